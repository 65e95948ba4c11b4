use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for evaluation records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvaluationId(pub String);

/// Identifier for a person owned by the external people directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectionId(pub String);

/// Stable criterion key used to index ratings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CriterionId(pub String);

macro_rules! display_as_inner {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

display_as_inner!(EvaluationId, PersonId, TemplateId, SectionId, CriterionId);

/// Position of an evaluation in the review lifecycle.
///
/// Acknowledgment is tracked separately on [`Evaluation::acknowledgement`] once the
/// evaluation is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    PendingSelfEvaluation,
    PendingManagerReview,
    InReviewSession,
    Completed,
}

impl EvaluationStatus {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::PendingSelfEvaluation,
            Self::PendingManagerReview,
            Self::InReviewSession,
            Self::Completed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingSelfEvaluation => "pending_self_evaluation",
            Self::PendingManagerReview => "pending_manager_review",
            Self::InReviewSession => "in_review_session",
            Self::Completed => "completed",
        }
    }

    /// Lifecycle position, used for forward-only checks and status sorting.
    pub const fn rank(self) -> u8 {
        match self {
            Self::PendingSelfEvaluation => 0,
            Self::PendingManagerReview => 1,
            Self::InReviewSession => 2,
            Self::Completed => 3,
        }
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reference to a file held by the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub id: String,
    pub file_name: String,
}

/// A single rating entered against one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// Which party entered a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSide {
    SelfReview,
    ManagerReview,
}

/// Self and manager ratings recorded for one criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionRatings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_review: Option<RatingEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_review: Option<RatingEntry>,
}

impl CriterionRatings {
    pub fn side(&self, side: RatingSide) -> Option<&RatingEntry> {
        match side {
            RatingSide::SelfReview => self.self_review.as_ref(),
            RatingSide::ManagerReview => self.manager_review.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, side: RatingSide, entry: RatingEntry) {
        match side {
            RatingSide::SelfReview => self.self_review = Some(entry),
            RatingSide::ManagerReview => self.manager_review = Some(entry),
        }
    }
}

pub type RatingSheet = BTreeMap<CriterionId, CriterionRatings>;

/// Employee's signed confirmation of a completed evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub acknowledged: bool,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub signature: String,
}

/// Ordered set of labeled values a criterion is rated on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingScale {
    pub id: String,
    pub name: String,
    pub levels: Vec<ScaleLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleLevel {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<GradingScale>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSection {
    pub id: SectionId,
    pub name: String,
    pub criteria: Vec<Criterion>,
}

/// Copy of a template taken when an evaluation is created. Later template edits
/// never reach evaluations that already exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub id: TemplateId,
    pub name: String,
    pub sections: Vec<TemplateSection>,
}

impl TemplateSnapshot {
    pub fn criteria(&self) -> impl Iterator<Item = (&TemplateSection, &Criterion)> {
        self.sections
            .iter()
            .flat_map(|section| section.criteria.iter().map(move |c| (section, c)))
    }

    pub fn criterion(&self, id: &CriterionId) -> Option<&Criterion> {
        self.criteria()
            .map(|(_, criterion)| criterion)
            .find(|criterion| &criterion.id == id)
    }

    pub fn required_criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria()
            .map(|(_, criterion)| criterion)
            .filter(|criterion| criterion.required)
    }
}

/// One scheduled performance review for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: EvaluationId,
    pub employee_id: PersonId,
    pub evaluator_id: PersonId,
    pub template_id: TemplateId,
    pub template: TemplateSnapshot,
    pub status: EvaluationStatus,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub review_session_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed_date: Option<NaiveDate>,
    #[serde(default)]
    pub ratings: RatingSheet,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub section_scores: BTreeMap<SectionId, f64>,
    #[serde(default)]
    pub acknowledgement: Option<Acknowledgement>,
    #[serde(default)]
    pub version: u64,
}

impl Evaluation {
    /// Fresh record in the initial lifecycle state.
    pub fn scheduled(
        id: EvaluationId,
        employee_id: PersonId,
        evaluator_id: PersonId,
        template: TemplateSnapshot,
        scheduled_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            employee_id,
            evaluator_id,
            template_id: template.id.clone(),
            template,
            status: EvaluationStatus::PendingSelfEvaluation,
            scheduled_date,
            review_session_date: None,
            completed_date: None,
            ratings: RatingSheet::new(),
            overall_score: None,
            section_scores: BTreeMap::new(),
            acknowledgement: None,
            version: 0,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgement
            .as_ref()
            .map(|ack| ack.acknowledged)
            .unwrap_or(false)
    }

    /// An evaluation occupies the employee's slot until it is completed and acknowledged.
    pub fn is_active(&self) -> bool {
        !(self.status == EvaluationStatus::Completed && self.is_acknowledged())
    }

    pub fn stamp(&self) -> StateStamp {
        StateStamp {
            status: self.status,
            acknowledged: self.is_acknowledged(),
            version: self.version,
        }
    }

    /// Criteria marked required that have no rating from `side`.
    pub fn missing_ratings(&self, side: RatingSide) -> Vec<CriterionId> {
        self.template
            .required_criteria()
            .filter(|criterion| {
                self.ratings
                    .get(&criterion.id)
                    .and_then(|ratings| ratings.side(side))
                    .is_none()
            })
            .map(|criterion| criterion.id.clone())
            .collect()
    }
}

/// Observed state used for compare-and-swap writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateStamp {
    pub status: EvaluationStatus,
    pub acknowledged: bool,
    pub version: u64,
}

/// Roster entry supplied by the people directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub manager_id: Option<PersonId>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl Employee {
    /// Department used for filtering, falling back to the position title.
    pub fn department_label(&self) -> Option<&str> {
        self.department
            .as_deref()
            .or(self.position.as_deref())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn reports_to(&self, manager: &PersonId) -> bool {
        self.manager_id.as_ref() == Some(manager)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Employee,
    Manager,
    Director,
    Administrator,
}

impl ActorRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => Some(Self::Employee),
            "manager" => Some(Self::Manager),
            "director" => Some(Self::Director),
            "admin" | "administrator" => Some(Self::Administrator),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Director => "director",
            Self::Administrator => "administrator",
        }
    }

    /// Roles that may schedule new evaluations.
    pub const fn can_schedule(self) -> bool {
        matches!(self, Self::Manager | Self::Director | Self::Administrator)
    }
}

/// The identity on whose behalf an engine call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: PersonId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: PersonId(id.into()),
            role,
        }
    }
}
