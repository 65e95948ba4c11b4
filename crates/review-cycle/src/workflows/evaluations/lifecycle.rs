//! Transition rules for the evaluation lifecycle.
//!
//! ```text
//! pending_self_evaluation --submit_self_evaluation (employee)--> pending_manager_review
//! pending_manager_review  --schedule_review_session (evaluator)--> in_review_session
//! in_review_session       --complete (evaluator)--> completed
//! completed               --acknowledge (employee)--> completed + acknowledged
//! ```
//!
//! Planning is pure: [`plan_transition`] validates a request against a snapshot of the
//! record and returns the record to write. Persisting it is the service's job.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Acknowledgement, Actor, CriterionId, Evaluation, EvaluationStatus, PersonId, RatingEntry,
    RatingSide,
};
use super::scoring::compute_overall_score;

pub type RatingInput = BTreeMap<CriterionId, RatingEntry>;

/// Explicit transition verbs accepted by the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transition {
    /// Store self ratings without submitting.
    SaveSelfRatings { ratings: RatingInput },
    SubmitSelfEvaluation {
        #[serde(default)]
        ratings: RatingInput,
    },
    /// Store manager ratings before or during the review session.
    SaveManagerRatings { ratings: RatingInput },
    ScheduleReviewSession {
        #[serde(rename = "sessionDate")]
        session_date: NaiveDate,
    },
    Complete {
        #[serde(default)]
        ratings: RatingInput,
    },
    Acknowledge {
        #[serde(default)]
        notes: String,
        #[serde(default)]
        signature: String,
    },
}

impl Transition {
    pub const fn action(&self) -> &'static str {
        match self {
            Transition::SaveSelfRatings { .. } => "save_self_ratings",
            Transition::SubmitSelfEvaluation { .. } => "submit_self_evaluation",
            Transition::SaveManagerRatings { .. } => "save_manager_ratings",
            Transition::ScheduleReviewSession { .. } => "schedule_review_session",
            Transition::Complete { .. } => "complete",
            Transition::Acknowledge { .. } => "acknowledge",
        }
    }

    /// Party allowed to request this transition.
    pub const fn party(&self) -> Party {
        match self {
            Transition::SaveSelfRatings { .. }
            | Transition::SubmitSelfEvaluation { .. }
            | Transition::Acknowledge { .. } => Party::Employee,
            Transition::SaveManagerRatings { .. }
            | Transition::ScheduleReviewSession { .. }
            | Transition::Complete { .. } => Party::Evaluator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Employee,
    Evaluator,
}

impl Party {
    pub const fn label(self) -> &'static str {
        match self {
            Party::Employee => "employee",
            Party::Evaluator => "evaluator",
        }
    }
}

/// Result of planning a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The record to persist.
    Apply(Evaluation),
    /// Identical re-submission of a transition that already took effect.
    Unchanged,
}

/// Input problems detected before any state is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("criterion {0} is not part of this evaluation's template")]
    UnknownCriterion(CriterionId),
    #[error("rating for criterion {0} must be a finite number")]
    NonFiniteRating(CriterionId),
    #[error("missing {side} ratings for required criteria: {}", join_ids(.criteria))]
    MissingRatings {
        side: &'static str,
        criteria: Vec<CriterionId>,
    },
    #[error("review session date {session_date} is before {today}")]
    SessionDateInPast {
        session_date: NaiveDate,
        today: NaiveDate,
    },
    #[error("no employees selected")]
    NoEmployeesSelected,
    #[error("scheduled date is required")]
    MissingScheduledDate,
    #[error("template {0} does not exist")]
    UnknownTemplate(String),
    #[error("{0} cannot schedule an evaluation for themselves")]
    SelfEvaluationRequest(PersonId),
}

fn join_ids(ids: &[CriterionId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn acknowledged_suffix(acknowledged: &bool) -> &'static str {
    if *acknowledged {
        " (acknowledged)"
    } else {
        ""
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("{actor} is not the {party} on this evaluation and cannot {action}")]
    Unauthorized {
        actor: PersonId,
        party: &'static str,
        action: &'static str,
    },
    #[error("cannot {action} while evaluation is {status}{}", acknowledged_suffix(.acknowledged))]
    InvalidState {
        action: &'static str,
        status: EvaluationStatus,
        acknowledged: bool,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Validates `transition` against `current` on behalf of `actor` and returns the record
/// to write. `current` is never mutated; a failed plan leaves nothing to roll back.
pub fn plan_transition(
    current: &Evaluation,
    actor: &Actor,
    transition: &Transition,
    today: NaiveDate,
) -> Result<Step, LifecycleError> {
    authorize(current, actor, transition)?;

    match transition {
        Transition::SaveSelfRatings { ratings } => {
            require_status(current, transition, &[EvaluationStatus::PendingSelfEvaluation])?;
            let next = with_ratings(current, RatingSide::SelfReview, ratings)?;
            Ok(apply_if_changed(current, next))
        }
        Transition::SubmitSelfEvaluation { ratings } => {
            if current.status == EvaluationStatus::PendingManagerReview
                && is_resubmission(current, RatingSide::SelfReview, ratings)
            {
                return Ok(Step::Unchanged);
            }
            require_status(current, transition, &[EvaluationStatus::PendingSelfEvaluation])?;

            let mut next = with_ratings(current, RatingSide::SelfReview, ratings)?;
            require_complete(&next, RatingSide::SelfReview)?;
            next.status = EvaluationStatus::PendingManagerReview;
            Ok(Step::Apply(next))
        }
        Transition::SaveManagerRatings { ratings } => {
            require_status(
                current,
                transition,
                &[
                    EvaluationStatus::PendingManagerReview,
                    EvaluationStatus::InReviewSession,
                ],
            )?;
            let next = with_ratings(current, RatingSide::ManagerReview, ratings)?;
            Ok(apply_if_changed(current, next))
        }
        Transition::ScheduleReviewSession { session_date } => {
            if current.status == EvaluationStatus::InReviewSession
                && current.review_session_date == Some(*session_date)
            {
                return Ok(Step::Unchanged);
            }
            require_status(current, transition, &[EvaluationStatus::PendingManagerReview])?;
            if *session_date < today {
                return Err(ValidationError::SessionDateInPast {
                    session_date: *session_date,
                    today,
                }
                .into());
            }

            let mut next = current.clone();
            next.review_session_date = Some(*session_date);
            next.status = EvaluationStatus::InReviewSession;
            Ok(Step::Apply(next))
        }
        Transition::Complete { ratings } => {
            if current.status == EvaluationStatus::Completed
                && is_resubmission(current, RatingSide::ManagerReview, ratings)
            {
                return Ok(Step::Unchanged);
            }
            require_status(current, transition, &[EvaluationStatus::InReviewSession])?;

            let mut next = with_ratings(current, RatingSide::ManagerReview, ratings)?;
            require_complete(&next, RatingSide::ManagerReview)?;
            let breakdown = compute_overall_score(&next.ratings, &next.template);
            next.overall_score = breakdown.overall;
            next.section_scores = breakdown.by_section;
            next.completed_date = Some(today);
            next.status = EvaluationStatus::Completed;
            Ok(Step::Apply(next))
        }
        Transition::Acknowledge { notes, signature } => {
            require_status(current, transition, &[EvaluationStatus::Completed])?;
            // First acknowledgment wins; repeats never overwrite the signature.
            if current.is_acknowledged() {
                return Ok(Step::Unchanged);
            }

            let mut next = current.clone();
            next.acknowledgement = Some(Acknowledgement {
                acknowledged: true,
                date: today,
                notes: notes.trim().to_string(),
                signature: signature.trim().to_string(),
            });
            Ok(Step::Apply(next))
        }
    }
}

fn authorize(
    current: &Evaluation,
    actor: &Actor,
    transition: &Transition,
) -> Result<(), LifecycleError> {
    let party = transition.party();
    let expected = match party {
        Party::Employee => &current.employee_id,
        Party::Evaluator => &current.evaluator_id,
    };

    if &actor.id == expected {
        Ok(())
    } else {
        Err(LifecycleError::Unauthorized {
            actor: actor.id.clone(),
            party: party.label(),
            action: transition.action(),
        })
    }
}

fn require_status(
    current: &Evaluation,
    transition: &Transition,
    allowed: &[EvaluationStatus],
) -> Result<(), LifecycleError> {
    if allowed.contains(&current.status) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidState {
            action: transition.action(),
            status: current.status,
            acknowledged: current.is_acknowledged(),
        })
    }
}

fn with_ratings(
    current: &Evaluation,
    side: RatingSide,
    ratings: &RatingInput,
) -> Result<Evaluation, ValidationError> {
    let mut next = current.clone();
    for (criterion_id, entry) in ratings {
        if current.template.criterion(criterion_id).is_none() {
            return Err(ValidationError::UnknownCriterion(criterion_id.clone()));
        }
        if !entry.rating.is_finite() {
            return Err(ValidationError::NonFiniteRating(criterion_id.clone()));
        }
        next.ratings
            .entry(criterion_id.clone())
            .or_default()
            .set(side, entry.clone());
    }
    Ok(next)
}

fn require_complete(next: &Evaluation, side: RatingSide) -> Result<(), ValidationError> {
    let missing = next.missing_ratings(side);
    if missing.is_empty() {
        return Ok(());
    }
    Err(ValidationError::MissingRatings {
        side: match side {
            RatingSide::SelfReview => "self",
            RatingSide::ManagerReview => "manager",
        },
        criteria: missing,
    })
}

fn is_resubmission(current: &Evaluation, side: RatingSide, ratings: &RatingInput) -> bool {
    ratings.iter().all(|(criterion_id, entry)| {
        current
            .ratings
            .get(criterion_id)
            .and_then(|stored| stored.side(side))
            == Some(entry)
    })
}

fn apply_if_changed(current: &Evaluation, next: Evaluation) -> Step {
    if next.ratings == current.ratings {
        Step::Unchanged
    } else {
        Step::Apply(next)
    }
}
