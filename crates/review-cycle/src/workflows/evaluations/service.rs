use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SchedulingConfig;

use super::domain::{
    Actor, ActorRole, Employee, Evaluation, EvaluationId, EvaluationStatus, PersonId, TemplateId,
};
use super::due::DueDateClassifier;
use super::eligibility::{can_view, resolve_eligible, within_reach, EligibilityReport};
use super::lifecycle::{plan_transition, LifecycleError, Step, Transition, ValidationError};
use super::query::{dashboard_stats, run_query, DashboardStats, EvaluationQuery, EvaluationSummary};
use super::repository::{
    DirectoryError, EvaluationNotice, EvaluationRepository, NoticeKind, NotificationPublisher,
    PeopleDirectory, RepositoryError, TemplateCatalog,
};

/// Batch scheduling request: one evaluation per listed employee, sharing template and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationsRequest {
    #[serde(default)]
    pub employee_ids: Vec<PersonId>,
    pub template_id: TemplateId,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
}

/// Per-employee outcome of a batch creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CreationOutcome {
    Created {
        #[serde(rename = "evaluationId")]
        evaluation_id: EvaluationId,
    },
    /// The employee already holds an active evaluation.
    Blocked {
        #[serde(rename = "existingEvaluationId")]
        existing_evaluation_id: EvaluationId,
    },
    Rejected { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationResult {
    pub employee_id: PersonId,
    #[serde(flatten)]
    pub outcome: CreationOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreation {
    pub created: usize,
    pub results: Vec<CreationResult>,
}

impl BatchCreation {
    fn push(&mut self, employee_id: PersonId, outcome: CreationOutcome) {
        if matches!(outcome, CreationOutcome::Created { .. }) {
            self.created += 1;
        }
        self.results.push(CreationResult {
            employee_id,
            outcome,
        });
    }
}

/// Facade wiring the lifecycle engine to storage, the people directory, the template
/// catalog, and outbound notifications.
pub struct EvaluationService<R, A> {
    repository: Arc<R>,
    notifier: Arc<A>,
    people: Arc<dyn PeopleDirectory>,
    templates: Arc<dyn TemplateCatalog>,
    scheduling: SchedulingConfig,
    classifier: DueDateClassifier,
    sequence: AtomicU64,
}

impl<R, A> EvaluationService<R, A>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<A>,
        people: Arc<dyn PeopleDirectory>,
        templates: Arc<dyn TemplateCatalog>,
        scheduling: SchedulingConfig,
    ) -> Self {
        let classifier = DueDateClassifier::from(&scheduling);
        Self {
            repository,
            notifier,
            people,
            templates,
            scheduling,
            classifier,
            sequence: AtomicU64::new(1),
        }
    }

    fn next_evaluation_id(&self) -> EvaluationId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        EvaluationId(format!("eval-{id:06}"))
    }

    /// Employees the actor may schedule, split into available and blocked.
    pub fn eligible(
        &self,
        actor: &Actor,
        team_only: bool,
    ) -> Result<EligibilityReport, EvaluationServiceError> {
        let roster = self.people.roster()?;
        let evaluations = self.repository.list()?;
        Ok(resolve_eligible(actor, &roster, &evaluations, team_only))
    }

    /// Schedules one evaluation per requested employee.
    ///
    /// Request-level problems (no employees, no date, unknown template, a role that
    /// cannot schedule) fail the whole call. Per-employee problems are reported in the
    /// result list and never stop the remaining rows.
    pub fn create_batch(
        &self,
        actor: &Actor,
        request: CreateEvaluationsRequest,
    ) -> Result<BatchCreation, EvaluationServiceError> {
        if !actor.role.can_schedule() {
            return Err(EvaluationServiceError::Forbidden {
                actor: actor.id.clone(),
                action: "schedule evaluations",
            });
        }
        if request.employee_ids.is_empty() {
            return Err(ValidationError::NoEmployeesSelected.into());
        }
        let scheduled_date = request
            .scheduled_date
            .ok_or(ValidationError::MissingScheduledDate)?;
        let template = self
            .templates
            .template(&request.template_id)?
            .ok_or_else(|| ValidationError::UnknownTemplate(request.template_id.0.clone()))?;

        let roster: HashMap<PersonId, Employee> = self
            .people
            .roster()?
            .into_iter()
            .map(|employee| (employee.id.clone(), employee))
            .collect();

        let mut seen = BTreeSet::new();
        let mut batch = BatchCreation::default();

        for employee_id in request.employee_ids {
            if !seen.insert(employee_id.clone()) {
                let reason = format!("employee {employee_id} is listed more than once");
                batch.push(employee_id, rejected(ErrorKind::Validation, reason));
                continue;
            }

            if employee_id == actor.id {
                let reason = ValidationError::SelfEvaluationRequest(employee_id.clone());
                batch.push(employee_id, rejected(ErrorKind::Validation, reason));
                continue;
            }
            let Some(employee) = roster.get(&employee_id) else {
                let reason = format!("employee {employee_id} is not in the directory");
                batch.push(employee_id, rejected(ErrorKind::NotFound, reason));
                continue;
            };
            if !within_reach(actor, employee, false) {
                let reason = format!("{} cannot schedule {employee_id}", actor.id);
                batch.push(employee_id, rejected(ErrorKind::Authorization, reason));
                continue;
            }

            let record = Evaluation::scheduled(
                self.next_evaluation_id(),
                employee_id.clone(),
                actor.id.clone(),
                template.clone(),
                scheduled_date,
            );

            let outcome = match self.repository.insert_active(record) {
                Ok(stored) => {
                    info!(
                        evaluation_id = %stored.id,
                        employee_id = %stored.employee_id,
                        evaluator_id = %stored.evaluator_id,
                        %scheduled_date,
                        "evaluation scheduled"
                    );
                    self.notify(&stored, NoticeKind::EvaluationScheduled);
                    CreationOutcome::Created {
                        evaluation_id: stored.id,
                    }
                }
                Err(RepositoryError::ActiveEvaluationExists { existing, .. }) => {
                    CreationOutcome::Blocked {
                        existing_evaluation_id: existing,
                    }
                }
                Err(error) => {
                    let error = EvaluationServiceError::from(error);
                    rejected(error.kind(), error)
                }
            };
            batch.push(employee_id, outcome);
        }

        Ok(batch)
    }

    /// Reads one evaluation on behalf of `actor`. Records outside the actor's read
    /// scope are refused rather than reported missing.
    pub fn get(
        &self,
        id: &EvaluationId,
        actor: &Actor,
    ) -> Result<Evaluation, EvaluationServiceError> {
        let record = self.load(id)?;
        if !can_view(actor, &record, &self.people_index()?) {
            return Err(EvaluationServiceError::Forbidden {
                actor: actor.id.clone(),
                action: "view this evaluation",
            });
        }
        Ok(record)
    }

    fn load(&self, id: &EvaluationId) -> Result<Evaluation, EvaluationServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Applies `transition` on behalf of `actor`. A rejected request leaves the stored
    /// record untouched; an identical re-submission returns the current record.
    pub fn transition(
        &self,
        id: &EvaluationId,
        actor: &Actor,
        transition: Transition,
        today: NaiveDate,
    ) -> Result<Evaluation, EvaluationServiceError> {
        let current = self.load(id)?;

        match plan_transition(&current, actor, &transition, today)? {
            Step::Unchanged => {
                debug!(
                    evaluation_id = %id,
                    action = transition.action(),
                    "transition already applied"
                );
                Ok(current)
            }
            Step::Apply(next) => {
                let stored = self.repository.compare_and_swap(current.stamp(), next)?;
                info!(
                    evaluation_id = %stored.id,
                    action = transition.action(),
                    from = %current.status,
                    to = %stored.status,
                    version = stored.version,
                    "evaluation updated"
                );
                if let Some(kind) = notice_for(&transition) {
                    self.notify(&stored, kind);
                }
                Ok(stored)
            }
        }
    }

    pub fn acknowledge(
        &self,
        id: &EvaluationId,
        actor: &Actor,
        notes: String,
        signature: String,
        today: NaiveDate,
    ) -> Result<Evaluation, EvaluationServiceError> {
        self.transition(id, actor, Transition::Acknowledge { notes, signature }, today)
    }

    /// Removes a record outright. Administrators only, from any state.
    pub fn delete(
        &self,
        id: &EvaluationId,
        actor: &Actor,
    ) -> Result<Evaluation, EvaluationServiceError> {
        if actor.role != ActorRole::Administrator {
            return Err(EvaluationServiceError::Forbidden {
                actor: actor.id.clone(),
                action: "delete evaluations",
            });
        }
        let removed = self.repository.delete(id)?;
        info!(
            evaluation_id = %removed.id,
            employee_id = %removed.employee_id,
            status = %removed.status,
            deleted_by = %actor.id,
            "evaluation deleted"
        );
        Ok(removed)
    }

    pub fn list(
        &self,
        actor: &Actor,
        query: &EvaluationQuery,
        now: NaiveDateTime,
    ) -> Result<Vec<EvaluationSummary>, EvaluationServiceError> {
        let (evaluations, people) = self.visible_to(actor)?;
        Ok(run_query(&evaluations, &people, query, &self.classifier, now))
    }

    /// Dashboard badges over the evaluations the actor can see.
    pub fn dashboard(
        &self,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<DashboardStats, EvaluationServiceError> {
        let (evaluations, people) = self.visible_to(actor)?;
        Ok(dashboard_stats(
            &evaluations,
            &people,
            &self.classifier,
            now,
            self.scheduling.upcoming_limit,
        ))
    }

    fn visible_to(
        &self,
        actor: &Actor,
    ) -> Result<(Vec<Evaluation>, HashMap<PersonId, Employee>), EvaluationServiceError> {
        let people = self.people_index()?;
        let evaluations = self
            .repository
            .list()?
            .into_iter()
            .filter(|evaluation| can_view(actor, evaluation, &people))
            .collect();
        Ok((evaluations, people))
    }

    fn people_index(&self) -> Result<HashMap<PersonId, Employee>, DirectoryError> {
        Ok(self
            .people
            .roster()?
            .into_iter()
            .map(|employee| (employee.id.clone(), employee))
            .collect())
    }

    fn notify(&self, evaluation: &Evaluation, kind: NoticeKind) {
        let recipient = match kind {
            NoticeKind::SelfEvaluationSubmitted | NoticeKind::EvaluationAcknowledged => {
                evaluation.evaluator_id.clone()
            }
            _ => evaluation.employee_id.clone(),
        };

        let mut details = BTreeMap::new();
        details.insert("status".to_string(), evaluation.status.label().to_string());
        details.insert(
            "scheduledDate".to_string(),
            evaluation.scheduled_date.to_string(),
        );
        if let Some(session) = evaluation.review_session_date {
            details.insert("reviewSessionDate".to_string(), session.to_string());
        }
        if let Some(score) = evaluation.overall_score {
            details.insert("overallScore".to_string(), format!("{score:.2}"));
        }

        let notice = EvaluationNotice {
            kind,
            evaluation_id: evaluation.id.clone(),
            recipient,
            details,
        };
        if let Err(error) = self.notifier.publish(notice) {
            warn!(evaluation_id = %evaluation.id, ?kind, %error, "notification not delivered");
        }
    }
}

fn notice_for(transition: &Transition) -> Option<NoticeKind> {
    match transition {
        Transition::SubmitSelfEvaluation { .. } => Some(NoticeKind::SelfEvaluationSubmitted),
        Transition::ScheduleReviewSession { .. } => Some(NoticeKind::ReviewSessionScheduled),
        Transition::Complete { .. } => Some(NoticeKind::EvaluationCompleted),
        Transition::Acknowledge { .. } => Some(NoticeKind::EvaluationAcknowledged),
        Transition::SaveSelfRatings { .. } | Transition::SaveManagerRatings { .. } => None,
    }
}

fn rejected(kind: ErrorKind, reason: impl ToString) -> CreationOutcome {
    CreationOutcome::Rejected {
        kind,
        reason: reason.to_string(),
    }
}

/// Caller-facing error classes. Only `Unavailable` is worth retrying automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    InvalidState,
    Conflict,
    NotFound,
    Unavailable,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

/// Error raised by the evaluation service.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("{actor} is not allowed to {action}")]
    Forbidden {
        actor: PersonId,
        action: &'static str,
    },
}

impl EvaluationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvaluationServiceError::Lifecycle(LifecycleError::Unauthorized { .. }) => {
                ErrorKind::Authorization
            }
            EvaluationServiceError::Lifecycle(LifecycleError::InvalidState { .. }) => {
                ErrorKind::InvalidState
            }
            EvaluationServiceError::Lifecycle(LifecycleError::Validation(_))
            | EvaluationServiceError::Validation(_) => ErrorKind::Validation,
            EvaluationServiceError::Repository(error) => match error {
                RepositoryError::ActiveEvaluationExists { .. }
                | RepositoryError::DuplicateId(_)
                | RepositoryError::StaleState { .. } => ErrorKind::Conflict,
                RepositoryError::NotFound => ErrorKind::NotFound,
                RepositoryError::Unavailable(_) => ErrorKind::Unavailable,
            },
            EvaluationServiceError::Directory(_) => ErrorKind::Unavailable,
            EvaluationServiceError::Forbidden { .. } => ErrorKind::Authorization,
        }
    }

    /// Status the evaluation was found in, for invalid-state rejections.
    pub fn observed_status(&self) -> Option<EvaluationStatus> {
        match self {
            EvaluationServiceError::Lifecycle(LifecycleError::InvalidState { status, .. }) => {
                Some(*status)
            }
            EvaluationServiceError::Repository(RepositoryError::StaleState { found, .. }) => {
                Some(*found)
            }
            _ => None,
        }
    }
}
