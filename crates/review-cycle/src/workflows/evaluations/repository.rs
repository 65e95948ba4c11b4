use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    Employee, Evaluation, EvaluationId, EvaluationStatus, PersonId, StateStamp, TemplateId,
    TemplateSnapshot,
};

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations must make `insert_active` and `compare_and_swap` atomic with respect
/// to each other: at most one active evaluation per employee may ever be observable.
pub trait EvaluationRepository: Send + Sync {
    /// Inserts `record` unless its employee already holds an active evaluation.
    fn insert_active(&self, record: Evaluation) -> Result<Evaluation, RepositoryError>;
    /// Replaces the stored record when its state still matches `expected`. The stored
    /// version is bumped and the written record returned.
    fn compare_and_swap(
        &self,
        expected: StateStamp,
        record: Evaluation,
    ) -> Result<Evaluation, RepositoryError>;
    fn fetch(&self, id: &EvaluationId) -> Result<Option<Evaluation>, RepositoryError>;
    fn delete(&self, id: &EvaluationId) -> Result<Evaluation, RepositoryError>;
    fn list(&self) -> Result<Vec<Evaluation>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("employee {employee_id} already has active evaluation {existing}")]
    ActiveEvaluationExists {
        employee_id: PersonId,
        existing: EvaluationId,
    },
    #[error("evaluation {0} already exists")]
    DuplicateId(EvaluationId),
    #[error("evaluation changed concurrently (expected {expected}, found {found})")]
    StaleState {
        expected: EvaluationStatus,
        found: EvaluationStatus,
    },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the externally owned employee roster.
pub trait PeopleDirectory: Send + Sync {
    fn roster(&self) -> Result<Vec<Employee>, DirectoryError>;

    fn employee(&self, id: &PersonId) -> Result<Option<Employee>, DirectoryError> {
        Ok(self
            .roster()?
            .into_iter()
            .find(|employee| &employee.id == id))
    }
}

/// Read access to the externally owned template catalog.
pub trait TemplateCatalog: Send + Sync {
    fn template(&self, id: &TemplateId) -> Result<Option<TemplateSnapshot>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for evaluation events (e-mail, in-app badges, ...).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: EvaluationNotice) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    EvaluationScheduled,
    SelfEvaluationSubmitted,
    ReviewSessionScheduled,
    EvaluationCompleted,
    EvaluationAcknowledged,
}

/// Payload handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationNotice {
    pub kind: NoticeKind,
    pub evaluation_id: EvaluationId,
    pub recipient: PersonId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
