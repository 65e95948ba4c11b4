//! Performance-evaluation scheduling and lifecycle.
//!
//! Evaluations are created in batches by managers, move through self-evaluation,
//! manager review and a review session, and end with the employee's acknowledgment.
//! Everything outside the store (people, templates, notifications) is reached through
//! the collaborator traits in [`repository`].

pub mod domain;
pub mod due;
pub mod eligibility;
pub mod lifecycle;
pub mod query;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Acknowledgement, Actor, ActorRole, AttachmentRef, Criterion, CriterionId, CriterionRatings,
    Employee, Evaluation, EvaluationId, EvaluationStatus, GradingScale, PersonId, RatingEntry,
    RatingSheet, RatingSide, ScaleLevel, SectionId, StateStamp, TemplateId, TemplateSection,
    TemplateSnapshot,
};
pub use due::{classify, DueBucket, DueDateClassifier, DueStatus};
pub use eligibility::{resolve_eligible, BlockedEmployee, EligibilityReport};
pub use lifecycle::{
    plan_transition, LifecycleError, Party, RatingInput, Step, Transition, ValidationError,
};
pub use query::{
    DashboardStats, DateRange, EvaluationQuery, EvaluationSummary, SortField, SortOrder,
    StatusFilter,
};
pub use repository::{
    DirectoryError, EvaluationNotice, EvaluationRepository, NoticeKind, NotificationError,
    NotificationPublisher, PeopleDirectory, RepositoryError, TemplateCatalog,
};
pub use router::{evaluation_router, ActorHeader, ActorRejection};
pub use scoring::{compute_overall_score, ScoreBreakdown};
pub use service::{
    BatchCreation, CreateEvaluationsRequest, CreationOutcome, CreationResult, ErrorKind,
    EvaluationService, EvaluationServiceError,
};
pub use store::InMemoryEvaluationStore;
