use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::SchedulingConfig;
use crate::workflows::evaluations::domain::{
    Actor, ActorRole, Criterion, CriterionId, Employee, EvaluationId, GradingScale, PersonId,
    RatingEntry, ScaleLevel, SectionId, TemplateId, TemplateSection, TemplateSnapshot,
};
use crate::workflows::evaluations::lifecycle::{RatingInput, Transition};
use crate::workflows::evaluations::repository::{
    DirectoryError, EvaluationNotice, NotificationError, NotificationPublisher, PeopleDirectory,
    TemplateCatalog,
};
use crate::workflows::evaluations::service::{
    CreateEvaluationsRequest, CreationOutcome, EvaluationService,
};
use crate::workflows::evaluations::store::InMemoryEvaluationStore;

pub(super) const TEMPLATE_ID: &str = "store-associate";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 14).expect("valid date")
}

pub(super) fn five_point() -> GradingScale {
    GradingScale {
        id: "five-point".to_string(),
        name: "Five point".to_string(),
        levels: (1..=5)
            .map(|value| ScaleLevel {
                value: value as f64,
                label: format!("{value}"),
            })
            .collect(),
    }
}

fn criterion(id: &str, name: &str, required: bool) -> Criterion {
    Criterion {
        id: CriterionId::from(id),
        name: name.to_string(),
        required,
        scale: Some(five_point()),
    }
}

pub(super) fn template() -> TemplateSnapshot {
    TemplateSnapshot {
        id: TemplateId::from(TEMPLATE_ID),
        name: "Store Associate Quarterly".to_string(),
        sections: vec![
            TemplateSection {
                id: SectionId::from("service"),
                name: "Customer service".to_string(),
                criteria: vec![
                    criterion("greeting", "Greets customers", true),
                    criterion("product_knowledge", "Product knowledge", true),
                ],
            },
            TemplateSection {
                id: SectionId::from("operations"),
                name: "Store operations".to_string(),
                criteria: vec![
                    criterion("punctuality", "Punctuality", true),
                    criterion("merchandising", "Merchandising", false),
                ],
            },
        ],
    }
}

fn person(id: &str, name: &str, manager: Option<&str>, department: &str) -> Employee {
    Employee {
        id: PersonId::from(id),
        name: name.to_string(),
        manager_id: manager.map(PersonId::from),
        department: Some(department.to_string()),
        position: None,
    }
}

/// D1 runs the store; M1 and M2 report to D1; E1/E2 report to M1, E3 to M2.
pub(super) fn roster() -> Vec<Employee> {
    vec![
        person("D1", "Dana Director", None, "Management"),
        person("M1", "Morgan Manager", Some("D1"), "Management"),
        person("M2", "Riley Manager", Some("D1"), "Management"),
        person("E1", "Avery Stone", Some("M1"), "Grocery"),
        person("E2", "Blake Moss", Some("M1"), "Pharmacy"),
        person("E3", "Casey Lin", Some("M2"), "Grocery"),
    ]
}

pub(super) fn manager() -> Actor {
    Actor::new("M1", ActorRole::Manager)
}

pub(super) fn director() -> Actor {
    Actor::new("D1", ActorRole::Director)
}

pub(super) fn administrator() -> Actor {
    Actor::new("A1", ActorRole::Administrator)
}

pub(super) fn employee(id: &str) -> Actor {
    Actor::new(id, ActorRole::Employee)
}

pub(super) fn ratings(values: &[(&str, f64)]) -> RatingInput {
    values
        .iter()
        .map(|(id, rating)| {
            (
                CriterionId::from(*id),
                RatingEntry {
                    rating: *rating,
                    comment: String::new(),
                    attachments: Vec::new(),
                },
            )
        })
        .collect()
}

pub(super) fn full_self_ratings() -> RatingInput {
    ratings(&[("greeting", 4.0), ("product_knowledge", 3.0), ("punctuality", 5.0)])
}

pub(super) fn full_manager_ratings() -> RatingInput {
    ratings(&[
        ("greeting", 4.0),
        ("product_knowledge", 3.0),
        ("punctuality", 4.0),
        ("merchandising", 5.0),
    ])
}

pub(super) fn request(employee_ids: &[&str]) -> CreateEvaluationsRequest {
    CreateEvaluationsRequest {
        employee_ids: employee_ids.iter().map(|id| PersonId::from(*id)).collect(),
        template_id: TemplateId::from(TEMPLATE_ID),
        scheduled_date: Some(today()),
    }
}

#[derive(Clone)]
pub(super) struct MemoryDirectory {
    employees: Vec<Employee>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self {
            employees: roster(),
        }
    }
}

impl PeopleDirectory for MemoryDirectory {
    fn roster(&self) -> Result<Vec<Employee>, DirectoryError> {
        Ok(self.employees.clone())
    }
}

pub(super) struct UnavailableDirectory;

impl PeopleDirectory for UnavailableDirectory {
    fn roster(&self) -> Result<Vec<Employee>, DirectoryError> {
        Err(DirectoryError::Unavailable("hr system offline".to_string()))
    }
}

pub(super) struct MemoryCatalog {
    templates: HashMap<TemplateId, TemplateSnapshot>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        let template = template();
        Self {
            templates: HashMap::from([(template.id.clone(), template)]),
        }
    }
}

impl TemplateCatalog for MemoryCatalog {
    fn template(&self, id: &TemplateId) -> Result<Option<TemplateSnapshot>, DirectoryError> {
        Ok(self.templates.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<EvaluationNotice>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<EvaluationNotice> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryNotifier {
    fn publish(&self, notice: EvaluationNotice) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationPublisher for FailingNotifier {
    fn publish(&self, _notice: EvaluationNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay refused".to_string()))
    }
}

pub(super) type TestService = EvaluationService<InMemoryEvaluationStore, MemoryNotifier>;

pub(super) fn build_service() -> (TestService, Arc<InMemoryEvaluationStore>, Arc<MemoryNotifier>) {
    let store = Arc::new(InMemoryEvaluationStore::new());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = EvaluationService::new(
        store.clone(),
        notifier.clone(),
        Arc::new(MemoryDirectory::default()),
        Arc::new(MemoryCatalog::default()),
        SchedulingConfig::default(),
    );
    (service, store, notifier)
}

/// Schedules one evaluation for `employee_id` as M1 and returns its id.
pub(super) fn schedule<R, A>(service: &EvaluationService<R, A>, employee_id: &str) -> EvaluationId
where
    R: crate::workflows::evaluations::repository::EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let batch = service
        .create_batch(&manager(), request(&[employee_id]))
        .expect("batch accepted");
    match &batch.results[0].outcome {
        CreationOutcome::Created { evaluation_id } => evaluation_id.clone(),
        other => panic!("expected creation, got {other:?}"),
    }
}

/// Drives a freshly scheduled evaluation up to `in_review_session`.
pub(super) fn advance_to_review_session<R, A>(
    service: &EvaluationService<R, A>,
    id: &EvaluationId,
    employee_id: &str,
) where
    R: crate::workflows::evaluations::repository::EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    service
        .transition(
            id,
            &employee(employee_id),
            Transition::SubmitSelfEvaluation {
                ratings: full_self_ratings(),
            },
            today(),
        )
        .expect("self evaluation submitted");
    service
        .transition(
            id,
            &manager(),
            Transition::ScheduleReviewSession {
                session_date: today(),
            },
            today(),
        )
        .expect("session scheduled");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
