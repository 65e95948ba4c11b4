use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use review_cycle::workflows::evaluations::{
    Criterion, CriterionId, DirectoryError, Employee, EvaluationNotice, GradingScale,
    NotificationError, NotificationPublisher, PeopleDirectory, PersonId, ScaleLevel, SectionId,
    TemplateCatalog, TemplateId, TemplateSection, TemplateSnapshot,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Roster used until the HR system integration is wired in.
#[derive(Debug, Clone)]
pub(crate) struct InMemoryPeopleDirectory {
    employees: Vec<Employee>,
}

impl InMemoryPeopleDirectory {
    pub(crate) fn seeded() -> Self {
        let person = |id: &str, name: &str, manager: Option<&str>, department: &str, position: &str| {
            Employee {
                id: PersonId::from(id),
                name: name.to_string(),
                manager_id: manager.map(PersonId::from),
                department: Some(department.to_string()),
                position: Some(position.to_string()),
            }
        };

        Self {
            employees: vec![
                person("D100", "Jordan Park", None, "Store Leadership", "Store Director"),
                person("M200", "Priya Shah", Some("D100"), "Front End", "Front End Manager"),
                person("M201", "Luis Ortega", Some("D100"), "Grocery", "Grocery Manager"),
                person("E300", "Sam Rivera", Some("M200"), "Front End", "Cashier"),
                person("E301", "Taylor Brooks", Some("M200"), "Front End", "Customer Service Associate"),
                person("E302", "Jamie Chen", Some("M201"), "Grocery", "Stock Associate"),
                person("E303", "Alex Morgan", Some("M201"), "Grocery", "Produce Associate"),
            ],
        }
    }
}

impl PeopleDirectory for InMemoryPeopleDirectory {
    fn roster(&self) -> Result<Vec<Employee>, DirectoryError> {
        Ok(self.employees.clone())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InMemoryTemplateCatalog {
    templates: HashMap<TemplateId, TemplateSnapshot>,
}

impl InMemoryTemplateCatalog {
    pub(crate) fn seeded() -> Self {
        let scale = GradingScale {
            id: "five-point".to_string(),
            name: "Five point".to_string(),
            levels: [
                "Needs improvement",
                "Developing",
                "Meets expectations",
                "Exceeds expectations",
                "Outstanding",
            ]
            .into_iter()
            .enumerate()
            .map(|(index, label)| ScaleLevel {
                value: (index + 1) as f64,
                label: label.to_string(),
            })
            .collect(),
        };
        let criterion = |id: &str, name: &str, required: bool| Criterion {
            id: CriterionId::from(id),
            name: name.to_string(),
            required,
            scale: Some(scale.clone()),
        };
        let section = |id: &str, name: &str, criteria: Vec<Criterion>| TemplateSection {
            id: SectionId::from(id),
            name: name.to_string(),
            criteria,
        };

        let associate = TemplateSnapshot {
            id: TemplateId::from("associate-quarterly"),
            name: "Store Associate Quarterly Review".to_string(),
            sections: vec![
                section(
                    "customer-service",
                    "Customer Service",
                    vec![
                        criterion("greeting", "Greets and assists customers", true),
                        criterion("checkout-accuracy", "Checkout accuracy", true),
                    ],
                ),
                section(
                    "operations",
                    "Store Operations",
                    vec![
                        criterion("punctuality", "Punctuality and attendance", true),
                        criterion("merchandising", "Merchandising standards", false),
                    ],
                ),
                section(
                    "teamwork",
                    "Teamwork",
                    vec![criterion("collaboration", "Supports teammates", true)],
                ),
            ],
        };
        let leadership = TemplateSnapshot {
            id: TemplateId::from("shift-lead-annual"),
            name: "Shift Lead Annual Review".to_string(),
            sections: vec![section(
                "leadership",
                "Leadership",
                vec![
                    criterion("coaching", "Coaches associates", true),
                    criterion("scheduling", "Shift coverage planning", true),
                ],
            )],
        };

        Self {
            templates: [associate, leadership]
                .into_iter()
                .map(|template| (template.id.clone(), template))
                .collect(),
        }
    }
}

impl TemplateCatalog for InMemoryTemplateCatalog {
    fn template(&self, id: &TemplateId) -> Result<Option<TemplateSnapshot>, DirectoryError> {
        Ok(self.templates.get(id).cloned())
    }
}

/// Logs every notice and keeps it for inspection; stands in for e-mail delivery.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    notices: Arc<Mutex<Vec<EvaluationNotice>>>,
}

impl NotificationPublisher for LoggingNotifier {
    fn publish(&self, notice: EvaluationNotice) -> Result<(), NotificationError> {
        info!(
            kind = ?notice.kind,
            evaluation_id = %notice.evaluation_id,
            recipient = %notice.recipient,
            "evaluation notice"
        );
        let mut guard = self
            .notices
            .lock()
            .map_err(|_| NotificationError::Transport("notice log poisoned".to_string()))?;
        guard.push(notice);
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn notices(&self) -> Vec<EvaluationNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_roster_has_reporting_lines() {
        let roster = InMemoryPeopleDirectory::seeded().roster().expect("roster");
        let managed_by_m200 = roster
            .iter()
            .filter(|employee| employee.reports_to(&PersonId::from("M200")))
            .count();
        assert_eq!(managed_by_m200, 2);
    }

    #[test]
    fn seeded_catalog_resolves_templates() {
        let catalog = InMemoryTemplateCatalog::seeded();
        let template = catalog
            .template(&TemplateId::from("associate-quarterly"))
            .expect("lookup")
            .expect("present");
        assert_eq!(template.required_criteria().count(), 4);
        assert!(catalog
            .template(&TemplateId::from("missing"))
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert!(parse_date(" 2025-02-28 ").is_ok());
        let error = parse_date("28/02/2025").expect_err("rejects other formats");
        assert!(error.contains("YYYY-MM-DD"));
    }
}
