use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{
    Employee, Evaluation, EvaluationId, EvaluationStatus, PersonId, TemplateId,
};
use super::due::{DueBucket, DueDateClassifier, DueStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    NotCompleted,
    PendingSelfEvaluation,
    PendingManagerReview,
    InReviewSession,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, status: EvaluationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::NotCompleted => status != EvaluationStatus::Completed,
            StatusFilter::PendingSelfEvaluation => {
                status == EvaluationStatus::PendingSelfEvaluation
            }
            StatusFilter::PendingManagerReview => status == EvaluationStatus::PendingManagerReview,
            StatusFilter::InReviewSession => status == EvaluationStatus::InReviewSession,
            StatusFilter::Completed => status == EvaluationStatus::Completed,
        }
    }
}

/// Window over `scheduledDate`, counted back from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    Week,
    Month,
    Quarter,
    #[default]
    All,
}

impl DateRange {
    fn window_days(self) -> Option<i64> {
        match self {
            DateRange::Week => Some(7),
            DateRange::Month => Some(30),
            DateRange::Quarter => Some(90),
            DateRange::All => None,
        }
    }

    pub fn contains(self, scheduled: NaiveDate, today: NaiveDate) -> bool {
        match self.window_days() {
            Some(days) => scheduled >= today - Duration::days(days),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    ScheduledDate,
    EmployeeName,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// List filters as accepted by `GET /api/evaluations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationQuery {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub evaluator: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Evaluation list row with display names joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub id: EvaluationId,
    pub employee_id: PersonId,
    pub employee_name: String,
    pub evaluator_id: PersonId,
    pub evaluator_name: String,
    pub template_id: TemplateId,
    pub template_name: String,
    pub department: Option<String>,
    pub status: EvaluationStatus,
    pub acknowledged: bool,
    pub scheduled_date: NaiveDate,
    pub review_session_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    pub overall_score: Option<f64>,
    pub due: DueStatus,
}

impl EvaluationSummary {
    pub fn build(
        evaluation: &Evaluation,
        people: &HashMap<PersonId, Employee>,
        classifier: &DueDateClassifier,
        now: NaiveDateTime,
    ) -> Self {
        let employee = people.get(&evaluation.employee_id);
        let name_of = |id: &PersonId| {
            people
                .get(id)
                .map(|person| person.name.clone())
                .unwrap_or_else(|| id.0.clone())
        };

        Self {
            id: evaluation.id.clone(),
            employee_id: evaluation.employee_id.clone(),
            employee_name: name_of(&evaluation.employee_id),
            evaluator_id: evaluation.evaluator_id.clone(),
            evaluator_name: name_of(&evaluation.evaluator_id),
            template_id: evaluation.template_id.clone(),
            template_name: evaluation.template.name.clone(),
            department: employee
                .and_then(Employee::department_label)
                .map(str::to_string),
            status: evaluation.status,
            acknowledged: evaluation.is_acknowledged(),
            scheduled_date: evaluation.scheduled_date,
            review_session_date: evaluation.review_session_date,
            completed_date: evaluation.completed_date,
            overall_score: evaluation.overall_score,
            due: classifier.classify(evaluation.scheduled_date, now),
        }
    }

    fn status_rank(&self) -> u8 {
        // Acknowledged rows sort after plain completions.
        self.status.rank() * 2 + u8::from(self.acknowledged)
    }
}

/// Filters and sorts evaluations. Ties on the sort key always fall back to ascending
/// id so paging stays deterministic.
pub fn run_query(
    evaluations: &[Evaluation],
    people: &HashMap<PersonId, Employee>,
    query: &EvaluationQuery,
    classifier: &DueDateClassifier,
    now: NaiveDateTime,
) -> Vec<EvaluationSummary> {
    let today = now.date();
    let search = normalized(query.search.as_deref());
    let department = normalized(query.department.as_deref());
    let evaluator = non_blank(query.evaluator.as_deref());
    let template = non_blank(query.template.as_deref());

    let mut rows: Vec<EvaluationSummary> = evaluations
        .iter()
        .filter(|evaluation| query.status.matches(evaluation.status))
        .filter(|evaluation| query.date_range.contains(evaluation.scheduled_date, today))
        .filter(|evaluation| evaluator.map_or(true, |id| evaluation.evaluator_id.0 == id))
        .filter(|evaluation| template.map_or(true, |id| evaluation.template_id.0 == id))
        .map(|evaluation| EvaluationSummary::build(evaluation, people, classifier, now))
        .filter(|row| match &department {
            Some(wanted) => row
                .department
                .as_deref()
                .map(|value| value.to_lowercase() == *wanted)
                .unwrap_or(false),
            None => true,
        })
        .filter(|row| match &search {
            Some(needle) => [&row.employee_name, &row.evaluator_name, &row.template_name]
                .iter()
                .any(|haystack| haystack.to_lowercase().contains(needle.as_str())),
            None => true,
        })
        .collect();

    rows.sort_by(|a, b| {
        let primary = match query.sort_by {
            SortField::ScheduledDate => a.scheduled_date.cmp(&b.scheduled_date),
            SortField::EmployeeName => a
                .employee_name
                .to_lowercase()
                .cmp(&b.employee_name.to_lowercase()),
            SortField::Status => a.status_rank().cmp(&b.status_rank()),
        };
        let primary = match query.sort_order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });

    rows
}

/// Badge numbers for the dashboard, derived from the same classifier as the lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub pending_evaluations: usize,
    pub overdue_evaluations: usize,
    pub due_soon_evaluations: usize,
    pub upcoming_evaluations: Vec<EvaluationSummary>,
}

/// `pending` counts every evaluation not yet completed regardless of bucket; the
/// upcoming list holds the next `limit` of those scheduled today or later.
pub fn dashboard_stats(
    evaluations: &[Evaluation],
    people: &HashMap<PersonId, Employee>,
    classifier: &DueDateClassifier,
    now: NaiveDateTime,
    limit: usize,
) -> DashboardStats {
    let pending_query = EvaluationQuery {
        status: StatusFilter::NotCompleted,
        ..EvaluationQuery::default()
    };
    let pending = run_query(evaluations, people, &pending_query, classifier, now);

    let count_bucket =
        |bucket: DueBucket| pending.iter().filter(|row| row.due.bucket == bucket).count();
    let overdue_evaluations = count_bucket(DueBucket::Overdue);
    let due_soon_evaluations = count_bucket(DueBucket::DueSoon);

    let today = now.date();
    let upcoming_evaluations = pending
        .iter()
        .filter(|row| row.scheduled_date >= today)
        .take(limit)
        .cloned()
        .collect();

    DashboardStats {
        pending_evaluations: pending.len(),
        overdue_evaluations,
        due_soon_evaluations,
        upcoming_evaluations,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn normalized(value: Option<&str>) -> Option<String> {
    non_blank(value).map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::evaluations::domain::TemplateSnapshot;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 14)
            .expect("valid date")
            .and_hms_opt(9, 0, 0)
            .expect("valid time")
    }

    fn person(id: &str, name: &str, department: &str) -> Employee {
        Employee {
            id: PersonId::from(id),
            name: name.to_string(),
            manager_id: None,
            department: Some(department.to_string()),
            position: None,
        }
    }

    fn people() -> HashMap<PersonId, Employee> {
        [
            person("E1", "Avery Stone", "Grocery"),
            person("E2", "blake Moss", "Pharmacy"),
            person("E3", "Casey Lin", "Grocery"),
            person("M1", "Morgan Reyes", "Management"),
        ]
        .into_iter()
        .map(|employee| (employee.id.clone(), employee))
        .collect()
    }

    fn evaluation(
        id: &str,
        employee: &str,
        template: &str,
        offset_days: i64,
        status: EvaluationStatus,
    ) -> Evaluation {
        let mut record = Evaluation::scheduled(
            EvaluationId::from(id),
            PersonId::from(employee),
            PersonId::from("M1"),
            TemplateSnapshot {
                id: TemplateId::from(template),
                name: format!("{template} review"),
                sections: Vec::new(),
            },
            now().date() + Duration::days(offset_days),
        );
        record.status = status;
        record
    }

    fn records() -> Vec<Evaluation> {
        vec![
            evaluation("ev-3", "E3", "annual", 20, EvaluationStatus::InReviewSession),
            evaluation("ev-1", "E1", "quarterly", -3, EvaluationStatus::PendingSelfEvaluation),
            evaluation("ev-2", "E2", "quarterly", 5, EvaluationStatus::Completed),
            evaluation("ev-4", "E1", "annual", 5, EvaluationStatus::PendingManagerReview),
            evaluation("ev-5", "E2", "annual", -60, EvaluationStatus::PendingSelfEvaluation),
        ]
    }

    fn ids(rows: &[EvaluationSummary]) -> Vec<&str> {
        rows.iter().map(|row| row.id.0.as_str()).collect()
    }

    #[test]
    fn default_query_sorts_by_date_then_id() {
        let rows = run_query(
            &records(),
            &people(),
            &EvaluationQuery::default(),
            &DueDateClassifier::default(),
            now(),
        );
        assert_eq!(ids(&rows), vec!["ev-5", "ev-1", "ev-2", "ev-4", "ev-3"]);
        assert_eq!(rows[1].employee_name, "Avery Stone");
        assert_eq!(rows[1].due.bucket, DueBucket::Overdue);
    }

    #[test]
    fn descending_order_keeps_ascending_id_tiebreak() {
        let query = EvaluationQuery {
            sort_order: SortOrder::Desc,
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert_eq!(ids(&rows), vec!["ev-3", "ev-2", "ev-4", "ev-1", "ev-5"]);
    }

    #[test]
    fn filters_by_status_department_and_search() {
        let query = EvaluationQuery {
            status: StatusFilter::NotCompleted,
            department: Some("grocery".to_string()),
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert_eq!(ids(&rows), vec!["ev-1", "ev-4", "ev-3"]);

        let query = EvaluationQuery {
            search: Some("BLAKE".to_string()),
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert_eq!(ids(&rows), vec!["ev-5", "ev-2"]);

        let query = EvaluationQuery {
            search: Some("annual".to_string()),
            template: Some("annual".to_string()),
            evaluator: Some("M1".to_string()),
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert_eq!(ids(&rows), vec!["ev-5", "ev-4", "ev-3"]);
    }

    #[test]
    fn date_range_drops_older_evaluations() {
        let query = EvaluationQuery {
            date_range: DateRange::Month,
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert!(!ids(&rows).contains(&"ev-5"));
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn status_sort_orders_by_lifecycle_position() {
        let query = EvaluationQuery {
            sort_by: SortField::Status,
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert_eq!(ids(&rows), vec!["ev-1", "ev-5", "ev-4", "ev-3", "ev-2"]);
    }

    #[test]
    fn employee_name_sort_is_case_insensitive() {
        let query = EvaluationQuery {
            sort_by: SortField::EmployeeName,
            ..EvaluationQuery::default()
        };
        let rows = run_query(&records(), &people(), &query, &DueDateClassifier::default(), now());
        assert_eq!(ids(&rows), vec!["ev-1", "ev-4", "ev-2", "ev-5", "ev-3"]);
    }

    #[test]
    fn dashboard_counts_pending_and_lists_upcoming() {
        let stats = dashboard_stats(&records(), &people(), &DueDateClassifier::default(), now(), 1);
        assert_eq!(stats.pending_evaluations, 4);
        assert_eq!(stats.overdue_evaluations, 2);
        assert_eq!(stats.due_soon_evaluations, 1);
        assert_eq!(ids(&stats.upcoming_evaluations), vec!["ev-4"]);
    }

    #[test]
    fn unknown_people_fall_back_to_ids() {
        let rows = run_query(
            &records(),
            &HashMap::new(),
            &EvaluationQuery::default(),
            &DueDateClassifier::default(),
            now(),
        );
        assert_eq!(rows[0].employee_name, "E2");
        assert_eq!(rows[0].department, None);
    }
}
