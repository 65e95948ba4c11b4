use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use super::domain::{
    Actor, ActorRole, Employee, Evaluation, EvaluationId, EvaluationStatus, PersonId,
};

/// Employee who cannot receive a new evaluation yet, with the record holding the slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedEmployee {
    pub employee: Employee,
    pub evaluation_id: EvaluationId,
    pub status: EvaluationStatus,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EligibilityReport {
    pub available: Vec<Employee>,
    pub blocked: Vec<BlockedEmployee>,
}

/// Whether `employee` falls inside the actor's reporting reach, ignoring the
/// self-exclusion rule. `team_only` narrows directors and administrators to direct
/// reports; line managers are always limited to them.
pub fn within_reach(actor: &Actor, employee: &Employee, team_only: bool) -> bool {
    match actor.role {
        ActorRole::Employee => false,
        ActorRole::Manager => employee.reports_to(&actor.id),
        ActorRole::Director | ActorRole::Administrator => {
            !team_only || employee.reports_to(&actor.id)
        }
    }
}

/// Whether the actor may read `evaluation`. Everyone sees records they are the
/// subject or evaluator of; managers also see their direct reports' records, and
/// directors and administrators see everything.
pub fn can_view(
    actor: &Actor,
    evaluation: &Evaluation,
    people: &HashMap<PersonId, Employee>,
) -> bool {
    if evaluation.employee_id == actor.id || evaluation.evaluator_id == actor.id {
        return true;
    }
    match actor.role {
        ActorRole::Employee => false,
        ActorRole::Manager => people
            .get(&evaluation.employee_id)
            .map_or(false, |employee| employee.reports_to(&actor.id)),
        ActorRole::Director | ActorRole::Administrator => true,
    }
}

/// Partitions the actor's selectable roster into employees that may receive a new
/// evaluation and those still holding an active one.
///
/// Records with blank identifiers are dropped with a warning instead of failing the
/// whole resolution.
pub fn resolve_eligible(
    actor: &Actor,
    roster: &[Employee],
    active_evaluations: &[Evaluation],
    team_only: bool,
) -> EligibilityReport {
    let mut holding: HashMap<&PersonId, &Evaluation> = HashMap::new();
    for evaluation in active_evaluations {
        if evaluation.id.0.trim().is_empty() || evaluation.employee_id.0.trim().is_empty() {
            warn!(evaluation_id = %evaluation.id, "skipping evaluation with missing identifiers");
            continue;
        }
        if evaluation.is_active() {
            holding.insert(&evaluation.employee_id, evaluation);
        }
    }

    let mut seen = BTreeSet::new();
    let mut report = EligibilityReport::default();

    for employee in roster {
        if employee.id.0.trim().is_empty() {
            warn!(name = %employee.name, "skipping roster entry without an id");
            continue;
        }
        if employee.id == actor.id || !within_reach(actor, employee, team_only) {
            continue;
        }
        if !seen.insert(employee.id.clone()) {
            continue;
        }

        match holding.get(&employee.id) {
            Some(evaluation) => report.blocked.push(BlockedEmployee {
                employee: employee.clone(),
                evaluation_id: evaluation.id.clone(),
                status: evaluation.status,
                acknowledged: evaluation.is_acknowledged(),
            }),
            None => report.available.push(employee.clone()),
        }
    }

    report
}
