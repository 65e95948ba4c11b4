use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{Evaluation, EvaluationId, PersonId, StateStamp};
use super::repository::{EvaluationRepository, RepositoryError};

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<EvaluationId, Evaluation>,
    active_by_employee: HashMap<PersonId, EvaluationId>,
}

impl StoreState {
    fn reindex(&mut self, record: &Evaluation) {
        if record.is_active() {
            self.active_by_employee
                .insert(record.employee_id.clone(), record.id.clone());
        } else if self.active_by_employee.get(&record.employee_id) == Some(&record.id) {
            self.active_by_employee.remove(&record.employee_id);
        }
    }
}

/// Process-local evaluation store. A single lock guards both the records and the
/// per-employee active index so check-and-insert is one critical section.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationStore {
    state: Mutex<StoreState>,
}

impl InMemoryEvaluationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state.lock().map_err(|_| {
            RepositoryError::Unavailable("evaluation store lock poisoned".to_string())
        })
    }
}

impl EvaluationRepository for InMemoryEvaluationStore {
    fn insert_active(&self, mut record: Evaluation) -> Result<Evaluation, RepositoryError> {
        let mut state = self.lock()?;

        if let Some(existing) = state.active_by_employee.get(&record.employee_id) {
            return Err(RepositoryError::ActiveEvaluationExists {
                employee_id: record.employee_id.clone(),
                existing: existing.clone(),
            });
        }
        if state.records.contains_key(&record.id) {
            return Err(RepositoryError::DuplicateId(record.id.clone()));
        }

        record.version = 1;
        state.reindex(&record);
        state.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn compare_and_swap(
        &self,
        expected: StateStamp,
        mut record: Evaluation,
    ) -> Result<Evaluation, RepositoryError> {
        let mut state = self.lock()?;

        let current = state
            .records
            .get(&record.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.stamp() != expected {
            return Err(RepositoryError::StaleState {
                expected: expected.status,
                found: current.status,
            });
        }

        record.version = current.version + 1;
        state.reindex(&record);
        state.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &EvaluationId) -> Result<Option<Evaluation>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.records.get(id).cloned())
    }

    fn delete(&self, id: &EvaluationId) -> Result<Evaluation, RepositoryError> {
        let mut state = self.lock()?;
        let removed = state.records.remove(id).ok_or(RepositoryError::NotFound)?;
        if state.active_by_employee.get(&removed.employee_id) == Some(&removed.id) {
            state.active_by_employee.remove(&removed.employee_id);
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<Evaluation>, RepositoryError> {
        let state = self.lock()?;
        let mut records: Vec<Evaluation> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::evaluations::domain::{
        Acknowledgement, EvaluationStatus, TemplateId, TemplateSnapshot,
    };
    use chrono::NaiveDate;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn record(id: &str, employee: &str) -> Evaluation {
        Evaluation::scheduled(
            EvaluationId::from(id),
            PersonId::from(employee),
            PersonId::from("mgr"),
            TemplateSnapshot {
                id: TemplateId::from("tpl"),
                name: "Quarterly".to_string(),
                sections: Vec::new(),
            },
            NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"),
        )
    }

    #[test]
    fn second_active_evaluation_is_rejected() {
        let store = InMemoryEvaluationStore::new();
        store.insert_active(record("ev-1", "E1")).expect("first insert");

        match store.insert_active(record("ev-2", "E1")) {
            Err(RepositoryError::ActiveEvaluationExists { existing, .. }) => {
                assert_eq!(existing, EvaluationId::from("ev-1"));
            }
            other => panic!("expected active conflict, got {other:?}"),
        }
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn concurrent_creators_produce_exactly_one_record() {
        let store = Arc::new(InMemoryEvaluationStore::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.insert_active(record(&format!("ev-{n}"), "E1")).is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread joins"))
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn stale_stamp_is_refused_and_record_kept() {
        let store = InMemoryEvaluationStore::new();
        let stored = store.insert_active(record("ev-1", "E1")).expect("insert");
        let stamp = stored.stamp();

        let mut first = stored.clone();
        first.status = EvaluationStatus::PendingManagerReview;
        let written = store.compare_and_swap(stamp, first).expect("first swap");
        assert_eq!(written.version, 2);

        let mut second = stored.clone();
        second.status = EvaluationStatus::PendingManagerReview;
        match store.compare_and_swap(stamp, second) {
            Err(RepositoryError::StaleState { expected, found }) => {
                assert_eq!(expected, EvaluationStatus::PendingSelfEvaluation);
                assert_eq!(found, EvaluationStatus::PendingManagerReview);
            }
            other => panic!("expected stale state, got {other:?}"),
        }
        let current = store
            .fetch(&EvaluationId::from("ev-1"))
            .expect("fetch")
            .expect("present");
        assert_eq!(current.version, 2);
    }

    #[test]
    fn acknowledgment_and_deletion_release_the_slot() {
        let store = InMemoryEvaluationStore::new();
        let stored = store.insert_active(record("ev-1", "E1")).expect("insert");

        let mut done = stored.clone();
        done.status = EvaluationStatus::Completed;
        done.acknowledgement = Some(Acknowledgement {
            acknowledged: true,
            date: NaiveDate::from_ymd_opt(2025, 5, 9).expect("valid date"),
            notes: String::new(),
            signature: "E1".to_string(),
        });
        store
            .compare_and_swap(stored.stamp(), done)
            .expect("swap succeeds");
        store
            .insert_active(record("ev-2", "E1"))
            .expect("slot released after acknowledgment");

        store.delete(&EvaluationId::from("ev-2")).expect("delete");
        store
            .insert_active(record("ev-3", "E1"))
            .expect("slot released after deletion");
    }
}
