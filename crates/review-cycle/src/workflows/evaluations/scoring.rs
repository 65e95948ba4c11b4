use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{RatingSheet, SectionId, TemplateSnapshot};

/// Overall and per-section means of the evaluator's ratings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub overall: Option<f64>,
    pub by_section: BTreeMap<SectionId, f64>,
    pub rated_criteria: usize,
}

#[derive(Default)]
struct Tally {
    sum: f64,
    count: usize,
}

impl Tally {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Averages manager ratings per section and across the whole template.
///
/// The overall figure is the flat mean of every rated criterion, not the mean of the
/// section means. Unrated criteria and criteria without a grading scale are left out
/// of both numerator and denominator. Bounds are not checked here.
pub fn compute_overall_score(
    ratings: &RatingSheet,
    template: &TemplateSnapshot,
) -> ScoreBreakdown {
    let mut overall = Tally::default();
    let mut by_section = BTreeMap::new();

    for section in &template.sections {
        let mut tally = Tally::default();
        for criterion in &section.criteria {
            if criterion.scale.is_none() {
                continue;
            }
            let rating = ratings
                .get(&criterion.id)
                .and_then(|entry| entry.manager_review.as_ref())
                .map(|entry| entry.rating)
                .filter(|value| value.is_finite());
            if let Some(value) = rating {
                tally.add(value);
                overall.add(value);
            }
        }
        if let Some(mean) = tally.mean() {
            by_section.insert(section.id.clone(), mean);
        }
    }

    ScoreBreakdown {
        overall: overall.mean(),
        by_section,
        rated_criteria: overall.count,
    }
}
