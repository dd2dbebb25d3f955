use serde::{Deserialize, Serialize};

use crate::domain::answer::AnswerCandidate;

pub const DEFAULT_MAX_CANDIDATES: usize = 3;
pub const DEFAULT_MIN_SCORE: f64 = 30.0;

/// Decides which knowledge-base candidates are worth showing to the asker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub max_candidates: usize,
    /// Candidates scoring at or below this value are discarded.
    pub min_score: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self { max_candidates: DEFAULT_MAX_CANDIDATES, min_score: DEFAULT_MIN_SCORE }
    }
}

impl ThresholdPolicy {
    pub fn new(max_candidates: usize, min_score: f64) -> Self {
        Self { max_candidates, min_score }
    }

    /// Sorts by descending score (stable, so ties keep service order), keeps
    /// the top `max_candidates` and drops anything at or below `min_score`.
    pub fn apply(&self, mut candidates: Vec<AnswerCandidate>) -> Vec<AnswerCandidate> {
        candidates.sort_by(|left, right| right.score.total_cmp(&left.score));
        candidates
            .into_iter()
            .take(self.max_candidates)
            .filter(|candidate| candidate.score > self.min_score)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ThresholdPolicy;
    use crate::domain::answer::{AnswerCandidate, AnswerRef};

    fn candidate(label: &str, score: f64) -> AnswerCandidate {
        AnswerCandidate::new(AnswerRef::Text(label.to_owned()), score, label)
    }

    fn scores(candidates: &[AnswerCandidate]) -> Vec<f64> {
        candidates.iter().map(|candidate| candidate.score).collect()
    }

    #[test]
    fn keeps_top_three_above_cutoff_in_descending_order() {
        let filtered = ThresholdPolicy::default().apply(vec![
            candidate("a", 55.0),
            candidate("b", 31.0),
            candidate("c", 30.0),
            candidate("d", 60.0),
            candidate("e", 12.0),
        ]);

        assert_eq!(scores(&filtered), vec![60.0, 55.0, 31.0]);
    }

    #[test]
    fn caps_output_at_three_candidates() {
        let filtered = ThresholdPolicy::default().apply(vec![
            candidate("a", 90.0),
            candidate("b", 80.0),
            candidate("c", 70.0),
            candidate("d", 95.0),
        ]);

        assert_eq!(scores(&filtered), vec![95.0, 90.0, 80.0]);
    }

    #[test]
    fn equal_scores_keep_service_order() {
        let filtered = ThresholdPolicy::default().apply(vec![
            candidate("first", 50.0),
            candidate("second", 50.0),
            candidate("third", 70.0),
        ]);

        let labels: Vec<&str> =
            filtered.iter().map(|candidate| candidate.representative_question.as_str()).collect();
        assert_eq!(labels, vec!["third", "first", "second"]);
    }

    #[test]
    fn score_exactly_at_cutoff_is_discarded() {
        let filtered = ThresholdPolicy::default().apply(vec![candidate("a", 30.0)]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn output_respects_bounds_for_assorted_inputs() {
        let inputs = [
            vec![],
            vec![5.0],
            vec![99.9, 0.0, 31.5, 30.0001, 44.0, 44.0],
            vec![29.9, 30.0, 10.0],
            vec![31.0, 32.0, 33.0, 34.0, 35.0, 36.0],
        ];

        for input in inputs {
            let candidates: Vec<_> = input
                .iter()
                .enumerate()
                .map(|(index, score)| candidate(&index.to_string(), *score))
                .collect();
            let filtered = ThresholdPolicy::default().apply(candidates);

            assert!(filtered.len() <= 3);
            assert!(filtered.iter().all(|candidate| candidate.score > 30.0));
            assert!(filtered.windows(2).all(|pair| pair[0].score >= pair[1].score));
        }
    }
}
