use std::cmp::Ordering;

use serde::Serialize;

use crate::cost::CostSnapshot;
use crate::task::TaskDescriptor;

/// Floor applied to cost estimates so free tasks do not divide by zero.
pub const COST_EPSILON: f64 = 0.001;

/// Score for a task of `priority_ordinal` expected to take `cost` seconds.
///
/// Increases with priority and decreases with cost.
pub fn score(priority_ordinal: u8, cost: f64, exponent: f64) -> f64 {
    let cost = if cost.is_nan() { f64::INFINITY } else { cost.max(COST_EPSILON) };
    f64::from(priority_ordinal).powf(exponent) / cost
}

/// A task paired with its score for the current run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    #[serde(skip)]
    pub task: TaskDescriptor,
    pub task_id: String,
    /// Cost estimate (seconds) the score was computed from.
    pub cost: f64,
    pub score: f64,
    /// 0-based position after ranking.
    pub rank: usize,
}

/// Pure ranking of candidate tasks. Performs no I/O.
#[derive(Debug, Clone, Copy)]
pub struct ScoreEngine {
    priority_exponent: f64,
}

impl ScoreEngine {
    pub fn new(priority_exponent: f64) -> Self {
        Self { priority_exponent }
    }

    pub fn score(&self, task: &TaskDescriptor, cost: f64) -> f64 {
        score(task.priority().ordinal(), cost, self.priority_exponent)
    }

    /// Sort `tasks` by descending score; equal scores order by id.
    ///
    /// Costs come from `snapshot`, falling back to the nominal cost for ids
    /// the snapshot does not cover.
    pub fn rank(&self, tasks: &[TaskDescriptor], snapshot: &CostSnapshot) -> Vec<ScoredCandidate> {
        let mut candidates: Vec<ScoredCandidate> = tasks
            .iter()
            .map(|task| {
                let cost = snapshot.get(task.id()).unwrap_or_else(|| task.nominal_cost());
                ScoredCandidate {
                    task: task.clone(),
                    task_id: task.id().to_string(),
                    cost,
                    score: self.score(task, cost),
                    rank: 0,
                }
            })
            .collect();

        candidates.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.task_id.cmp(&b.task_id),
            other => other,
        });
        for (rank, candidate) in candidates.iter_mut().enumerate() {
            candidate.rank = rank;
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Completion;
    use crate::types::Priority;

    fn task(id: &str, priority: Priority, cost: f64) -> TaskDescriptor {
        TaskDescriptor::from_fn(id, priority, cost, |c: Completion| async move {
            c.no_data();
            Ok(())
        })
    }

    fn ids(ranked: &[ScoredCandidate]) -> Vec<&str> {
        ranked.iter().map(|c| c.task_id.as_str()).collect()
    }

    #[test]
    fn score_grows_with_priority_and_shrinks_with_cost() {
        assert!(score(5, 2.0, 1.0) > score(4, 2.0, 1.0));
        assert!(score(3, 1.0, 1.0) > score(3, 2.0, 1.0));
        assert_eq!(score(3, 1.5, 1.0), 2.0);
    }

    #[test]
    fn zero_cost_is_clamped() {
        assert_eq!(score(2, 0.0, 1.0), 2.0 / COST_EPSILON);
        assert!(score(2, 0.0, 1.0).is_finite());
    }

    #[test]
    fn higher_priority_and_no_higher_cost_never_ranks_lower() {
        let engine = ScoreEngine::new(2.0);
        for (hp, lp) in [(Priority::VeryHigh, Priority::High), (Priority::Normal, Priority::VeryLow)] {
            for (hc, lc) in [(1.0, 1.0), (0.5, 3.0), (0.0, 0.0)] {
                // "a" sorts first on ties, so give the better task the later id.
                let tasks = vec![task("a", lp, lc), task("b", hp, hc)];
                let ranked = engine.rank(&tasks, &CostSnapshot::default());
                assert_eq!(ranked[0].task_id, "b", "priority {hp:?}/{lp:?} cost {hc}/{lc}");
            }
        }
    }

    #[test]
    fn ties_break_by_id() {
        let engine = ScoreEngine::new(1.0);
        let tasks = vec![task("zeta", Priority::Low, 1.0), task("alpha", Priority::Low, 1.0)];
        let ranked = engine.rank(&tasks, &CostSnapshot::default());
        assert_eq!(ids(&ranked), vec!["alpha", "zeta"]);
        assert_eq!(ranked[1].rank, 1);
    }

    #[test]
    fn default_exponent_prefers_important_over_cheap() {
        let engine = ScoreEngine::new(2.0);
        let tasks = vec![
            task("a", Priority::VeryHigh, 2.0),
            task("b", Priority::Normal, 1.0),
            task("c", Priority::VeryHigh, 10.0),
        ];
        let ranked = engine.rank(&tasks, &CostSnapshot::default());
        assert_eq!(ids(&ranked), vec!["a", "b", "c"]);
    }

    #[test]
    fn plain_ratio_prefers_cheap() {
        let engine = ScoreEngine::new(1.0);
        let tasks = vec![task("a", Priority::VeryHigh, 2.0), task("b", Priority::Normal, 1.0)];
        let ranked = engine.rank(&tasks, &CostSnapshot::default());
        assert_eq!(ids(&ranked), vec!["b", "a"]);
    }
}
