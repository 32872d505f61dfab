use serde::Serialize;

use crate::score::ScoredCandidate;

/// Result of a single greedy admission pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Admission {
    /// Admitted candidates, in execution order.
    pub admitted: Vec<ScoredCandidate>,
    /// Candidates that did not fit, in rank order.
    pub skipped: Vec<ScoredCandidate>,
    /// Estimated load of the busiest lane after packing.
    pub makespan: f64,
}

/// Pick the ranked candidates that fit `budget_secs` across
/// `concurrency` parallel lanes.
///
/// Each candidate goes to the currently least-loaded lane (lowest index on
/// ties) and is admitted only if that lane stays within the budget. Misfits are
/// skipped, not deferred: this is one greedy pass, not an optimal packing.
pub fn admit(ranked: Vec<ScoredCandidate>, budget_secs: f64, concurrency: usize) -> Admission {
    let mut admission = Admission::default();
    if !(budget_secs > 0.0) {
        admission.skipped = ranked;
        return admission;
    }

    let mut lanes = vec![0.0_f64; concurrency.max(1)];
    for candidate in ranked {
        let (lane, load) = lanes
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        if load + candidate.cost <= budget_secs {
            lanes[lane] = load + candidate.cost;
            admission.admitted.push(candidate);
        } else {
            admission.skipped.push(candidate);
        }
    }

    admission.makespan = lanes.iter().copied().fold(0.0, f64::max);
    admission
}
