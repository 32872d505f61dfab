use crate::types::{AggregateOutcome, Outcome};

/// Fold per-task outcomes into one verdict.
///
/// Any new data wins; otherwise any explicit failure surfaces; otherwise (no
/// tasks, only no-data or timeouts) the run had no data.
pub fn aggregate<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> AggregateOutcome {
    let mut result = AggregateOutcome::NoData;
    for outcome in outcomes {
        match outcome.as_aggregate() {
            AggregateOutcome::NewData => return AggregateOutcome::NewData,
            AggregateOutcome::Failed => result = AggregateOutcome::Failed,
            AggregateOutcome::NoData => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Outcome; 4] = [Outcome::NewData, Outcome::NoData, Outcome::Failed, Outcome::TimedOut];

    #[test]
    fn empty_run_has_no_data() {
        assert_eq!(aggregate(std::iter::empty()), AggregateOutcome::NoData);
    }

    #[test]
    fn new_data_dominates_every_combination() {
        for a in ALL {
            for b in ALL {
                let outcomes = [a, b];
                let expect_new = outcomes.contains(&Outcome::NewData);
                assert_eq!(
                    aggregate(&outcomes) == AggregateOutcome::NewData,
                    expect_new,
                    "{outcomes:?}"
                );
            }
        }
    }

    #[test]
    fn failure_beats_no_data() {
        let outcomes = [Outcome::NoData, Outcome::Failed, Outcome::TimedOut];
        assert_eq!(aggregate(&outcomes), AggregateOutcome::Failed);
    }

    #[test]
    fn timeouts_alone_are_no_data() {
        let outcomes = [Outcome::TimedOut, Outcome::NoData];
        assert_eq!(aggregate(&outcomes), AggregateOutcome::NoData);
    }
}
