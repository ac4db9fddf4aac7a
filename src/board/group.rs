//! Row grouping for rowspan tables
//!
//! Rows sharing a pull request are rendered with one merged cell. Each group
//! is described by the span stored on its first row; the other rows carry 0.

/// Span counts for one row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spans {
    /// Rows covered by this row's trunk pull request cell
    pub trunk_pr: usize,
    /// Rows covered by this row's backport pull request cell
    pub backport_pr: usize,
}

/// Compute spans from each row's `(trunk PR, backport PR)` numbers, in order.
///
/// A row continues the previous trunk group when the trunk numbers match. It
/// continues the previous backport group only when both rows have a backport
/// pull request with the same number, so consecutive rows without one each
/// form their own group.
pub fn project(keys: &[(u64, Option<u64>)]) -> Vec<Spans> {
    let mut spans = vec![Spans::default(); keys.len()];
    let mut trunk_start = 0;
    let mut backport_start = 0;

    for (i, &(trunk, backport)) in keys.iter().enumerate() {
        if i == 0 {
            continue;
        }
        let (prev_trunk, prev_backport) = keys[i - 1];

        if trunk != prev_trunk {
            spans[trunk_start].trunk_pr = i - trunk_start;
            trunk_start = i;
        }
        let continues = matches!((prev_backport, backport), (Some(a), Some(b)) if a == b);
        if !continues {
            spans[backport_start].backport_pr = i - backport_start;
            backport_start = i;
        }
    }

    if !keys.is_empty() {
        spans[trunk_start].trunk_pr = keys.len() - trunk_start;
        spans[backport_start].backport_pr = keys.len() - backport_start;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trunk(spans: &[Spans]) -> Vec<usize> {
        spans.iter().map(|s| s.trunk_pr).collect()
    }

    fn backport(spans: &[Spans]) -> Vec<usize> {
        spans.iter().map(|s| s.backport_pr).collect()
    }

    #[test]
    fn test_empty() {
        assert!(project(&[]).is_empty());
    }

    #[test]
    fn test_single_row() {
        let s = project(&[(1, None)]);
        assert_eq!(s, vec![Spans { trunk_pr: 1, backport_pr: 1 }]);
    }

    #[test]
    fn test_trunk_runs() {
        let s = project(&[(7, None), (7, None), (7, None), (3, None), (7, None)]);
        assert_eq!(trunk(&s), vec![3, 0, 0, 1, 1]);
    }

    #[test]
    fn test_backport_runs_follow_shared_pr() {
        let s = project(&[(1, Some(50)), (2, Some(50)), (3, Some(51)), (3, Some(51))]);
        assert_eq!(backport(&s), vec![2, 0, 2, 0]);
        assert_eq!(trunk(&s), vec![1, 1, 2, 0]);
    }

    #[test]
    fn test_rows_without_backport_never_merge() {
        // Two rows of the same trunk PR, neither ported: still separate cells.
        let s = project(&[(1, None), (1, None), (2, None)]);
        assert_eq!(backport(&s), vec![1, 1, 1]);
        assert_eq!(trunk(&s), vec![2, 0, 1]);
    }

    #[test]
    fn test_backport_run_broken_by_unported_row() {
        let s = project(&[(1, Some(9)), (2, None), (3, Some(9))]);
        assert_eq!(backport(&s), vec![1, 1, 1]);
    }
}
