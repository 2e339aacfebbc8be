//! Delta computation between a delivery cursor and a cumulative snapshot.

use crate::error::ConsistencyViolation;

/// Fragments not yet delivered, plus any contract breach noticed on the way.
#[derive(Debug, PartialEq, Eq)]
pub struct Delta<'a> {
    pub fragments: &'a [String],
    /// Cursor value after applying this delta. Never below the input cursor.
    pub next_cursor: usize,
    pub violation: Option<ConsistencyViolation>,
}

/// Compute `fragments[cursor..]`.
///
/// A snapshot shorter than `cursor` yields an empty delta, leaves the cursor
/// where it was, and reports a [`ConsistencyViolation`].
pub fn reconcile(cursor: usize, fragments: &[String]) -> Delta<'_> {
    match fragments.get(cursor..) {
        Some(suffix) => Delta {
            fragments: suffix,
            next_cursor: fragments.len(),
            violation: None,
        },
        None => Delta {
            fragments: &[],
            next_cursor: cursor,
            violation: Some(ConsistencyViolation {
                expected_at_least: cursor,
                observed: fragments.len(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fresh_cursor_takes_everything() {
        let fragments = strings(&["a", "b"]);
        let delta = reconcile(0, &fragments);
        assert_eq!(delta.fragments, ["a", "b"]);
        assert_eq!(delta.next_cursor, 2);
        assert!(delta.violation.is_none());
    }

    #[test]
    fn cursor_at_end_yields_empty_delta() {
        let fragments = strings(&["a", "b"]);
        let delta = reconcile(2, &fragments);
        assert!(delta.fragments.is_empty());
        assert_eq!(delta.next_cursor, 2);
        assert!(delta.violation.is_none());
    }

    #[test]
    fn suffix_only() {
        let fragments = strings(&["a", "b", "c", "d"]);
        let delta = reconcile(1, &fragments);
        assert_eq!(delta.fragments, ["b", "c", "d"]);
        assert_eq!(delta.next_cursor, 4);
    }

    #[test]
    fn shrunk_snapshot_is_clamped_and_flagged() {
        let fragments = strings(&["a"]);
        let delta = reconcile(3, &fragments);
        assert!(delta.fragments.is_empty());
        assert_eq!(delta.next_cursor, 3);
        assert_eq!(
            delta.violation,
            Some(ConsistencyViolation {
                expected_at_least: 3,
                observed: 1,
            })
        );
    }
}
