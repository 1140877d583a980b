//! Specificity-based route ordering.
//!
//! Several built patterns can match the same request (`/:id` shadows
//! `/findOne` at the same position). The sort imposes a deterministic total
//! order so the scan at request time always prefers the more specific
//! pattern: verb rank first, then segmentwise specificity where a literal
//! segment outranks a parameter and any segment outranks the bare root.

use super::build::Route;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Static,
    Param,
}

fn classify(segment: &str) -> SegmentKind {
    if segment.starts_with(':') {
        SegmentKind::Param
    } else {
        SegmentKind::Static
    }
}

/// Path segments after normalization: leading/trailing slashes trimmed, an
/// empty remainder is the root (zero segments).
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}

/// Pairwise comparator over verb+path pairs.
///
/// 1. Verb rank ascending; a differing rank decides outright.
/// 2. Segment kinds compared position by position from the first segment;
///    the first position where the kinds differ decides (static side first).
/// 3. All compared positions tied in kind: the deeper path sorts first.
/// 4. Fully tied: `Ordering::Equal`, so a stable sort preserves input order.
#[must_use]
pub fn compare_routes(a: &Route, b: &Route) -> Ordering {
    compare_verb_path(a.verb.rank(), &a.path, b.verb.rank(), &b.path)
}

fn compare_verb_path(rank_a: u8, path_a: &str, rank_b: u8, path_b: &str) -> Ordering {
    match rank_a.cmp(&rank_b) {
        Ordering::Equal => {}
        other => return other,
    }

    let mut segs_a = segments(path_a);
    let mut segs_b = segments(path_b);
    loop {
        match (segs_a.next(), segs_b.next()) {
            (Some(a), Some(b)) => match (classify(a), classify(b)) {
                (SegmentKind::Static, SegmentKind::Param) => return Ordering::Less,
                (SegmentKind::Param, SegmentKind::Static) => return Ordering::Greater,
                _ => {}
            },
            // Deeper sorts first; root (zero segments) ranks least specific.
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Sort the built route table in place. The sort is stable, so routes whose
/// verb and path tie exactly keep their declaration order.
pub fn sort_routes(routes: &mut [Route]) {
    routes.sort_by(compare_routes);
}
