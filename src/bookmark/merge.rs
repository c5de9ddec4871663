//! Bookmark merge
//!
//! `merge` is a join: idempotent, commutative and associative, so replicas
//! converge whatever order they exchange versions in.
//!
//! # Rules
//!
//! | Field | Rule |
//! |-------|------|
//! | `created` | earliest wins |
//! | `updated` | latest wins |
//! | title, description, unread, deleted | copied from the winner |
//! | `tag_triples` | per tag name, see [`merge_tag_triples`] |
//!
//! The winner is the version with the greater [`precedence`] key. The key
//! is a total order whose ties only occur between versions with identical
//! copied fields, which is what keeps associativity when two of three
//! versions share an `updated` timestamp.

use crate::bookmark::{Bookmark, TagTriple, TagTriples};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Ordering key deciding which version's scalar fields survive
///
/// Most recently updated first; then longer title, longer description,
/// title, description, unread, and finally not-deleted.
fn precedence(b: &Bookmark) -> (DateTime<Utc>, usize, usize, &str, &str, bool, bool) {
    (
        b.updated,
        b.title.chars().count(),
        b.description.chars().count(),
        b.title.as_str(),
        b.description.as_str(),
        b.unread,
        !b.deleted,
    )
}

/// Merges two versions of the same bookmark
///
/// Never fails; inputs are not validated (a `created` after `updated` is
/// carried through as-is).
pub fn merge(a: &Bookmark, b: &Bookmark) -> Bookmark {
    let winner = match precedence(a).cmp(&precedence(b)) {
        Ordering::Less => b,
        Ordering::Equal | Ordering::Greater => a,
    };

    Bookmark {
        // Same identity in practice; min keeps the merge total otherwise
        url: std::cmp::min(&a.url, &b.url).clone(),
        title: winner.title.clone(),
        description: winner.description.clone(),
        created: a.created.min(b.created),
        updated: a.updated.max(b.updated),
        unread: winner.unread,
        deleted: winner.deleted,
        tag_triples: merge_tag_triples(&a.tag_triples, &b.tag_triples),
    }
}

/// Picks the surviving triple of two triples for the same tag name
///
/// The later `updated` wins outright. On equal timestamps the live
/// (non-deleted) triple wins; equal timestamp and flag means the triples
/// are identical.
pub(crate) fn resolve_tag(a: &TagTriple, b: &TagTriple) -> TagTriple {
    let key = |t: &TagTriple| (t.updated, !t.deleted);
    if key(a) >= key(b) {
        a.clone()
    } else {
        b.clone()
    }
}

/// Merges two tag sets name by name
///
/// Tags present on only one side pass through unchanged.
pub fn merge_tag_triples(a: &TagTriples, b: &TagTriples) -> TagTriples {
    let mut merged = a.clone();
    for triple in b.iter() {
        merged.insert(triple.clone());
    }
    merged
}
