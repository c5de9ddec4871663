//! Bookmark model
//!
//! A bookmark is identified by its URL. Every other field is merged with
//! last-writer-wins semantics (see [`merge`]), and deletion is a tombstone
//! flag rather than a physical delete so that merges stay monotone.

mod merge;

pub use merge::{merge, merge_tag_triples};

use crate::url::CanonicalUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One tag attached to a bookmark, with its own LWW timestamp and tombstone
///
/// Serialised as a `[name, updated, deleted]` array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    from = "(String, DateTime<Utc>, bool)",
    into = "(String, DateTime<Utc>, bool)"
)]
pub struct TagTriple {
    pub name: String,
    pub updated: DateTime<Utc>,
    pub deleted: bool,
}

impl TagTriple {
    pub fn new(name: impl Into<String>, updated: DateTime<Utc>, deleted: bool) -> Self {
        Self {
            name: name.into(),
            updated,
            deleted,
        }
    }
}

impl From<(String, DateTime<Utc>, bool)> for TagTriple {
    fn from((name, updated, deleted): (String, DateTime<Utc>, bool)) -> Self {
        Self {
            name,
            updated,
            deleted,
        }
    }
}

impl From<TagTriple> for (String, DateTime<Utc>, bool) {
    fn from(triple: TagTriple) -> Self {
        (triple.name, triple.updated, triple.deleted)
    }
}

/// The tag set of a bookmark, unique by tag name
///
/// Inserting a triple for a name that is already present keeps whichever
/// of the two wins under the tag merge rule, so the set can never hold two
/// triples for one name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TagTriple>", into = "Vec<TagTriple>")]
pub struct TagTriples(BTreeMap<String, TagTriple>);

impl TagTriples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a triple, resolving against any existing triple of the same name
    pub fn insert(&mut self, triple: TagTriple) {
        let resolved = match self.0.get(&triple.name) {
            Some(existing) => merge::resolve_tag(existing, &triple),
            None => triple,
        };
        self.0.insert(resolved.name.clone(), resolved);
    }

    pub fn get(&self, name: &str) -> Option<&TagTriple> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagTriple> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the tags that are not tombstoned
    pub fn current_tags(&self) -> BTreeSet<&str> {
        self.iter()
            .filter(|t| !t.deleted)
            .map(|t| t.name.as_str())
            .collect()
    }
}

impl FromIterator<TagTriple> for TagTriples {
    fn from_iter<I: IntoIterator<Item = TagTriple>>(iter: I) -> Self {
        let mut triples = Self::new();
        for triple in iter {
            triples.insert(triple);
        }
        triples
    }
}

impl From<Vec<TagTriple>> for TagTriples {
    fn from(triples: Vec<TagTriple>) -> Self {
        triples.into_iter().collect()
    }
}

impl From<TagTriples> for Vec<TagTriple> {
    fn from(triples: TagTriples) -> Self {
        triples.0.into_values().collect()
    }
}

/// A bookmark as synced between devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: CanonicalUrl,
    pub title: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub unread: bool,
    pub deleted: bool,
    #[serde(default)]
    pub tag_triples: TagTriples,
}

impl Bookmark {
    /// Names of the bookmark's live (non-tombstoned) tags
    pub fn current_tags(&self) -> BTreeSet<&str> {
        self.tag_triples.current_tags()
    }

    /// Merges another version of this bookmark into a new value
    pub fn merge(&self, other: &Bookmark) -> Bookmark {
        merge(self, other)
    }
}
