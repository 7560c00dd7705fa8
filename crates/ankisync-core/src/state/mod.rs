//! Digest stores and reconciliation
//!
//! A `DigestStore` remembers what was last pushed for each id. Reconciling it
//! against a freshly computed state drives the side effects: `apply` for
//! every current entry, `evict` for every id that disappeared.
//!
//! The side effects are supplied by a `Reconciler`:
//!
//! - `NoteEvictor`: deletes notes that no longer have a document
//! - `TemplateWriter`: writes one template document per note type

mod note_state;
mod template;

pub use note_state::NoteEvictor;
pub use template::TemplateWriter;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

/// Side effects of a reconciliation
#[async_trait]
pub trait Reconciler<V: Send + Sync>: Send + Sync {
    /// Bring the outside world in line with `value`; false keeps the old entry
    async fn apply(&self, id: i64, value: &V, previous: Option<&V>) -> bool;

    /// Remove whatever `value` stood for; the entry is dropped either way
    async fn evict(&self, id: i64, value: &V);
}

/// Ids touched by a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub applied: Vec<i64>,
    pub failed: Vec<i64>,
    pub evicted: Vec<i64>,
}

/// Last known value per id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestStore<V> {
    entries: BTreeMap<i64, V>,
}

impl<V> Default for DigestStore<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: Clone + Send + Sync> DigestStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: BTreeMap<i64, V>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: i64) -> Option<&V> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &V)> {
        self.entries.iter()
    }

    pub fn into_map(self) -> BTreeMap<i64, V> {
        self.entries
    }

    /// Make the store match `new_state`
    ///
    /// Entries are committed only when `apply` succeeds. Ids missing from
    /// `new_state` are evicted and removed. One entry failing never stops
    /// the others.
    pub async fn reconcile<R>(&mut self, new_state: BTreeMap<i64, V>, reconciler: &R) -> ReconcileOutcome
    where
        R: Reconciler<V> + ?Sized,
    {
        let mut outcome = ReconcileOutcome::default();

        let stale: Vec<i64> = self
            .entries
            .keys()
            .filter(|id| !new_state.contains_key(id))
            .copied()
            .collect();

        for (id, value) in new_state {
            let previous = self.entries.get(&id).cloned();
            if reconciler.apply(id, &value, previous.as_ref()).await {
                self.entries.insert(id, value);
                outcome.applied.push(id);
            } else {
                debug!("Keeping previous entry for {}", id);
                outcome.failed.push(id);
            }
        }

        for id in stale {
            if let Some(old) = self.entries.remove(&id) {
                reconciler.evict(id, &old).await;
                outcome.evicted.push(id);
            }
        }

        outcome
    }
}
