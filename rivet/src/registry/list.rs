//! Ordered producer lists

use super::Entry;
use crate::target::{ServiceKey, Target};
use indexmap::IndexMap;

/// Producers registered for one exact type, split by registration name.
///
/// The last entry of a list is the default; the whole list is kept for aggregation.
#[derive(Default)]
pub(crate) struct TargetList {
    unnamed: Vec<Entry>,
    named: IndexMap<String, Vec<Entry>>,
}

impl TargetList {
    pub(crate) fn push(&mut self, key: &ServiceKey, entry: Entry) {
        match key.name() {
            None => self.unnamed.push(entry),
            Some(name) => self.named
                .entry(name.to_owned())
                .or_default()
                .push(entry),
        }
    }

    #[inline]
    pub(crate) fn all(&self, key: &ServiceKey) -> &[Entry] {
        match key.name() {
            None => &self.unnamed,
            Some(name) => self.named
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    #[inline]
    pub(crate) fn last(&self, key: &ServiceKey) -> Option<Target> {
        self.all(key)
            .last()
            .map(|entry| entry.target.clone())
    }
}
