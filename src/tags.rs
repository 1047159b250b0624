// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tag index: tag → keys.
//!
//! Derived from the entry store and updated on every set/delete so that an
//! invalidation does not need to scan every entry. Untagged entries never
//! appear here, and a tag whose last key goes away is dropped.

use std::collections::HashSet;

use dashmap::DashMap;

#[derive(Default)]
pub struct TagIndex {
    by_tag: DashMap<String, HashSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under each tag.
    pub fn insert<'a, I>(&self, key: &str, tags: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for tag in tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Unregister `key` from each tag, dropping tags left empty.
    ///
    /// `still_tagged(tag)` runs under the tag's shard lock. A key whose
    /// current entry carries the tag again (a concurrent rewrite) stays.
    pub fn remove<'a, I>(&self, key: &str, tags: I, still_tagged: impl Fn(&str) -> bool)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for tag in tags {
            let now_empty = match self.by_tag.get_mut(tag) {
                Some(mut keys) => {
                    if !still_tagged(tag) {
                        keys.remove(key);
                    }
                    keys.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.by_tag.remove_if(tag, |_, keys| keys.is_empty());
            }
        }
    }

    /// Keys carrying any of `tags`, deduplicated.
    pub fn keys_for_any<'a, I>(&self, tags: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = HashSet::new();
        for tag in tags {
            if let Some(keys) = self.by_tag.get(tag) {
                out.extend(keys.iter().cloned());
            }
        }
        out
    }

    pub fn keys_for(&self, tag: &str) -> Vec<String> {
        self.by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }
}
