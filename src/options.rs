// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-write options.
//!
//! The cache knows nothing about what it stores. Callers decide TTL, tags,
//! compression and placement priority on every write.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tiered_cache::{SetOptions, Priority, QueryOptions};
//!
//! // Default TTL, no tags
//! let opts = SetOptions::default();
//!
//! // Short-lived, tagged, pinned to the hot tier
//! let opts = SetOptions::ttl(Duration::from_secs(60))
//!     .with_tags(["tenant:42", "report"])
//!     .with_priority(Priority::High);
//! assert_eq!(opts.tags.len(), 2);
//!
//! // Read-through with refresh-ahead
//! let q = QueryOptions::ttl(Duration::from_secs(5)).refresh_in_background();
//! assert!(q.refresh_in_background);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placement hint for the tier manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    /// Always placed in L1
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Options for [`Cache::set`](crate::Cache::set).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL for this entry. `None` uses the configured default TTL.
    pub ttl: Option<Duration>,

    /// Labels for group invalidation. Never used for ownership.
    pub tags: Vec<String>,

    /// Run the value through the installed codec if it is larger than the
    /// compression threshold.
    pub compress: bool,

    /// Placement hint.
    pub priority: Priority,
}

impl SetOptions {
    #[must_use]
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }
}

/// Options for [`Cache::cache_query`](crate::Cache::cache_query).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// TTL for the cached result. `None` uses the configured default TTL.
    pub ttl: Option<Duration>,

    /// Tags attached to the cached result.
    pub tags: Vec<String>,

    /// On a hit whose remaining TTL is below 10% of the default TTL, reload
    /// in the background without delaying the caller.
    pub refresh_in_background: bool,
}

impl QueryOptions {
    #[must_use]
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn refresh_in_background(mut self) -> Self {
        self.refresh_in_background = true;
        self
    }

    pub(crate) fn to_set_options(&self) -> SetOptions {
        SetOptions {
            ttl: self.ttl,
            tags: self.tags.clone(),
            compress: false,
            priority: Priority::Normal,
        }
    }
}
