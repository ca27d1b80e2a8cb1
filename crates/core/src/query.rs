// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured search request, as produced by the (external) query parser.

use serde::{Deserialize, Serialize};

/// One structured search: where from, where to, which persisted session to
/// use, and which platforms to fan out over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    /// Name of the persisted session profile set to use (default "default")
    pub session: String,
    /// Platforms to search. Empty means every platform the driver factory offers.
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl SearchQuery {
    pub fn builder(
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> SearchQueryBuilder {
        SearchQueryBuilder {
            origin: origin.into(),
            destination: destination.into(),
            session: "default".to_string(),
            platforms: Vec::new(),
        }
    }
}

pub struct SearchQueryBuilder {
    origin: String,
    destination: String,
    session: String,
    platforms: Vec<String>,
}

impl SearchQueryBuilder {
    crate::setters! {
        into {
            session: String,
        }
        set {
            platforms: Vec<String>,
        }
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platforms.push(platform.into());
        self
    }

    pub fn build(self) -> SearchQuery {
        SearchQuery {
            origin: self.origin,
            destination: self.destination,
            session: self.session,
            platforms: self.platforms,
        }
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
