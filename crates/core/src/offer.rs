// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offer model: the authoritative server-side form and its wire projection.
//!
//! An offer is born with two representations. The authoritative [`Offer`]
//! carries a live, non-serializable driver handle and stays inside the
//! registry; the [`OfferProjection`] is built alongside it and is the only
//! form that crosses the wire. Neither is ever mutated into the other.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque token a driver attaches to an offer so it can complete booking
/// later (a page element reference, an internal result index, etc.).
///
/// Only the driver that issued the handle knows its concrete type.
#[derive(Clone)]
pub struct OfferHandle(Arc<dyn Any + Send + Sync>);

impl OfferHandle {
    pub fn new<T: Any + Send + Sync>(token: T) -> Self {
        Self(Arc::new(token))
    }

    /// Recover the concrete token. Returns `None` when the handle was issued
    /// by a different driver.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for OfferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OfferHandle(..)")
    }
}

/// A bookable option surfaced by a platform driver.
///
/// Deliberately not `Serialize`: the wire form is [`OfferProjection`].
#[derive(Debug, Clone)]
pub struct Offer {
    pub platform: String,
    /// Display name (ride tier, product variant, restaurant item)
    pub name: String,
    /// Price exactly as the platform displayed it (e.g. "₹1,234")
    pub price_text: String,
    /// Stable identity key, when the platform provides one
    pub key: Option<String>,
    /// Handle-free extra detail (ETA, seller, rating), safe to project
    pub details: serde_json::Value,
    pub handle: OfferHandle,
}

impl Offer {
    /// Numeric price for ranking, if the display text parses.
    pub fn normalized_price(&self) -> Option<f64> {
        normalize_price(&self.price_text)
    }

    /// Ranking value: unparsable prices sort last.
    pub fn rank_price(&self) -> f64 {
        self.normalized_price().unwrap_or(f64::INFINITY)
    }

    /// Build the serializable wire projection of this offer.
    pub fn projection(&self) -> OfferProjection {
        OfferProjection {
            platform: self.platform.clone(),
            name: self.name.clone(),
            price: self.price_text.clone(),
            key: self.key.clone(),
            raw_details: self.details.clone(),
        }
    }
}

/// Serializable projection of an [`Offer`] returned to callers.
///
/// `raw_details` never contains an opaque handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferProjection {
    pub platform: String,
    pub name: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw_details: serde_json::Value,
}

/// A client's reference to a previously projected offer.
///
/// Identity is the stable key when the platform issued one; otherwise the
/// display name (optionally narrowed by price) within that platform's subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRef {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl OfferRef {
    pub fn by_key(platform: impl Into<String>, key: impl Into<String>) -> Self {
        Self { platform: platform.into(), key: Some(key.into()), name: None, price: None }
    }

    pub fn by_name(platform: impl Into<String>, name: impl Into<String>) -> Self {
        Self { platform: platform.into(), key: None, name: Some(name.into()), price: None }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }
}

/// Normalize a display price to a numeric value by stripping every
/// non-numeric character. Returns `None` when nothing parsable remains
/// ("N/A", "Free", "--").
pub fn normalize_price(text: &str) -> Option<f64> {
    let cleaned: String =
        text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

crate::builder! {
    pub struct OfferBuilder => Offer {
        into {
            platform: String = "testcab",
            name: String = "Test Ride",
            price_text: String = "₹100",
        }
        set {
            details: serde_json::Value = serde_json::Value::Null,
        }
        option {
            key: String = None,
        }
        computed {
            handle: OfferHandle = OfferHandle::new(()),
        }
    }
}

#[cfg(test)]
#[path = "offer_tests.rs"]
mod tests;
