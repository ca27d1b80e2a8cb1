// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Selection reconciliation: map a client's serializable offer reference
//! back to the authoritative server-held offer.
//!
//! Exactly one match is required. Identity is the platform's stable key when
//! it issues one; otherwise exact display-name equality within the
//! platform's subset, narrowed by exact price text when the selection
//! carries one. Ambiguity is an error, never resolved by guessing.

use thiserror::Error;
use valet_core::{Offer, OfferRef};

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no offer on {platform} matches the selection")]
    NotFound { platform: String },

    #[error("{count} offers on {platform} match the selection; cannot disambiguate")]
    Ambiguous { platform: String, count: usize },
}

/// Resolve a client selection against a job's retained offers.
pub fn reconcile<'a>(
    offers: &'a [Offer],
    selection: &OfferRef,
) -> Result<&'a Offer, ReconcileError> {
    let subset: Vec<&Offer> =
        offers.iter().filter(|offer| offer.platform == selection.platform).collect();

    let candidates: Vec<&Offer> = if let Some(key) = &selection.key {
        subset
            .iter()
            .copied()
            .filter(|offer| offer.key.as_deref() == Some(key.as_str()))
            .collect()
    } else if let Some(name) = &selection.name {
        let by_name: Vec<&Offer> =
            subset.iter().copied().filter(|offer| &offer.name == name).collect();
        // Same display name at different prices: narrow by exact price text
        // when the selection carries one.
        match &selection.price {
            Some(price) if by_name.len() > 1 => {
                by_name.into_iter().filter(|offer| &offer.price_text == price).collect()
            }
            _ => by_name,
        }
    } else {
        // No discriminator at all: only an unaccompanied platform match can
        // be exact.
        subset
    };

    match candidates.len() {
        0 => Err(ReconcileError::NotFound { platform: selection.platform.clone() }),
        1 => Ok(candidates[0]),
        count => {
            Err(ReconcileError::Ambiguous { platform: selection.platform.clone(), count })
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
