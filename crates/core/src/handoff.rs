// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handoff kinds and payload types for human-in-the-loop input.
//!
//! A handoff bridges an automation task that needs input (login credentials,
//! an OTP, a choice among offers) and the external caller that supplies it
//! through a separate, later request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of external input a parked job is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    Credentials,
    Otp,
    Choice,
}

crate::simple_display! {
    HandoffKind {
        Credentials => "credentials",
        Otp => "otp",
        Choice => "choice",
    }
}

/// A login credential supplied by the client.
///
/// `identity` is whatever the platform logs in with (phone number, email);
/// `secret` is the password or PIN, if the platform uses one before OTP.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Credential {
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: identity.into(), secret: None }
    }

    pub fn with_secret(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { identity: identity.into(), secret: Some(secret.into()) }
    }
}

// Manual Debug so secrets never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
