// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session store: isolates persisted login state per (platform, session-name).
//!
//! Persisted profiles live in one directory per key, named
//! `<platform>_profile_<session>`. A job never runs automation against the
//! persisted tree directly: `acquire` hands out a fresh temporary copy, so a
//! failed or partial run can never corrupt a known-good session. Only an
//! explicit `persist` after a successful login writes back.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Session store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("profile copy failed for {key}: {source}")]
    Copy {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A (possibly temporary) profile directory handed to one driver for one job.
#[derive(Debug, Clone)]
pub struct WorkingProfile {
    pub platform: String,
    pub session: String,
    /// Directory the driver points its automation session at
    path: PathBuf,
    /// Persisted directory this working copy derives from
    persisted: PathBuf,
    /// True when `path` is a temp copy of an existing persisted profile
    temp: bool,
}

impl WorkingProfile {
    /// Directory the driver should use for this run.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the working directory is a disposable temp copy.
    ///
    /// False means the persisted profile did not exist at acquire time and
    /// the driver is populating it in place via a first-time login.
    pub fn is_temp_copy(&self) -> bool {
        self.temp
    }

    /// Whether an authenticated session existed when this profile was acquired.
    pub fn had_session(&self) -> bool {
        self.temp
    }

    fn key(&self) -> String {
        profile_key(&self.platform, &self.session)
    }
}

/// Manages persisted authentication state per (platform, session-name).
///
/// The directory namespace is the only resource shared across jobs, so
/// acquire/release/persist for the same key are mutually exclusive.
pub struct SessionStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

fn profile_key(platform: &str, session: &str) -> String {
    format!("{platform}_profile_{session}")
}

impl SessionStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), locks: Mutex::new(HashMap::new()) }
    }

    /// Create a store under the user state directory
    /// (`$XDG_STATE_HOME/valet/profiles` or the platform equivalent).
    pub fn open_default() -> Result<Self, StoreError> {
        let root = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or(StoreError::NoStateDir)?
            .join("valet")
            .join("profiles");
        Ok(Self::new(root))
    }

    /// The persisted directory for a (platform, session) key.
    pub fn profile_dir(&self, platform: &str, session: &str) -> PathBuf {
        self.root.join(profile_key(platform, session))
    }

    /// Hand out a working profile for one job run.
    ///
    /// If the persisted profile exists it is copied into a fresh temp
    /// location and the copy is returned; otherwise the not-yet-existing
    /// persisted path is returned directly, to be populated in place by a
    /// first-time login.
    pub async fn acquire(
        &self,
        platform: &str,
        session: &str,
    ) -> Result<WorkingProfile, StoreError> {
        let key = profile_key(platform, session);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let persisted = self.root.join(&key);
        if !persisted.is_dir() {
            debug!(key, "no persisted profile, first-time login will populate in place");
            tokio::fs::create_dir_all(&self.root).await?;
            return Ok(WorkingProfile {
                platform: platform.to_string(),
                session: session.to_string(),
                path: persisted.clone(),
                persisted,
                temp: false,
            });
        }

        let temp = self.root.join("tmp").join(format!("{key}.{}", nanoid::nanoid!(8)));
        copy_dir(&persisted, &temp)
            .await
            .map_err(|source| StoreError::Copy { key: key.clone(), source })?;
        debug!(key, temp = %temp.display(), "acquired temp working copy");

        Ok(WorkingProfile {
            platform: platform.to_string(),
            session: session.to_string(),
            path: temp,
            persisted,
            temp: true,
        })
    }

    /// Delete the temp copy behind a working profile.
    ///
    /// Best-effort and idempotent: invoked from every cleanup path, a
    /// missing directory is fine and other failures are logged, not fatal.
    pub async fn release(&self, profile: &WorkingProfile) {
        if !profile.temp {
            return;
        }
        let lock = self.key_lock(&profile.key());
        let _guard = lock.lock().await;

        match tokio::fs::remove_dir_all(&profile.path).await {
            Ok(()) => debug!(key = profile.key(), "released temp working copy"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                key = profile.key(),
                path = %profile.path.display(),
                error = %e,
                "failed to remove temp working copy (best-effort)"
            ),
        }
    }

    /// Write a working copy back over the persisted profile.
    ///
    /// The explicit post-success save step: the only code path that mutates
    /// the persisted tree. A no-op for in-place (first-login) profiles.
    pub async fn persist(&self, profile: &WorkingProfile) -> Result<(), StoreError> {
        if !profile.temp {
            return Ok(());
        }
        let key = profile.key();
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        // Replace atomically-ish: stage next to the target, then swap.
        let staging = self.root.join("tmp").join(format!("{key}.staging"));
        if staging.exists() {
            tokio::fs::remove_dir_all(&staging).await?;
        }
        copy_dir(&profile.path, &staging)
            .await
            .map_err(|source| StoreError::Copy { key: key.clone(), source })?;

        if profile.persisted.exists() {
            tokio::fs::remove_dir_all(&profile.persisted).await?;
        }
        tokio::fs::rename(&staging, &profile.persisted).await?;
        debug!(key, "persisted working copy");
        Ok(())
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

/// Recursively copy a directory tree.
async fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dst).await?;
    let mut entries = tokio::fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let to = dst.join(entry.file_name());
        if entry.file_type().await?.is_dir() {
            Box::pin(copy_dir(&entry.path(), &to)).await?;
        } else {
            tokio::fs::copy(entry.path(), &to).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
