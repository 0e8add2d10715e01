//! Per-project build exclusivity.
//!
//! Two guards must both pass before a build starts: the on-disk lock marker
//! (visible to other processes) and an in-process flag. A [`BuildGuard`] owns
//! both and releases them when dropped, whatever way the build ends.

use crate::layout::ProjectLayout;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a build or search was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockContention {
    /// The project's `.lock` marker exists.
    MarkerPresent,
    /// This process is already running a build.
    InProcessBusy,
}

impl std::fmt::Display for LockContention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarkerPresent => write!(f, "A build is in progress for this project"),
            Self::InProcessBusy => write!(f, "Another build is already running in this process"),
        }
    }
}

/// Holds the lock marker and the in-process flag for the lifetime of a build.
#[derive(Debug)]
pub struct BuildGuard {
    marker: PathBuf,
    flag: Arc<AtomicBool>,
}

impl BuildGuard {
    /// Try to take both guards without blocking.
    ///
    /// Contention is returned as `Ok(Err(_))` with nothing changed on disk or
    /// in memory. `Err(_)` is an I/O failure creating the marker.
    pub fn acquire(
        layout: &ProjectLayout,
        flag: &Arc<AtomicBool>,
    ) -> std::io::Result<Result<Self, LockContention>> {
        let marker = layout.lock_path();

        if marker.exists() {
            return Ok(Err(LockContention::MarkerPresent));
        }

        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(Err(LockContention::InProcessBusy));
        }

        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => {
                debug!("Created lock marker {:?}", marker);
                Ok(Ok(Self {
                    marker,
                    flag: Arc::clone(flag),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                flag.store(false, Ordering::SeqCst);
                Ok(Err(LockContention::MarkerPresent))
            }
            Err(e) => {
                flag.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.marker) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove lock marker {:?}: {}", self.marker, e);
            }
        } else {
            debug!("Removed lock marker {:?}", self.marker);
        }
        self.flag.store(false, Ordering::SeqCst);
    }
}
