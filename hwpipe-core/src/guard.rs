//! Process-wide exclusivity for singular hardware resources

use crate::error::{HwPipeError, HwPipeResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Resource name used by the process-wide video guard
pub const VIDEO_PIPELINE_RESOURCE: &str = "hardware video pipeline";

static VIDEO_GUARD: OnceLock<InstanceGuard> = OnceLock::new();

/// Test-and-set gate allowing at most one holder at a time.
///
/// Guards are plain values injected into sessions; clones share the flag.
/// [`InstanceGuard::process_wide_video`] returns the one shared by every
/// video session in the process.
#[derive(Debug, Clone)]
pub struct InstanceGuard {
    resource: Arc<str>,
    held: Arc<AtomicBool>,
}

impl InstanceGuard {
    /// Create an independent guard for `resource`
    pub fn new(resource: &str) -> Self {
        Self {
            resource: Arc::from(resource),
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Guard shared by all hardware video pipelines in this process
    pub fn process_wide_video() -> InstanceGuard {
        VIDEO_GUARD
            .get_or_init(|| InstanceGuard::new(VIDEO_PIPELINE_RESOURCE))
            .clone()
    }

    /// Atomically take the guard; fails with `DeviceBusy` if already held
    pub fn try_acquire(&self) -> HwPipeResult<GuardLease> {
        if self.held.swap(true, Ordering::AcqRel) {
            warn!(resource = %self.resource, "instance guard already held");
            return Err(HwPipeError::busy(&self.resource));
        }
        debug!(resource = %self.resource, "instance guard acquired");
        Ok(GuardLease {
            resource: self.resource.clone(),
            held: Some(self.held.clone()),
        })
    }

    /// Whether some lease currently holds the guard
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Name of the guarded resource
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

/// Ownership of an acquired guard; released once, on `release` or drop
#[derive(Debug)]
pub struct GuardLease {
    resource: Arc<str>,
    held: Option<Arc<AtomicBool>>,
}

impl GuardLease {
    /// Release the guard; later calls are no-ops
    pub fn release(&mut self) {
        if let Some(held) = self.held.take() {
            held.store(false, Ordering::Release);
            debug!(resource = %self.resource, "instance guard released");
        }
    }

    /// Whether this lease still holds the guard
    pub fn is_active(&self) -> bool {
        self.held.is_some()
    }
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        self.release();
    }
}
