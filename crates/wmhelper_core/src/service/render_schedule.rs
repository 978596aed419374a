//! Debounce for the deferred full-quality render.
//!
//! A burst of input (continuous zoom, panning) gets an immediate cheap render;
//! one full-quality render is scheduled after a quiet period and pushed back
//! whenever more input arrives. At most one deferred render is ever pending.

use crate::config::HQ_RENDER_DELAY_MS;
use std::time::{Duration, Instant};

/// Quality the rendering collaborator should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderQuality {
    Preview,
    Full,
}

/// Single-slot deferred render timer driven by the caller's clock.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    delay: Duration,
    pending_at: Option<Instant>,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(HQ_RENDER_DELAY_MS))
    }
}

impl RenderScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending_at: None,
        }
    }

    /// Registers an input burst at `now`.
    ///
    /// Returns the quality to render immediately and replaces any pending
    /// full render with one due at `now + delay`.
    pub fn request_preview(&mut self, now: Instant) -> RenderQuality {
        self.pending_at = Some(now + self.delay);
        RenderQuality::Preview
    }

    /// Drops the pending full render, if any.
    pub fn cancel(&mut self) -> bool {
        self.pending_at.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_at.is_some()
    }

    /// When the pending full render fires, if one is pending.
    pub fn due_at(&self) -> Option<Instant> {
        self.pending_at
    }

    /// Fires the pending full render once it is due.
    pub fn poll(&mut self, now: Instant) -> Option<RenderQuality> {
        match self.pending_at {
            Some(due) if now >= due => {
                self.pending_at = None;
                Some(RenderQuality::Full)
            }
            _ => None,
        }
    }
}
