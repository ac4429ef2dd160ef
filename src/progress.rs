//! Observer trait for long-running session actions.
//!
//! Rasterising a large PDF, loading a multi-gigabyte model and generating a
//! page of text all take seconds to minutes. The controller reports the start
//! and end of each such action to a [`SessionObserver`] so a front end can
//! show a busy indicator. Observers only watch; they cannot cancel or alter
//! an action.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr_session::{Action, SessionObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl SessionObserver for Counter {
//!     fn on_action_complete(&self, _action: Action, _summary: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::OcrError;
use std::fmt;
use std::sync::Arc;

/// A session action that may block for a while.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Upload,
    LoadModel,
    Extract,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Upload => "Converting PDF to images",
            Action::LoadModel => "Loading model",
            Action::Extract => "Extracting text from image",
        };
        f.write_str(s)
    }
}

/// Receives start/end events for blocking actions.
///
/// All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// Called before the action's external call starts.
    ///
    /// * `detail`: what is being worked on (file name, model identifier, page)
    fn on_action_start(&self, action: Action, detail: &str) {
        let _ = (action, detail);
    }

    /// Called when the action succeeded.
    fn on_action_complete(&self, action: Action, summary: &str) {
        let _ = (action, summary);
    }

    /// Called when the action failed. The error is also returned to the caller.
    fn on_action_error(&self, action: Action, error: &OcrError) {
        let _ = (action, error);
    }
}

/// Observer that ignores every event. Used when none is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Shared observer handle as stored by the controller.
pub type ObserverHandle = Arc<dyn SessionObserver>;
