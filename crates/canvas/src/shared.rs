//! A canvas shared between threads.
//!
//! Background work (bulk construction from an import, for instance) takes the
//! same lock as the UI thread before touching the view. Holding the guard gives
//! `&mut CanvasView`, so code running under the lock never locks again.

use crate::view::CanvasView;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct SharedCanvas {
    inner: Arc<Mutex<CanvasView>>,
}

impl SharedCanvas {
    pub fn new(view: CanvasView) -> Self {
        Self {
            inner: Arc::new(Mutex::new(view)),
        }
    }

    /// Locks the canvas. A thread that panicked while holding the lock does
    /// not make the canvas unusable for the others.
    pub fn lock(&self) -> MutexGuard<'_, CanvasView> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("canvas lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Runs `f` with the canvas locked
    pub fn with<R>(&self, f: impl FnOnce(&mut CanvasView) -> R) -> R {
        f(&mut self.lock())
    }
}
