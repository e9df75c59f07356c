//! Cancellation handles.

/// Wraps a cancel operation; `cancel` is idempotent.
#[derive(Default)]
pub struct CancelHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl CancelHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Performs the cancel operation. Further calls do nothing.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Owns a [`CancelHandle`] and cancels it when dropped.
///
/// `release` disarms the handle; moving transfers ownership. Copying is not
/// possible, so at most one scope performs the cancellation.
#[derive(Debug, Default)]
pub struct ScopedCancelHandle {
    handle: Option<CancelHandle>,
}

impl ScopedCancelHandle {
    pub fn new(handle: CancelHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Cancels the owned handle now.
    pub fn cancel(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.cancel();
        }
    }

    /// Disarms this scope and returns the inner handle, if still armed.
    pub fn release(&mut self) -> Option<CancelHandle> {
        self.handle.take()
    }
}

impl From<CancelHandle> for ScopedCancelHandle {
    fn from(handle: CancelHandle) -> Self {
        Self::new(handle)
    }
}

impl Drop for ScopedCancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
