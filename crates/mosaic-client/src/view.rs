//! What a screen holds while its data loads, and the token that tells late
//! responses whether the screen is still there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mosaic_shared::{MosaicError, RemoteCallError};

/// Data of one view.
#[derive(Debug)]
pub enum ViewState<T> {
    Loading,
    Ready(T),
    Failed(MosaicError),
}

impl<T> ViewState<T> {
    pub fn from_result(result: Result<T, MosaicError>) -> Self {
        match result {
            Ok(value) => Self::Ready(value),
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&MosaicError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ViewState<U> {
        match self {
            Self::Loading => ViewState::Loading,
            Self::Ready(value) => ViewState::Ready(f(value)),
            Self::Failed(e) => ViewState::Failed(e),
        }
    }
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self::Loading
    }
}

/// "Still mounted" flag shared by a view and the requests it started.
///
/// Clones share the flag. Once [`ViewScope::unmount`] is called every
/// request that settles afterwards must leave view state alone.
#[derive(Debug, Clone)]
pub struct ViewScope {
    mounted: Arc<AtomicBool>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Returns `true` the first time only.
    pub fn unmount(&self) -> bool {
        self.mounted.swap(false, Ordering::AcqRel)
    }

    /// Pass `result` through if the view is still mounted, otherwise turn it
    /// into `RemoteCallError::Cancelled`.
    pub fn settle<T>(&self, result: Result<T, MosaicError>) -> Result<T, MosaicError> {
        if self.is_mounted() {
            result
        } else {
            Err(RemoteCallError::Cancelled.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmount_is_shared_and_once() {
        let scope = ViewScope::new();
        let child = scope.clone();
        assert!(child.is_mounted());

        assert!(scope.unmount());
        assert!(!scope.unmount());
        assert!(!child.is_mounted());
    }

    #[test]
    fn test_settle_after_unmount_is_cancelled() {
        let scope = ViewScope::new();
        assert_eq!(scope.settle::<u32>(Ok(3)).unwrap(), 3);

        scope.unmount();
        let err = scope.settle::<u32>(Ok(3)).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_view_state_from_result() {
        let state = ViewState::from_result(Ok::<_, MosaicError>(vec![1, 2]));
        assert_eq!(state.ready().map(Vec::len), Some(2));

        let failed: ViewState<()> =
            ViewState::from_result(Err(MosaicError::InvalidInput("nope".into())));
        assert!(failed.error().is_some());
        assert!(ViewState::<()>::default().is_loading());
    }
}
