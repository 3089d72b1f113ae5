//! Load parameters and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Default number of area size levels queried beyond the magnification level.
pub const DEFAULT_MAX_AREA_LEVEL: u32 = 4;

// =============================================================================
// Breaker
// =============================================================================

/// Cooperative cancellation token.
///
/// Load tasks poll it before starting and again before committing loaded
/// data. Work already in progress is never interrupted.
pub trait Breaker: Send + Sync {
    fn is_aborted(&self) -> bool;
}

impl Breaker for CancellationToken {
    fn is_aborted(&self) -> bool {
        self.is_cancelled()
    }
}

/// A breaker backed by a plain atomic flag.
#[derive(Debug, Default)]
pub struct AtomicBreaker {
    aborted: AtomicBool,
}

impl AtomicBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.aborted.store(false, Ordering::SeqCst);
    }
}

impl Breaker for AtomicBreaker {
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

// =============================================================================
// AreaSearchParameter
// =============================================================================

/// Options controlling how missing tile data is loaded.
#[derive(Clone)]
pub struct AreaSearchParameter {
    max_area_level: u32,
    use_low_zoom_optimization: bool,
    use_multithreading: bool,
    resolve_route_members: bool,
    breaker: Option<Arc<dyn Breaker>>,
}

impl AreaSearchParameter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many area size levels below the magnification are loaded.
    pub fn with_max_area_level(mut self, level: u32) -> Self {
        self.max_area_level = level;
        self
    }

    /// Enables routing flagged types through the low zoom sources.
    pub fn with_low_zoom_optimization(mut self, enabled: bool) -> Self {
        self.use_low_zoom_optimization = enabled;
        self
    }

    pub fn with_multithreading(mut self, enabled: bool) -> Self {
        self.use_multithreading = enabled;
        self
    }

    /// Enables attaching member ways to loaded routes.
    pub fn with_resolve_route_members(mut self, enabled: bool) -> Self {
        self.resolve_route_members = enabled;
        self
    }

    pub fn with_breaker(mut self, breaker: Arc<dyn Breaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Uses a [`CancellationToken`] as breaker.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        self.with_breaker(Arc::new(token))
    }

    pub fn max_area_level(&self) -> u32 {
        self.max_area_level
    }

    pub fn use_low_zoom_optimization(&self) -> bool {
        self.use_low_zoom_optimization
    }

    pub fn use_multithreading(&self) -> bool {
        self.use_multithreading
    }

    pub fn resolve_route_members(&self) -> bool {
        self.resolve_route_members
    }

    /// Returns true if a breaker is set and has fired.
    pub fn is_aborted(&self) -> bool {
        self.breaker
            .as_ref()
            .is_some_and(|breaker| breaker.is_aborted())
    }
}

impl Default for AreaSearchParameter {
    fn default() -> Self {
        Self {
            max_area_level: DEFAULT_MAX_AREA_LEVEL,
            use_low_zoom_optimization: true,
            use_multithreading: false,
            resolve_route_members: false,
            breaker: None,
        }
    }
}

impl fmt::Debug for AreaSearchParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaSearchParameter")
            .field("max_area_level", &self.max_area_level)
            .field("use_low_zoom_optimization", &self.use_low_zoom_optimization)
            .field("use_multithreading", &self.use_multithreading)
            .field("resolve_route_members", &self.resolve_route_members)
            .field("breaker", &self.breaker.is_some())
            .finish()
    }
}
