pub mod countdown;
pub mod engine;
mod sse;

use std::sync::Arc;

use tokio::sync::watch;

pub use self::sse::{AdminChannel, SseHub};
use self::{engine::CountdownEngine, sse::SseState};

pub type SharedState = Arc<AppState>;

/// Per-stream capacity of the SSE broadcast channels.
const SSE_CHANNEL_CAPACITY: usize = 16;

/// Central application state: the countdown engine plus the SSE fan-out.
pub struct AppState {
    engine: Arc<CountdownEngine>,
    sse: SseState,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(engine: Arc<CountdownEngine>) -> SharedState {
        Arc::new(Self {
            engine,
            sse: SseState::new(SSE_CHANNEL_CAPACITY, SSE_CHANNEL_CAPACITY),
        })
    }

    /// Engine owning the resident countdown settings.
    pub fn engine(&self) -> &Arc<CountdownEngine> {
        &self.engine
    }

    /// True while the store is unreachable or not configured.
    pub fn is_degraded(&self) -> bool {
        !self.engine.is_connected()
    }

    /// Subscribe to store connectivity updates (`true` means connected).
    pub fn connection_watcher(&self) -> watch::Receiver<bool> {
        self.engine.connection_watcher()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Admin stream bookkeeping, including the token write routes check against.
    pub fn admin_channel(&self) -> &AdminChannel {
        self.sse.admin()
    }
}
