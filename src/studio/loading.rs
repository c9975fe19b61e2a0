//! Rotating status messages shown while an image is being generated.
//!
//! Purely cosmetic: nothing in the session reads these back.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Messages cycled through during a generation.
pub const LOADING_MESSAGES: [&str; 7] = [
    "Initializing neural pathways...",
    "Synthesizing visual concepts...",
    "Brushing digital pixels...",
    "Refining artistic details...",
    "Applying lighting and shadows...",
    "Manifesting your imagination...",
    "Almost there, finalizing the masterpiece...",
];

/// How long each message stays up.
pub const DEFAULT_LOADING_INTERVAL: Duration = Duration::from_secs(3);

/// Index into [`LOADING_MESSAGES`] that wraps around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingRotation {
    index: usize,
}

impl LoadingRotation {
    /// Starts at the first message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Goes back to the first message.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Moves to the next message, wrapping after the last.
    pub fn advance(&mut self) -> &'static str {
        self.index = (self.index + 1) % LOADING_MESSAGES.len();
        self.message()
    }

    /// Current position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current message.
    pub fn message(&self) -> &'static str {
        LOADING_MESSAGES[self.index]
    }
}

/// Publishes the current loading message while alive.
///
/// Dropping the ticker stops the rotation and publishes `None`.
pub struct LoadingTicker {
    task: JoinHandle<()>,
    sender: Arc<watch::Sender<Option<&'static str>>>,
}

impl LoadingTicker {
    /// Publishes the first message and starts advancing every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(sender: Arc<watch::Sender<Option<&'static str>>>, interval: Duration) -> Self {
        let mut rotation = LoadingRotation::new();
        sender.send_replace(Some(rotation.message()));

        let tx = Arc::clone(&sender);
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticks.tick().await;
                tx.send_replace(Some(rotation.advance()));
            }
        });

        Self { task, sender }
    }
}

impl Drop for LoadingTicker {
    fn drop(&mut self) {
        self.task.abort();
        self.sender.send_replace(None);
    }
}
