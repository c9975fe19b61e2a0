//! The studio session: prompt, options, history and the single in-flight
//! generation.

use crate::error::{LuminaError, Result};
use crate::image::{AspectRatio, GenerationOptions, GenerationRequest, ImageProvider, ImageSize};
use crate::studio::history::{History, HistoryEntry};
use crate::studio::loading::{LoadingTicker, DEFAULT_LOADING_INTERVAL};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

// tokio intervals panic on a zero period
const MIN_LOADING_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct StudioState {
    prompt: String,
    options: GenerationOptions,
    history: History,
    current: Option<HistoryEntry>,
    error: Option<String>,
}

/// Clears the in-flight flag when the generation ends, including when the
/// `generate` future is dropped mid-request.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An image generation session.
///
/// All methods take `&self`; share the studio behind an `Arc` to render
/// loading messages or read state while a generation is running. At most
/// one provider call is outstanding at any time.
pub struct Studio {
    provider: Arc<dyn ImageProvider>,
    state: Mutex<StudioState>,
    in_flight: AtomicBool,
    loading: Arc<watch::Sender<Option<&'static str>>>,
    loading_interval: Duration,
}

impl Studio {
    /// Creates a session on top of the given provider.
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        let (loading, _) = watch::channel(None);
        Self {
            provider,
            state: Mutex::new(StudioState::default()),
            in_flight: AtomicBool::new(false),
            loading: Arc::new(loading),
            loading_interval: DEFAULT_LOADING_INTERVAL,
        }
    }

    /// Sets the starting generation options.
    pub fn with_options(self, options: GenerationOptions) -> Self {
        self.lock().options = options;
        self
    }

    /// Sets how often the loading message changes. Clamped to at least 1ms.
    pub fn with_loading_interval(mut self, interval: Duration) -> Self {
        self.loading_interval = interval.max(MIN_LOADING_INTERVAL);
        self
    }

    /// Current loading message interval.
    pub fn loading_interval(&self) -> Duration {
        self.loading_interval
    }

    fn lock(&self) -> MutexGuard<'_, StudioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.lock().prompt = prompt.into();
    }

    /// Current prompt text.
    pub fn prompt(&self) -> String {
        self.lock().prompt.clone()
    }

    /// Replaces all generation options.
    pub fn set_options(&self, options: GenerationOptions) {
        self.lock().options = options;
    }

    /// Current generation options.
    pub fn options(&self) -> GenerationOptions {
        self.lock().options
    }

    /// Sets the aspect ratio for the next generation.
    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.lock().options.aspect_ratio = ratio;
    }

    /// Turns the Pro engine on or off.
    pub fn set_high_quality(&self, enabled: bool) {
        self.lock().options.high_quality = enabled;
    }

    /// Sets the Pro engine resolution.
    pub fn set_image_size(&self, size: ImageSize) {
        self.lock().options.image_size = size;
    }

    /// Model the next generation would use.
    pub fn active_model(&self) -> String {
        let options = self.options();
        self.provider.model_for(&options).to_string()
    }

    /// Returns true while a generation is running.
    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns true if [`generate`](Self::generate) would submit right now.
    pub fn can_submit(&self) -> bool {
        !self.is_generating() && !self.lock().prompt.trim().is_empty()
    }

    /// The image on display.
    pub fn current(&self) -> Option<HistoryEntry> {
        self.lock().current.clone()
    }

    /// Message from the last failed generation.
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Hides the error message.
    pub fn dismiss_error(&self) {
        self.lock().error = None;
    }

    /// Runs `f` against the history without copying it.
    pub fn with_history<R>(&self, f: impl FnOnce(&History) -> R) -> R {
        f(&self.lock().history)
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.entries().to_vec()
    }

    /// Snapshot of every entry but the newest.
    pub fn previous(&self) -> Vec<HistoryEntry> {
        self.lock().history.previous().to_vec()
    }

    /// Number of images generated this session (since the last clear).
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Watches the loading message; `None` when idle.
    pub fn subscribe_loading(&self) -> watch::Receiver<Option<&'static str>> {
        self.loading.subscribe()
    }

    /// Submits the current prompt.
    ///
    /// Rejects with [`LuminaError::EmptyPrompt`] or
    /// [`LuminaError::GenerationInProgress`] without touching any state.
    /// On success the new entry is prepended to history, shown as current
    /// and the prompt is cleared. On failure the error message is recorded
    /// and history is left alone.
    pub async fn generate(&self) -> Result<HistoryEntry> {
        let _in_flight =
            InFlightGuard::acquire(&self.in_flight).ok_or(LuminaError::GenerationInProgress)?;

        let (prompt, options) = {
            let mut state = self.lock();
            if state.prompt.trim().is_empty() {
                return Err(LuminaError::EmptyPrompt);
            }
            state.error = None;
            (state.prompt.clone(), state.options)
        };
        let _ticker = LoadingTicker::start(Arc::clone(&self.loading), self.loading_interval);

        tracing::debug!(
            model = self.provider.model_for(&options),
            aspect_ratio = %options.aspect_ratio,
            "starting generation"
        );

        let request = GenerationRequest::new(prompt.clone()).with_options(options);
        match self.provider.generate(&request).await {
            Ok(image) => {
                let entry = HistoryEntry::new(image, prompt, options.aspect_ratio);
                let mut state = self.lock();
                state.history.push_front(entry.clone());
                state.current = Some(entry.clone());
                state.prompt.clear();
                tracing::debug!(id = %entry.id, history_len = state.history.len(), "generation complete");
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!("generation failed: {e}");
                self.lock().error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Sets the prompt and submits it.
    pub async fn generate_prompt(&self, prompt: impl Into<String>) -> Result<HistoryEntry> {
        if self.is_generating() {
            return Err(LuminaError::GenerationInProgress);
        }
        self.set_prompt(prompt);
        self.generate().await
    }

    /// Shows a history entry as the current image.
    pub fn select(&self, id: Uuid) -> Result<HistoryEntry> {
        let mut state = self.lock();
        let entry = state
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| LuminaError::NotFound(id.to_string()))?;
        state.current = Some(entry.clone());
        Ok(entry)
    }

    /// Shows the history entry at `index` (0 is newest) as the current image.
    pub fn select_index(&self, index: usize) -> Result<HistoryEntry> {
        let mut state = self.lock();
        let entry = state
            .history
            .get_index(index)
            .cloned()
            .ok_or_else(|| LuminaError::NotFound(format!("#{index}")))?;
        state.current = Some(entry.clone());
        Ok(entry)
    }

    /// Empties the history. The current image stays on display.
    pub fn clear_history(&self) {
        let mut state = self.lock();
        tracing::debug!(cleared = state.history.len(), "clearing history");
        state.history.clear();
    }

    /// Saves an image into `dir`: the entry with `id`, or the current image.
    pub fn download(&self, id: Option<Uuid>, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let entry = {
            let state = self.lock();
            match id {
                Some(id) => state.history.get(id).cloned(),
                None => state.current.clone(),
            }
        };
        let entry = entry.ok_or_else(|| {
            LuminaError::NotFound(id.map_or_else(|| "no image on display".into(), |id| id.to_string()))
        })?;
        let path = entry.save_to(dir)?;
        tracing::debug!(path = %path.display(), "saved image");
        Ok(path)
    }
}
