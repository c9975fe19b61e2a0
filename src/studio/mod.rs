//! Studio session: prompt submission, creation history and loading messages.

mod history;
mod loading;
mod session;

pub use history::{History, HistoryEntry};
pub use loading::{LoadingRotation, LoadingTicker, DEFAULT_LOADING_INTERVAL, LOADING_MESSAGES};
pub use session::Studio;
