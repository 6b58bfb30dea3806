mod config;
mod error;
mod store;
mod watcher;

pub use config::{KEY_ENV, PostgrestConfig, URL_ENV};
pub use error::{PostgrestError, StoreConfigError};
pub use store::PostgrestSettingsStore;
