/// Database model definitions.
pub mod models;
/// Countdown settings persistence and change notifications.
pub mod settings_store;
/// Storage abstraction layer for database operations.
pub mod storage;
