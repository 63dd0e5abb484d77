mod detection;
mod log_level;
mod sync_mode;

pub use detection::Detection;
pub use log_level::LogLevel;
pub use sync_mode::SyncMode;
