mod settings_file;
mod validation;

pub use settings_file::{SettingsFile, SettingsFileError};
pub use validation::{ConfigurationError, validate_roots};
pub(crate) use validation::{IntervalTooShortSnafu, MissingRootSnafu, SettingsSnafu};
