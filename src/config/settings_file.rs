use std::path::{Path, PathBuf};

use clap::ValueEnum;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::application::data::{Detection, SyncMode};
use crate::ext::BestEffortPathExt;

/// Settings read from an optional YAML file. Every key is optional, command
/// line arguments take precedence over whatever is set here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFile {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval: Option<u64>,
    pub rescan_interval: Option<u64>,
    pub strategy: Option<Detection>,
    pub mode: Option<SyncMode>,
}

impl SettingsFile {
    /// Reads and parses `path`. Relative roots are resolved against the
    /// directory containing the file.
    pub async fn from_path(path: &Path) -> Result<Self, SettingsFileError> {
        debug!("Reading settings file: {}", path.best_effort_path_display());
        let bytes = compio::fs::read(path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.best_effort_path_display(),
        })?;

        let settings: SettingsFile = contents.as_str().try_into()?;
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(settings.relative_to(base))
    }

    fn relative_to(self, base: &Path) -> Self {
        let resolve = |root: Option<PathBuf>| root.map(|root| base.join(root));
        Self {
            source: resolve(self.source),
            replica: resolve(self.replica),
            ..self
        }
    }
}

impl TryFrom<&str> for SettingsFile {
    type Error = SettingsFileError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents =
            Yaml::load_from_str(contents).map_err(|e| SettingsFileError::ParseError { source: e })?;
        let document = documents
            .first()
            .ok_or(SettingsFileError::MalformedSettings)?;
        let top_level = document
            .as_mapping()
            .ok_or(SettingsFileError::TopLevelNotMap)?;

        let mut settings = SettingsFile::default();
        for (key, value) in top_level {
            let Yaml::Value(Scalar::String(key)) = key else {
                debug!("Skipping non-string settings key: {:?}", key);
                continue;
            };
            match &**key {
                "source" => settings.source = Some(string_value(key, value)?.into()),
                "replica" => settings.replica = Some(string_value(key, value)?.into()),
                "interval" => settings.interval = Some(seconds_value(key, value)?),
                "rescan_interval" => settings.rescan_interval = Some(seconds_value(key, value)?),
                "strategy" => settings.strategy = Some(choice_value(key, value)?),
                "mode" => settings.mode = Some(choice_value(key, value)?),
                unknown => warn!("Ignoring unknown setting '{}'", unknown),
            }
        }

        Ok(settings)
    }
}

fn string_value<'a>(key: &str, value: &'a Yaml) -> Result<&'a str, SettingsFileError> {
    match value {
        Yaml::Value(Scalar::String(text)) => Ok(text.as_ref()),
        _ => WrongTypeSnafu {
            key,
            expected: "a string",
        }
        .fail(),
    }
}

fn seconds_value(key: &str, value: &Yaml) -> Result<u64, SettingsFileError> {
    match value {
        Yaml::Value(Scalar::Integer(seconds)) if *seconds >= 0 => Ok(*seconds as u64),
        _ => WrongTypeSnafu {
            key,
            expected: "a non-negative number of seconds",
        }
        .fail(),
    }
}

fn choice_value<T: ValueEnum>(key: &str, value: &Yaml) -> Result<T, SettingsFileError> {
    let text = string_value(key, value)?;
    T::from_str(text, true).map_err(|_| SettingsFileError::UnknownChoice {
        key: key.to_string(),
        value: text.to_string(),
    })
}

#[derive(Debug, Snafu)]
pub enum SettingsFileError {
    #[snafu(display("Failed to read the settings file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Settings file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the settings file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted settings file"))]
    MalformedSettings,
    #[snafu(display("Top level of the settings file should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Setting '{}' should be {}", key, expected))]
    WrongType { key: String, expected: &'static str },
    #[snafu(display("'{}' is not a valid value for '{}'", value, key))]
    UnknownChoice { key: String, value: String },
}
