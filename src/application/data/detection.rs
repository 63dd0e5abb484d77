use clap::ValueEnum;
use derive_more::Display;

use crate::reconcile::{ContentHashDetector, DetectionStrategy, TimestampDetector};

/// How the polling reconciler decides that a file needs copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Display)]
pub enum Detection {
    /// Compare modification times
    #[default]
    #[display("timestamp")]
    Timestamp,
    /// Compare SHA-256 digests of the content
    #[display("hash")]
    Hash,
}

impl From<Detection> for DetectionStrategy {
    fn from(detection: Detection) -> Self {
        match detection {
            Detection::Timestamp => DetectionStrategy::Timestamp(TimestampDetector),
            Detection::Hash => DetectionStrategy::ContentHash(ContentHashDetector),
        }
    }
}
