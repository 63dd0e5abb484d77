use clap::ValueEnum;
use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Display)]
pub enum SyncMode {
    /// Rescan both trees on every interval
    #[default]
    #[display("poll")]
    Poll,
    /// Follow filesystem notifications after one initial pass
    #[display("watch")]
    Watch,
}
