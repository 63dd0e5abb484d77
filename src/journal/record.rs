use std::path::PathBuf;
use std::time::SystemTime;

use derive_more::Display;

use crate::filesystem::{MirrorPath, RelativePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ActionKind {
    #[display("create_directory")]
    CreateDirectory,
    #[display("copy_file")]
    CopyFile,
    #[display("remove_file")]
    RemoveFile,
    #[display("remove_directory_tree")]
    RemoveDirectoryTree,
}

/// One successful mutation of the replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub at: SystemTime,
    pub kind: ActionKind,
    pub relative: RelativePath,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl ActionRecord {
    pub fn now(kind: ActionKind, target: &MirrorPath) -> Self {
        Self {
            at: SystemTime::now(),
            kind,
            relative: target.relative.clone(),
            source: target.source.clone(),
            destination: target.destination.clone(),
        }
    }
}
