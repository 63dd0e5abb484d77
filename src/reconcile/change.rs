use derive_more::Display;

use crate::filesystem::{Entry, RelativePath};

/// What has to happen to one replica path.
///
/// Carries no file content; the applier reads the source at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ChangeAction {
    #[display("create")]
    Create(Entry),
    #[display("update")]
    Update(Entry),
    #[display("remove")]
    Remove(RelativePath),
    #[display("no-op")]
    NoOp,
}
