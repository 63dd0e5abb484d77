//! Convergence of the replica onto the source.
//!
//! Two drivers share the same [`Applier`]: [`PollingReconciler`] compares
//! full snapshots on a fixed interval, [`EventReconciler`] applies OS
//! notifications as they arrive.

mod applier;
mod change;
mod detector;
mod events;
mod polling;
mod pruner;
mod watcher;

pub use applier::{Applier, ApplyError, Mutation};
pub use change::ChangeAction;
pub use detector::{ChangeDetector, ContentHashDetector, DetectionStrategy, TimestampDetector};
pub use events::{EventReconciler, NotificationEvent};
pub use polling::{PassReport, PollingReconciler};
pub use pruner::Pruner;
pub use watcher::{NotificationSubscription, WatchError};
