//! Lifecycle operations: add, remove, tag, pull.
//!
//! These compose the store, integrity engine and remote client with
//! filesystem mutation. Registry metadata changes always finish with a
//! store `write()`; directory changes around them are best-effort and
//! never atomic with the metadata.

mod add;
mod pull;
mod remove;
mod tag;

pub use add::add_asset;
pub use pull::pull_asset;
pub use remove::{remove_assets, RemoveMode, RemoveOutcome};
pub use tag::tag_asset;
