//! CRI runtime implementations.
//!
//! - [`HollowRuntime`]: simulated sandboxes and containers for hollow nodes

pub mod hollow;

pub use self::hollow::{HollowRuntime, MissingRecordPolicy, RuntimeConfig, image_digest};
