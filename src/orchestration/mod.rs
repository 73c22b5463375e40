//! Orchestration layer for charm publishing
//!
//! Resolves what is being published and where it is pushed, then drives a
//! single publish attempt against the store.

pub mod charm_publisher;
pub mod location;

pub use charm_publisher::{CharmPublisher, PublishReport};
pub use location::{LocationOverride, LocationResolver};
