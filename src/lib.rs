pub mod core;
pub mod orchestration;
pub mod store;
pub mod validation;
pub mod vcs;

pub use self::core::*;
pub use orchestration::{CharmPublisher, LocationResolver, PublishReport};
pub use store::CharmStoreClient;
pub use vcs::{CommandError, GitBranch, SafeCommandExecutor};
