pub mod charm_url;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod poll;
pub mod state_machine;
pub mod traits;

pub use charm_url::CharmUrl;
pub use config::CharmPublishConfig;
pub use config_loader::{ConfigLoadOptions, ConfigLoader};
pub use error::*;
pub use poll::*;
pub use state_machine::{PublishState, PublishStateMachine, StateTransition, TransitionError};
pub use traits::*;
