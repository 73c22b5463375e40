pub mod charm_metadata;

pub use charm_metadata::{CharmMetadata, Relation, RelationRole};
