//! Charm store access

pub mod http_client;

pub use http_client::CharmStoreClient;
