pub(crate) mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod observability;
pub mod provider;
pub mod routing;
pub mod search;
pub mod state;
pub mod store;
pub mod stream;
pub mod transport;
