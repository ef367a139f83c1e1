//! HTTP surface of the marketplace: REST handlers plus server wiring.

pub mod rest;
pub mod server;

pub use rest::AppState;
pub use server::ApiServer;
