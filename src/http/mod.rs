//! HTTP surface: transport seams, incremental request decoding, routing,
//! and the cooperative dispatcher that drives everything.

pub mod assets;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod transport;
