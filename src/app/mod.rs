//! Application-layer seams: port traits and structured events.

pub mod events;
pub mod ports;
