//! Types shared between the zone server and display clients.

pub mod config;
pub mod protocol;
pub mod vec2;
