//! Zone occupancy server library.
//!
//! Bouncing entities, one worker thread each, share a circular zone whose
//! occupancy is held within `[min, max]` by a blocking monitor. This module
//! exposes the server components for use in tests and binaries.

pub mod arena;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod interrupt;
pub mod pacing;
pub mod sim_loop;
mod sync;
pub mod worker;
pub mod ws;
