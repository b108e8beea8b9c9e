//! Beeper module: edge detection and the service that drives the sound
//!
//! - EdgeDetector: reports when a modifier goes from released to held
//! - Beeper: serial loop over snapshots and front-end controls

mod detector;
mod service;

pub use service::{Beeper, Control};
