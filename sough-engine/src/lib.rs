//! Sough Engine — one evolving ambient-drone voice behind a realtime-safe API.
//!
//! Crate layout:
//! - [`engine`]  : `DroneEngine` lifecycle + block render entry point
//! - [`voice`]   : the drone voice (oscillator bank, filter, saturation, gains)
//! - [`control`] : control-rate modulation (cutoff LFO, detune drift)
//! - [`space`]   : mono diffusion wash
//!
//! The engine deliberately avoids heap allocations in the audio thread.
//! Parameters are smoothed target/current pairs; setters only write targets
//! and are O(1).

pub mod control;
pub mod engine;
pub mod space;
pub mod voice;

// Re-export the surface most hosts need.
pub use engine::{DroneEngine, EngineError};
pub use voice::{BASE_PITCH_HZ, CONTROL_INTERVAL};
