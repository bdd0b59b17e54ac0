#![cfg_attr(not(feature = "std"), no_std)]
//! Sough Core — no_std-ready DSP primitives for the sough drone engine.
//!
//! Features
//! - `std`      : (default) use the Rust standard library; enables runtime
//!   CPU detection for the vector kernels
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable approximations (polys/rationals) for tanh/trig, etc.
//! - `simd`     : enable the portable-SIMD kernel tier (`wide`)
//!
//! Modules
//! - [`dsp`]     : math backend, utils (db/lin, phase wrap, cents, fast trig, meters)
//! - [`filters`] : one-pole LP, DC blocker, TPT SVF low-pass
//! - [`smooth`]  : target/current parameter smoothing
//! - [`kernels`] : mix/sine vector kernels with per-ISA backends
//!
//! Design
//! - No heap allocations; pure sample-by-sample or fixed-slice primitives
//! - Clear separation between math helpers and stateful building blocks
//! - Friendly to embedded / real-time targets

pub mod dsp;
pub mod filters;
pub mod kernels;
pub mod smooth;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        cents_to_ratio, db_to_lin, kill_denormals, lin_to_db, one_pole_coeff_hz,
        one_pole_coeff_ms, reduce_phase, saturate, soft_clip, tpt_g, wrap_phase, TAU,
    };
    pub use crate::filters::{DcBlock, OnePoleLP, SvfLp};
    pub use crate::kernels::Kernels;
    pub use crate::smooth::SmoothedParam;
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let _ = SmoothedParam::new(0.5, 30.0, 48000.0);
        let mut lp = OnePoleLP::new(1000.0, 48000.0);
        let _ = lp.process(0.1);
        let k = Kernels::detect();
        let mut phase = 0.0;
        let mut buf = [0.0f32; 8];
        (k.sine)(&mut buf, &mut phase, 0.01);
    }
}
