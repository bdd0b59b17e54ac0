//! C ABI wrapper for the sough drone engine.
//!
//! Exposes a small set of functions to create/destroy an engine, render
//! interleaved f32 samples, and drive the scene parameters.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `SoughEngine` (heap-allocated; the caller owns it
//!   and must pass it to `sough_destroy` exactly once).
//! - `sough_create` returns null for a non-finite or non-positive sample
//!   rate, or on allocation failure; callers must check before use.
//! - The render path produces **mono** internally and duplicates the sample
//!   to N channels.
//!
//! Threading
//! - A handle is NOT thread-safe; call all functions on it from the same
//!   audio thread.

use sough_engine::DroneEngine;

/// Opaque engine handle handed to C. Single-owner: using it after
/// `sough_destroy` is undefined behavior by contract.
pub struct SoughEngine {
    inner: DroneEngine,
}

// --- Creation / destruction -------------------------------------------------------

/// Create a new engine with the default "slow drone" scene.
/// Returns a non-null pointer on success, or null on an invalid sample rate
/// or allocation failure.
#[no_mangle]
pub extern "C" fn sough_create(sample_rate: f32) -> *mut SoughEngine {
    match DroneEngine::new(sample_rate) {
        Ok(inner) => Box::into_raw(Box::new(SoughEngine { inner })),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Destroy an engine previously returned by `sough_create`. Null is a no-op.
#[no_mangle]
pub extern "C" fn sough_destroy(engine: *mut SoughEngine) {
    if !engine.is_null() {
        unsafe {
            drop(Box::from_raw(engine));
        }
    }
}

/// Reset the engine to a new sample rate (e.g., when the host changes device
/// config). Coefficients are re-derived in place; nothing is reallocated.
#[no_mangle]
pub extern "C" fn sough_reset(engine: *mut SoughEngine, sample_rate: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.reset(sample_rate);
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` frames of audio into an interleaved f32 buffer with
/// `channels` channels. `out_interleaved` must have room for
/// `frames * channels` floats. The internal voice is mono; the sample is
/// duplicated to all channels.
///
/// Returns the number of frames rendered: `frames` on success, 0 on invalid
/// input (null pointers, zero frames or channels). On a short return the
/// caller silences the remainder of its buffer itself.
#[no_mangle]
pub extern "C" fn sough_render_interleaved_f32(
    engine: *mut SoughEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if engine.is_null() || out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let e = unsafe { &mut *engine };
    let out = unsafe {
        std::slice::from_raw_parts_mut(out_interleaved, (frames as usize) * (channels as usize))
    };
    e.inner.render_interleaved(out, frames, channels)
}

// --- Gain + scene parameter setters ----------------------------------------------

/// Set the post-chain output gain. Applied after the scene's own smoothed
/// gain and NOT smoothed itself: automating this mid-stream can click. Use
/// `sough_scene_set_out_gain` for click-free gain automation. Values are
/// clamped to [0, +inf); non-finite input is ignored.
#[no_mangle]
pub extern "C" fn sough_set_gain(engine: *mut SoughEngine, gain: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.set_gain(gain);
}

/// Set the base low-pass cutoff (Hz) for the scene (floored at 20 Hz).
#[no_mangle]
pub extern "C" fn sough_scene_set_cut_base(engine: *mut SoughEngine, hz: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.set_cut_base_hz(hz);
}

/// Set the modulation span (Hz) around the base cutoff.
#[no_mangle]
pub extern "C" fn sough_scene_set_cut_span(engine: *mut SoughEngine, hz: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.set_cut_span_hz(hz);
}

/// Set drive (saturation intensity), clamped internally to [0.1, 5.0].
#[no_mangle]
pub extern "C" fn sough_scene_set_drive(engine: *mut SoughEngine, drive: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.set_drive(drive);
}

/// Set the scene output gain (smoothed; the click-free one).
#[no_mangle]
pub extern "C" fn sough_scene_set_out_gain(engine: *mut SoughEngine, gain: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.set_out_gain(gain);
}

/// Set the companion-voice detune depth in cents (clamped to [0, 25]).
#[no_mangle]
pub extern "C" fn sough_scene_set_detune_cents(engine: *mut SoughEngine, cents: f32) {
    if engine.is_null() {
        return;
    }
    let e = unsafe { &mut *engine };
    e.inner.set_detune_cents(cents);
}
