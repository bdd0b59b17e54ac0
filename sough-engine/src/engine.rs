//! Engine lifecycle and the render entry point.
//!
//! `DroneEngine` is a single-owner resource: create it with a sample rate,
//! drive it from one logical thread, let `Drop` release it. None of the
//! entry points lock, allocate, or block; `render_interleaved` is safe to
//! call from a deadline-bound audio callback.

use thiserror::Error;

use sough_core::kernels::Kernels;

use crate::voice::DroneVoice;

/// Construction errors. Everything after construction reports trouble
/// through the zero-return render contract instead.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("sample rate must be a positive, finite number of Hz (got {0})")]
    InvalidSampleRate(f32),
}

/// One mono drone voice behind a realtime-safe rendering API.
///
/// Not thread-safe by design: call every method from the same logical thread
/// (normally the host's audio callback thread). A host that wants cross-
/// thread automation must serialize updates onto that thread itself.
pub struct DroneEngine {
    sr: f32,
    post_gain: f32,
    voice: DroneVoice,
}

impl DroneEngine {
    /// Create an engine with the default "slow drone" scene. The kernel
    /// backend is detected here, once, and held for the engine's lifetime.
    pub fn new(sample_rate: f32) -> Result<Self, EngineError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sr: sample_rate,
            post_gain: 1.0,
            voice: DroneVoice::new(sample_rate, Kernels::detect()),
        })
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sr
    }

    /// The kernel set selected at creation, for startup logging.
    #[inline]
    pub fn kernels(&self) -> Kernels {
        self.voice.kernels()
    }

    /// Re-derive all sample-rate-dependent coefficients in place; no
    /// reallocation. Parameter targets survive, audio state returns to
    /// quiescence. Invalid rates are ignored.
    pub fn reset(&mut self, sample_rate: f32) {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return;
        }
        self.sr = sample_rate;
        self.voice.reset(sample_rate);
    }

    /// Post-chain gain, applied after the scene's own smoothed output gain.
    /// Deliberately *not* smoothed — automating it mid-stream can click.
    /// Negative or non-finite values are ignored.
    #[inline]
    pub fn set_gain(&mut self, gain: f32) {
        if gain.is_finite() {
            self.post_gain = gain.max(0.0);
        }
    }

    // --- scene setters: O(1) smoother-target updates -------------------------

    /// Base low-pass cutoff in Hz (floored at 20 Hz).
    #[inline]
    pub fn set_cut_base_hz(&mut self, hz: f32) {
        self.voice.set_cut_base_hz(hz);
    }

    /// Modulation excursion around the base cutoff, in Hz.
    #[inline]
    pub fn set_cut_span_hz(&mut self, hz: f32) {
        self.voice.set_cut_span_hz(hz);
    }

    /// Saturation drive, clamped to [0.1, 5.0].
    #[inline]
    pub fn set_drive(&mut self, drive: f32) {
        self.voice.set_drive(drive);
    }

    /// Scene output gain (smoothed, pre post-gain).
    #[inline]
    pub fn set_out_gain(&mut self, gain: f32) {
        self.voice.set_out_gain(gain);
    }

    /// Companion-voice detune depth in cents.
    #[inline]
    pub fn set_detune_cents(&mut self, cents: f32) {
        self.voice.set_detune_cents(cents);
    }

    /// Render `frames` frames into `out`, interleaved, duplicating the mono
    /// sample across `channels` channels per frame.
    ///
    /// Returns the number of frames written: `frames` on success, 0 on
    /// invalid input (`frames == 0`, `channels == 0`, or `out` shorter than
    /// `frames * channels`), in which case `out` is untouched. A caller
    /// seeing a short count zero-fills the remainder and carries on; the
    /// audio thread is never asked to handle an error value.
    pub fn render_interleaved(&mut self, out: &mut [f32], frames: u32, channels: u32) -> u32 {
        if frames == 0 || channels == 0 {
            return 0;
        }
        let frames = frames as usize;
        let ch = channels as usize;
        let Some(need) = frames.checked_mul(ch) else {
            return 0;
        };
        if out.len() < need {
            return 0;
        }

        let g = self.post_gain;
        let mut done = 0usize;
        while done < frames {
            let run = self.voice.next_run(frames - done);
            let base = done * ch;
            for (i, &s) in run.iter().enumerate() {
                let v = (s * g).clamp(-1.0, 1.0);
                let off = base + i * ch;
                for slot in out[off..off + ch].iter_mut() {
                    *slot = v;
                }
            }
            done += run.len();
        }
        frames as u32
    }

    #[cfg(test)]
    pub(crate) fn base_phase_inc(&self) -> f32 {
        self.voice.base_phase_inc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::BASE_PITCH_HZ;
    use sough_core::dsp::TAU;

    #[test]
    fn rejects_bad_sample_rates() {
        for sr in [0.0, -48000.0, f32::NAN, f32::INFINITY] {
            assert!(DroneEngine::new(sr).is_err(), "sr={}", sr);
        }
    }

    #[test]
    fn first_sample_is_finite_and_bounded() {
        for sr in [8000.0, 44100.0, 48000.0, 96000.0] {
            let mut e = DroneEngine::new(sr).unwrap();
            let mut buf = [7.0f32; 1];
            assert_eq!(e.render_interleaved(&mut buf, 1, 1), 1);
            assert!(buf[0].is_finite());
            assert!(buf[0].abs() <= 1.0, "sr={} s={}", sr, buf[0]);
        }
    }

    #[test]
    fn invalid_render_args_return_zero_and_leave_buffer_alone() {
        let mut e = DroneEngine::new(48000.0).unwrap();
        let mut buf = [7.0f32; 64];

        assert_eq!(e.render_interleaved(&mut buf, 0, 2), 0);
        assert_eq!(e.render_interleaved(&mut buf, 16, 0), 0);
        // too small: 64 < 33 * 2
        assert_eq!(e.render_interleaved(&mut buf, 33, 2), 0);

        assert!(buf.iter().all(|&s| s == 7.0));
    }

    #[test]
    fn out_gain_at_zero_settles_to_silence() {
        let sr = 48000.0;
        let mut e = DroneEngine::new(sr).unwrap();
        e.set_out_gain(0.0);

        // a second is far beyond the 30 ms smoother settle
        let mut buf = vec![0.0f32; 1024];
        for _ in 0..((sr as usize) / 512) {
            e.render_interleaved(&mut buf, 512, 2);
        }
        e.render_interleaved(&mut buf, 512, 2);
        let peak = buf.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak < 1e-6, "peak={}", peak);
    }

    #[test]
    fn split_rendering_matches_one_shot() {
        let frames = 256u32;
        let mut whole = vec![0.0f32; frames as usize];
        let mut split = vec![0.0f32; frames as usize];

        let mut e1 = DroneEngine::new(44100.0).unwrap();
        assert_eq!(e1.render_interleaved(&mut whole, frames, 1), frames);

        let mut e2 = DroneEngine::new(44100.0).unwrap();
        let (a, b) = split.split_at_mut(100);
        assert_eq!(e2.render_interleaved(a, 100, 1), 100);
        assert_eq!(e2.render_interleaved(b, 156, 1), 156);

        for i in 0..frames as usize {
            assert!(
                (whole[i] - split[i]).abs() < 1e-3,
                "i={}: {} vs {}",
                i,
                whole[i],
                split[i]
            );
        }
    }

    #[test]
    fn drive_outside_range_never_breaks_the_output_bound() {
        for drive in [-10.0, 0.0, 100.0, 1e9] {
            let mut e = DroneEngine::new(48000.0).unwrap();
            e.set_drive(drive);
            let mut buf = vec![0.0f32; 4096];
            for _ in 0..8 {
                e.render_interleaved(&mut buf, 4096, 1);
            }
            for &s in &buf {
                assert!(s.is_finite() && s.abs() <= 1.0, "drive={} s={}", drive, s);
            }
        }
    }

    #[test]
    fn channels_carry_identical_samples() {
        let mut e = DroneEngine::new(48000.0).unwrap();
        let mut buf = vec![0.0f32; 64 * 4];
        assert_eq!(e.render_interleaved(&mut buf, 64, 4), 64);
        for frame in buf.chunks_exact(4) {
            assert!(frame.iter().all(|&s| s == frame[0]), "frame={:?}", frame);
        }
    }

    #[test]
    fn reset_rederives_coefficients_for_the_new_rate() {
        let mut e = DroneEngine::new(44100.0).unwrap();
        let mut buf = vec![0.0f32; 512];
        e.render_interleaved(&mut buf, 512, 1);

        e.reset(96000.0);
        assert_eq!(e.sample_rate(), 96000.0);
        let expect = TAU * BASE_PITCH_HZ / 96000.0;
        assert!((e.base_phase_inc() - expect).abs() < 1e-9);

        // still renders cleanly after the rate change
        assert_eq!(e.render_interleaved(&mut buf, 512, 1), 512);
        assert!(buf.iter().all(|&s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn reset_ignores_invalid_rates() {
        let mut e = DroneEngine::new(48000.0).unwrap();
        e.reset(0.0);
        e.reset(f32::NAN);
        assert_eq!(e.sample_rate(), 48000.0);
    }

    #[test]
    fn post_gain_scales_after_the_scene_gain() {
        let mut quiet = DroneEngine::new(48000.0).unwrap();
        quiet.set_gain(0.0);
        let mut buf = vec![0.0f32; 1024];
        quiet.render_interleaved(&mut buf, 1024, 1);
        assert!(buf.iter().all(|&s| s == 0.0));
    }
}
