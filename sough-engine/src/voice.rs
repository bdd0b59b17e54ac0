//! The drone voice: oscillator bank, modulated filter, saturation, wash,
//! and gain staging, advanced in control blocks.
//!
//! Rendering walks 32-sample control blocks aligned to the voice's absolute
//! sample position: modulation (cutoff LFO, detune drift) and filter
//! coefficients update at block boundaries, smoothers and the audio chain
//! tick every sample, and the oscillators are generated in bulk by the
//! vector kernels. Because block boundaries are anchored to the absolute
//! sample counter, splitting a render across calls at any point produces the
//! same sample stream.

use sough_core::dsp::{cents_to_ratio, saturate, TAU};
use sough_core::filters::{DcBlock, SvfLp};
use sough_core::kernels::Kernels;
use sough_core::smooth::SmoothedParam;

use crate::control::{DetuneDrift, Lfo};
use crate::space::Wash;

/// Samples per control block.
pub const CONTROL_INTERVAL: usize = 32;

/// The fixed musical pitch of the base voice (A2).
pub const BASE_PITCH_HZ: f32 = 110.0;

// Modulation shape. Neither rate is observable through the boundary API;
// both sit far below 1 Hz so the texture wanders instead of wobbling.
const CUTOFF_LFO_HZ: f32 = 0.05;
const DRIFT_SPAN_CENTS: f32 = 2.5;
const DRIFT_PERIOD_S: f32 = 8.0;
const DRIFT_SLEW_HZ: f32 = 0.15;

// Fixed drift seed: two voices built with the same parameters render the
// same stream, which keeps the continuity contract testable.
const DRIFT_SEED: u64 = 0x536f_7567_6821;

const SMOOTH_MS: f32 = 30.0;
const FILTER_Q: f32 = 0.6;
const MIN_CUT_HZ: f32 = 20.0;
const MAX_CUT_FRAC: f32 = 0.45; // of sample rate
const DC_GUARD_HZ: f32 = 15.0;
const MAX_DETUNE_CENTS: f32 = 25.0;

// Default "slow drone" scene.
const DEFAULT_CUT_BASE_HZ: f32 = 900.0;
const DEFAULT_CUT_SPAN_HZ: f32 = 600.0;
const DEFAULT_DRIVE: f32 = 0.9;
const DEFAULT_OUT_GAIN: f32 = 0.33;
const DEFAULT_DETUNE_CENTS: f32 = 6.0;

/// One mono drone voice. Owned by [`DroneEngine`](crate::engine::DroneEngine);
/// everything here runs on the audio thread with no allocation.
pub struct DroneVoice {
    sr: f32,
    kernels: Kernels,

    // oscillator bank: base voice + detuned companion, radian phases
    phase_a: f32,
    phase_b: f32,
    inc_a: f32,
    inc_b: f32,

    // modulation
    lfo_cut: Lfo,
    drift: DetuneDrift,

    // smoothed scene parameters (targets written by setters)
    cut_base: SmoothedParam,
    cut_span: SmoothedParam,
    drive: SmoothedParam,
    out_gain: SmoothedParam,
    detune: SmoothedParam,

    // stages
    filter: SvfLp,
    wash: Wash,
    dc: DcBlock,

    // control-block bookkeeping
    block_pos: usize,
    scratch_osc: [f32; CONTROL_INTERVAL],
    scratch_mix: [f32; CONTROL_INTERVAL],
}

impl DroneVoice {
    pub fn new(sr: f32, kernels: Kernels) -> Self {
        let control_rate = sr / CONTROL_INTERVAL as f32;
        let mut v = Self {
            sr,
            kernels,
            phase_a: 0.0,
            phase_b: 0.0,
            inc_a: 0.0,
            inc_b: 0.0,
            lfo_cut: Lfo::sine(CUTOFF_LFO_HZ),
            drift: DetuneDrift::new(
                DRIFT_SPAN_CENTS,
                DRIFT_PERIOD_S,
                DRIFT_SLEW_HZ,
                control_rate,
                DRIFT_SEED,
            ),
            cut_base: SmoothedParam::new(DEFAULT_CUT_BASE_HZ, SMOOTH_MS, sr),
            cut_span: SmoothedParam::new(DEFAULT_CUT_SPAN_HZ, SMOOTH_MS, sr),
            drive: SmoothedParam::new(DEFAULT_DRIVE, SMOOTH_MS, sr),
            out_gain: SmoothedParam::new(DEFAULT_OUT_GAIN, SMOOTH_MS, sr),
            detune: SmoothedParam::new(DEFAULT_DETUNE_CENTS, SMOOTH_MS, sr),
            filter: SvfLp::new(DEFAULT_CUT_BASE_HZ, FILTER_Q, sr),
            wash: Wash::new(sr),
            dc: DcBlock::new(DC_GUARD_HZ, sr),
            block_pos: 0,
            scratch_osc: [0.0; CONTROL_INTERVAL],
            scratch_mix: [0.0; CONTROL_INTERVAL],
        };
        v.derive_increments(DEFAULT_DETUNE_CENTS);
        v
    }

    /// Re-derive every sample-rate-dependent coefficient in place and return
    /// audio state (phases, filter, wash, DC guard) to quiescence. Smoother
    /// targets and currents survive; continuity across a rate change is not
    /// promised, silence-safety is.
    pub fn reset(&mut self, sr: f32) {
        self.sr = sr;
        let control_rate = sr / CONTROL_INTERVAL as f32;

        self.phase_a = 0.0;
        self.phase_b = 0.0;
        self.block_pos = 0;

        self.lfo_cut.reset_phase();
        self.drift.reset(control_rate);

        for p in [
            &mut self.cut_base,
            &mut self.cut_span,
            &mut self.drive,
            &mut self.out_gain,
            &mut self.detune,
        ] {
            p.set_sample_rate(sr);
        }

        self.filter.set_sample_rate(sr);
        self.filter.clear();
        self.wash.reset(sr);
        self.dc.set_sample_rate(sr);
        self.dc.clear();

        self.derive_increments(self.detune.current());
    }

    // --- setters: fire-and-forget target updates -----------------------------

    #[inline]
    pub fn set_cut_base_hz(&mut self, hz: f32) {
        if hz.is_finite() {
            self.cut_base.set_target(hz.max(MIN_CUT_HZ));
        }
    }

    #[inline]
    pub fn set_cut_span_hz(&mut self, hz: f32) {
        if hz.is_finite() {
            self.cut_span.set_target(hz.max(0.0));
        }
    }

    /// Drive is always clamped to [0.1, 5.0] before use.
    #[inline]
    pub fn set_drive(&mut self, d: f32) {
        if d.is_finite() {
            self.drive.set_target(d.clamp(0.1, 5.0));
        }
    }

    #[inline]
    pub fn set_out_gain(&mut self, g: f32) {
        if g.is_finite() {
            self.out_gain.set_target(g.max(0.0));
        }
    }

    #[inline]
    pub fn set_detune_cents(&mut self, c: f32) {
        if c.is_finite() {
            self.detune.set_target(c.clamp(0.0, MAX_DETUNE_CENTS));
        }
    }

    #[inline]
    pub fn kernels(&self) -> Kernels {
        self.kernels
    }

    #[inline]
    pub(crate) fn base_phase_inc(&self) -> f32 {
        self.inc_a
    }

    #[inline]
    fn derive_increments(&mut self, cents: f32) {
        self.inc_a = TAU * BASE_PITCH_HZ / self.sr;
        self.inc_b = self.inc_a * cents_to_ratio(cents);
    }

    /// Block-boundary work: sample the modulators, move the filter cutoff,
    /// retune the companion voice.
    fn control_tick(&mut self) {
        let dt = CONTROL_INTERVAL as f32 / self.sr;

        let lfo = self.lfo_cut.tick_block(CONTROL_INTERVAL, self.sr);
        let cut = self.cut_base.current() + self.cut_span.current() * lfo;
        self.filter
            .set_cutoff_hz(cut.clamp(MIN_CUT_HZ, MAX_CUT_FRAC * self.sr));

        let wander = self.drift.tick(dt);
        self.derive_increments(self.detune.current() + wander);
    }

    /// Produce up to `max` finished mono samples (everything except the
    /// engine's post gain) and return them. The returned slice is never
    /// empty for `max > 0`; callers loop until they have enough frames.
    pub fn next_run(&mut self, max: usize) -> &[f32] {
        if self.block_pos == 0 {
            self.control_tick();
        }
        let run = max.min(CONTROL_INTERVAL - self.block_pos);

        // Oscillator bank, in bulk: two sine voices summed at equal gain,
        // headroom preserved ahead of the filter.
        self.scratch_mix[..run].fill(0.0);
        (self.kernels.sine)(&mut self.scratch_osc[..run], &mut self.phase_a, self.inc_a);
        (self.kernels.mix)(&mut self.scratch_mix[..run], &self.scratch_osc[..run], 0.5);
        (self.kernels.sine)(&mut self.scratch_osc[..run], &mut self.phase_b, self.inc_b);
        (self.kernels.mix)(&mut self.scratch_mix[..run], &self.scratch_osc[..run], 0.5);

        // Per-sample chain: filter → saturation → wash → DC guard → gain.
        for i in 0..run {
            self.cut_base.tick();
            self.cut_span.tick();
            self.detune.tick();
            let drive = self.drive.tick();
            let g = self.out_gain.tick();

            let y = self.filter.process(self.scratch_mix[i]);
            let y = saturate(y, drive.clamp(0.1, 5.0));
            let y = self.wash.process(y);
            let y = self.dc.process(y);
            self.scratch_mix[i] = y * g;
        }

        self.block_pos = (self.block_pos + run) % CONTROL_INTERVAL;
        &self.scratch_mix[..run]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(sr: f32) -> DroneVoice {
        DroneVoice::new(sr, Kernels::detect())
    }

    #[test]
    fn phases_stay_bounded() {
        let mut v = voice(48000.0);
        for _ in 0..10_000 {
            let _ = v.next_run(CONTROL_INTERVAL);
            assert!(v.phase_a.abs() <= TAU + 1e-3);
            assert!(v.phase_b.abs() <= TAU + 1e-3);
        }
    }

    #[test]
    fn run_never_crosses_a_block_boundary() {
        let mut v = voice(44100.0);
        let mut lens = Vec::new();
        for req in [5usize, 40, 1, 31, 100, 7] {
            lens.push(v.next_run(req).len());
        }
        assert_eq!(lens, vec![5, 27, 1, 31, 32, 7]);
    }

    #[test]
    fn output_is_bounded_and_finite() {
        let mut v = voice(48000.0);
        for _ in 0..5_000 {
            for &s in v.next_run(CONTROL_INTERVAL) {
                assert!(s.is_finite());
                assert!(s.abs() <= 1.5, "s={}", s);
            }
        }
    }

    #[test]
    fn reset_rederives_base_increment() {
        let mut v = voice(48000.0);
        let _ = v.next_run(CONTROL_INTERVAL);
        v.reset(96000.0);
        let expect = TAU * BASE_PITCH_HZ / 96000.0;
        assert!((v.base_phase_inc() - expect).abs() < 1e-9);
    }
}
