//! Mono diffusion wash (no heap, realtime-safe).
//!
//! A small Schroeder-style tail that turns the dry drone into something with
//! air around it: two short all-passes diffuse the input, three damped combs
//! in parallel build the body, one more all-pass smears the sum. Delay lines
//! are fixed-size arrays inside the struct, so `process` never allocates.
//!
//! Output is mono; the engine duplicates it to device channels after gain
//! staging.

use sough_core::dsp::{kill_denormals, one_pole_coeff_hz};

// Compile-time line capacities, sized for up to 96 kHz.
const MAX_AP: usize = 4096; // ~42 ms @ 96k
const MAX_COMB: usize = 24576; // ~0.25 s @ 96k
const MAX_TAIL_AP: usize = 4096;

#[derive(Copy, Clone, Debug)]
struct DelayLine<const N: usize> {
    buf: [f32; N],
    i: usize,
    len: usize,
}

impl<const N: usize> DelayLine<N> {
    #[inline]
    fn new() -> Self {
        Self { buf: [0.0; N], i: 0, len: 1 }
    }

    #[inline]
    fn set_len(&mut self, len: usize) {
        self.len = len.clamp(1, N);
        if self.i >= self.len {
            self.i = 0;
        }
    }

    #[inline]
    fn clear(&mut self) {
        self.buf = [0.0; N];
        self.i = 0;
    }

    #[inline]
    fn read(&self) -> f32 {
        self.buf[self.i]
    }

    #[inline]
    fn write_advance(&mut self, x: f32) {
        self.buf[self.i] = x;
        self.i += 1;
        if self.i >= self.len {
            self.i = 0;
        }
    }
}

/// Canonical feedforward + feedback all-pass around a single delay.
#[derive(Copy, Clone, Debug)]
struct Allpass<const N: usize> {
    d: DelayLine<N>,
    g: f32,
}

impl<const N: usize> Allpass<N> {
    #[inline]
    fn new(g: f32) -> Self {
        Self { d: DelayLine::new(), g }
    }

    #[inline]
    fn configure(&mut self, len: usize, g: f32) {
        self.d.set_len(len);
        self.g = g.clamp(-0.999, 0.999);
    }

    #[inline]
    fn clear(&mut self) {
        self.d.clear();
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let z = self.d.read();
        let y = z - self.g * x;
        self.d.write_advance(x + self.g * y);
        kill_denormals(y)
    }
}

/// Feedback comb with a one-pole damper folded into the loop. The damper
/// state lives inline (`lp_y`), coefficient derived from a cutoff in Hz.
#[derive(Copy, Clone, Debug)]
struct DampedComb<const N: usize> {
    d: DelayLine<N>,
    fb: f32,
    damp_a: f32,
    lp_y: f32,
}

impl<const N: usize> DampedComb<N> {
    #[inline]
    fn new() -> Self {
        Self { d: DelayLine::new(), fb: 0.7, damp_a: 1.0, lp_y: 0.0 }
    }

    #[inline]
    fn set_len(&mut self, len: usize) {
        self.d.set_len(len);
    }

    #[inline]
    fn set_feedback(&mut self, fb: f32) {
        self.fb = fb.clamp(0.0, 0.99);
    }

    #[inline]
    fn set_damp(&mut self, cut_hz: f32, sr: f32) {
        self.damp_a = 1.0 - one_pole_coeff_hz(cut_hz, sr);
    }

    #[inline]
    fn clear(&mut self) {
        self.d.clear();
        self.lp_y = 0.0;
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let z = self.d.read();
        self.lp_y += self.damp_a * (z - self.lp_y);
        self.lp_y = kill_denormals(self.lp_y);
        self.d.write_advance(x + self.fb * self.lp_y);
        z
    }
}

/// The wash itself. `room` maps to comb feedback, `damp` to the in-loop
/// low-pass cutoff, `mix` is the wet fraction.
#[derive(Copy, Clone, Debug)]
pub struct Wash {
    sr: f32,
    ap_in1: Allpass<MAX_AP>,
    ap_in2: Allpass<MAX_AP>,
    combs: [DampedComb<MAX_COMB>; 3],
    ap_tail: Allpass<MAX_TAIL_AP>,
    room: f32,
    damp: f32,
    mix: f32,
}

impl Wash {
    pub fn new(sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            ap_in1: Allpass::new(0.71),
            ap_in2: Allpass::new(0.68),
            combs: [DampedComb::new(), DampedComb::new(), DampedComb::new()],
            ap_tail: Allpass::new(0.62),
            room: 0.55,
            damp: 0.35,
            mix: 0.22,
        };
        s.reset(sr);
        s
    }

    /// Re-derive line lengths and coefficients for `sr` and clear all state.
    pub fn reset(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        let scale = self.sr / 48_000.0;

        self.ap_in1.configure((523.0 * scale) as usize, 0.71);
        self.ap_in2.configure((829.0 * scale) as usize, 0.68);

        // Mutually prime-ish lengths to keep the tail from ringing at one pitch.
        let lens = [6421.0, 7919.0, 9161.0];
        for (c, l) in self.combs.iter_mut().zip(lens) {
            c.set_len((l * scale) as usize);
        }

        self.ap_tail.configure((661.0 * scale) as usize, 0.62);

        self.clear();
        self.update_params();
    }

    /// Zero all delay-line and damper state without touching tuning.
    pub fn clear(&mut self) {
        self.ap_in1.clear();
        self.ap_in2.clear();
        for c in self.combs.iter_mut() {
            c.clear();
        }
        self.ap_tail.clear();
    }

    fn update_params(&mut self) {
        let fb = 0.5 + 0.42 * self.room.clamp(0.0, 1.0); // 0.5..0.92
        let cut = 1800.0 + 10_000.0 * (1.0 - self.damp.clamp(0.0, 1.0));
        for c in self.combs.iter_mut() {
            c.set_feedback(fb);
            c.set_damp(cut, self.sr);
        }
        self.mix = self.mix.clamp(0.0, 1.0);
    }

    /// Process one mono sample; returns dry + wet.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let pre = self.ap_in2.process(self.ap_in1.process(x));

        let mut sum = 0.0;
        for c in self.combs.iter_mut() {
            sum += c.process(pre);
        }
        sum *= 1.0 / 3.0;

        let wet = self.ap_tail.process(sum);
        kill_denormals((1.0 - self.mix) * x + self.mix * wet)
    }
}
