//! Vector kernels for the render hot loops.
//!
//! Two operations, selected once at startup and then called through plain
//! function pointers:
//!
//! - `mix_with_gain(dst, src, gain)` : `dst[i] += src[i] * gain`
//! - `sine_generate(out, phase, phase_inc)` : fills `out` with a sine wave
//!   starting at `*phase` (radians), advancing and wrapping the phase, and
//!   writes the updated phase back so repeated calls are phase-continuous.
//!
//! Backends:
//! - scalar (always present, the reference implementation)
//! - `wide` f32x4 portable SIMD (feature `simd`)
//! - x86-64: AVX mix + SSE4.1 sine, runtime-detected under `std`
//! - AArch64: NEON (baseline feature on that target)
//!
//! Every backend evaluates the same 7th-order odd polynomial after reducing
//! the phase to [-π, π], so outputs agree to within a few ULPs of each other;
//! the only divergence is rounding order. That equivalence is the correctness
//! contract here and is what the tests pin down.

use crate::dsp::{reduce_phase, wrap_phase};

/// `dst[i] += src[i] * gain` over the common prefix of the two slices.
pub type MixFn = fn(&mut [f32], &[f32], f32);

/// Phase-accumulating sine fill; phase is radians and is written back wrapped.
pub type SineFn = fn(&mut [f32], &mut f32, f32);

// Odd Taylor coefficients for sin(x) on [-π, π]:
// sin(x) ≈ x + x³(C3 + x²(C5 + x²·C7))
const C3: f32 = -1.0 / 6.0;
const C5: f32 = 1.0 / 120.0;
const C7: f32 = -1.0 / 5040.0;

/// A capability-selected kernel set. Detect once (engine creation), then call
/// through the fields from the audio thread; detection never happens per call.
#[derive(Copy, Clone, Debug)]
pub struct Kernels {
    pub mix: MixFn,
    pub sine: SineFn,
    mix_name: &'static str,
    sine_name: &'static str,
}

impl Kernels {
    /// Pick the best backend for the running CPU.
    pub fn detect() -> Self {
        #[allow(unused_mut)]
        let mut k = Self::portable();

        #[cfg(all(target_arch = "x86_64", feature = "std"))]
        {
            if std::arch::is_x86_feature_detected!("avx") {
                k.mix = x86::mix_avx;
                k.mix_name = "avx";
            }
            if std::arch::is_x86_feature_detected!("sse4.1") {
                k.sine = x86::sine_sse;
                k.sine_name = "sse4.1";
            }
        }
        // Without std there is no runtime detection; trust the compile target.
        #[cfg(all(target_arch = "x86_64", not(feature = "std"), target_feature = "avx"))]
        {
            k.mix = x86::mix_avx;
            k.mix_name = "avx";
        }
        #[cfg(all(target_arch = "x86_64", not(feature = "std"), target_feature = "sse4.1"))]
        {
            k.sine = x86::sine_sse;
            k.sine_name = "sse4.1";
        }

        #[cfg(target_arch = "aarch64")]
        {
            k.mix = neon::mix;
            k.mix_name = "neon";
            k.sine = neon::sine;
            k.sine_name = "neon";
        }

        k
    }

    /// The portable tier: `wide` SIMD when the `simd` feature is on, plain
    /// scalar otherwise.
    pub fn portable() -> Self {
        #[cfg(feature = "simd")]
        {
            Self {
                mix: portable_simd::mix,
                sine: portable_simd::sine,
                mix_name: "wide",
                sine_name: "wide",
            }
        }
        #[cfg(not(feature = "simd"))]
        {
            Self::scalar()
        }
    }

    /// The scalar reference backend.
    pub fn scalar() -> Self {
        Self {
            mix: mix_scalar,
            sine: sine_scalar,
            mix_name: "scalar",
            sine_name: "scalar",
        }
    }

    /// Backend names as `(mix, sine)`, for startup logging.
    pub fn names(&self) -> (&'static str, &'static str) {
        (self.mix_name, self.sine_name)
    }
}

#[inline(always)]
fn sine_poly(x: f32) -> f32 {
    let x2 = x * x;
    let x3 = x2 * x;
    x + x3 * (C3 + x2 * (C5 + x2 * C7))
}

// --------------------------------- Scalar ----------------------------------------

/// In-place scaled accumulate over the common prefix of `dst` and `src`.
pub fn mix_scalar(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s * gain;
    }
}

/// Iterative phase accumulation, wrapped whenever it leaves [-2π, 2π].
pub fn sine_scalar(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
    let mut p = *phase;
    for y in out.iter_mut() {
        *y = sine_poly(reduce_phase(p));
        p = wrap_phase(p + phase_inc);
    }
    *phase = p;
}

// --------------------------------- wide (portable SIMD) --------------------------

#[cfg(feature = "simd")]
mod portable_simd {
    use super::{sine_poly, C3, C5, C7};
    use crate::dsp::{reduce_phase, wrap_phase, TAU};
    use wide::f32x4;

    pub fn mix(dst: &mut [f32], src: &[f32], gain: f32) {
        let n = dst.len().min(src.len());
        let g = f32x4::splat(gain);
        let (d_head, d_tail) = dst[..n].split_at_mut(n - n % 4);
        let (s_head, s_tail) = src[..n].split_at(n - n % 4);
        for (dc, sc) in d_head.chunks_exact_mut(4).zip(s_head.chunks_exact(4)) {
            let dv = f32x4::from([dc[0], dc[1], dc[2], dc[3]]);
            let sv = f32x4::from([sc[0], sc[1], sc[2], sc[3]]);
            dc.copy_from_slice(&(dv + sv * g).to_array());
        }
        for (d, s) in d_tail.iter_mut().zip(s_tail.iter()) {
            *d += *s * gain;
        }
    }

    pub fn sine(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
        let mut p = *phase;
        let lane = f32x4::from([0.0, 1.0, 2.0, 3.0]) * f32x4::splat(phase_inc);
        let tau = f32x4::splat(TAU);
        let inv_tau = f32x4::splat(1.0 / TAU);
        let c3 = f32x4::splat(C3);
        let c5 = f32x4::splat(C5);
        let c7 = f32x4::splat(C7);

        let n = out.len();
        let (head, tail) = out.split_at_mut(n - n % 4);
        for chunk in head.chunks_exact_mut(4) {
            let base = f32x4::splat(p) + lane;
            let k = (base * inv_tau).round();
            let x = base - k * tau;
            let x2 = x * x;
            let x3 = x2 * x;
            let y = x + x3 * (c3 + x2 * (c5 + x2 * c7));
            chunk.copy_from_slice(&y.to_array());
            p = wrap_phase(p + 4.0 * phase_inc);
        }
        for y in tail.iter_mut() {
            *y = sine_poly(reduce_phase(p));
            p = wrap_phase(p + phase_inc);
        }
        *phase = p;
    }
}

// --------------------------------- x86-64 ----------------------------------------

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::{sine_poly, C3, C5, C7};
    use crate::dsp::{reduce_phase, wrap_phase, TAU};
    use core::arch::x86_64::*;

    /// Caller contract: only installed by `Kernels::detect` after an AVX check.
    pub fn mix_avx(dst: &mut [f32], src: &[f32], gain: f32) {
        unsafe { mix_avx_inner(dst, src, gain) }
    }

    #[target_feature(enable = "avx")]
    unsafe fn mix_avx_inner(dst: &mut [f32], src: &[f32], gain: f32) {
        let n = dst.len().min(src.len());
        let d = dst.as_mut_ptr();
        let s = src.as_ptr();
        let g = _mm256_set1_ps(gain);
        let vec_n = n - n % 8;
        let mut i = 0;
        while i < vec_n {
            let dv = _mm256_loadu_ps(d.add(i));
            let sv = _mm256_loadu_ps(s.add(i));
            _mm256_storeu_ps(d.add(i), _mm256_add_ps(dv, _mm256_mul_ps(sv, g)));
            i += 8;
        }
        while i < n {
            *d.add(i) += *s.add(i) * gain;
            i += 1;
        }
    }

    /// Caller contract: only installed by `Kernels::detect` after an SSE4.1
    /// check (`_mm_round_ps`).
    pub fn sine_sse(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
        unsafe { sine_sse_inner(out, phase, phase_inc) }
    }

    #[target_feature(enable = "sse4.1")]
    unsafe fn sine_sse_inner(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
        let n = out.len();
        let o = out.as_mut_ptr();
        let mut p = *phase;

        // lane offsets 0..3 in units of phase_inc; highest lane goes in e3
        let lane = _mm_mul_ps(_mm_set_ps(3.0, 2.0, 1.0, 0.0), _mm_set1_ps(phase_inc));
        let tau = _mm_set1_ps(TAU);
        let inv_tau = _mm_set1_ps(1.0 / TAU);
        let c3 = _mm_set1_ps(C3);
        let c5 = _mm_set1_ps(C5);
        let c7 = _mm_set1_ps(C7);

        let vec_n = n - n % 4;
        let mut i = 0;
        while i < vec_n {
            let base = _mm_add_ps(_mm_set1_ps(p), lane);
            let k = _mm_round_ps(
                _mm_mul_ps(base, inv_tau),
                _MM_FROUND_TO_NEAREST_INT | _MM_FROUND_NO_EXC,
            );
            let x = _mm_sub_ps(base, _mm_mul_ps(k, tau));
            let x2 = _mm_mul_ps(x, x);
            let x3 = _mm_mul_ps(x2, x);
            let t = _mm_add_ps(c5, _mm_mul_ps(x2, c7));
            let t = _mm_add_ps(c3, _mm_mul_ps(x2, t));
            let y = _mm_add_ps(x, _mm_mul_ps(x3, t));
            _mm_storeu_ps(o.add(i), y);
            p = wrap_phase(p + 4.0 * phase_inc);
            i += 4;
        }
        while i < n {
            *o.add(i) = sine_poly(reduce_phase(p));
            p = wrap_phase(p + phase_inc);
            i += 1;
        }
        *phase = p;
    }
}

// --------------------------------- AArch64 NEON ----------------------------------

#[cfg(target_arch = "aarch64")]
mod neon {
    use super::{sine_poly, C3, C5, C7};
    use crate::dsp::{reduce_phase, wrap_phase, TAU};
    use core::arch::aarch64::*;

    // NEON is a baseline feature of the aarch64 targets we build for, so the
    // safe wrappers are sound without a runtime check.
    pub fn mix(dst: &mut [f32], src: &[f32], gain: f32) {
        unsafe { mix_inner(dst, src, gain) }
    }

    #[target_feature(enable = "neon")]
    unsafe fn mix_inner(dst: &mut [f32], src: &[f32], gain: f32) {
        let n = dst.len().min(src.len());
        let d = dst.as_mut_ptr();
        let s = src.as_ptr();
        let vec_n = n - n % 4;
        let mut i = 0;
        while i < vec_n {
            let dv = vld1q_f32(d.add(i));
            let sv = vld1q_f32(s.add(i));
            vst1q_f32(d.add(i), vfmaq_n_f32(dv, sv, gain));
            i += 4;
        }
        while i < n {
            *d.add(i) += *s.add(i) * gain;
            i += 1;
        }
    }

    pub fn sine(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
        unsafe { sine_inner(out, phase, phase_inc) }
    }

    #[target_feature(enable = "neon")]
    unsafe fn sine_inner(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
        let n = out.len();
        let o = out.as_mut_ptr();
        let mut p = *phase;

        let offsets: [f32; 4] = [0.0, 1.0, 2.0, 3.0];
        let lane = vmulq_n_f32(vld1q_f32(offsets.as_ptr()), phase_inc);
        let tau = vdupq_n_f32(TAU);
        let inv_tau = vdupq_n_f32(1.0 / TAU);
        let c3 = vdupq_n_f32(C3);
        let c5 = vdupq_n_f32(C5);
        let c7 = vdupq_n_f32(C7);

        let vec_n = n - n % 4;
        let mut i = 0;
        while i < vec_n {
            let base = vaddq_f32(vdupq_n_f32(p), lane);
            let k = vrndnq_f32(vmulq_f32(base, inv_tau));
            let x = vsubq_f32(base, vmulq_f32(k, tau));
            let x2 = vmulq_f32(x, x);
            let x3 = vmulq_f32(x2, x);
            let t = vaddq_f32(c5, vmulq_f32(x2, c7));
            let t = vaddq_f32(c3, vmulq_f32(x2, t));
            let y = vaddq_f32(x, vmulq_f32(x3, t));
            vst1q_f32(o.add(i), y);
            p = wrap_phase(p + 4.0 * phase_inc);
            i += 4;
        }
        while i < n {
            *o.add(i) = sine_poly(reduce_phase(p));
            p = wrap_phase(p + phase_inc);
            i += 1;
        }
        *phase = p;
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::TAU;

    // Every backend compiled into this build, by name.
    fn backends() -> Vec<(&'static str, Kernels)> {
        let mut v = vec![("scalar", Kernels::scalar())];
        #[cfg(feature = "simd")]
        v.push(("wide", Kernels::portable()));
        v.push(("detected", Kernels::detect()));
        v
    }

    #[test]
    fn mix_matches_reference() {
        for (name, k) in backends() {
            for n in [0usize, 1, 3, 4, 7, 8, 33, 256] {
                let src: Vec<f32> = (0..n).map(|i| (i as f32 * 0.37).sin()).collect();
                let mut dst: Vec<f32> = (0..n).map(|i| i as f32 * 0.01 - 0.5).collect();
                let mut expect = dst.clone();
                for i in 0..n {
                    expect[i] += src[i] * 0.8;
                }
                (k.mix)(&mut dst, &src, 0.8);
                for i in 0..n {
                    assert!(
                        (dst[i] - expect[i]).abs() < 1e-6,
                        "{name} n={n} i={i}: {} vs {}",
                        dst[i],
                        expect[i]
                    );
                }
            }
        }
    }

    #[test]
    fn mix_uses_common_prefix() {
        let k = Kernels::detect();
        let src = [1.0f32, 1.0, 1.0];
        let mut dst = [0.0f32; 8];
        (k.mix)(&mut dst, &src, 2.0);
        assert_eq!(&dst[..3], &[2.0, 2.0, 2.0]);
        assert_eq!(&dst[3..], &[0.0; 5]);
    }

    #[test]
    fn sine_backends_agree_with_scalar() {
        let inc = TAU * 110.0 / 48_000.0;
        let mut reference = vec![0.0f32; 512];
        let mut ref_phase = 0.3;
        sine_scalar(&mut reference, &mut ref_phase, inc);

        for (name, k) in backends() {
            let mut out = vec![0.0f32; 512];
            let mut phase = 0.3;
            (k.sine)(&mut out, &mut phase, inc);
            for i in 0..512 {
                assert!(
                    (out[i] - reference[i]).abs() < 5e-4,
                    "{name} i={i}: {} vs {}",
                    out[i],
                    reference[i]
                );
            }
            // Phases are equal modulo one cycle.
            let dp = reduce_phase(phase - ref_phase);
            assert!(dp.abs() < 1e-3, "{name} phase {} vs {}", phase, ref_phase);
        }
    }

    #[test]
    fn sine_tracks_true_sine() {
        // 7th-order Taylor: worst error sits near ±π, well under a tenth.
        let inc = 0.11;
        for (name, k) in backends() {
            let mut out = vec![0.0f32; 400];
            let mut phase = 0.0;
            (k.sine)(&mut out, &mut phase, inc);
            for (i, &y) in out.iter().enumerate() {
                let truth = (i as f32 * inc).sin();
                assert!(
                    (y - truth).abs() < 0.08,
                    "{name} i={i}: {} vs {}",
                    y,
                    truth
                );
            }
        }
    }

    #[test]
    fn sine_is_phase_continuous_across_calls() {
        let inc = TAU * 220.0 / 44_100.0;
        for (name, k) in backends() {
            let mut whole = vec![0.0f32; 96];
            let mut p_whole = 1.0;
            (k.sine)(&mut whole, &mut p_whole, inc);

            let mut split = vec![0.0f32; 96];
            let mut p_split = 1.0;
            let (a, b) = split.split_at_mut(13);
            (k.sine)(a, &mut p_split, inc);
            (k.sine)(b, &mut p_split, inc);

            for i in 0..96 {
                assert!(
                    (whole[i] - split[i]).abs() < 1e-4,
                    "{name} i={i}: {} vs {}",
                    whole[i],
                    split[i]
                );
            }
            assert!((reduce_phase(p_whole - p_split)).abs() < 1e-4, "{name}");
        }
    }

    #[test]
    fn sine_phase_stays_bounded() {
        let k = Kernels::detect();
        let mut out = vec![0.0f32; 480];
        let mut phase = 0.0;
        for _ in 0..200 {
            (k.sine)(&mut out, &mut phase, 0.9);
            assert!(phase.abs() <= TAU + 1e-3, "phase={}", phase);
        }
    }

    #[test]
    fn empty_slices_are_no_ops() {
        for (_, k) in backends() {
            let mut phase = 0.25;
            (k.sine)(&mut [], &mut phase, 0.1);
            assert_eq!(phase, 0.25);
            (k.mix)(&mut [], &[], 1.0);
        }
    }
}
