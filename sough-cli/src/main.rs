//! sough-cli — real-time player for the sough ambient-drone engine.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, info, warn};
use std::time::Duration;

use sough_core::dsp::{lin_to_db, one_pole_coeff_ms, Rms};
use sough_engine::DroneEngine;

// One render pass per chunk; sized so frames * channels fits for anything
// up to 8 channels without heap allocation in the callback.
const CHUNK_SAMPLES: usize = 2048;

#[derive(Debug, Parser)]
#[command(name = "sough", about = "Real-time ambient-drone player", version)]
struct Args {
    /// List available output devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Output device name (exact match); defaults to the system device.
    #[arg(long)]
    device: Option<String>,

    /// Requested sample rate in Hz.
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Requested channel count.
    #[arg(long)]
    channels: Option<u16>,

    /// Stop after this many seconds; otherwise play until Ctrl+C.
    #[arg(long)]
    duration: Option<u64>,

    /// Post-chain gain (unsmoothed master trim).
    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    /// Base low-pass cutoff in Hz.
    #[arg(long, default_value_t = 900.0)]
    cut_base: f32,

    /// Cutoff modulation span in Hz.
    #[arg(long, default_value_t = 600.0)]
    cut_span: f32,

    /// Saturation drive (clamped to 0.1..=5.0).
    #[arg(long, default_value_t = 0.9)]
    drive: f32,

    /// Companion-voice detune in cents (clamped to 0..=25).
    #[arg(long, default_value_t = 6.0)]
    detune: f32,

    /// Scene output gain (smoothed).
    #[arg(long, default_value_t = 0.33)]
    out_gain: f32,
}

fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn pick_device(requested: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = requested {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        bail!("requested device not found: {name}");
    }
    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device"))
}

/// Pick the supported config range closest to the request. Sample-rate
/// distance dominates; channel-count distance breaks ties.
fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = match req_ch {
            Some(c) => (i64::from(ch) - i64::from(c)).unsigned_abs(),
            None => 0,
        };
        let sr_pen = match req_sr {
            Some(sr) if (sr_min..=sr_max).contains(&sr) => 0,
            Some(sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            None => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;

    let pick_sr = match req_sr {
        Some(sr) => {
            let lo = range.min_sample_rate().0;
            let hi = range.max_sample_rate().0;
            cpal::SampleRate(sr.clamp(lo, hi))
        }
        None => range.max_sample_rate(),
    };

    Ok(range.with_sample_rate(pick_sr))
}

fn apply_scene(engine: &mut DroneEngine, args: &Args) {
    engine.set_gain(args.gain);
    engine.set_cut_base_hz(args.cut_base);
    engine.set_cut_span_hz(args.cut_span);
    engine.set_drive(args.drive);
    engine.set_detune_cents(args.detune);
    engine.set_out_gain(args.out_gain);
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut engine: DroneEngine,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let sr = cfg.sample_rate.0.max(1) as f32;
    let channels = cfg.channels as usize;
    let chunk_frames = (CHUNK_SAMPLES / channels.max(1)).max(1);

    // ~300 ms RMS level, reported roughly once per second.
    let mut meter = Rms::new(one_pole_coeff_ms(300.0, sr));
    let mut meter_level = 0.0f32;
    let meter_interval = sr as usize;
    let mut meter_count = 0usize;

    let mut chunk = [0.0f32; CHUNK_SAMPLES];

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            for block in output.chunks_mut(chunk_frames * channels) {
                let frames = (block.len() / channels) as u32;
                let need = frames as usize * channels;
                let wrote = engine.render_interleaved(&mut chunk[..need], frames, channels as u32);
                if wrote == 0 {
                    // Render contract leaves the buffer untouched; ship silence.
                    chunk[..need].fill(0.0);
                }

                for (dst, &s) in block.iter_mut().zip(&chunk[..need]) {
                    *dst = T::from_sample(s);
                }

                // Meter on channel 0 only; all channels carry the same sample.
                for frame in chunk[..need].chunks_exact(channels) {
                    meter_level = meter.tick(frame[0]);
                }
                meter_count += frames as usize;
                if meter_count >= meter_interval {
                    info!("level ~ {:.1} dBFS", lin_to_db(meter_level.max(1e-9)));
                    meter_count = 0;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        return list_output_devices();
    }

    let device = pick_device(args.device.as_deref())?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)
        .context("no usable output config")?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();

    if let Some(sr) = args.sample_rate {
        cfg.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(ch) = args.channels {
        cfg.channels = ch;
    }

    let sr = cfg.sample_rate.0 as f32;
    let mut engine = DroneEngine::new(sr).map_err(|e| anyhow!("engine init at {sr} Hz: {e}"))?;
    apply_scene(&mut engine, &args);

    let (mix_name, sine_name) = engine.kernels().names();
    info!("device: {}", device.name()?);
    info!(
        "stream: {} Hz, {} ch, {:?}",
        cfg.sample_rate.0, cfg.channels, sample_format
    );
    info!("kernels: mix={mix_name} sine={sine_name}");
    debug!(
        "scene: cut_base={} cut_span={} drive={} detune={} out_gain={} gain={}",
        args.cut_base, args.cut_span, args.drive, args.detune, args.out_gain, args.gain
    );

    let err_fn = |e: cpal::StreamError| warn!("stream error: {e}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, engine, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, engine, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, engine, err_fn)?,
        other => bail!("unsupported device sample format: {other:?}"),
    };

    stream.play()?;
    info!("playing; Ctrl+C to stop");

    if let Some(d) = args.duration {
        std::thread::sleep(Duration::from_secs(d));
        return Ok(());
    }

    loop {
        std::thread::sleep(Duration::from_millis(500));
    }
}
