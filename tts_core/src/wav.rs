//! WAV helpers shared by the conditioner and the silence check.

use std::path::Path;

use anyhow::Context;

/// Decoded WAV contents, samples interleaved and scaled to [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Read sample rate and channel count without decoding the data chunk.
pub fn probe<P: AsRef<Path>>(path: P) -> anyhow::Result<(u32, u16)> {
    let reader = hound::WavReader::open(path.as_ref())
        .with_context(|| format!("Failed to open WAV: {}", path.as_ref().display()))?;
    let spec = reader.spec();
    Ok((spec.sample_rate, spec.channels))
}

pub fn read<P: AsRef<Path>>(path: P) -> anyhow::Result<PcmAudio> {
    let reader = hound::WavReader::open(path.as_ref())
        .with_context(|| format!("Failed to open WAV: {}", path.as_ref().display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?
        }
    };

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Write interleaved f32 samples as 16-bit PCM.
pub fn write_pcm16<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)
        .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;

    const I16_MAX_F32: f32 = i16::MAX as f32;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
        writer
            .write_sample(v)
            .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
    }
    writer
        .finalize()
        .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    Ok(())
}

/// Average interleaved channels into one.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let n = channels as usize;
    samples
        .chunks_exact(n)
        .map(|frame| frame.iter().sum::<f32>() / n as f32)
        .collect()
}

/// Linear-interpolation resampler for mono audio.
pub fn resample_linear(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() || src_rate == 0 {
        return input.to_vec();
    }

    let output_len = (input.len() as u64 * dst_rate as u64).div_ceil(src_rate as u64) as usize;
    let inv_ratio = src_rate as f64 / dst_rate as f64;

    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src_pos = i as f64 * inv_ratio;
        let idx = src_pos as usize;
        match (input.get(idx), input.get(idx + 1)) {
            (Some(&a), Some(&b)) => {
                let frac = (src_pos - idx as f64) as f32;
                output.push(a + (b - a) * frac);
            }
            _ => output.push(input.last().copied().unwrap_or(0.0)),
        }
    }
    output
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// RMS of the whole file, all channels together.
pub fn file_rms<P: AsRef<Path>>(path: P) -> anyhow::Result<f32> {
    Ok(rms(&read(path)?.samples))
}
