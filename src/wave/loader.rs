// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! WAV file loading. Waves are decoded entirely into memory, converted to
//! float and to the engine's channel count and sample rate.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use super::{Wave, WaveError};
use crate::{
    audio::buffer::AudioBuffer,
    resampler::{Kernel, ResamplerQuality},
    Id,
};

/// Input block size for sample rate conversion.
const TRANSCODE_BLOCK_FRAMES: usize = 1024;

/// Reads a WAV file into a wave with `channels` channels at `sample_rate`.
/// Files at another rate are converted with a resampler of the given quality.
pub fn load(
    id: Id,
    path: &Path,
    sample_rate: u32,
    channels: usize,
    quality: ResamplerQuality,
) -> Result<Wave, WaveError> {
    info!(path = ?path, "Loading wave");

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(WaveError::Unsupported("zero channels".to_string()));
    }

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(WaveError::Unsupported(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    let source_channels = spec.channels as usize;
    let mut decoded = AudioBuffer::from_interleaved(samples, source_channels);
    if decoded.count_frames() == 0 {
        return Err(WaveError::Empty(path.to_path_buf()));
    }
    if spec.sample_rate != sample_rate {
        debug!(
            source_rate = spec.sample_rate,
            target_rate = sample_rate,
            quality = ?quality,
            "Transcoding wave"
        );
        decoded = transcode(&decoded, spec.sample_rate, sample_rate, quality)?;
    }

    let mut buffer = AudioBuffer::new(decoded.count_frames(), channels);
    buffer.copy_from(&decoded, decoded.count_frames(), 0, 0);

    let wave = Wave::new(id, buffer, sample_rate, path);
    info!(
        path = ?path,
        source_channels,
        frames = wave.frames(),
        duration_ms = wave.duration().as_millis(),
        "Wave loaded"
    );
    Ok(wave)
}

/// Converts a whole buffer between sample rates. The resampler delay is cut
/// from the head, so frame `n` of the source lands at `n * ratio`.
fn transcode(
    source: &AudioBuffer,
    source_rate: u32,
    target_rate: u32,
    quality: ResamplerQuality,
) -> Result<AudioBuffer, WaveError> {
    let channels = source.count_channels();
    let frames = source.count_frames();
    let ratio = target_rate as f64 / source_rate as f64;
    let target_frames = (frames as f64 * ratio).ceil() as usize;

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|c| (0..frames).map(|i| source.frame(i)[c]).collect())
        .collect();

    let mut kernel = Kernel::new(quality, ratio, 1.0, TRANSCODE_BLOCK_FRAMES, channels)?;
    let delay = kernel.output_delay();
    let mut scratch = kernel.output_buffer_allocate();
    let mut output = vec![Vec::with_capacity(target_frames + delay + scratch[0].len()); channels];

    let mut position = 0;
    while output[0].len() < target_frames + delay {
        let needed = kernel.input_frames_next();
        let (_, written) = if position + needed <= frames {
            let block: Vec<&[f32]> = planar
                .iter()
                .map(|channel| &channel[position..position + needed])
                .collect();
            kernel.process_into_buffer(&block, &mut scratch)?
        } else if position < frames {
            let tail: Vec<&[f32]> = planar.iter().map(|channel| &channel[position..]).collect();
            kernel.process_partial_into_buffer(Some(&tail), &mut scratch)?
        } else {
            kernel.process_partial_into_buffer(None::<&[&[f32]]>, &mut scratch)?
        };
        position = (position + needed).min(frames);
        if written == 0 {
            break;
        }
        for (channel, block) in output.iter_mut().zip(&scratch) {
            channel.extend_from_slice(&block[..written]);
        }
    }

    let mut interleaved = Vec::with_capacity(target_frames * channels);
    for frame in delay..delay + target_frames {
        interleaved.extend(
            output
                .iter()
                .map(|channel| channel.get(frame).copied().unwrap_or(0.0)),
        );
    }
    Ok(AudioBuffer::from_interleaved(interleaved, channels))
}
