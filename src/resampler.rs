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
use std::fmt;

use rubato::{
    FastFixedIn, PolynomialDegree, ResampleResult, Resampler as _, ResamplerConstructionError,
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::Deserialize;

use crate::{audio::buffer::AudioBuffer, error::EngineError, Frame};

/// Input frames handed to rubato per processing call.
const CHUNK_FRAMES: usize = 256;

/// The lowest and highest playback pitch.
pub const MIN_PITCH: f32 = 0.1;
pub const MAX_PITCH: f32 = 4.0;

/// Headroom for changing the ratio at runtime. Covers 1 / MIN_PITCH.
const MAX_RELATIVE_RATIO: f64 = 12.0;

/// Resampling quality, from slowest to fastest.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerQuality {
    SincBest,
    SincMedium,
    #[default]
    SincFastest,
    Cubic,
    Linear,
}

impl ResamplerQuality {
    fn sinc_parameters(&self) -> Option<SincInterpolationParameters> {
        let (sinc_len, oversampling_factor, interpolation) = match self {
            ResamplerQuality::SincBest => (256, 256, SincInterpolationType::Cubic),
            ResamplerQuality::SincMedium => (128, 128, SincInterpolationType::Quadratic),
            ResamplerQuality::SincFastest => (64, 64, SincInterpolationType::Linear),
            ResamplerQuality::Cubic | ResamplerQuality::Linear => return None,
        };
        Some(SincInterpolationParameters {
            sinc_len,
            f_cutoff: 0.95,
            oversampling_factor,
            interpolation,
            window: WindowFunction::BlackmanHarris2,
        })
    }
}

/// The rubato resampler picked by a quality setting. Shared by live pitch
/// shifting and by sample rate conversion at load time.
pub(crate) enum Kernel {
    Sinc(SincFixedIn<f32>),
    Polynomial(FastFixedIn<f32>),
}

impl Kernel {
    pub(crate) fn new(
        quality: ResamplerQuality,
        ratio: f64,
        max_relative_ratio: f64,
        chunk_frames: usize,
        channels: usize,
    ) -> Result<Kernel, ResamplerConstructionError> {
        Ok(match quality.sinc_parameters() {
            Some(parameters) => Kernel::Sinc(SincFixedIn::new(
                ratio,
                max_relative_ratio,
                parameters,
                chunk_frames,
                channels,
            )?),
            None => {
                let degree = if quality == ResamplerQuality::Cubic {
                    PolynomialDegree::Cubic
                } else {
                    PolynomialDegree::Linear
                };
                Kernel::Polynomial(FastFixedIn::new(
                    ratio,
                    max_relative_ratio,
                    degree,
                    chunk_frames,
                    channels,
                )?)
            }
        })
    }

    pub(crate) fn process_into_buffer<Vin: AsRef<[f32]>, Vout: AsMut<[f32]>>(
        &mut self,
        input: &[Vin],
        output: &mut [Vout],
    ) -> ResampleResult<(usize, usize)> {
        match self {
            Kernel::Sinc(r) => r.process_into_buffer(input, output, None),
            Kernel::Polynomial(r) => r.process_into_buffer(input, output, None),
        }
    }

    /// Pads a short input with zeros, or pushes the delayed tail out when
    /// given no input at all. Allocates.
    pub(crate) fn process_partial_into_buffer<Vin: AsRef<[f32]>, Vout: AsMut<[f32]>>(
        &mut self,
        input: Option<&[Vin]>,
        output: &mut [Vout],
    ) -> ResampleResult<(usize, usize)> {
        match self {
            Kernel::Sinc(r) => r.process_partial_into_buffer(input, output, None),
            Kernel::Polynomial(r) => r.process_partial_into_buffer(input, output, None),
        }
    }

    pub(crate) fn input_frames_next(&self) -> usize {
        match self {
            Kernel::Sinc(r) => r.input_frames_next(),
            Kernel::Polynomial(r) => r.input_frames_next(),
        }
    }

    pub(crate) fn input_frames_max(&self) -> usize {
        match self {
            Kernel::Sinc(r) => r.input_frames_max(),
            Kernel::Polynomial(r) => r.input_frames_max(),
        }
    }

    pub(crate) fn output_buffer_allocate(&self) -> Vec<Vec<f32>> {
        match self {
            Kernel::Sinc(r) => r.output_buffer_allocate(true),
            Kernel::Polynomial(r) => r.output_buffer_allocate(true),
        }
    }

    /// Output frames between an input frame going in and its resampled
    /// counterpart coming out.
    pub(crate) fn output_delay(&self) -> usize {
        match self {
            Kernel::Sinc(r) => r.output_delay(),
            Kernel::Polynomial(r) => r.output_delay(),
        }
    }

    fn set_resample_ratio(&mut self, ratio: f64) -> ResampleResult<()> {
        match self {
            Kernel::Sinc(r) => r.set_resample_ratio(ratio, false),
            Kernel::Polynomial(r) => r.set_resample_ratio(ratio, false),
        }
    }

    fn reset(&mut self) {
        match self {
            Kernel::Sinc(r) => r.reset(),
            Kernel::Polynomial(r) => r.reset(),
        }
    }
}

/// Holds resampled frames that did not fit in the destination yet. Only
/// refilled once it is empty, so it never needs more than one rubato output
/// chunk of room.
struct PlanarOutputFifo {
    channels: Vec<Vec<f32>>,
    read_pos: usize,
    len: usize,
}

impl PlanarOutputFifo {
    fn available_frames(&self) -> usize {
        self.len - self.read_pos
    }

    fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    /// Writes up to `max_frames` frames into `dest` starting at `offset`.
    fn drain_into(&mut self, dest: &mut AudioBuffer, offset: Frame, max_frames: Frame) -> Frame {
        let to_copy = self.available_frames().min(max_frames);
        for i in 0..to_copy {
            let frame = dest.frame_mut(offset + i);
            for (c, sample) in frame.iter_mut().enumerate() {
                let source = &self.channels[c.min(self.channels.len() - 1)];
                *sample = source[self.read_pos + i];
            }
        }
        self.read_pos += to_copy;
        to_copy
    }
}

/// A stateful pitch shifter for streaming wave data. Buffers are allocated up
/// front, `process` never allocates.
pub struct Resampler {
    kernel: Kernel,
    quality: ResamplerQuality,
    pitch: f32,
    input: Vec<Vec<f32>>,
    output: PlanarOutputFifo,
}

impl Resampler {
    pub fn new(quality: ResamplerQuality, channels: usize) -> Result<Resampler, EngineError> {
        let channels = channels.max(1);
        let kernel = Kernel::new(quality, 1.0, MAX_RELATIVE_RATIO, CHUNK_FRAMES, channels)?;

        let input = vec![Vec::with_capacity(kernel.input_frames_max()); channels];
        let output = PlanarOutputFifo {
            channels: kernel.output_buffer_allocate(),
            read_pos: 0,
            len: 0,
        };

        Ok(Resampler {
            kernel,
            quality,
            pitch: 1.0,
            input,
            output,
        })
    }

    pub fn quality(&self) -> ResamplerQuality {
        self.quality
    }

    /// Resampled frames not written to a destination yet.
    pub fn buffered_frames(&self) -> Frame {
        self.output.available_frames()
    }

    /// Reads from `wave` between `start` and `max` and writes pitched audio into
    /// `dest` starting at `offset`. Returns the number of wave frames consumed
    /// and the number of destination frames produced.
    ///
    /// A wave frame counts as consumed once it went through rubato, so the
    /// last frames of a range can still sit in the output queue when `used`
    /// reaches `max`. Calling again with no frames left drains them.
    pub fn process(
        &mut self,
        wave: &AudioBuffer,
        start: Frame,
        max: Frame,
        dest: &mut AudioBuffer,
        offset: Frame,
        pitch: f32,
    ) -> (Frame, Frame) {
        self.set_pitch(pitch);

        let wanted = dest.count_frames().saturating_sub(offset);
        let max = max.min(wave.count_frames());
        let mut used = 0;
        let mut generated = 0;

        loop {
            generated += self
                .output
                .drain_into(dest, offset + generated, wanted - generated);
            if generated >= wanted {
                break;
            }

            let available = max.saturating_sub(start + used);
            if available == 0 {
                break;
            }
            let needed = self.kernel.input_frames_next();
            let take = needed.min(available);
            self.fill_input(wave, start + used, take, needed);

            match self
                .kernel
                .process_into_buffer(&self.input, &mut self.output.channels)
            {
                Ok((_, written)) => {
                    used += take;
                    self.output.read_pos = 0;
                    // Zero padding of a short final chunk is not played.
                    self.output.len = if take == needed {
                        written
                    } else {
                        written.min((take as f64 / self.pitch as f64).round() as usize)
                    };
                }
                Err(_) => break,
            }
        }

        (used, generated)
    }

    /// Drops the internal state, queued output included. Called when the
    /// read position jumps.
    pub fn last(&mut self) {
        self.kernel.reset();
        self.output.clear();
    }

    fn set_pitch(&mut self, pitch: f32) {
        let pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
        if pitch == self.pitch {
            return;
        }
        if self.kernel.set_resample_ratio(1.0 / pitch as f64).is_ok() {
            self.pitch = pitch;
        }
    }

    /// Copies `frames` wave frames into the planar input and zero pads it to
    /// `len`. The input was allocated for the largest chunk rubato asks for.
    fn fill_input(&mut self, wave: &AudioBuffer, start: Frame, frames: Frame, len: usize) {
        let wave_channels = wave.count_channels().max(1);
        for (c, channel) in self.input.iter_mut().enumerate() {
            channel.clear();
            let source = c.min(wave_channels - 1);
            channel.extend((start..start + frames).map(|i| wave.frame(i)[source]));
            channel.resize(len, 0.0);
        }
    }
}

impl fmt::Debug for Resampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resampler")
            .field("quality", &self.quality)
            .field("pitch", &self.pitch)
            .field("buffered", &self.output.available_frames())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_wave(frames: usize) -> AudioBuffer {
        AudioBuffer::from_interleaved(vec![0.5; frames * 2], 2)
    }

    /// Plays `[0, frames)` through in blocks of `block` and returns the total
    /// number of frames written.
    fn play_range(resampler: &mut Resampler, frames: usize, block: usize, pitch: f32) -> usize {
        let wave = constant_wave(frames);
        let mut dest = AudioBuffer::new(block, 2);
        let mut tracker = 0;
        let mut total = 0;
        loop {
            let (used, generated) = resampler.process(&wave, tracker, frames, &mut dest, 0, pitch);
            tracker += used;
            total += generated;
            if used == 0 && generated == 0 {
                return total;
            }
        }
    }

    #[test]
    fn test_pitch_up_consumes_more_than_it_produces() -> Result<(), EngineError> {
        let wave = constant_wave(8192);
        let mut dest = AudioBuffer::new(256, 2);
        let mut resampler = Resampler::new(ResamplerQuality::Linear, 2)?;

        let (used, generated) = resampler.process(&wave, 0, 8192, &mut dest, 0, 2.0);
        assert_eq!(generated, 256);
        assert!(used >= 512, "used {} frames", used);
        Ok(())
    }

    #[test]
    fn test_pitch_down_produces_more_than_it_consumes() -> Result<(), EngineError> {
        let wave = constant_wave(8192);
        let mut dest = AudioBuffer::new(400, 2);
        let mut resampler = Resampler::new(ResamplerQuality::Linear, 2)?;

        let (used, generated) = resampler.process(&wave, 0, 8192, &mut dest, 0, 0.5);
        assert_eq!(generated, 400);
        assert!(used < generated, "used {} frames", used);
        Ok(())
    }

    #[test]
    fn test_stops_at_range_end() -> Result<(), EngineError> {
        let wave = constant_wave(100);
        let mut dest = AudioBuffer::new(1024, 2);
        let mut resampler = Resampler::new(ResamplerQuality::SincFastest, 2)?;

        let (used, generated) = resampler.process(&wave, 0, 100, &mut dest, 0, 1.5);
        assert_eq!(used, 100);
        assert!(generated < 1024);
        Ok(())
    }

    #[test]
    fn test_range_length_follows_pitch() -> Result<(), EngineError> {
        for (quality, pitch) in [
            (ResamplerQuality::Linear, 0.5),
            (ResamplerQuality::Linear, 2.0),
            (ResamplerQuality::SincFastest, 0.5),
            (ResamplerQuality::SincFastest, 2.0),
        ] {
            let mut resampler = Resampler::new(quality, 2)?;
            let total = play_range(&mut resampler, 1000, 64, pitch);
            let expected = (1000.0 / pitch) as usize;
            assert!(
                total.abs_diff(expected) <= 4,
                "{:?} at pitch {} wrote {} frames",
                quality,
                pitch,
                total
            );
        }
        Ok(())
    }

    #[test]
    fn test_range_end_keeps_queued_frames() -> Result<(), EngineError> {
        let wave = constant_wave(1000);
        let mut dest = AudioBuffer::new(64, 2);
        let mut resampler = Resampler::new(ResamplerQuality::Linear, 2)?;

        let mut tracker = 0;
        while tracker < 1000 {
            tracker += resampler.process(&wave, tracker, 1000, &mut dest, 0, 0.5).0;
        }
        assert!(resampler.buffered_frames() > 0);

        let (used, generated) = resampler.process(&wave, 1000, 1000, &mut dest, 0, 0.5);
        assert_eq!(used, 0);
        assert!(generated > 0);
        Ok(())
    }

    #[test]
    fn test_offset_leaves_head_untouched() -> Result<(), EngineError> {
        let wave = constant_wave(4096);
        let mut dest = AudioBuffer::new(128, 2);
        let mut resampler = Resampler::new(ResamplerQuality::Linear, 2)?;

        let (_, generated) = resampler.process(&wave, 0, 4096, &mut dest, 64, 1.25);
        assert_eq!(generated, 64);
        assert!(dest.as_slice()[..128].iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn test_last_discards_buffered_output() -> Result<(), EngineError> {
        let wave = constant_wave(4096);
        let mut dest = AudioBuffer::new(10, 2);
        let mut resampler = Resampler::new(ResamplerQuality::Linear, 2)?;

        resampler.process(&wave, 0, 4096, &mut dest, 0, 0.5);
        assert!(resampler.buffered_frames() > 0);
        resampler.last();
        assert_eq!(resampler.buffered_frames(), 0);
        Ok(())
    }
}
