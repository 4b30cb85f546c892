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
use crate::{audio::buffer::AudioBuffer, resampler::Resampler, wave::Wave, Frame};

/// Frames consumed from the wave and frames written to the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadResult {
    pub used: Frame,
    pub generated: Frame,
}

/// Reads wave frames in `[start, max)` into `dest` from `offset` on. Unity
/// pitch is a plain copy, anything else goes through the resampler.
pub fn read_wave(
    wave: &Wave,
    dest: &mut AudioBuffer,
    start: Frame,
    max: Frame,
    offset: Frame,
    pitch: f32,
    resampler: Option<&mut Resampler>,
) -> ReadResult {
    match resampler {
        Some(resampler) if pitch != 1.0 => {
            let (used, generated) =
                resampler.process(wave.buffer(), start, max, dest, offset, pitch);
            ReadResult { used, generated }
        }
        _ => read_copy(wave, dest, start, max, offset),
    }
}

fn read_copy(
    wave: &Wave,
    dest: &mut AudioBuffer,
    start: Frame,
    max: Frame,
    offset: Frame,
) -> ReadResult {
    let frames = dest
        .count_frames()
        .saturating_sub(offset)
        .min(max.saturating_sub(start));
    let copied = dest.copy_from(wave.buffer(), frames, start, offset);
    ReadResult {
        used: copied,
        generated: copied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resampler::ResamplerQuality,
        testutil::test_wave,
    };

    #[test]
    fn test_unity_pitch_is_exact() {
        let wave = test_wave(300);
        let mut dest = AudioBuffer::new(100, 2);
        let mut all = Vec::new();
        let mut tracker = 0;
        while tracker < wave.frames() {
            dest.clear();
            let result = read_wave(&wave, &mut dest, tracker, wave.frames(), 0, 1.0, None);
            assert_eq!(result.used, result.generated);
            all.extend_from_slice(&dest.as_slice()[..result.generated * 2]);
            tracker += result.used;
        }
        assert_eq!(all, wave.buffer().as_slice());
    }

    #[test]
    fn test_copy_stops_at_range_end() {
        let wave = test_wave(300);
        let mut dest = AudioBuffer::new(100, 2);
        let result = read_wave(&wave, &mut dest, 250, 280, 10, 1.0, None);
        assert_eq!(
            result,
            ReadResult {
                used: 30,
                generated: 30
            }
        );
        assert_eq!(dest.frame(10), wave.buffer().frame(250));
        assert_eq!(dest.frame(40), &[0.0, 0.0]);
    }

    #[test]
    fn test_pitched_read_uses_resampler() -> Result<(), crate::error::EngineError> {
        let wave = test_wave(4000);
        let mut resampler = Resampler::new(ResamplerQuality::Linear, 2)?;
        let mut dest = AudioBuffer::new(256, 2);
        let result = read_wave(&wave, &mut dest, 0, 4000, 0, 2.0, Some(&mut resampler));
        assert_eq!(result.generated, 256);
        assert!(result.used > result.generated);
        Ok(())
    }
}
