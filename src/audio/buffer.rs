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

use crate::Frame;

/// Left/right gains derived from a pan position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pan {
    pub left: f32,
    pub right: f32,
}

impl Pan {
    /// Unity gain on both sides.
    pub const CENTER: Pan = Pan {
        left: 1.0,
        right: 1.0,
    };

    /// Converts a pan position in [0.0, 1.0] to per-side gains. The center
    /// position leaves both sides untouched.
    pub fn from_position(position: f32) -> Pan {
        if position == 0.5 {
            return Pan::CENTER;
        }
        let position = position.clamp(0.0, 1.0);
        Pan {
            left: 1.0 - position,
            right: position,
        }
    }

    fn gain_for(&self, channel: usize) -> f32 {
        match channel {
            0 => self.left,
            1 => self.right,
            _ => 1.0,
        }
    }
}

/// Peak levels for a stereo signal.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Peak {
    pub left: f32,
    pub right: f32,
}

/// An interleaved block of f32 samples. Allocation only happens through
/// `new` and `alloc`, everything else is safe to call from the audio thread.
#[derive(Clone, Default)]
pub struct AudioBuffer {
    data: Vec<f32>,
    frames: Frame,
    channels: usize,
}

impl AudioBuffer {
    /// Creates a zeroed buffer.
    pub fn new(frames: Frame, channels: usize) -> AudioBuffer {
        AudioBuffer {
            data: vec![0.0; frames * channels],
            frames,
            channels,
        }
    }

    /// Creates a buffer from interleaved samples. Trailing samples that do not
    /// make up a whole frame are dropped.
    pub fn from_interleaved(mut data: Vec<f32>, channels: usize) -> AudioBuffer {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        data.truncate(frames * channels);
        AudioBuffer {
            data,
            frames,
            channels,
        }
    }

    /// Reallocates the buffer. Never call this from the audio thread.
    pub fn alloc(&mut self, frames: Frame, channels: usize) {
        self.data = vec![0.0; frames * channels];
        self.frames = frames;
        self.channels = channels;
    }

    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn count_frames(&self) -> Frame {
        self.frames
    }

    pub fn count_channels(&self) -> usize {
        self.channels
    }

    pub fn count_samples(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns the samples of a single frame.
    pub fn frame(&self, frame: Frame) -> &[f32] {
        let start = frame * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn frame_mut(&mut self, frame: Frame) -> &mut [f32] {
        let start = frame * self.channels;
        &mut self.data[start..start + self.channels]
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Silences every frame starting at `offset`.
    pub fn clear_from(&mut self, offset: Frame) {
        let start = (offset * self.channels).min(self.data.len());
        self.data[start..].fill(0.0);
    }

    /// Copies `frames` frames from `src`, starting at `src_offset`, into this
    /// buffer at `dest_offset`. A mono source is spread across every channel;
    /// otherwise extra source channels are ignored. Returns the number of
    /// frames actually copied.
    pub fn copy_from(
        &mut self,
        src: &AudioBuffer,
        frames: Frame,
        src_offset: Frame,
        dest_offset: Frame,
    ) -> Frame {
        let frames = frames
            .min(self.frames.saturating_sub(dest_offset))
            .min(src.frames.saturating_sub(src_offset));
        if self.channels == src.channels {
            let dest_start = dest_offset * self.channels;
            let src_start = src_offset * src.channels;
            let len = frames * self.channels;
            self.data[dest_start..dest_start + len]
                .copy_from_slice(&src.data[src_start..src_start + len]);
            return frames;
        }
        for i in 0..frames {
            let src_frame = src.frame(src_offset + i);
            let dest_frame = self.frame_mut(dest_offset + i);
            for (c, sample) in dest_frame.iter_mut().enumerate() {
                *sample = src_frame[c.min(src_frame.len() - 1)];
            }
        }
        frames
    }

    /// Overwrites this buffer with `src` scaled by `gain`.
    pub fn set(&mut self, src: &AudioBuffer, gain: f32) {
        let frames = self.frames.min(src.frames);
        for i in 0..frames {
            let src_frame = src.frame(i);
            let dest_frame = self.frame_mut(i);
            for (c, sample) in dest_frame.iter_mut().enumerate() {
                *sample = src_frame[c.min(src_frame.len() - 1)] * gain;
            }
        }
    }

    /// Adds `src` into this buffer, scaled by `gain` and panned.
    pub fn sum(&mut self, src: &AudioBuffer, gain: f32, pan: Pan) {
        let frames = self.frames.min(src.frames);
        for i in 0..frames {
            let src_frame = src.frame(i);
            let dest_frame = self.frame_mut(i);
            for (c, sample) in dest_frame.iter_mut().enumerate() {
                *sample += src_frame[c.min(src_frame.len() - 1)] * gain * pan.gain_for(c);
            }
        }
    }

    pub fn apply_gain(&mut self, gain: f32) {
        if gain == 1.0 {
            return;
        }
        self.data.iter_mut().for_each(|s| *s *= gain);
    }

    /// Hard clips every sample to [-1.0, 1.0].
    pub fn limit(&mut self) {
        self.data.iter_mut().for_each(|s| *s = s.clamp(-1.0, 1.0));
    }

    /// Absolute peak of the first two channels. Mono buffers report the same
    /// value on both sides.
    pub fn peak(&self) -> Peak {
        let mut peak = Peak::default();
        if self.channels == 0 {
            return peak;
        }
        for frame in self.data.chunks_exact(self.channels) {
            peak.left = peak.left.max(frame[0].abs());
            peak.right = peak.right.max(frame[frame.len().min(2) - 1].abs());
        }
        peak
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("frames", &self.frames)
            .field("channels", &self.channels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: usize) -> AudioBuffer {
        let data = (0..frames * channels).map(|i| i as f32).collect();
        AudioBuffer::from_interleaved(data, channels)
    }

    #[test]
    fn test_pan_positions() {
        assert_eq!(Pan::from_position(0.5), Pan::CENTER);
        assert_eq!(
            Pan::from_position(0.0),
            Pan {
                left: 1.0,
                right: 0.0
            }
        );
        assert_eq!(
            Pan::from_position(0.75),
            Pan {
                left: 0.25,
                right: 0.75
            }
        );
    }

    #[test]
    fn test_clear_from() {
        let mut buffer = ramp(4, 2);
        buffer.clear_from(2);
        assert_eq!(buffer.as_slice(), &[0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0]);

        // Offsets past the end are a no-op.
        let mut buffer = ramp(2, 2);
        buffer.clear_from(10);
        assert_eq!(buffer.as_slice(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_copy_from_mono_spreads() {
        let src = AudioBuffer::from_interleaved(vec![0.1, 0.2, 0.3], 1);
        let mut dest = AudioBuffer::new(4, 2);
        let copied = dest.copy_from(&src, 10, 1, 1);
        assert_eq!(copied, 2);
        assert_eq!(dest.as_slice(), &[0.0, 0.0, 0.2, 0.2, 0.3, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_sum_with_gain_and_pan() {
        let src = AudioBuffer::from_interleaved(vec![1.0, 1.0, 1.0, 1.0], 2);
        let mut dest = AudioBuffer::from_interleaved(vec![0.5, 0.5, 0.5, 0.5], 2);
        dest.sum(&src, 0.5, Pan::from_position(1.0));
        assert_eq!(dest.as_slice(), &[0.5, 1.0, 0.5, 1.0]);
    }

    #[test]
    fn test_limit_and_peak() {
        let mut buffer = AudioBuffer::from_interleaved(vec![1.5, -0.2, -3.0, 0.4], 2);
        assert_eq!(
            buffer.peak(),
            Peak {
                left: 3.0,
                right: 0.4
            }
        );
        buffer.limit();
        assert_eq!(buffer.as_slice(), &[1.0, -0.2, -1.0, 0.4]);
    }
}
