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
//! Recording of the hardware input into a take one loop long.

use std::fmt;

use parking_lot::Mutex;
use tracing::info;

use crate::{audio::buffer::AudioBuffer, channel::shared::WeakAtomic, Frame};

/// Holds the take while input recording runs. The audio thread writes into
/// it with `record`, control threads start and stop it.
pub struct InputRecorder {
    recording: WeakAtomic<bool>,
    take: Mutex<AudioBuffer>,
}

impl InputRecorder {
    pub fn new() -> InputRecorder {
        InputRecorder {
            recording: WeakAtomic::new(false),
            take: Mutex::new(AudioBuffer::default()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load()
    }

    /// Starts a fresh, silent take of `frames` frames. Any take in progress
    /// is dropped.
    pub fn start(&self, frames: Frame, channels: usize) {
        let take = AudioBuffer::new(frames, channels);
        let old = std::mem::replace(&mut *self.take.lock(), take);
        self.recording.store(true);
        drop(old);
        info!(frames, channels, "Input recording started.");
    }

    /// Sums `input` into the take at loop position `position`, wrapping at
    /// the end of the take. Skips the block when a control thread holds the
    /// take.
    pub(crate) fn record(&self, input: &AudioBuffer, position: Frame) {
        if !self.recording.load() {
            return;
        }
        let Some(mut take) = self.take.try_lock() else {
            return;
        };
        let len = take.count_frames();
        if len == 0 {
            return;
        }
        for i in 0..input.count_frames() {
            let src = input.frame(i);
            let dest = take.frame_mut((position + i) % len);
            for (c, sample) in dest.iter_mut().enumerate() {
                *sample += src[c.min(src.len() - 1)];
            }
        }
    }

    /// Ends recording and hands back the take, if one was running.
    pub fn stop(&self) -> Option<AudioBuffer> {
        if !self.recording.load() {
            return None;
        }
        self.recording.store(false);
        let take = std::mem::take(&mut *self.take.lock());
        info!(frames = take.count_frames(), "Input recording stopped.");
        Some(take)
    }
}

impl Default for InputRecorder {
    fn default() -> Self {
        InputRecorder::new()
    }
}

impl fmt::Debug for InputRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRecorder")
            .field("recording", &self.recording)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wraps_at_take_end() {
        let recorder = InputRecorder::new();
        let input = AudioBuffer::from_interleaved(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2);

        // Nothing happens before start.
        recorder.record(&input, 0);
        assert!(recorder.stop().is_none());

        recorder.start(4, 2);
        assert!(recorder.is_recording());
        recorder.record(&input, 2);

        let take = recorder.stop().expect("take");
        assert!(!recorder.is_recording());
        assert_eq!(take.as_slice(), &[0.5, 0.6, 0.0, 0.0, 0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_record_overdubs_passes() {
        let recorder = InputRecorder::new();
        let input = AudioBuffer::from_interleaved(vec![0.25, 0.25], 2);
        recorder.start(2, 2);
        recorder.record(&input, 1);
        recorder.record(&input, 3);
        let take = recorder.stop().expect("take");
        assert_eq!(take.frame(0), &[0.0, 0.0]);
        assert_eq!(take.frame(1), &[0.5, 0.5]);
    }

    #[test]
    fn test_mono_input_fills_every_channel() {
        let recorder = InputRecorder::new();
        let input = AudioBuffer::from_interleaved(vec![0.5], 1);
        recorder.start(1, 2);
        recorder.record(&input, 0);
        assert_eq!(recorder.stop().expect("take").as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_locked_take_skips_block() {
        let recorder = InputRecorder::new();
        let input = AudioBuffer::from_interleaved(vec![1.0, 1.0], 2);
        recorder.start(1, 2);
        {
            let _held = recorder.take.lock();
            recorder.record(&input, 0);
        }
        assert_eq!(recorder.stop().expect("take").as_slice(), &[0.0, 0.0]);
    }
}
