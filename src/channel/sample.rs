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
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    resampler::{MAX_PITCH, MIN_PITCH},
    wave::Wave,
    Frame,
};

/// How a sample channel reacts to key presses and to the end of its wave.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SamplePlayerMode {
    /// Plays once, a second press stops.
    #[default]
    SingleBasic,
    /// Plays once, a second press pauses and the next one resumes.
    SingleBasicPause,
    /// Plays while the key is held.
    SinglePress,
    /// A second press restarts from the beginning.
    SingleRetrig,
    /// Loops until pressed again, then finishes the current pass.
    SingleEndless,
    /// Starts on the next first beat and loops.
    LoopBasic,
    /// Plays one pass per loop, waiting for the next first beat.
    LoopOnce,
    /// Like `LoopOnce`, but can also start on a bar.
    LoopOnceBar,
    /// Loops and restarts on every bar.
    LoopRepeat,
}

impl SamplePlayerMode {
    /// Loop modes follow the sequencer. Single modes react immediately.
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            SamplePlayerMode::LoopBasic
                | SamplePlayerMode::LoopOnce
                | SamplePlayerMode::LoopOnceBar
                | SamplePlayerMode::LoopRepeat
        )
    }
}

/// Playback settings of a sample channel. Copied on every document swap, so
/// the wave itself is shared.
#[derive(Clone, Debug)]
pub struct SampleChannel {
    pub wave: Option<Arc<Wave>>,
    pub mode: SamplePlayerMode,
    /// First frame of the playback range.
    pub begin: Frame,
    /// One past the last frame of the playback range.
    pub end: Frame,
    pub pitch: f32,
    /// Take the gain of each press from its velocity.
    pub velocity_as_vol: bool,
    /// Pass live input through while armed.
    pub input_monitor: bool,
    pub has_actions: bool,
}

impl SampleChannel {
    pub fn new(mode: SamplePlayerMode) -> SampleChannel {
        SampleChannel {
            wave: None,
            mode,
            begin: 0,
            end: 0,
            pitch: 1.0,
            velocity_as_vol: false,
            input_monitor: false,
            has_actions: false,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.mode.is_loop()
    }

    pub fn has_wave(&self) -> bool {
        self.wave.is_some()
    }

    /// Replaces the wave and resets the range to cover all of it.
    pub fn set_wave(&mut self, wave: Option<Arc<Wave>>) {
        self.begin = 0;
        self.end = wave.as_ref().map(|wave| wave.frames()).unwrap_or(0);
        self.wave = wave;
    }

    /// Sets the playback range, clamped to the wave.
    pub fn set_range(&mut self, begin: Frame, end: Frame) {
        let frames = self.wave.as_ref().map(|wave| wave.frames()).unwrap_or(0);
        self.end = end.min(frames);
        self.begin = begin.min(self.end);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_wave;

    #[test]
    fn test_loop_modes() {
        assert!(SamplePlayerMode::LoopOnceBar.is_loop());
        assert!(SamplePlayerMode::LoopRepeat.is_loop());
        assert!(!SamplePlayerMode::SingleEndless.is_loop());
        assert!(!SamplePlayerMode::SinglePress.is_loop());
    }

    #[test]
    fn test_range_is_clamped() {
        let mut sample = SampleChannel::new(SamplePlayerMode::SingleBasic);
        sample.set_wave(Some(test_wave(1000)));
        assert_eq!((sample.begin, sample.end), (0, 1000));

        sample.set_range(200, 5000);
        assert_eq!((sample.begin, sample.end), (200, 1000));

        sample.set_range(2000, 100);
        assert_eq!((sample.begin, sample.end), (100, 100));

        sample.set_wave(None);
        assert_eq!((sample.begin, sample.end), (0, 0));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut sample = SampleChannel::new(SamplePlayerMode::SingleBasic);
        sample.set_pitch(10.0);
        assert_eq!(sample.pitch, MAX_PITCH);
        sample.set_pitch(0.0);
        assert_eq!(sample.pitch, MIN_PITCH);
    }
}
