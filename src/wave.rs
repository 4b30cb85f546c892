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
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{audio::buffer::AudioBuffer, Frame, Id};

pub mod loader;

#[derive(Debug, thiserror::Error)]
pub enum WaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV decoding error: {0}")]
    Decode(#[from] hound::Error),

    #[error("unsupported WAV format: {0}")]
    Unsupported(String),

    #[error("{0} contains no audio")]
    Empty(PathBuf),

    #[error("resampler construction failed: {0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),

    #[error("sample rate conversion failed: {0}")]
    Resample(#[from] rubato::ResampleError),
}

/// Decoded audio, ready to be played by a sample channel.
pub struct Wave {
    id: Id,
    buffer: AudioBuffer,
    rate: u32,
    path: PathBuf,
}

impl Wave {
    pub fn new(id: Id, buffer: AudioBuffer, rate: u32, path: &Path) -> Wave {
        Wave {
            id,
            buffer,
            rate,
            path: path.to_path_buf(),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> Frame {
        self.buffer.count_frames()
    }

    pub fn channels(&self) -> usize {
        self.buffer.count_channels()
    }

    pub fn duration(&self) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.rate as f64)
    }
}

impl fmt::Debug for Wave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wave")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("rate", &self.rate)
            .field("frames", &self.frames())
            .field("channels", &self.channels())
            .finish()
    }
}
