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
use serde::Deserialize;

use crate::{resampler::ResamplerQuality, Frame};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BUFFER_SIZE: Frame = 512;
const DEFAULT_CHANNELS: u16 = 2;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Audio {
    /// The output device. The host default when unset.
    device: Option<String>,

    /// Sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames rendered per block (default: 512).
    buffer_size: Option<Frame>,

    /// Output channels (default: 2).
    channels: Option<u16>,

    /// Hard limit the output to [-1.0, 1.0].
    limit_output: Option<bool>,

    /// Mix the hardware input into the output.
    input_to_output: Option<bool>,

    /// Mix input takes onto armed channels that already hold a wave.
    input_rec_overdub: Option<bool>,

    /// Quality of the pitch shifter (default: sinc_fastest).
    resampler_quality: Option<ResamplerQuality>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn buffer_size(&self) -> Frame {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn limit_output(&self) -> bool {
        self.limit_output.unwrap_or(false)
    }

    pub fn input_to_output(&self) -> bool {
        self.input_to_output.unwrap_or(false)
    }

    pub fn input_rec_overdub(&self) -> bool {
        self.input_rec_overdub.unwrap_or(false)
    }

    pub fn resampler_quality(&self) -> ResamplerQuality {
        self.resampler_quality.unwrap_or_default()
    }
}
