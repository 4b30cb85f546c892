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

use super::error::ConfigError;
use crate::{
    channel::{MidiInputMapping, SamplePlayerMode},
    midi::lightning::MidiLightning,
    Frame,
};

/// The kinds of channel a configuration can declare.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Sample,
    Midi,
    Group,
}

/// A channel declared in the configuration.
#[derive(Deserialize, Clone)]
pub struct Channel {
    #[serde(rename = "type")]
    channel_type: ChannelType,
    name: String,

    /// Sample channels: player mode (default: single_basic).
    mode: Option<SamplePlayerMode>,
    /// Sample channels: WAV file, relative to the configuration file.
    wave: Option<String>,
    /// Sample channels: playback range in frames.
    begin: Option<Frame>,
    end: Option<Frame>,
    pitch: Option<f32>,
    velocity_as_vol: Option<bool>,
    input_monitor: Option<bool>,
    armed: Option<bool>,

    volume: Option<f32>,
    pan: Option<f32>,
    /// Name of the group channel this channel is mixed into.
    group: Option<String>,

    /// Take MIDI input. Implied when `key` is set.
    midi_in: Option<bool>,
    /// Only take MIDI input from this MIDI channel.
    midi_in_channel: Option<u8>,
    /// Note that presses a sample channel.
    key: Option<u8>,

    /// MIDI channels: outgoing MIDI channel. Output is enabled when set.
    output_channel: Option<u8>,

    /// Learnt notes for the controller lights. Lightning is on when any is
    /// set.
    light_playing: Option<u8>,
    light_mute: Option<u8>,
    light_solo: Option<u8>,
}

impl Channel {
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> SamplePlayerMode {
        self.mode.unwrap_or_default()
    }

    pub fn wave(&self) -> Option<&str> {
        self.wave.as_deref()
    }

    /// The playback range, if one was given.
    pub fn range(&self) -> Option<(Frame, Frame)> {
        match (self.begin, self.end) {
            (None, None) => None,
            (begin, end) => Some((begin.unwrap_or(0), end.unwrap_or(Frame::MAX))),
        }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.unwrap_or(1.0)
    }

    pub fn velocity_as_vol(&self) -> bool {
        self.velocity_as_vol.unwrap_or(false)
    }

    pub fn input_monitor(&self) -> bool {
        self.input_monitor.unwrap_or(false)
    }

    pub fn armed(&self) -> bool {
        self.armed.unwrap_or(false)
    }

    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(1.0)
    }

    pub fn pan(&self) -> f32 {
        self.pan.unwrap_or(0.5)
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn midi_input_mapping(&self) -> MidiInputMapping {
        MidiInputMapping {
            enabled: self.midi_in.unwrap_or(self.key.is_some()),
            filter: self.midi_in_channel,
            key: self.key,
        }
    }

    pub fn output_channel(&self) -> Option<u8> {
        self.output_channel
    }

    pub fn midi_lightning(&self) -> MidiLightning {
        MidiLightning {
            enabled: self.light_playing.is_some()
                || self.light_mute.is_some()
                || self.light_solo.is_some(),
            playing: self.light_playing,
            mute: self.light_mute,
            solo: self.light_solo,
        }
    }

    pub(super) fn validate(&self, channels: &[Channel]) -> Result<(), ConfigError> {
        if let Some(group) = self.group() {
            let is_group = channels
                .iter()
                .any(|c| c.name == group && c.channel_type == ChannelType::Group);
            if !is_group {
                return Err(ConfigError::Invalid(format!(
                    "channel {} refers to unknown group {}",
                    self.name, group
                )));
            }
            if self.channel_type == ChannelType::Group {
                return Err(ConfigError::Invalid(format!(
                    "group {} cannot be nested",
                    self.name
                )));
            }
        }
        if self.midi_in_channel.is_some_and(|c| c > 15)
            || self.output_channel.is_some_and(|c| c > 15)
        {
            return Err(ConfigError::Invalid(format!(
                "channel {} uses a MIDI channel above 15",
                self.name
            )));
        }
        if self.key.is_some_and(|key| key > 127) {
            return Err(ConfigError::Invalid(format!(
                "channel {} uses a key above 127",
                self.name
            )));
        }
        let lights = [self.light_playing, self.light_mute, self.light_solo];
        if lights.iter().flatten().any(|note| *note > 127) {
            return Err(ConfigError::Invalid(format!(
                "channel {} uses a light note above 127",
                self.name
            )));
        }
        Ok(())
    }
}
