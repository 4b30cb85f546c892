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
use std::collections::HashSet;

use serde::Deserialize;

use super::{audio::Audio, channel::Channel, error::ConfigError, midi::Midi};
use crate::{model, sequencer::SequencerSettings};

const DEFAULT_MIDI_QUEUE_SIZE: usize = 128;
const DEFAULT_RENDER_QUEUE_SIZE: usize = 16;
const DEFAULT_BPM: f32 = 120.0;
const DEFAULT_BEATS: u32 = 4;
const DEFAULT_BARS: u32 = 1;

/// The configuration for the engine.
#[derive(Deserialize, Clone, Default)]
pub struct EngineConfig {
    audio: Option<Audio>,
    behaviors: Option<Behaviors>,
    queues: Option<Queues>,
    sequencer: Option<Sequencer>,
    midi: Option<Midi>,
    channels: Option<Vec<Channel>>,
}

impl EngineConfig {
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    pub fn behaviors(&self) -> Behaviors {
        self.behaviors.clone().unwrap_or_default()
    }

    pub fn queues(&self) -> Queues {
        self.queues.clone().unwrap_or_default()
    }

    pub fn sequencer(&self) -> Sequencer {
        self.sequencer.clone().unwrap_or_default()
    }

    pub fn midi(&self) -> Midi {
        self.midi.clone().unwrap_or_default()
    }

    pub fn channels(&self) -> &[Channel] {
        self.channels.as_deref().unwrap_or(&[])
    }

    /// Checks what deserialization cannot: sizes and references between
    /// channels.
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.audio().buffer_size() == 0 {
            return Err(ConfigError::Invalid("buffer_size must be positive".into()));
        }
        if self.audio().channels() == 0 {
            return Err(ConfigError::Invalid("channels must be positive".into()));
        }
        if self.queues().midi_queue_size() == 0 || self.queues().render_queue_size() == 0 {
            return Err(ConfigError::Invalid("queue sizes must be positive".into()));
        }
        if self.sequencer().bpm() <= 0.0 {
            return Err(ConfigError::Invalid("bpm must be positive".into()));
        }

        let mut names = HashSet::new();
        for channel in self.channels() {
            if !names.insert(channel.name()) {
                return Err(ConfigError::Invalid(format!(
                    "channel name {} is used twice",
                    channel.name()
                )));
            }
        }
        for channel in self.channels() {
            channel.validate(self.channels())?;
        }
        self.midi().validate()
    }
}

/// Engine-wide channel behaviors.
#[derive(Deserialize, Clone, Default)]
pub struct Behaviors {
    treat_recs_as_loops: Option<bool>,
    chans_stop_on_seq_halt: Option<bool>,
}

impl Behaviors {
    pub fn treat_recs_as_loops(&self) -> bool {
        self.treat_recs_as_loops.unwrap_or(false)
    }

    pub fn chans_stop_on_seq_halt(&self) -> bool {
        self.chans_stop_on_seq_halt.unwrap_or(false)
    }

    pub fn to_behaviors(&self) -> model::Behaviors {
        model::Behaviors {
            treat_recs_as_loops: self.treat_recs_as_loops(),
            chans_stop_on_seq_halt: self.chans_stop_on_seq_halt(),
        }
    }
}

/// Capacities of the per-channel queues.
#[derive(Deserialize, Clone, Default)]
pub struct Queues {
    midi_queue_size: Option<usize>,
    render_queue_size: Option<usize>,
}

impl Queues {
    pub fn midi_queue_size(&self) -> usize {
        self.midi_queue_size.unwrap_or(DEFAULT_MIDI_QUEUE_SIZE)
    }

    pub fn render_queue_size(&self) -> usize {
        self.render_queue_size.unwrap_or(DEFAULT_RENDER_QUEUE_SIZE)
    }
}

/// Tempo and grid at startup.
#[derive(Deserialize, Clone, Default)]
pub struct Sequencer {
    bpm: Option<f32>,
    beats: Option<u32>,
    bars: Option<u32>,
    quantize: Option<u32>,
    metronome: Option<bool>,
}

impl Sequencer {
    pub fn bpm(&self) -> f32 {
        self.bpm.unwrap_or(DEFAULT_BPM)
    }

    pub fn beats(&self) -> u32 {
        self.beats.unwrap_or(DEFAULT_BEATS)
    }

    pub fn bars(&self) -> u32 {
        self.bars.unwrap_or(DEFAULT_BARS)
    }

    pub fn quantize(&self) -> u32 {
        self.quantize.unwrap_or(0)
    }

    pub fn metronome(&self) -> bool {
        self.metronome.unwrap_or(false)
    }

    pub fn to_settings(&self) -> SequencerSettings {
        SequencerSettings {
            bpm: self.bpm(),
            beats: self.beats(),
            bars: self.bars(),
            quantize: self.quantize(),
            metronome: self.metronome(),
        }
    }
}
