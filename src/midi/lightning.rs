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
//! Controller feedback. Channel status, mute and solo changes are sent to
//! the MIDI output as messages taken from a midi map, with the note or
//! controller the channel learnt filled in.

use serde::Deserialize;

use super::{
    event::{MidiEvent, MidiEventError},
    Output,
};
use crate::channel::ChannelStatus;

/// Which data byte of a map message carries the learnt note.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LearntSlot {
    #[default]
    Data1,
    Data2,
}

/// A channel voice message from the midi map.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightMessage {
    /// MIDI channel, 0-15.
    pub channel: u8,
    /// Status byte, e.g. 0x90 for note-on. The low nibble is ignored.
    pub status: u8,
    #[serde(default)]
    pub data1: u8,
    #[serde(default)]
    pub data2: u8,
    #[serde(default)]
    pub learnt: LearntSlot,
}

impl LightMessage {
    /// Builds the event with `learnt` in the learnt slot.
    pub fn to_event(&self, learnt: u8) -> Result<MidiEvent, MidiEventError> {
        let (data1, data2) = match self.learnt {
            LearntSlot::Data1 => (learnt, self.data2),
            LearntSlot::Data2 => (self.data1, learnt),
        };
        MidiEvent::parse(&[
            (self.status & 0xF0) | (self.channel & 0x0F),
            data1 & 0x7F,
            data2 & 0x7F,
        ])
    }
}

/// The messages a controller understands, one per light state. Unset
/// states send nothing.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiMap {
    pub stopped: Option<LightMessage>,
    pub waiting: Option<LightMessage>,
    pub stopping: Option<LightMessage>,
    pub playing: Option<LightMessage>,
    pub playing_inaudible: Option<LightMessage>,
    pub mute_on: Option<LightMessage>,
    pub mute_off: Option<LightMessage>,
    pub solo_on: Option<LightMessage>,
    pub solo_off: Option<LightMessage>,
}

impl MidiMap {
    pub fn status(&self, status: ChannelStatus, audible: bool) -> Option<&LightMessage> {
        match status {
            ChannelStatus::Off => self.stopped.as_ref(),
            ChannelStatus::Wait => self.waiting.as_ref(),
            ChannelStatus::Ending => self.stopping.as_ref(),
            ChannelStatus::Play if audible => self.playing.as_ref(),
            ChannelStatus::Play => self.playing_inaudible.as_ref(),
            ChannelStatus::Empty => None,
        }
    }

    pub fn mute(&self, mute: bool) -> Option<&LightMessage> {
        if mute {
            self.mute_on.as_ref()
        } else {
            self.mute_off.as_ref()
        }
    }

    pub fn solo(&self, solo: bool) -> Option<&LightMessage> {
        if solo {
            self.solo_on.as_ref()
        } else {
            self.solo_off.as_ref()
        }
    }

    /// Every message that is set.
    pub fn messages(&self) -> impl Iterator<Item = &LightMessage> {
        [
            &self.stopped,
            &self.waiting,
            &self.stopping,
            &self.playing,
            &self.playing_inaudible,
            &self.mute_on,
            &self.mute_off,
            &self.solo_on,
            &self.solo_off,
        ]
        .into_iter()
        .flatten()
    }
}

/// The notes or controllers a channel learnt for its lights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiLightning {
    pub enabled: bool,
    pub playing: Option<u8>,
    pub mute: Option<u8>,
    pub solo: Option<u8>,
}

/// Identifies a status light so repeated states are sent only once.
pub fn status_code(status: ChannelStatus, audible: bool) -> usize {
    ((status as usize) << 1) | usize::from(audible)
}

pub fn send_status(
    map: &MidiMap,
    lightning: &MidiLightning,
    status: ChannelStatus,
    audible: bool,
    output: &dyn Output,
) {
    send(map.status(status, audible), lightning.playing, lightning, output);
}

pub fn send_mute(map: &MidiMap, lightning: &MidiLightning, mute: bool, output: &dyn Output) {
    send(map.mute(mute), lightning.mute, lightning, output);
}

pub fn send_solo(map: &MidiMap, lightning: &MidiLightning, solo: bool, output: &dyn Output) {
    send(map.solo(solo), lightning.solo, lightning, output);
}

fn send(
    message: Option<&LightMessage>,
    learnt: Option<u8>,
    lightning: &MidiLightning,
    output: &dyn Output,
) {
    if !lightning.enabled {
        return;
    }
    let (Some(message), Some(learnt)) = (message, learnt) else {
        return;
    };
    // Map messages are checked when the configuration loads.
    if let Ok(event) = message.to_event(learnt) {
        output.send(event);
    }
}
