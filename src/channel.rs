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
use std::{fmt, sync::Arc};

use crate::{audio::buffer::Pan, midi::lightning::MidiLightning, plugin::PluginRef, Id};

pub mod midi;
pub mod sample;
pub mod shared;

pub use midi::MidiChannel;
pub use sample::{SampleChannel, SamplePlayerMode};
pub use shared::{ChannelShared, ChannelStatus, RenderCommand, RenderMode};

/// Channel ids reserved for the internal channels.
pub const MASTER_OUT_CHANNEL_ID: Id = 1;
pub const MASTER_IN_CHANNEL_ID: Id = 2;
pub const PREVIEW_CHANNEL_ID: Id = 3;

/// The first id handed out to user channels.
pub const FIRST_USER_CHANNEL_ID: Id = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
    MasterOut,
    MasterIn,
    Preview,
    Group,
    Sample,
    Midi,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelType::MasterOut => "master out",
            ChannelType::MasterIn => "master in",
            ChannelType::Preview => "preview",
            ChannelType::Group => "group",
            ChannelType::Sample => "sample",
            ChannelType::Midi => "MIDI",
        };
        write!(f, "{}", name)
    }
}

/// Type-specific channel data.
#[derive(Clone, Debug)]
pub enum ChannelKind {
    MasterOut,
    MasterIn,
    Preview(SampleChannel),
    Group,
    Sample(SampleChannel),
    Midi(MidiChannel),
}

/// Maps incoming MIDI to a channel.
#[derive(Clone, Debug, Default)]
pub struct MidiInputMapping {
    pub enabled: bool,
    /// Only accept this MIDI channel. None accepts all of them.
    pub filter: Option<u8>,
    /// Note that presses a sample channel.
    pub key: Option<u8>,
}

impl MidiInputMapping {
    pub fn accepts(&self, channel: u8) -> bool {
        self.enabled && self.filter.is_none_or(|filter| filter == channel)
    }
}

/// A channel as stored in the document. Cheap to clone: audio data and cross
/// thread state live in `shared`.
#[derive(Clone)]
pub struct Channel {
    pub id: Id,
    pub name: String,
    pub kind: ChannelKind,
    pub volume: f32,
    /// Pan position in [0.0, 1.0], 0.5 is center.
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    /// Whether the channel is mixed into its group or the master bus.
    pub send_to_master: bool,
    /// The group this channel is mixed into.
    pub group: Option<Id>,
    pub plugins: Vec<PluginRef>,
    pub midi_input: MidiInputMapping,
    pub lightning: MidiLightning,
    pub shared: Arc<ChannelShared>,
}

impl Channel {
    pub fn new(id: Id, name: &str, kind: ChannelKind, shared: Arc<ChannelShared>) -> Channel {
        Channel {
            id,
            name: name.to_string(),
            kind,
            volume: 1.0,
            pan: 0.5,
            mute: false,
            solo: false,
            armed: false,
            send_to_master: true,
            group: None,
            plugins: Vec::new(),
            midi_input: MidiInputMapping::default(),
            lightning: MidiLightning::default(),
            shared,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self.kind {
            ChannelKind::MasterOut => ChannelType::MasterOut,
            ChannelKind::MasterIn => ChannelType::MasterIn,
            ChannelKind::Preview(_) => ChannelType::Preview,
            ChannelKind::Group => ChannelType::Group,
            ChannelKind::Sample(_) => ChannelType::Sample,
            ChannelKind::Midi(_) => ChannelType::Midi,
        }
    }

    /// Master and preview channels are rendered separately from the tracks.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            ChannelKind::MasterOut | ChannelKind::MasterIn | ChannelKind::Preview(_)
        )
    }

    pub fn is_audible(&self, has_solos: bool) -> bool {
        !self.mute && (!has_solos || self.solo)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Sample data for sample and preview channels.
    pub fn sample(&self) -> Option<&SampleChannel> {
        match &self.kind {
            ChannelKind::Sample(sample) | ChannelKind::Preview(sample) => Some(sample),
            _ => None,
        }
    }

    pub fn sample_mut(&mut self) -> Option<&mut SampleChannel> {
        match &mut self.kind {
            ChannelKind::Sample(sample) | ChannelKind::Preview(sample) => Some(sample),
            _ => None,
        }
    }

    pub fn midi(&self) -> Option<&MidiChannel> {
        match &self.kind {
            ChannelKind::Midi(midi) => Some(midi),
            _ => None,
        }
    }

    pub fn midi_mut(&mut self) -> Option<&mut MidiChannel> {
        match &mut self.kind {
            ChannelKind::Midi(midi) => Some(midi),
            _ => None,
        }
    }

    /// Armed sample channels with input monitoring take live input.
    pub fn can_receive_audio(&self) -> bool {
        self.armed && self.sample().is_some_and(|sample| sample.input_monitor)
    }

    /// Gain applied when mixing: user volume times velocity volume.
    /// Whether a finished input take goes to this channel. Channels that
    /// already hold a wave only take it when overdubbing.
    pub fn can_input_rec(&self, overdub: bool) -> bool {
        self.armed
            && matches!(self.kind, ChannelKind::Sample(_))
            && self
                .sample()
                .is_some_and(|sample| sample.wave.is_none() || overdub)
    }

    pub fn mix_gain(&self) -> f32 {
        self.volume * self.shared.volume_internal.load()
    }

    pub fn pan_gains(&self) -> Pan {
        Pan::from_position(self.pan)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("volume", &self.volume)
            .field("pan", &self.pan)
            .field("mute", &self.mute)
            .field("solo", &self.solo)
            .field("armed", &self.armed)
            .field("send_to_master", &self.send_to_master)
            .field("group", &self.group)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("lightning", &self.lightning)
            .field("shared", &self.shared)
            .finish()
    }
}
