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
use std::io::Cursor;

use midly::{live::LiveEvent, num::u4, MidiMessage};

use crate::Frame;

const CONTROLLER_ALL_SOUND_OFF: u8 = 0x78;
const CONTROLLER_ALL_NOTES_OFF: u8 = 0x7B;

#[derive(Debug, thiserror::Error)]
pub enum MidiEventError {
    #[error("unable to parse MIDI event: {0}")]
    Parse(#[from] midly::Error),

    #[error("only channel messages are supported")]
    NotAChannelMessage,

    #[error("unable to encode MIDI event: {0}")]
    Encode(#[from] std::io::Error),
}

/// The broad category of a channel message, as far as playback cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn,
    NoteOff,
    Controller,
    Other,
}

/// A channel voice message plus the in-block frame offset it applies to.
/// Fixed size and `Copy` so it can travel through lock-free queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    raw: [u8; 3],
    len: u8,
    delta: Frame,
}

impl MidiEvent {
    /// Builds a MIDI event from a midly channel message.
    pub fn from_message(channel: u4, message: MidiMessage) -> Result<MidiEvent, MidiEventError> {
        let mut raw = [0u8; 3];
        let mut cursor = Cursor::new(&mut raw[..]);
        LiveEvent::Midi { channel, message }.write_std(&mut cursor)?;
        let len = cursor.position() as u8;
        Ok(MidiEvent { raw, len, delta: 0 })
    }

    /// Parses raw bytes as received from a MIDI input port.
    pub fn parse(bytes: &[u8]) -> Result<MidiEvent, MidiEventError> {
        match LiveEvent::parse(bytes)? {
            LiveEvent::Midi { channel, message } => MidiEvent::from_message(channel, message),
            _ => Err(MidiEventError::NotAChannelMessage),
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> MidiEvent {
        MidiEvent::raw3(0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> MidiEvent {
        MidiEvent::raw3(0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F)
    }

    /// The "all notes off" controller message.
    pub fn all_notes_off(channel: u8) -> MidiEvent {
        MidiEvent::raw3(0xB0 | (channel & 0x0F), CONTROLLER_ALL_NOTES_OFF, 0)
    }

    fn raw3(status: u8, data1: u8, data2: u8) -> MidiEvent {
        MidiEvent {
            raw: [status, data1, data2],
            len: 3,
            delta: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw[..self.len as usize]
    }

    pub fn status(&self) -> u8 {
        self.raw[0] & 0xF0
    }

    pub fn channel(&self) -> u8 {
        self.raw[0] & 0x0F
    }

    pub fn data1(&self) -> u8 {
        self.raw[1]
    }

    pub fn data2(&self) -> u8 {
        self.raw[2]
    }

    pub fn note(&self) -> u8 {
        self.raw[1]
    }

    pub fn velocity(&self) -> u8 {
        self.raw[2]
    }

    /// Velocity scaled to [0.0, 1.0].
    pub fn velocity_float(&self) -> f32 {
        self.velocity() as f32 / 127.0
    }

    pub fn delta(&self) -> Frame {
        self.delta
    }

    /// Note-on with zero velocity counts as a note-off.
    pub fn kind(&self) -> MidiEventKind {
        match self.status() {
            0x90 if self.velocity() > 0 => MidiEventKind::NoteOn,
            0x90 | 0x80 => MidiEventKind::NoteOff,
            0xB0 => MidiEventKind::Controller,
            _ => MidiEventKind::Other,
        }
    }

    /// Whether this message silences everything on its channel.
    pub fn is_kill(&self) -> bool {
        self.kind() == MidiEventKind::Controller
            && matches!(
                self.data1(),
                CONTROLLER_ALL_NOTES_OFF | CONTROLLER_ALL_SOUND_OFF
            )
    }

    pub fn with_channel(mut self, channel: u8) -> MidiEvent {
        self.raw[0] = self.status() | (channel & 0x0F);
        self
    }

    pub fn with_delta(mut self, delta: Frame) -> MidiEvent {
        self.delta = delta;
        self
    }

    /// Converts back into a midly event for devices that want one.
    pub fn to_live_event(&self) -> Result<LiveEvent<'_>, MidiEventError> {
        Ok(LiveEvent::parse(self.as_bytes())?)
    }
}
