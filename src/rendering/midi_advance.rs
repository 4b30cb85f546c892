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
use super::{midi_output::send_from_actions, midi_reactions};
use crate::{
    actions::Action,
    channel::{shared::ChannelShared, MidiChannel},
    midi,
    sequencer::{Event, EventType},
    Id,
};

/// Reacts to one sequencer event. Audio thread only.
pub fn advance(
    channel_id: Id,
    shared: &ChannelShared,
    midi: &MidiChannel,
    event: &Event,
    actions: &[Action],
    output: &dyn midi::Output,
) {
    match event.event_type {
        EventType::FirstBeat => midi_reactions::rewind(&shared.play_status),
        EventType::Actions => {
            if shared.is_playing() {
                send_from_actions(channel_id, shared, midi, actions, event.delta, output);
            }
        }
        EventType::Bar | EventType::Rewind => {}
    }
}
