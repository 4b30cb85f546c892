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

//! MIDI fan-out for MIDI channels: every event goes to the channel's plugins
//! and, when enabled, to the outside MIDI device.

use crate::{
    actions::Action,
    channel::{shared::ChannelShared, MidiChannel},
    midi::{self, event::MidiEvent},
    Frame, Id,
};

/// Sends the actions that belong to `channel_id`, stamped with `delta`.
pub fn send_from_actions(
    channel_id: Id,
    shared: &ChannelShared,
    midi: &MidiChannel,
    actions: &[Action],
    delta: Frame,
    output: &dyn midi::Output,
) {
    for action in actions.iter().filter(|action| action.channel_id == channel_id) {
        send_to_plugins(shared, action.event, delta);
        if midi.can_send_midi() {
            send_to_out(action.event.with_delta(delta), midi.output_filter, output);
        }
    }
}

pub fn send_all_notes_off(shared: &ChannelShared, midi: &MidiChannel, output: &dyn midi::Output) {
    let event = MidiEvent::all_notes_off(0);
    send_to_plugins(shared, event, 0);
    if midi.can_send_midi() {
        send_to_out(event, midi.output_filter, output);
    }
}

/// Queues an event for the plugin stage. Internally every event lives on MIDI
/// channel 0.
pub fn send_to_plugins(shared: &ChannelShared, event: MidiEvent, delta: Frame) -> bool {
    shared.push_midi(event.with_channel(0).with_delta(delta))
}

fn send_to_out(event: MidiEvent, output_filter: u8, output: &dyn midi::Output) {
    output.send(event.with_channel(output_filter));
}
