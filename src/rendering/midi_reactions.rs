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

//! MIDI channel transitions.

use super::midi_output::send_all_notes_off;
use crate::{
    channel::{
        shared::{ChannelShared, ChannelStatus, WeakAtomic},
        MidiChannel,
    },
    midi,
};

/// Play toggle: starts on the next first beat, or stops at the end of the
/// current loop.
pub fn play(status: &WeakAtomic<ChannelStatus>) {
    let next = match status.load() {
        ChannelStatus::Play => ChannelStatus::Ending,
        ChannelStatus::Ending => ChannelStatus::Play,
        ChannelStatus::Wait => ChannelStatus::Off,
        ChannelStatus::Off => ChannelStatus::Wait,
        ChannelStatus::Empty => ChannelStatus::Empty,
    };
    status.store(next);
}

/// Stops right away and silences hanging notes.
pub fn kill(shared: &ChannelShared, midi: &MidiChannel, output: &dyn midi::Output) {
    let was_playing = shared.is_playing();
    shared.play_status.store(ChannelStatus::Off);
    if was_playing {
        send_all_notes_off(shared, midi, output);
    }
}

/// The loop started over: pending starts and stops take effect.
pub fn rewind(status: &WeakAtomic<ChannelStatus>) {
    match status.load() {
        ChannelStatus::Ending => status.store(ChannelStatus::Off),
        ChannelStatus::Wait => status.store(ChannelStatus::Play),
        _ => {}
    }
}
