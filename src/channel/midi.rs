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

/// Settings of a MIDI channel.
#[derive(Clone, Debug, Default)]
pub struct MidiChannel {
    /// Send replayed events to the outside MIDI device.
    pub output_enabled: bool,
    /// MIDI channel (0-15) used for outgoing events.
    pub output_filter: u8,
    pub has_actions: bool,
}

impl MidiChannel {
    pub fn new(output_enabled: bool, output_filter: u8) -> MidiChannel {
        MidiChannel {
            output_enabled,
            output_filter: output_filter & 0x0F,
            has_actions: false,
        }
    }

    pub fn can_send_midi(&self) -> bool {
        self.output_enabled
    }
}
