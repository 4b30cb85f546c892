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
use crate::midi::lightning::MidiMap;

/// MIDI devices. Names are matched as substrings of the port names.
#[derive(Deserialize, Clone, Default)]
pub struct Midi {
    /// Port that replayed MIDI actions are sent to.
    output: Option<String>,

    /// Port whose events drive the channels.
    input: Option<String>,

    /// Messages that light the controller, sent to the output port.
    map: Option<MidiMap>,
}

impl Midi {
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn map(&self) -> MidiMap {
        self.map.unwrap_or_default()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for message in self.map().messages() {
            if !(0x80..0xF0).contains(&message.status) || message.channel > 15 {
                return Err(ConfigError::Invalid(format!(
                    "midi map message {message:?} is not a channel message"
                )));
            }
        }
        Ok(())
    }
}
