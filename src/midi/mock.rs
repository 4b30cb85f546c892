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
//! In-memory MIDI output for tests.

use std::fmt;

use parking_lot::Mutex;

use super::event::MidiEvent;

/// Keeps every event it is sent.
#[derive(Default)]
pub struct RecordingOutput {
    events: Mutex<Vec<MidiEvent>>,
}

impl RecordingOutput {
    pub fn new() -> RecordingOutput {
        RecordingOutput::default()
    }

    /// Everything sent so far, oldest first.
    pub fn events(&self) -> Vec<MidiEvent> {
        self.events.lock().clone()
    }
}

impl super::Output for RecordingOutput {
    fn send(&self, event: MidiEvent) {
        self.events.lock().push(event);
    }
}

impl fmt::Display for RecordingOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recording (Mock)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::Output as _;

    #[test]
    fn test_recording_output() {
        let output = RecordingOutput::new();
        output.send(MidiEvent::note_on(1, 60, 90));
        output.send(MidiEvent::note_off(1, 60, 0));
        assert_eq!(
            output.events(),
            vec![MidiEvent::note_on(1, 60, 90), MidiEvent::note_off(1, 60, 0)]
        );
    }
}
