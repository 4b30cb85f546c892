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
use std::{error::Error, fmt, sync::Arc};

use crossbeam_channel::Sender;

use self::event::MidiEvent;

pub mod event;
pub mod lightning;
mod midir;
#[cfg(test)]
pub mod mock;

/// The outside MIDI device. Called from the audio thread, so implementations
/// must never block.
pub trait Output: fmt::Display + Send + Sync {
    /// Sends an event. Events that cannot be delivered right away are dropped.
    fn send(&self, event: MidiEvent);
}

/// Swallows everything. Used when no MIDI output is configured.
#[derive(Default)]
pub struct NullOutput;

impl Output for NullOutput {
    fn send(&self, _: MidiEvent) {}
}

impl fmt::Display for NullOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "none")
    }
}

/// A MIDI input that forwards every parsed event to a sender.
pub trait Input: fmt::Display + Send + Sync {
    /// Starts forwarding events.
    fn watch_events(&self, sender: Sender<MidiEvent>) -> Result<(), Box<dyn Error>>;

    /// Stops forwarding events.
    fn stop_watch_events(&self);
}

/// Opens the output port whose name contains `name`. `queue_size` bounds the
/// events waiting for the sender thread.
pub fn get_output(name: &str, queue_size: usize) -> Result<Arc<dyn Output>, Box<dyn Error>> {
    Ok(Arc::new(midir::Output::get(name, queue_size)?))
}

/// Finds the input port whose name contains `name`.
pub fn get_input(name: &str) -> Result<Arc<dyn Input>, Box<dyn Error>> {
    Ok(Arc::new(midir::Input::get(name)?))
}
