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
use std::sync::Arc;

use crate::{audio::buffer::AudioBuffer, midi::event::MidiEvent};

/// An audio effect or instrument. Called from the audio thread, so
/// implementations must not block or allocate while processing.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Processes one block in place. `midi` holds the events for this block,
    /// each stamped with its in-block offset.
    fn process(&self, buffer: &mut AudioBuffer, midi: &[MidiEvent]);

    fn is_bypassed(&self) -> bool {
        false
    }
}

/// Plugins are shared between document copies.
pub type PluginRef = Arc<dyn Plugin>;

/// Runs a channel's plugin chain.
pub trait PluginHost: Send + Sync {
    fn process_stack(
        &self,
        buffer: &mut AudioBuffer,
        plugins: &[PluginRef],
        midi: Option<&[MidiEvent]>,
    );
}

/// Runs every plugin in order, in process.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectPluginHost;

impl PluginHost for DirectPluginHost {
    fn process_stack(
        &self,
        buffer: &mut AudioBuffer,
        plugins: &[PluginRef],
        midi: Option<&[MidiEvent]>,
    ) {
        let midi = midi.unwrap_or(&[]);
        plugins
            .iter()
            .filter(|plugin| !plugin.is_bypassed())
            .for_each(|plugin| plugin.process(buffer, midi));
    }
}
