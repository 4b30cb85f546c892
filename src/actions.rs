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
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, info};

use crate::{
    midi::event::MidiEvent,
    model::{Model, SwapType},
    Frame, Id,
};

/// A recorded MIDI event for a channel, placed on a loop frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Action {
    pub id: Id,
    pub channel_id: Id,
    pub frame: Frame,
    pub event: MidiEvent,
}

/// Every recorded action, indexed by frame. Lookups by frame do not allocate.
#[derive(Clone, Debug, Default)]
pub struct Actions {
    by_frame: BTreeMap<Frame, Vec<Action>>,
    next_id: Id,
}

impl Actions {
    /// Actions placed on `frame`, in recording order.
    pub fn on_frame(&self, frame: Frame) -> &[Action] {
        self.by_frame
            .get(&frame)
            .map(|actions| actions.as_slice())
            .unwrap_or(&[])
    }

    pub fn record(&mut self, channel_id: Id, frame: Frame, event: MidiEvent) -> Id {
        self.next_id += 1;
        let action = Action {
            id: self.next_id,
            channel_id,
            frame,
            event: event.with_delta(0),
        };
        self.by_frame.entry(frame).or_default().push(action);
        action.id
    }

    pub fn has_actions(&self, channel_id: Id) -> bool {
        self.iter().any(|action| action.channel_id == channel_id)
    }

    pub fn for_channel(&self, channel_id: Id) -> Vec<Action> {
        self.iter()
            .filter(|action| action.channel_id == channel_id)
            .copied()
            .collect()
    }

    pub fn clear_channel(&mut self, channel_id: Id) {
        self.by_frame.retain(|_, actions| {
            actions.retain(|action| action.channel_id != channel_id);
            !actions.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.by_frame.clear();
    }

    pub fn len(&self) -> usize {
        self.by_frame.values().map(|actions| actions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_frame.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Action> {
        self.by_frame.values().flatten()
    }
}

/// Records live input into the document while action recording is on.
pub struct ActionRecorder {
    model: Arc<Model>,
    recording: AtomicBool,
}

impl ActionRecorder {
    pub fn new(model: Arc<Model>) -> ActionRecorder {
        ActionRecorder {
            model,
            recording: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        info!("Action recording started");
        self.recording.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        info!("Action recording stopped");
        self.recording.store(false, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Stores `event` for a channel at `frame` and publishes the document.
    pub fn live_rec(&self, channel_id: Id, event: MidiEvent, frame: Frame) -> Id {
        let id = {
            let mut document = self.model.get();
            let id = document.actions.record(channel_id, frame, event);
            if let Some(channel) = document.channel_mut(channel_id) {
                if let Some(sample) = channel.sample_mut() {
                    sample.has_actions = true;
                } else if let Some(midi) = channel.midi_mut() {
                    midi.has_actions = true;
                }
            }
            id
        };
        self.model.swap(SwapType::Hard);
        debug!(channel = channel_id, frame, action = id, "Recorded action");
        id
    }

    /// Drops every action of a channel.
    pub fn clear_channel(&self, channel_id: Id) {
        {
            let mut document = self.model.get();
            document.actions.clear_channel(channel_id);
            if let Some(channel) = document.channel_mut(channel_id) {
                if let Some(sample) = channel.sample_mut() {
                    sample.has_actions = false;
                } else if let Some(midi) = channel.midi_mut() {
                    midi.has_actions = false;
                }
            }
        }
        self.model.swap(SwapType::Hard);
        info!(channel = channel_id, "Cleared actions");
    }
}
