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

//! The document holding every channel and setting, double buffered between
//! the control threads and the audio thread.
//!
//! Control threads edit a local copy behind a mutex and publish it with
//! `swap`. The audio thread reads the published snapshot through `get_rt`,
//! which never blocks. Replaced snapshots are kept until no reader holds them,
//! so the audio thread never frees a document.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::{
    actions::Actions,
    channel::{
        Channel, MASTER_IN_CHANNEL_ID, MASTER_OUT_CHANNEL_ID, PREVIEW_CHANNEL_ID,
    },
    midi::lightning::MidiMap,
    mixer::MixerSettings,
    sequencer::SequencerSettings,
    Frame, Id,
};

/// Engine-wide behaviors that change how channels react.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Behaviors {
    /// Recorded actions start and stop on the first beat, like loops.
    pub treat_recs_as_loops: bool,
    /// Stopping the sequencer stops loops and channels replaying actions.
    pub chans_stop_on_seq_halt: bool,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub sample_rate: u32,
    pub buffer_size: Frame,
    pub channels: Vec<Channel>,
    pub sequencer: SequencerSettings,
    pub mixer: MixerSettings,
    /// Messages for controller lights.
    pub midi_map: MidiMap,
    pub behaviors: Behaviors,
    pub actions: Actions,
    /// Set while a structural edit is in progress. The audio thread still
    /// renders, but skips quantizers and sequencer events.
    pub locked: bool,
}

impl Document {
    pub fn new(sample_rate: u32, buffer_size: Frame) -> Document {
        Document {
            sample_rate,
            buffer_size,
            channels: Vec::new(),
            sequencer: SequencerSettings::default(),
            mixer: MixerSettings::default(),
            midi_map: MidiMap::default(),
            behaviors: Behaviors::default(),
            actions: Actions::default(),
            locked: false,
        }
    }

    pub fn channel(&self, id: Id) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    pub fn channel_mut(&mut self, id: Id) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|channel| channel.id == id)
    }

    pub fn master_out(&self) -> Option<&Channel> {
        self.channel(MASTER_OUT_CHANNEL_ID)
    }

    pub fn master_in(&self) -> Option<&Channel> {
        self.channel(MASTER_IN_CHANNEL_ID)
    }

    pub fn preview(&self) -> Option<&Channel> {
        self.channel(PREVIEW_CHANNEL_ID)
    }

    /// User channels: samples, MIDI and groups.
    pub fn tracks(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|channel| !channel.is_internal())
    }

    pub fn has_solos(&self) -> bool {
        self.tracks().any(|channel| channel.solo)
    }
}

/// How `Model::swap` publishes the local document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapType {
    /// Keep the change local.
    None,
    /// Publish. Used for frequent parameter changes.
    Soft,
    /// Publish a structural change.
    Hard,
}

pub struct Model {
    local: Mutex<Document>,
    rt: ArcSwap<Document>,
    retired: Mutex<Vec<Arc<Document>>>,
}

impl Model {
    pub fn new(document: Document) -> Model {
        Model {
            rt: ArcSwap::from_pointee(document.clone()),
            local: Mutex::new(document),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// The editable document. Control threads only.
    pub fn get(&self) -> MutexGuard<'_, Document> {
        self.local.lock()
    }

    /// The published snapshot. Never blocks.
    pub fn get_rt(&self) -> Guard<Arc<Document>> {
        self.rt.load()
    }

    pub fn swap(&self, swap_type: SwapType) {
        if swap_type == SwapType::None {
            return;
        }

        let snapshot = Arc::new(self.local.lock().clone());
        let previous = self.rt.swap(snapshot);

        // Snapshots the audio thread no longer reads are released here, off
        // the audio thread.
        let mut retired = self.retired.lock();
        retired.push(previous);
        retired.retain(|document| Arc::strong_count(document) > 1);
        if swap_type == SwapType::Hard {
            debug!(retired = retired.len(), "Published document");
        }
    }

    /// Marks the document locked for a structural edit. Unlocks and publishes
    /// again when the returned guard is dropped.
    pub fn lock(&self) -> DocumentLock<'_> {
        self.local.lock().locked = true;
        self.swap(SwapType::Hard);
        DocumentLock { model: self }
    }

    /// Snapshots waiting to be released.
    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }
}

pub struct DocumentLock<'a> {
    model: &'a Model,
}

impl DocumentLock<'_> {
    /// The editable document while locked.
    pub fn get(&self) -> MutexGuard<'_, Document> {
        self.model.get()
    }
}

impl Drop for DocumentLock<'_> {
    fn drop(&mut self) {
        self.model.local.lock().locked = false;
        self.model.swap(SwapType::Hard);
    }
}
