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
    fmt,
    ops::Range,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{error::EngineError, Frame};

/// Identifies a scheduled quantizer callback.
pub type QuantizerAction = usize;

const NO_TRIGGER: QuantizerAction = QuantizerAction::MAX;

type Callback<C> = Box<dyn Fn(&C, Frame) + Send + Sync>;

/// Defers an action to the next quantization boundary. A control thread calls
/// `trigger`, the audio thread calls `advance` once per block and the scheduled
/// callback runs at the exact frame of the boundary, with its in-block offset.
///
/// Only one trigger is pending at a time. A newer trigger replaces an older
/// one that has not fired yet.
pub struct Quantizer<C> {
    callbacks: Vec<(QuantizerAction, Callback<C>)>,
    pending: AtomicUsize,
}

impl<C> Quantizer<C> {
    pub fn new() -> Quantizer<C> {
        Quantizer {
            callbacks: Vec::new(),
            pending: AtomicUsize::new(NO_TRIGGER),
        }
    }

    /// Registers the callback for an action. Setup only, before the quantizer
    /// is shared with the audio thread.
    pub fn schedule<F>(&mut self, id: QuantizerAction, callback: F)
    where
        F: Fn(&C, Frame) + Send + Sync + 'static,
    {
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.push((id, Box::new(callback)));
    }

    /// Requests that the action fires at the next boundary.
    pub fn trigger(&self, id: QuantizerAction) -> Result<(), EngineError> {
        if !self.callbacks.iter().any(|(existing, _)| *existing == id) {
            return Err(EngineError::UnknownQuantizerAction(id));
        }
        self.pending.store(id, Ordering::Release);
        Ok(())
    }

    /// Cancels a pending trigger without firing it.
    pub fn clear(&self) {
        self.pending.store(NO_TRIGGER, Ordering::Release);
    }

    pub fn has_been_triggered(&self) -> bool {
        self.pending.load(Ordering::Acquire) != NO_TRIGGER
    }

    /// Fires the pending action if `block` contains a multiple of `step`. A
    /// step of zero disables quantization.
    pub fn advance(&self, block: Range<Frame>, step: Frame, context: &C) {
        if step == 0 || block.is_empty() {
            return;
        }
        let id = self.pending.load(Ordering::Acquire);
        if id == NO_TRIGGER {
            return;
        }

        let boundary = block.start.div_ceil(step) * step;
        if boundary >= block.end {
            return;
        }

        // A trigger that arrives while this one fires stays pending.
        if self
            .pending
            .compare_exchange(id, NO_TRIGGER, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Some((_, callback)) = self.callbacks.iter().find(|(existing, _)| *existing == id) {
            callback(context, boundary - block.start);
        }
    }
}

impl<C> Default for Quantizer<C> {
    fn default() -> Self {
        Quantizer::new()
    }
}

impl<C> fmt::Debug for Quantizer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quantizer")
            .field(
                "actions",
                &self.callbacks.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            )
            .field("triggered", &self.has_been_triggered())
            .finish()
    }
}
