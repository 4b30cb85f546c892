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
//! Real-time playback engine for a loop-based sequencer. Sample and MIDI
//! channels are driven by control threads through atomics and bounded queues
//! and rendered block by block on the audio thread.

pub mod actions;
pub mod audio;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod midi;
pub mod mixer;
pub mod model;
pub mod plugin;
pub mod quantizer;
pub mod rendering;
pub mod resampler;
pub mod sequencer;
pub mod wave;

#[cfg(test)]
pub(crate) mod testutil;

/// A frame index. One frame holds one sample per audio channel.
pub type Frame = usize;

/// Identifies channels, waves, plugins and actions.
pub type Id = u32;
