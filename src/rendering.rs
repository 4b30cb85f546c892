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

//! Channel state machines and the block renderer.
//!
//! `*_reactions` modules run on control threads and only touch atomics and
//! queues. `*_advance` modules react to sequencer events on the audio thread.
//! `renderer` ties it all together once per block.

pub mod midi_advance;
pub mod midi_output;
pub mod midi_reactions;
pub mod reactor;
pub mod renderer;
pub mod sample_advance;
pub mod sample_reactions;
pub mod sample_rendering;
pub mod wave_reader;

#[cfg(test)]
mod tests;
