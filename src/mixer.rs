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
use std::fmt;

use crate::{
    audio::buffer::{AudioBuffer, Pan, Peak},
    channel::shared::WeakAtomic,
    Frame,
};

use self::input_rec::InputRecorder;

pub mod input_rec;

/// Output stage switches. Lives in the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MixerSettings {
    /// Hard clip the output to [-1.0, 1.0].
    pub limit_output: bool,
    /// Monitor the hardware input on the output.
    pub input_to_output: bool,
    /// Mix a finished input take onto channels that already hold a wave.
    pub overdub: bool,
}

/// Mixer state shared between the audio thread and control threads: whether
/// rendering is enabled, the last peak levels and the input take.
pub struct Mixer {
    active: WeakAtomic<bool>,
    peak_out: WeakAtomic<Peak>,
    peak_in: WeakAtomic<Peak>,
    input_recorder: InputRecorder,
}

impl Mixer {
    pub fn new() -> Mixer {
        Mixer {
            active: WeakAtomic::new(false),
            peak_out: WeakAtomic::new(Peak::default()),
            peak_in: WeakAtomic::new(Peak::default()),
            input_recorder: InputRecorder::new(),
        }
    }

    pub fn enable(&self) {
        self.active.store(true);
    }

    /// Renders silence from the next block on.
    pub fn disable(&self) {
        self.active.store(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.load()
    }

    /// Output level before master volume, from the last block.
    pub fn peak_out(&self) -> Peak {
        self.peak_out.load()
    }

    pub fn peak_in(&self) -> Peak {
        self.peak_in.load()
    }

    pub fn input_recorder(&self) -> &InputRecorder {
        &self.input_recorder
    }

    /// Meters the hardware input and, with the sequencer at `position`,
    /// feeds the input take.
    pub(crate) fn record_input(&self, input: &AudioBuffer, position: Option<Frame>) {
        self.peak_in.store(input.peak());
        if let Some(position) = position {
            self.input_recorder.record(input, position);
        }
    }

    /// Last steps of every block: input monitoring, peak meter, master volume
    /// and the limiter.
    pub(crate) fn finalize_output(
        &self,
        out: &mut AudioBuffer,
        input: Option<&AudioBuffer>,
        master_volume: f32,
        settings: &MixerSettings,
    ) {
        if settings.input_to_output {
            if let Some(input) = input {
                out.sum(input, 1.0, Pan::CENTER);
            }
        }
        self.peak_out.store(out.peak());
        out.apply_gain(master_volume);
        if settings.limit_output {
            out.limit();
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer::new()
    }
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("active", &self.active)
            .field("peak_out", &self.peak_out)
            .field("peak_in", &self.peak_in)
            .field("input_recorder", &self.input_recorder)
            .finish()
    }
}
