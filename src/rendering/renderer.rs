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

//! The per-block render pass. Owned by the audio callback.

use std::{fmt, ops::Range, sync::Arc};

use super::{midi_advance, sample_advance, sample_rendering};
use crate::{
    audio::buffer::AudioBuffer,
    channel::{Channel, ChannelKind},
    midi::{self, lightning},
    mixer::Mixer,
    model::{Document, Model},
    plugin::PluginHost,
    sequencer::{Event, EventType, Sequencer},
    Frame,
};

pub struct Renderer {
    model: Arc<Model>,
    mixer: Arc<Mixer>,
    sequencer: Sequencer,
    plugin_host: Arc<dyn PluginHost>,
    midi_output: Arc<dyn midi::Output>,
    /// Hardware input for the current block, after the master-in plugins.
    input: AudioBuffer,
}

impl Renderer {
    pub fn new(
        model: Arc<Model>,
        mixer: Arc<Mixer>,
        sequencer: Sequencer,
        plugin_host: Arc<dyn PluginHost>,
        midi_output: Arc<dyn midi::Output>,
        buffer_size: Frame,
        channels: usize,
    ) -> Renderer {
        Renderer {
            model,
            mixer,
            sequencer,
            plugin_host,
            midi_output,
            input: AudioBuffer::new(buffer_size, channels),
        }
    }

    /// Renders one block into `out`. `input` is the hardware input for the
    /// same block, if any.
    pub fn render(&mut self, out: &mut AudioBuffer, input: Option<&AudioBuffer>) {
        // Even when inactive, so nothing is left over from a previous block.
        out.clear();

        let document = self.model.get_rt();
        if !self.mixer.is_active() {
            return;
        }

        let frames = out.count_frames();
        let seq_running = self.sequencer.transport().is_running();
        if seq_running {
            self.sequencer
                .advance(&document.sequencer, frames, &document.actions);
            let block_start = self.sequencer.block_start();
            self.sequencer.render_metronome(out, &document.sequencer);
            if !document.locked {
                let step = document.sequencer.quantizer_step(document.sample_rate);
                advance_channels(
                    &document,
                    self.sequencer.events(),
                    block_start..block_start + frames,
                    step,
                    self.midi_output.as_ref(),
                );
            }
        }

        let has_input = match input {
            Some(input) => {
                self.input.clear();
                self.input.copy_from(input, input.count_frames(), 0, 0);
                let position = seq_running.then_some(self.sequencer.block_start());
                self.mixer.record_input(&self.input, position);
                if let Some(master_in) = document.master_in() {
                    self.plugin_host
                        .process_stack(&mut self.input, &master_in.plugins, None);
                }
                true
            }
            None => false,
        };
        let input = has_input.then_some(&self.input);

        if !document.locked {
            self.render_tracks(&document, out, input, seq_running);
            light_channels(&document, self.midi_output.as_ref());
        }

        if let Some(master_out) = document.master_out() {
            self.plugin_host.process_stack(out, &master_out.plugins, None);
        }
        if let Some(preview) = document.preview() {
            self.render_preview(preview, out);
        }

        let master_volume = document.master_out().map(|ch| ch.volume).unwrap_or(1.0);
        self.mixer
            .finalize_output(out, input, master_volume, &document.mixer);
    }

    fn render_tracks(
        &self,
        document: &Document,
        out: &mut AudioBuffer,
        input: Option<&AudioBuffer>,
        seq_running: bool,
    ) {
        let has_solos = document.has_solos();

        for group in document.tracks().filter(|ch| matches!(ch.kind, ChannelKind::Group)) {
            if let Some(mut state) = group.shared.render_state() {
                state.audio_buffer.clear();
            }
        }

        for channel in document.tracks() {
            if matches!(channel.kind, ChannelKind::Group) {
                continue;
            }
            let Some(mut state) = channel.shared.render_state() else {
                continue;
            };
            state.audio_buffer.clear();

            match &channel.kind {
                ChannelKind::Sample(sample) => {
                    sample_rendering::render(sample, &channel.shared, &mut state, seq_running);
                    if let Some(input) = input.filter(|_| channel.can_receive_audio()) {
                        sample_rendering::render_input(&mut state.audio_buffer, input);
                    }
                    self.plugin_host
                        .process_stack(&mut state.audio_buffer, &channel.plugins, None);
                }
                ChannelKind::Midi(_) => {
                    let state = &mut *state;
                    channel.shared.drain_midi(&mut state.midi_buffer);
                    self.plugin_host.process_stack(
                        &mut state.audio_buffer,
                        &channel.plugins,
                        Some(&state.midi_buffer),
                    );
                }
                _ => {}
            }

            if !channel.is_audible(has_solos) || !channel.send_to_master {
                continue;
            }
            let group = channel
                .group
                .and_then(|id| document.channel(id))
                .filter(|group| matches!(group.kind, ChannelKind::Group));
            match group {
                Some(group) => {
                    if let Some(mut bus) = group.shared.render_state() {
                        bus.audio_buffer
                            .sum(&state.audio_buffer, channel.mix_gain(), channel.pan_gains());
                    }
                }
                None => out.sum(&state.audio_buffer, channel.mix_gain(), channel.pan_gains()),
            }
        }

        for group in document.tracks().filter(|ch| matches!(ch.kind, ChannelKind::Group)) {
            let Some(mut state) = group.shared.render_state() else {
                continue;
            };
            self.plugin_host
                .process_stack(&mut state.audio_buffer, &group.plugins, None);
            if group.is_audible(has_solos) {
                out.sum(&state.audio_buffer, group.mix_gain(), group.pan_gains());
            }
        }
    }

    fn render_preview(&self, preview: &Channel, out: &mut AudioBuffer) {
        let (Some(sample), Some(mut state)) = (preview.sample(), preview.shared.render_state())
        else {
            return;
        };
        state.audio_buffer.clear();
        // The sequencer does not drive the preview.
        sample_rendering::render(sample, &preview.shared, &mut state, false);
        out.sum(&state.audio_buffer, preview.volume, preview.pan_gains());
    }
}

/// Lets every track react to this block's sequencer events, quantizer first.
fn advance_channels(
    document: &Document,
    events: &[Event],
    block: Range<Frame>,
    step: Frame,
    output: &dyn midi::Output,
) {
    for channel in document.tracks() {
        if let Some(quantizer) = &channel.shared.quantizer {
            quantizer.advance(block.clone(), step, &channel.shared);
        }
        for event in events {
            let actions = if event.event_type == EventType::Actions {
                document.actions.on_frame(event.global_frame)
            } else {
                &[]
            };
            match &channel.kind {
                ChannelKind::Sample(sample) => {
                    sample_advance::advance(channel.id, &channel.shared, sample.mode, event, actions)
                }
                ChannelKind::Midi(midi) => {
                    midi_advance::advance(channel.id, &channel.shared, midi, event, actions, output)
                }
                _ => {}
            }
        }
    }
}

/// Sends the status light of every lit channel whose status or audibility
/// changed since the last block.
fn light_channels(document: &Document, output: &dyn midi::Output) {
    let has_solos = document.has_solos();
    for channel in document.tracks() {
        if !channel.lightning.enabled || channel.lightning.playing.is_none() {
            continue;
        }
        let status = channel.shared.play_status.load();
        let audible = channel.is_audible(has_solos);
        let code = lightning::status_code(status, audible);
        if channel.shared.lit.load() == code {
            continue;
        }
        channel.shared.lit.store(code);
        lightning::send_status(&document.midi_map, &channel.lightning, status, audible, output);
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("mixer", &self.mixer)
            .field("sequencer", &self.sequencer)
            .finish()
    }
}
