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
//! Control-thread entry points. Each one turns a user intent into changes of
//! the channel's shared state, and publishes the document when a document
//! field changed. The model guard is never held across a swap.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{midi_output::send_to_plugins, midi_reactions, sample_reactions};
use crate::{
    actions::ActionRecorder,
    channel::{Channel, ChannelKind, ChannelType, SamplePlayerMode},
    error::EngineError,
    midi::{
        self,
        event::{MidiEvent, MidiEventKind},
        lightning::{self, MidiLightning, MidiMap},
    },
    model::{Document, Model, SwapType},
    sequencer::Transport,
    Frame, Id,
};

pub struct Reactor {
    model: Arc<Model>,
    transport: Arc<Transport>,
    recorder: Arc<ActionRecorder>,
    midi_output: Arc<dyn midi::Output>,
}

/// What a key event needs to know about the channel and the engine, copied
/// out of the document so no guard is held while reacting.
struct KeyContext {
    channel: Channel,
    can_record: bool,
    can_quantize: bool,
    frame: Frame,
}

impl Reactor {
    pub fn new(
        model: Arc<Model>,
        transport: Arc<Transport>,
        recorder: Arc<ActionRecorder>,
        midi_output: Arc<dyn midi::Output>,
    ) -> Reactor {
        Reactor {
            model,
            transport,
            recorder,
            midi_output,
        }
    }

    /// A key press. `velocity` is in [0.0, 1.0].
    pub fn key_press(&self, channel_id: Id, velocity: f32) -> Result<(), EngineError> {
        let context = self.key_context(channel_id)?;
        let shared = &context.channel.shared;

        match &context.channel.kind {
            ChannelKind::Midi(_) => midi_reactions::play(&shared.play_status),
            ChannelKind::Sample(sample) if sample.has_wave() => {
                if context.can_record && !sample.is_loop() {
                    self.recorder.live_rec(
                        channel_id,
                        MidiEvent::note_on(0, 0, 127),
                        context.frame,
                    );
                    // Existing actions would fight the press/release pair.
                    if sample.mode == SamplePlayerMode::SinglePress {
                        shared.read_actions.store(false);
                    }
                }
                sample_reactions::press(
                    shared,
                    sample.mode,
                    velocity,
                    sample.velocity_as_vol,
                    context.can_quantize,
                )?;
            }
            ChannelKind::Preview(_) => sample_reactions::press(
                shared,
                SamplePlayerMode::SingleBasicPause,
                0.0,
                false,
                false,
            )?,
            _ => {}
        }
        debug!(channel = channel_id, status = ?shared.play_status.load(), "Key press");
        Ok(())
    }

    pub fn key_release(&self, channel_id: Id) -> Result<(), EngineError> {
        let context = self.key_context(channel_id)?;
        let shared = &context.channel.shared;

        match &context.channel.kind {
            ChannelKind::Sample(sample) if sample.has_wave() => {
                if context.can_record && sample.mode == SamplePlayerMode::SinglePress {
                    self.recorder
                        .live_rec(channel_id, MidiEvent::note_off(0, 0, 0), context.frame);
                }
                sample_reactions::release(shared, sample.mode);
            }
            ChannelKind::Preview(_) => {
                sample_reactions::release(shared, SamplePlayerMode::SingleBasicPause)
            }
            _ => {}
        }
        Ok(())
    }

    /// Stops a channel right away.
    pub fn key_kill(&self, channel_id: Id) -> Result<(), EngineError> {
        let context = self.key_context(channel_id)?;
        let shared = &context.channel.shared;

        match &context.channel.kind {
            ChannelKind::Midi(midi) => {
                midi_reactions::kill(shared, midi, self.midi_output.as_ref())
            }
            ChannelKind::Sample(sample) | ChannelKind::Preview(sample) => {
                if sample.has_wave()
                    && context.can_record
                    && sample.mode == SamplePlayerMode::SinglePress
                {
                    self.recorder
                        .live_rec(channel_id, MidiEvent::all_notes_off(0), context.frame);
                }
                sample_reactions::kill(shared);
            }
            _ => {}
        }
        debug!(channel = channel_id, "Key kill");
        Ok(())
    }

    /// Live MIDI for a MIDI channel: recorded when action recording is on,
    /// then queued for the channel's plugins.
    pub fn process_midi_event(&self, channel_id: Id, event: MidiEvent) -> Result<(), EngineError> {
        let context = self.key_context(channel_id)?;
        if context.channel.midi().is_none() {
            return Err(EngineError::WrongChannelType {
                id: channel_id,
                expected: ChannelType::Midi,
                actual: context.channel.channel_type(),
            });
        }

        let flat = event.with_channel(0);
        if context.can_record {
            self.recorder.live_rec(channel_id, flat, context.frame);
        }
        if !send_to_plugins(&context.channel.shared, flat, 0) {
            warn!(channel = channel_id, "MIDI queue is full, dropping event.");
        }
        Ok(())
    }

    /// Routes an event from the MIDI input to every channel mapped to it.
    /// Sample channels react to their key, MIDI channels take everything.
    pub fn dispatch_midi_input(&self, event: MidiEvent) -> Result<(), EngineError> {
        let targets: Vec<(Id, bool, Option<u8>)> = self
            .model
            .get()
            .tracks()
            .filter(|channel| channel.midi_input.accepts(event.channel()))
            .map(|channel| {
                (
                    channel.id,
                    channel.midi().is_some(),
                    channel.midi_input.key,
                )
            })
            .collect();

        for (channel_id, is_midi, key) in targets {
            if is_midi {
                self.process_midi_event(channel_id, event)?;
                continue;
            }
            if key != Some(event.note()) {
                continue;
            }
            match event.kind() {
                MidiEventKind::NoteOn => self.key_press(channel_id, event.velocity_float())?,
                MidiEventKind::NoteOff => self.key_release(channel_id)?,
                _ if event.is_kill() => self.key_kill(channel_id)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Toggles replay of recorded actions on a channel that has some.
    pub fn toggle_read_actions(&self, channel_id: Id) -> Result<(), EngineError> {
        let (channel, treat_recs_as_loops) = {
            let document = self.model.get();
            (
                find(&document, channel_id)?.clone(),
                document.behaviors.treat_recs_as_loops,
            )
        };
        let has_actions = match &channel.kind {
            ChannelKind::Sample(sample) => sample.has_actions,
            ChannelKind::Midi(midi) => midi.has_actions,
            _ => false,
        };
        if !has_actions {
            return Ok(());
        }
        sample_reactions::toggle_read_actions(
            &channel.shared,
            treat_recs_as_loops,
            self.transport.is_running(),
        );
        info!(
            channel = channel_id,
            rec_status = ?channel.shared.rec_status.load(),
            "Toggled action replay"
        );
        Ok(())
    }

    /// Stops action replay right away. Only does something when recordings
    /// behave like loops.
    pub fn kill_read_actions(&self, channel_id: Id) -> Result<(), EngineError> {
        let document = self.model.get();
        let channel = find(&document, channel_id)?;
        if document.behaviors.treat_recs_as_loops {
            sample_reactions::kill_read_actions(&channel.shared);
        }
        Ok(())
    }

    /// Returns the new mute state.
    pub fn toggle_mute(&self, channel_id: Id) -> Result<bool, EngineError> {
        let mute = self.edit(channel_id, |channel| {
            channel.mute = !channel.mute;
            channel.mute
        })?;
        info!(channel = channel_id, mute, "Toggled mute");
        let (map, lights) = self.lights(channel_id)?;
        lightning::send_mute(&map, &lights, mute, self.midi_output.as_ref());
        Ok(mute)
    }

    /// Returns the new solo state.
    pub fn toggle_solo(&self, channel_id: Id) -> Result<bool, EngineError> {
        let solo = self.edit(channel_id, |channel| {
            channel.solo = !channel.solo;
            channel.solo
        })?;
        info!(channel = channel_id, solo, "Toggled solo");
        let (map, lights) = self.lights(channel_id)?;
        lightning::send_solo(&map, &lights, solo, self.midi_output.as_ref());
        Ok(solo)
    }

    pub fn set_volume(&self, channel_id: Id, volume: f32) -> Result<(), EngineError> {
        self.edit(channel_id, |channel| channel.volume = volume.max(0.0))
    }

    /// `pan` is clamped to [0.0, 1.0].
    pub fn set_pan(&self, channel_id: Id, pan: f32) -> Result<(), EngineError> {
        self.edit(channel_id, |channel| channel.pan = pan.clamp(0.0, 1.0))
    }

    pub fn set_armed(&self, channel_id: Id, armed: bool) -> Result<(), EngineError> {
        self.edit(channel_id, |channel| channel.armed = armed)
    }

    /// What every channel does when the sequencer stops.
    pub fn stop_all(&self) {
        let (channels, chans_stop_on_seq_halt) = {
            let document = self.model.get();
            (
                document.tracks().cloned().collect::<Vec<Channel>>(),
                document.behaviors.chans_stop_on_seq_halt,
            )
        };
        for channel in &channels {
            match &channel.kind {
                ChannelKind::Midi(midi) => {
                    if channel.is_playing() {
                        midi_reactions::kill(&channel.shared, midi, self.midi_output.as_ref());
                    }
                }
                ChannelKind::Sample(sample) => sample_reactions::stop_by_seq(
                    &channel.shared,
                    sample.is_loop(),
                    chans_stop_on_seq_halt,
                ),
                _ => {}
            }
        }
    }

    /// What MIDI channels do when the sequencer jumps back to the start.
    pub fn rewind_all(&self) {
        for channel in self.model.get().tracks() {
            if channel.midi().is_some() {
                midi_reactions::rewind(&channel.shared.play_status);
            }
        }
    }

    fn key_context(&self, channel_id: Id) -> Result<KeyContext, EngineError> {
        let document = self.model.get();
        let channel = find(&document, channel_id)?.clone();
        let running = self.transport.is_running();
        Ok(KeyContext {
            channel,
            can_record: running && self.recorder.is_recording(),
            can_quantize: running && document.sequencer.quantize > 0,
            frame: self.current_frame_quantized(&document),
        })
    }

    /// The transport position snapped to the nearest quantization boundary.
    fn current_frame_quantized(&self, document: &Document) -> Frame {
        let frame = self.transport.current_frame();
        let step = document.sequencer.quantizer_step(document.sample_rate);
        if step == 0 {
            return frame;
        }
        let total = document
            .sequencer
            .frames_in_loop(document.sample_rate)
            .max(1);
        (frame + step / 2) / step * step % total
    }

    fn lights(&self, channel_id: Id) -> Result<(MidiMap, MidiLightning), EngineError> {
        let document = self.model.get();
        let lights = find(&document, channel_id)?.lightning;
        Ok((document.midi_map, lights))
    }

    fn edit<T, F>(&self, channel_id: Id, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Channel) -> T,
    {
        let result = {
            let mut document = self.model.get();
            let channel = document
                .channel_mut(channel_id)
                .ok_or(EngineError::ChannelNotFound(channel_id))?;
            f(channel)
        };
        self.model.swap(SwapType::Soft);
        Ok(result)
    }
}

fn find(document: &Document, channel_id: Id) -> Result<&Channel, EngineError> {
    document
        .channel(channel_id)
        .ok_or(EngineError::ChannelNotFound(channel_id))
}
