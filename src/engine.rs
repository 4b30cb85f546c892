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
//! The engine owns every collaborator of the playback core and exposes the
//! control-side API. Nothing here runs on the audio thread except what
//! `renderer()` hands over.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    actions::ActionRecorder,
    audio::buffer::Pan,
    channel::{
        shared::SharedSettings, Channel, ChannelKind, ChannelShared, ChannelType, MidiChannel,
        MidiInputMapping, SampleChannel, SamplePlayerMode, FIRST_USER_CHANNEL_ID,
        MASTER_IN_CHANNEL_ID, MASTER_OUT_CHANNEL_ID, PREVIEW_CHANNEL_ID,
    },
    config::{self, EngineConfig},
    error::EngineError,
    midi::{
        self,
        lightning::{MidiLightning, MidiMap},
    },
    mixer::{Mixer, MixerSettings},
    model::{Behaviors, Document, Model, SwapType},
    plugin::{DirectPluginHost, PluginHost, PluginRef},
    rendering::{reactor::Reactor, renderer::Renderer, sample_reactions},
    sequencer::{Sequencer, SequencerSettings, Transport},
    wave::{loader, Wave},
    Frame, Id,
};

pub struct Engine {
    sample_rate: u32,
    settings: Mutex<SharedSettings>,
    model: Arc<Model>,
    transport: Arc<Transport>,
    mixer: Arc<Mixer>,
    recorder: Arc<ActionRecorder>,
    reactor: Reactor,
    plugin_host: Arc<dyn PluginHost>,
    midi_output: Arc<dyn midi::Output>,
    /// Set while an audio stream drives a renderer.
    streaming: AtomicBool,
    next_channel_id: AtomicU32,
    next_wave_id: AtomicU32,
}

impl Engine {
    /// Builds an engine with the master out, master in and preview channels.
    /// The mixer starts disabled.
    pub fn new(
        sample_rate: u32,
        settings: SharedSettings,
        midi_output: Arc<dyn midi::Output>,
        plugin_host: Arc<dyn PluginHost>,
    ) -> Result<Engine, EngineError> {
        if settings.buffer_size == 0 {
            return Err(EngineError::InvalidBufferSize(0));
        }

        let mut document = Document::new(sample_rate, settings.buffer_size);
        document.channels.push(Channel::new(
            MASTER_OUT_CHANNEL_ID,
            "master out",
            ChannelKind::MasterOut,
            Arc::new(ChannelShared::new(&settings)),
        ));
        document.channels.push(Channel::new(
            MASTER_IN_CHANNEL_ID,
            "master in",
            ChannelKind::MasterIn,
            Arc::new(ChannelShared::new(&settings)),
        ));
        document.channels.push(Channel::new(
            PREVIEW_CHANNEL_ID,
            "preview",
            ChannelKind::Preview(SampleChannel::new(SamplePlayerMode::SingleBasicPause)),
            Arc::new(ChannelShared::new_sample(&settings)?),
        ));

        let model = Arc::new(Model::new(document));
        let transport = Arc::new(Transport::new());
        let recorder = Arc::new(ActionRecorder::new(model.clone()));
        let reactor = Reactor::new(
            model.clone(),
            transport.clone(),
            recorder.clone(),
            midi_output.clone(),
        );

        info!(
            sample_rate,
            buffer_size = settings.buffer_size,
            channels = settings.channels,
            midi_output = %midi_output,
            "Engine created."
        );
        Ok(Engine {
            sample_rate,
            settings: Mutex::new(settings),
            model,
            transport,
            mixer: Arc::new(Mixer::new()),
            recorder,
            reactor,
            plugin_host,
            midi_output,
            streaming: AtomicBool::new(false),
            next_channel_id: AtomicU32::new(FIRST_USER_CHANNEL_ID),
            next_wave_id: AtomicU32::new(1),
        })
    }

    /// Builds an engine and its channels from a configuration. Wave paths
    /// are relative to `base_dir`.
    pub fn from_config(
        config: &EngineConfig,
        base_dir: &Path,
        midi_output: Arc<dyn midi::Output>,
    ) -> Result<Engine, EngineError> {
        let audio = config.audio();
        let queues = config.queues();
        let engine = Engine::new(
            audio.sample_rate(),
            SharedSettings {
                buffer_size: audio.buffer_size(),
                channels: audio.channels() as usize,
                midi_queue_size: queues.midi_queue_size(),
                render_queue_size: queues.render_queue_size(),
                resampler_quality: audio.resampler_quality(),
            },
            midi_output,
            Arc::new(DirectPluginHost),
        )?;
        engine.set_sequencer(config.sequencer().to_settings());
        engine.set_behaviors(config.behaviors().to_behaviors());
        engine.set_midi_map(config.midi().map());
        engine.set_mixer_settings(MixerSettings {
            limit_output: audio.limit_output(),
            input_to_output: audio.input_to_output(),
            overdub: audio.input_rec_overdub(),
        });

        // Groups first, so members can refer to them.
        let mut groups: HashMap<&str, Id> = HashMap::new();
        for channel in config.channels() {
            if channel.channel_type() == config::ChannelType::Group {
                let id = engine.add_group(channel.name());
                engine.configure_channel(id, channel, None)?;
                groups.insert(channel.name(), id);
            }
        }
        for channel in config.channels() {
            let id = match channel.channel_type() {
                config::ChannelType::Group => continue,
                config::ChannelType::Sample => {
                    let id = engine.add_sample_channel(channel.name(), channel.mode())?;
                    if let Some(wave) = channel.wave() {
                        engine.load_wave(id, &base_dir.join(wave))?;
                    }
                    if let Some((begin, end)) = channel.range() {
                        engine.set_range(id, begin, end)?;
                    }
                    engine.set_pitch(id, channel.pitch())?;
                    engine.edit_sample(id, |sample| {
                        sample.velocity_as_vol = channel.velocity_as_vol();
                        sample.input_monitor = channel.input_monitor();
                    })?;
                    id
                }
                config::ChannelType::Midi => engine.add_midi_channel(
                    channel.name(),
                    MidiChannel::new(
                        channel.output_channel().is_some(),
                        channel.output_channel().unwrap_or(0),
                    ),
                ),
            };
            let group = channel.group().and_then(|name| groups.get(name).copied());
            engine.configure_channel(id, channel, group)?;
        }
        Ok(engine)
    }

    fn configure_channel(
        &self,
        id: Id,
        config: &config::Channel,
        group: Option<Id>,
    ) -> Result<(), EngineError> {
        self.edit_channel(id, SwapType::Soft, |channel| {
            channel.volume = config.volume().max(0.0);
            channel.pan = config.pan().clamp(0.0, 1.0);
            channel.armed = config.armed();
            channel.midi_input = config.midi_input_mapping();
            channel.lightning = config.midi_lightning();
            channel.group = group;
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> Frame {
        self.settings.lock().buffer_size
    }

    /// Audio channels of every buffer.
    pub fn channels(&self) -> usize {
        self.settings.lock().channels
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    pub fn recorder(&self) -> &Arc<ActionRecorder> {
        &self.recorder
    }

    /// Key presses, mute, solo and the other live controls.
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    pub fn add_sample_channel(&self, name: &str, mode: SamplePlayerMode) -> Result<Id, EngineError> {
        let shared = ChannelShared::new_sample(&self.settings.lock())?;
        Ok(self.add_channel(name, ChannelKind::Sample(SampleChannel::new(mode)), shared))
    }

    pub fn add_midi_channel(&self, name: &str, midi: MidiChannel) -> Id {
        let shared = ChannelShared::new(&self.settings.lock());
        self.add_channel(name, ChannelKind::Midi(midi), shared)
    }

    pub fn add_group(&self, name: &str) -> Id {
        let shared = ChannelShared::new(&self.settings.lock());
        self.add_channel(name, ChannelKind::Group, shared)
    }

    fn add_channel(&self, name: &str, kind: ChannelKind, shared: ChannelShared) -> Id {
        let id = self.next_channel_id.fetch_add(1, Ordering::Relaxed);
        let channel = Channel::new(id, name, kind, Arc::new(shared));
        let channel_type = channel.channel_type();
        {
            let lock = self.model.lock();
            lock.get().channels.push(channel);
        }
        info!(channel = id, name, kind = %channel_type, "Channel added.");
        id
    }

    /// Removes a user channel, its actions and its group membership.
    pub fn delete_channel(&self, id: Id) -> Result<(), EngineError> {
        let is_internal = self
            .model
            .get()
            .channel(id)
            .ok_or(EngineError::ChannelNotFound(id))?
            .is_internal();
        if is_internal {
            return Err(EngineError::InternalChannel(id));
        }

        // Hanging notes would outlive the channel.
        self.reactor.key_kill(id)?;
        {
            let lock = self.model.lock();
            let mut document = lock.get();
            document.channels.retain(|channel| channel.id != id);
            for channel in document.channels.iter_mut() {
                if channel.group == Some(id) {
                    channel.group = None;
                }
            }
            document.actions.clear_channel(id);
        }
        info!(channel = id, "Channel deleted.");
        Ok(())
    }

    /// Mixes a channel into a group, or straight into the master bus.
    pub fn set_group(&self, id: Id, group: Option<Id>) -> Result<(), EngineError> {
        if let Some(group) = group {
            let actual = self
                .model
                .get()
                .channel(group)
                .ok_or(EngineError::ChannelNotFound(group))?
                .channel_type();
            if actual != ChannelType::Group {
                return Err(EngineError::WrongChannelType {
                    id: group,
                    expected: ChannelType::Group,
                    actual,
                });
            }
        }
        self.edit_channel(id, SwapType::Soft, |channel| channel.group = group)
    }

    /// Reads a WAV file into a sample or preview channel. Returns the wave id.
    pub fn load_wave(&self, id: Id, path: &Path) -> Result<Id, EngineError> {
        let wave_id = self.next_wave_id.fetch_add(1, Ordering::Relaxed);
        let quality = self.settings.lock().resampler_quality;
        let wave = loader::load(wave_id, path, self.sample_rate, self.channels(), quality)?;
        self.set_wave(id, Some(Arc::new(wave)))?;
        Ok(wave_id)
    }

    /// Replaces the wave of a sample or preview channel. The channel stops
    /// and its range covers the whole new wave.
    pub fn set_wave(&self, id: Id, wave: Option<Arc<Wave>>) -> Result<(), EngineError> {
        let loaded = wave.is_some();
        let wave_id = wave.as_ref().map(|wave| wave.id());
        let shared = {
            let mut document = self.model.get();
            let channel = sample_channel_mut(&mut document, id)?;
            if let Some(sample) = channel.sample_mut() {
                sample.set_wave(wave);
            }
            channel.shared.clone()
        };
        sample_reactions::set_wave_loaded(&shared, loaded, 0);
        self.model.swap(SwapType::Hard);
        info!(channel = id, wave = ?wave_id, "Wave set.");
        Ok(())
    }

    pub fn set_range(&self, id: Id, begin: Frame, end: Frame) -> Result<(), EngineError> {
        let (shared, begin) = {
            let mut document = self.model.get();
            let channel = sample_channel_mut(&mut document, id)?;
            let begin = match channel.sample_mut() {
                Some(sample) => {
                    sample.set_range(begin, end);
                    sample.begin
                }
                None => 0,
            };
            (channel.shared.clone(), begin)
        };
        // Keep the tracker inside the new range.
        if !shared.is_playing() {
            shared.tracker.store(begin);
        }
        self.model.swap(SwapType::Hard);
        debug!(channel = id, begin, end, "Range set.");
        Ok(())
    }

    pub fn set_pitch(&self, id: Id, pitch: f32) -> Result<(), EngineError> {
        self.edit_sample(id, |sample| sample.set_pitch(pitch))
    }

    pub fn set_mode(&self, id: Id, mode: SamplePlayerMode) -> Result<(), EngineError> {
        self.edit_sample(id, |sample| sample.mode = mode)
    }

    pub fn set_midi_input(&self, id: Id, mapping: MidiInputMapping) -> Result<(), EngineError> {
        self.edit_channel(id, SwapType::Soft, |channel| channel.midi_input = mapping)
    }

    pub fn set_midi_output(&self, id: Id, enabled: bool, filter: u8) -> Result<(), EngineError> {
        let mut result = Ok(());
        self.edit_channel(id, SwapType::Soft, |channel| {
            let actual = channel.channel_type();
            match channel.midi_mut() {
                Some(midi) => {
                    midi.output_enabled = enabled;
                    midi.output_filter = filter & 0x0F;
                }
                None => {
                    result = Err(EngineError::WrongChannelType {
                        id,
                        expected: ChannelType::Midi,
                        actual,
                    })
                }
            }
        })?;
        result
    }

    /// Appends a plugin to a channel's stack.
    pub fn add_plugin(&self, id: Id, plugin: PluginRef) -> Result<(), EngineError> {
        let name = plugin.name().to_string();
        self.edit_channel(id, SwapType::Hard, |channel| channel.plugins.push(plugin))?;
        info!(channel = id, plugin = name, "Plugin added.");
        Ok(())
    }

    pub fn set_sequencer(&self, settings: SequencerSettings) {
        self.model.get().sequencer = settings;
        self.model.swap(SwapType::Soft);
        info!(
            bpm = settings.bpm,
            beats = settings.beats,
            bars = settings.bars,
            quantize = settings.quantize,
            "Sequencer settings changed."
        );
    }

    pub fn set_behaviors(&self, behaviors: Behaviors) {
        self.model.get().behaviors = behaviors;
        self.model.swap(SwapType::Soft);
    }

    pub fn set_midi_map(&self, map: MidiMap) {
        self.model.get().midi_map = map;
        self.model.swap(SwapType::Soft);
    }

    /// Sets the learnt light notes of a channel. Its status light is sent
    /// again on the next block.
    pub fn set_midi_lightning(&self, id: Id, lightning: MidiLightning) -> Result<(), EngineError> {
        let shared = {
            let mut document = self.model.get();
            let channel = document
                .channel_mut(id)
                .ok_or(EngineError::ChannelNotFound(id))?;
            channel.lightning = lightning;
            channel.shared.clone()
        };
        self.model.swap(SwapType::Soft);
        shared.lit.store(usize::MAX);
        Ok(())
    }

    pub fn set_mixer_settings(&self, settings: MixerSettings) {
        self.model.get().mixer = settings;
        self.model.swap(SwapType::Soft);
    }

    /// Resizes every channel buffer. Only allowed while no stream runs.
    pub fn set_buffer_size(&self, frames: Frame) -> Result<(), EngineError> {
        if self.is_streaming() {
            return Err(EngineError::StreamRunning);
        }
        if frames == 0 {
            return Err(EngineError::InvalidBufferSize(frames));
        }

        let channels = {
            let mut settings = self.settings.lock();
            settings.buffer_size = frames;
            settings.channels
        };
        {
            let mut document = self.model.get();
            document.buffer_size = frames;
            for channel in &document.channels {
                channel.shared.set_buffer_size(frames, channels);
            }
        }
        self.model.swap(SwapType::Hard);
        info!(buffer_size = frames, "Buffer size changed.");
        Ok(())
    }

    pub fn start_sequencer(&self) {
        self.transport.start();
        info!("Sequencer started.");
    }

    /// Stops the transport and lets every channel react.
    pub fn stop_sequencer(&self) {
        self.transport.stop();
        self.reactor.stop_all();
        info!("Sequencer stopped.");
    }

    /// Jumps back to the start of the loop, on the next quantization
    /// boundary when quantization is on.
    pub fn rewind_sequencer(&self) -> Result<(), EngineError> {
        let quantized = self.model.get().sequencer.quantize > 0;
        self.transport.rewind(quantized)?;
        self.reactor.rewind_all();
        info!(quantized, "Sequencer rewound.");
        Ok(())
    }

    /// Starts recording the hardware input into a take one loop long.
    /// Returns false when no armed channel can receive it.
    pub fn start_input_rec(&self) -> bool {
        let (frames, targets) = {
            let document = self.model.get();
            let overdub = document.mixer.overdub;
            (
                document.sequencer.frames_in_loop(self.sample_rate),
                document
                    .tracks()
                    .filter(|channel| channel.can_input_rec(overdub))
                    .count(),
            )
        };
        if frames == 0 || targets == 0 {
            debug!(frames, targets, "Nothing to record input into.");
            return false;
        }
        self.mixer.input_recorder().start(frames, self.channels());
        true
    }

    /// Stops input recording and hands the take to every armed channel.
    /// Empty channels get it as a new wave. With overdub on, channels that
    /// already hold a wave get the take mixed onto it and keep playing.
    /// Returns the channels that received the take.
    pub fn stop_input_rec(&self) -> Result<Vec<Id>, EngineError> {
        let Some(take) = self.mixer.input_recorder().stop() else {
            return Ok(Vec::new());
        };
        let (overdub, targets) = {
            let document = self.model.get();
            let overdub = document.mixer.overdub;
            let targets: Vec<(Id, bool)> = document
                .tracks()
                .filter(|channel| channel.can_input_rec(overdub))
                .map(|channel| (channel.id, channel.sample().is_some_and(|s| s.wave.is_some())))
                .collect();
            (overdub, targets)
        };

        let mut dubbed = false;
        for &(id, has_wave) in &targets {
            let wave_id = self.next_wave_id.fetch_add(1, Ordering::Relaxed);
            if !has_wave {
                let wave = Wave::new(
                    wave_id,
                    take.clone(),
                    self.sample_rate,
                    &PathBuf::from(format!("TAKE-{wave_id}")),
                );
                self.set_wave(id, Some(Arc::new(wave)))?;
                continue;
            }
            let mut document = self.model.get();
            let channel = sample_channel_mut(&mut document, id)?;
            if let Some(sample) = channel.sample_mut() {
                if let Some(old) = sample.wave.take() {
                    let mut buffer = old.buffer().clone();
                    buffer.sum(&take, 1.0, Pan::CENTER);
                    sample.wave = Some(Arc::new(Wave::new(
                        wave_id,
                        buffer,
                        old.rate(),
                        old.path(),
                    )));
                    dubbed = true;
                }
            }
        }
        if dubbed {
            self.model.swap(SwapType::Hard);
        }
        let ids: Vec<Id> = targets.into_iter().map(|(id, _)| id).collect();
        info!(channels = ?ids, overdub, "Input take stored.");
        Ok(ids)
    }

    pub fn clear_actions(&self, id: Id) {
        self.recorder.clear_channel(id);
    }

    /// A renderer for an audio callback. Only one should run at a time.
    pub fn renderer(&self) -> Renderer {
        let (buffer_size, channels) = {
            let settings = self.settings.lock();
            (settings.buffer_size, settings.channels)
        };
        Renderer::new(
            self.model.clone(),
            self.mixer.clone(),
            Sequencer::new(self.transport.clone(), self.sample_rate, buffer_size),
            self.plugin_host.clone(),
            self.midi_output.clone(),
            buffer_size,
            channels,
        )
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.streaming.store(streaming, Ordering::Relaxed);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    /// Starts producing sound from the next block.
    pub fn enable(&self) {
        self.mixer.enable();
    }

    pub fn disable(&self) {
        self.mixer.disable();
    }

    fn edit_channel<F>(&self, id: Id, swap_type: SwapType, f: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Channel),
    {
        {
            let mut document = self.model.get();
            let channel = document
                .channel_mut(id)
                .ok_or(EngineError::ChannelNotFound(id))?;
            f(channel);
        }
        self.model.swap(swap_type);
        Ok(())
    }

    fn edit_sample<F>(&self, id: Id, f: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut SampleChannel),
    {
        {
            let mut document = self.model.get();
            let channel = sample_channel_mut(&mut document, id)?;
            if let Some(sample) = channel.sample_mut() {
                f(sample);
            }
        }
        self.model.swap(SwapType::Soft);
        Ok(())
    }
}

/// A channel that holds sample data: sample and preview channels.
fn sample_channel_mut(document: &mut Document, id: Id) -> Result<&mut Channel, EngineError> {
    let channel = document
        .channel_mut(id)
        .ok_or(EngineError::ChannelNotFound(id))?;
    if channel.sample().is_none() {
        return Err(EngineError::WrongChannelType {
            id,
            expected: ChannelType::Sample,
            actual: channel.channel_type(),
        });
    }
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs};

    use super::*;
    use crate::{
        audio::buffer::AudioBuffer,
        channel::ChannelStatus,
        midi::NullOutput,
        testutil::{shared_settings, test_engine, write_wav, SAMPLE_RATE},
    };

    #[test]
    fn test_new_creates_internal_channels() {
        let (engine, _) = test_engine();
        let document = engine.model().get();
        assert!(document.master_out().is_some());
        assert!(document.master_in().is_some());
        assert!(document
            .preview()
            .is_some_and(|preview| preview.shared.play_status.load() == ChannelStatus::Empty));
        assert_eq!(document.tracks().count(), 0);
        assert!(!engine.mixer().is_active());
    }

    #[test]
    fn test_new_rejects_empty_buffer() {
        let settings = SharedSettings {
            buffer_size: 0,
            ..shared_settings()
        };
        assert!(matches!(
            Engine::new(
                SAMPLE_RATE,
                settings,
                Arc::new(NullOutput),
                Arc::new(DirectPluginHost)
            ),
            Err(EngineError::InvalidBufferSize(0))
        ));
    }

    #[test]
    fn test_delete_channel() -> Result<(), EngineError> {
        let (engine, _) = test_engine();
        let group = engine.add_group("bus");
        let sample = engine.add_sample_channel("drums", SamplePlayerMode::LoopBasic)?;
        engine.set_group(sample, Some(group))?;
        engine
            .recorder()
            .live_rec(sample, crate::midi::event::MidiEvent::note_on(0, 0, 127), 0);

        engine.delete_channel(group)?;
        {
            let document = engine.model().get_rt();
            assert!(document.channel(group).is_none());
            assert_eq!(document.channel(sample).and_then(|ch| ch.group), None);
            assert!(!document.locked);
        }

        engine.delete_channel(sample)?;
        assert!(engine.model().get().actions.is_empty());
        assert!(matches!(
            engine.delete_channel(sample),
            Err(EngineError::ChannelNotFound(_))
        ));
        assert!(matches!(
            engine.delete_channel(PREVIEW_CHANNEL_ID),
            Err(EngineError::InternalChannel(PREVIEW_CHANNEL_ID))
        ));
        Ok(())
    }

    #[test]
    fn test_set_group_needs_group() -> Result<(), EngineError> {
        let (engine, _) = test_engine();
        let a = engine.add_sample_channel("a", SamplePlayerMode::SingleBasic)?;
        let b = engine.add_sample_channel("b", SamplePlayerMode::SingleBasic)?;
        assert!(matches!(
            engine.set_group(a, Some(b)),
            Err(EngineError::WrongChannelType {
                expected: ChannelType::Group,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_set_midi_output() -> Result<(), EngineError> {
        let (engine, _) = test_engine();
        let midi = engine.add_midi_channel("lead", MidiChannel::default());
        engine.set_midi_output(midi, true, 0x13)?;
        let output = engine
            .model()
            .get_rt()
            .channel(midi)
            .and_then(|channel| channel.midi().cloned());
        assert!(output.as_ref().is_some_and(|midi| midi.output_enabled));
        assert_eq!(output.map(|midi| midi.output_filter), Some(3));

        let group = engine.add_group("bus");
        assert!(matches!(
            engine.set_midi_output(group, true, 0),
            Err(EngineError::WrongChannelType { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_load_wave_and_range() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kick.wav");
        write_wav(&path, 2, SAMPLE_RATE, &[1000; 400])?;

        let (engine, _) = test_engine();
        let id = engine.add_sample_channel("kick", SamplePlayerMode::SingleBasic)?;
        engine.load_wave(id, &path)?;
        engine.set_range(id, 20, 150)?;

        let document = engine.model().get_rt();
        let channel = document.channel(id).ok_or("channel missing")?;
        let sample = channel.sample().ok_or("not a sample channel")?;
        assert_eq!(sample.wave.as_ref().map(|wave| wave.frames()), Some(200));
        assert_eq!((sample.begin, sample.end), (20, 150));
        assert_eq!(channel.shared.play_status.load(), ChannelStatus::Off);
        assert_eq!(channel.shared.tracker.load(), 20);

        assert!(engine.load_wave(id, &dir.path().join("missing.wav")).is_err());
        Ok(())
    }

    #[test]
    fn test_load_wave_converts_rate() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pad.wav");
        write_wav(&path, 1, SAMPLE_RATE / 2, &[4000; 300])?;

        let (engine, _) = test_engine();
        let id = engine.add_sample_channel("pad", SamplePlayerMode::LoopBasic)?;
        engine.load_wave(id, &path)?;

        let document = engine.model().get_rt();
        let sample = document
            .channel(id)
            .and_then(|channel| channel.sample())
            .ok_or("not a sample channel")?;
        let wave = sample.wave.as_ref().ok_or("no wave")?;
        assert_eq!(wave.rate(), SAMPLE_RATE);
        assert_eq!(wave.frames(), 600);
        assert_eq!(sample.end, 600);
        Ok(())
    }

    #[test]
    fn test_set_buffer_size() -> Result<(), EngineError> {
        let (engine, _) = test_engine();
        engine.set_streaming(true);
        assert!(matches!(
            engine.set_buffer_size(128),
            Err(EngineError::StreamRunning)
        ));
        engine.set_streaming(false);
        assert!(matches!(
            engine.set_buffer_size(0),
            Err(EngineError::InvalidBufferSize(0))
        ));

        engine.set_buffer_size(128)?;
        assert_eq!(engine.buffer_size(), 128);
        assert_eq!(engine.model().get_rt().buffer_size, 128);

        let mut renderer = engine.renderer();
        let mut out = AudioBuffer::new(128, 2);
        engine.enable();
        renderer.render(&mut out, None);
        Ok(())
    }

    #[test]
    fn test_rewind_sequencer_while_stopped() -> Result<(), EngineError> {
        let (engine, _) = test_engine();
        let mut renderer = engine.renderer();
        engine.enable();
        engine.start_sequencer();
        let mut out = AudioBuffer::new(64, 2);
        renderer.render(&mut out, None);
        engine.stop_sequencer();
        assert_eq!(engine.transport().current_frame(), 64);

        engine.rewind_sequencer()?;
        assert_eq!(engine.transport().current_frame(), 0);
        Ok(())
    }

    #[test]
    fn test_from_config() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_wav(&dir.path().join("drums.wav"), 2, 44100, &[500; 2000])?;
        let path = dir.path().join("loopdeck.yaml");
        fs::write(
            &path,
            r#"
audio:
  buffer_size: 128
sequencer:
  bpm: 100
  quantize: 2
channels:
  - type: group
    name: bus
    volume: 0.5
  - type: sample
    name: drums
    mode: loop_basic
    wave: drums.wav
    end: 800
    group: bus
    key: 36
  - type: midi
    name: lead
    output_channel: 3
    midi_in_channel: 1
"#,
        )?;
        let config = config::load(&path)?;
        let engine = Engine::from_config(&config, dir.path(), Arc::new(NullOutput))?;
        assert_eq!(engine.buffer_size(), 128);

        let document = engine.model().get_rt();
        assert_eq!(document.sequencer.bpm, 100.0);
        assert_eq!(document.sequencer.quantize, 2);

        let by_name = |name: &str| document.tracks().find(|channel| channel.name == name);
        let bus = by_name("bus").ok_or("missing bus")?;
        assert_eq!(bus.volume, 0.5);

        let drums = by_name("drums").ok_or("missing drums")?;
        assert_eq!(drums.group, Some(bus.id));
        assert_eq!(drums.midi_input.key, Some(36));
        let sample = drums.sample().ok_or("not a sample channel")?;
        assert_eq!(sample.mode, SamplePlayerMode::LoopBasic);
        assert_eq!(sample.end, 800);
        assert_eq!(drums.shared.play_status.load(), ChannelStatus::Off);

        let lead = by_name("lead").ok_or("missing lead")?;
        let midi = lead.midi().ok_or("not a MIDI channel")?;
        assert!(midi.output_enabled);
        assert_eq!(midi.output_filter, 3);
        assert_eq!(lead.midi_input.filter, Some(1));
        Ok(())
    }
}
