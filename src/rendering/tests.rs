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
//! Whole-engine scenarios: control calls on one side, rendered blocks on the
//! other.

use std::sync::Arc;

use super::sample_advance;
use crate::{
    audio::buffer::AudioBuffer,
    channel::{
        ChannelShared, ChannelStatus, MidiChannel, RenderCommand, RenderMode, SamplePlayerMode,
        PREVIEW_CHANNEL_ID,
    },
    engine::Engine,
    error::EngineError,
    midi::{
        event::MidiEvent,
        lightning::{LearntSlot, LightMessage, MidiLightning, MidiMap},
    },
    mixer::MixerSettings,
    rendering::{renderer::Renderer, sample_reactions},
    sequencer::{Event, EventType, SequencerSettings},
    testutil::{sample_shared, test_engine, test_wave},
    Frame, Id,
};

const BLOCK: usize = 64;
const WAVE_FRAMES: usize = 1000;

/// A one beat loop of 4410 frames.
fn short_loop() -> SequencerSettings {
    SequencerSettings {
        bpm: 600.0,
        beats: 1,
        bars: 1,
        quantize: 0,
        metronome: false,
    }
}

fn shared(engine: &Engine, id: Id) -> Arc<ChannelShared> {
    engine
        .model()
        .get()
        .channel(id)
        .map(|channel| channel.shared.clone())
        .expect("channel exists")
}

fn add_sample(engine: &Engine, name: &str, mode: SamplePlayerMode) -> Result<Id, EngineError> {
    let id = engine.add_sample_channel(name, mode)?;
    engine.set_wave(id, Some(test_wave(WAVE_FRAMES)))?;
    Ok(id)
}

fn render(renderer: &mut Renderer) -> AudioBuffer {
    let mut out = AudioBuffer::new(BLOCK, 2);
    renderer.render(&mut out, None);
    out
}

fn render_with_input(renderer: &mut Renderer, input: &AudioBuffer) -> AudioBuffer {
    let mut out = AudioBuffer::new(BLOCK, 2);
    renderer.render(&mut out, Some(input));
    out
}

fn render_blocks(renderer: &mut Renderer, blocks: usize) {
    for _ in 0..blocks {
        render(renderer);
    }
}

/// Left sample of `test_wave(WAVE_FRAMES)` at `frame`.
fn wave_left(frame: Frame) -> f32 {
    (frame + 1) as f32 / (WAVE_FRAMES + 1) as f32
}

fn is_silent(out: &AudioBuffer) -> bool {
    out.as_slice().iter().all(|sample| *sample == 0.0)
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_kill_while_playing_rewinds() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let id = add_sample(&engine, "pause", SamplePlayerMode::SingleBasicPause)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().key_press(id, 1.0)?;
    render(&mut renderer);
    assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    shared.tracker.store(500);

    engine.reactor().key_kill(id)?;
    let out = render(&mut renderer);
    assert!(is_silent(&out));
    assert_eq!(shared.play_status.load(), ChannelStatus::Off);
    assert_eq!(shared.tracker.load(), 0);
    Ok(())
}

#[test]
fn test_pause_and_resume() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let id = add_sample(&engine, "pause", SamplePlayerMode::SingleBasicPause)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().key_press(id, 1.0)?;
    render_blocks(&mut renderer, 2);
    engine.reactor().key_press(id, 1.0)?;
    let out = render(&mut renderer);
    assert!(is_silent(&out));
    assert_eq!(shared.play_status.load(), ChannelStatus::Off);
    assert_eq!(shared.tracker.load(), 2 * BLOCK);

    engine.reactor().key_press(id, 1.0)?;
    let out = render(&mut renderer);
    assert_eq!(out.frame(0)[0], wave_left(2 * BLOCK));
    Ok(())
}

#[test]
fn test_kill_while_paused_rewinds() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let id = add_sample(&engine, "pause", SamplePlayerMode::SingleBasicPause)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().key_press(id, 1.0)?;
    render_blocks(&mut renderer, 2);
    engine.reactor().key_press(id, 1.0)?;
    render(&mut renderer);
    assert_eq!(shared.play_status.load(), ChannelStatus::Off);
    assert_eq!(shared.tracker.load(), 2 * BLOCK);

    engine.reactor().key_kill(id)?;
    render(&mut renderer);
    assert_eq!(shared.tracker.load(), 0);

    engine.reactor().key_press(id, 1.0)?;
    let out = render(&mut renderer);
    assert_eq!(out.frame(0)[0], wave_left(0));
    Ok(())
}

#[test]
fn test_input_take_becomes_wave_of_empty_armed_channel() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    engine.set_sequencer(short_loop());
    let empty = engine.add_sample_channel("take", SamplePlayerMode::LoopBasic)?;
    let loaded = add_sample(&engine, "loaded", SamplePlayerMode::LoopBasic)?;
    engine.reactor().set_armed(loaded, true)?;
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().set_armed(empty, true)?;
    engine.start_sequencer();
    assert!(engine.start_input_rec());
    let input = AudioBuffer::from_interleaved(vec![0.25; BLOCK * 2], 2);
    for _ in 0..60 {
        render_with_input(&mut renderer, &input);
    }
    assert_eq!(engine.stop_input_rec()?, vec![empty]);

    let document = engine.model().get_rt();
    let channel = document.channel(empty).expect("channel exists");
    let wave = channel
        .sample()
        .and_then(|sample| sample.wave.clone())
        .expect("take stored");
    assert_eq!(wave.frames(), 4410);
    assert_eq!(wave.buffer().frame(0), &[0.25, 0.25]);
    assert_eq!(wave.buffer().frame(60 * BLOCK - 1), &[0.25, 0.25]);
    assert_eq!(wave.buffer().frame(60 * BLOCK), &[0.0, 0.0]);
    assert_eq!(channel.shared.play_status.load(), ChannelStatus::Off);

    // Loaded channels are left alone without overdub.
    let kept = document
        .channel(loaded)
        .and_then(|channel| channel.sample())
        .and_then(|sample| sample.wave.as_ref())
        .map(|wave| wave.frames());
    assert_eq!(kept, Some(WAVE_FRAMES));
    drop(document);

    // Every armed channel holds a wave now.
    assert!(!engine.start_input_rec());
    Ok(())
}

#[test]
fn test_input_overdub_keeps_playing() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    engine.set_sequencer(short_loop());
    engine.set_mixer_settings(MixerSettings {
        overdub: true,
        ..MixerSettings::default()
    });
    let id = add_sample(&engine, "dub", SamplePlayerMode::SingleBasic)?;
    engine.set_range(id, 100, 900)?;
    engine.reactor().set_armed(id, true)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();
    engine.start_sequencer();

    assert!(engine.start_input_rec());
    engine.reactor().key_press(id, 1.0)?;
    let input = AudioBuffer::from_interleaved(vec![0.25; BLOCK * 2], 2);
    for _ in 0..4 {
        render_with_input(&mut renderer, &input);
    }
    assert_eq!(engine.stop_input_rec()?, vec![id]);
    assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    assert_eq!(shared.tracker.load(), 100 + 4 * BLOCK);

    {
        let document = engine.model().get_rt();
        let sample = document
            .channel(id)
            .and_then(|channel| channel.sample())
            .expect("sample channel");
        assert_eq!((sample.begin, sample.end), (100, 900));
        let wave = sample.wave.as_ref().expect("wave kept");
        assert_eq!(wave.frames(), WAVE_FRAMES);
        assert_close(wave.buffer().frame(0)[0], wave_left(0) + 0.25);
        assert_close(wave.buffer().frame(600)[0], wave_left(600));
    }

    let out = render(&mut renderer);
    assert_close(out.frame(0)[0], wave_left(100 + 4 * BLOCK));
    Ok(())
}

#[test]
fn test_status_lights_follow_channel() -> Result<(), EngineError> {
    let (engine, output) = test_engine();
    let light = |velocity| LightMessage {
        channel: 0,
        status: 0x90,
        data1: 0,
        data2: velocity,
        learnt: LearntSlot::Data1,
    };
    engine.set_midi_map(MidiMap {
        stopped: Some(light(0)),
        playing: Some(light(127)),
        playing_inaudible: Some(light(20)),
        ..MidiMap::default()
    });
    let id = add_sample(&engine, "lit", SamplePlayerMode::SingleBasic)?;
    let dark = add_sample(&engine, "dark", SamplePlayerMode::SingleBasic)?;
    engine.set_midi_lightning(
        id,
        MidiLightning {
            enabled: true,
            playing: Some(36),
            ..MidiLightning::default()
        },
    )?;
    let mut renderer = engine.renderer();
    engine.enable();

    // Sent once, then only on changes.
    render_blocks(&mut renderer, 2);
    assert_eq!(output.events(), vec![MidiEvent::note_on(0, 36, 0)]);

    engine.reactor().key_press(id, 1.0)?;
    engine.reactor().key_press(dark, 1.0)?;
    render(&mut renderer);
    engine.reactor().toggle_mute(id)?;
    render_blocks(&mut renderer, 2);
    assert_eq!(
        output.events(),
        vec![
            MidiEvent::note_on(0, 36, 0),
            MidiEvent::note_on(0, 36, 127),
            MidiEvent::note_on(0, 36, 20),
        ]
    );
    Ok(())
}

#[test]
fn test_press_twice_in_one_block_is_silent() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let id = add_sample(&engine, "single", SamplePlayerMode::SingleBasic)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().key_press(id, 1.0)?;
    engine.reactor().key_press(id, 1.0)?;
    let out = render(&mut renderer);
    assert!(is_silent(&out));
    assert_eq!(shared.play_status.load(), ChannelStatus::Off);
    assert_eq!(shared.tracker.load(), 0);
    Ok(())
}

#[test]
fn test_midi_channel_follows_first_beat() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    engine.set_sequencer(short_loop());
    let id = engine.add_midi_channel("midi", MidiChannel::new(true, 0));
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();
    engine.start_sequencer();

    engine.reactor().key_press(id, 1.0)?;
    assert_eq!(shared.play_status.load(), ChannelStatus::Wait);
    render(&mut renderer);
    assert_eq!(shared.play_status.load(), ChannelStatus::Play);

    // Ending and back before the loop comes around keeps it playing.
    engine.reactor().key_press(id, 1.0)?;
    assert_eq!(shared.play_status.load(), ChannelStatus::Ending);
    engine.reactor().key_press(id, 1.0)?;
    render_blocks(&mut renderer, 100);
    assert_eq!(shared.play_status.load(), ChannelStatus::Play);

    engine.reactor().key_press(id, 1.0)?;
    render_blocks(&mut renderer, 100);
    assert_eq!(shared.play_status.load(), ChannelStatus::Off);
    Ok(())
}

#[test]
fn test_loop_once_bar_starts_on_bar() {
    let shared = sample_shared();
    sample_reactions::set_wave_loaded(&shared, true, 0);
    shared.play_status.store(ChannelStatus::Wait);

    let bar = Event {
        event_type: EventType::Bar,
        delta: 10,
        global_frame: 1000,
    };
    sample_advance::advance(4, &shared, SamplePlayerMode::LoopOnceBar, &bar, &[]);
    assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    assert_eq!(
        shared.take_render_command(),
        Some(RenderCommand::new(RenderMode::Normal, 10))
    );
}

#[test]
fn test_quantized_press_waits_for_boundary() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    engine.set_sequencer(SequencerSettings {
        quantize: 1,
        ..short_loop()
    });
    let id = add_sample(&engine, "quantized", SamplePlayerMode::SingleBasic)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();
    engine.start_sequencer();
    render(&mut renderer);

    engine.reactor().key_press(id, 1.0)?;
    render(&mut renderer);
    assert_eq!(shared.play_status.load(), ChannelStatus::Off);

    // 4410 frames to the next beat.
    render_blocks(&mut renderer, 4410 / BLOCK);
    assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    Ok(())
}

#[test]
fn test_groups_mute_and_solo() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let a = add_sample(&engine, "a", SamplePlayerMode::SingleEndless)?;
    let b = add_sample(&engine, "b", SamplePlayerMode::SingleEndless)?;
    let group = engine.add_group("bus");
    engine.set_group(b, Some(group))?;
    for id in [a, b, group] {
        engine.reactor().set_volume(id, 0.5)?;
    }
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().key_press(a, 1.0)?;
    engine.reactor().key_press(b, 1.0)?;
    let out = render(&mut renderer);
    assert_close(out.frame(0)[0], wave_left(0) * 0.75);
    assert_close(out.frame(0)[1], -wave_left(0) * 0.75);

    assert!(engine.reactor().toggle_solo(a)?);
    let out = render(&mut renderer);
    assert_close(out.frame(0)[0], wave_left(BLOCK) * 0.5);

    assert!(engine.reactor().toggle_mute(a)?);
    assert!(is_silent(&render(&mut renderer)));
    Ok(())
}

#[test]
fn test_locked_document_skips_tracks() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let id = add_sample(&engine, "single", SamplePlayerMode::SingleBasic)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.enable();
    engine.reactor().key_press(id, 1.0)?;

    let lock = engine.model().lock();
    assert!(is_silent(&render(&mut renderer)));
    assert_eq!(shared.tracker.load(), 0);
    drop(lock);

    let out = render(&mut renderer);
    assert_eq!(out.frame(0)[0], wave_left(0));
    assert_eq!(shared.tracker.load(), BLOCK);
    Ok(())
}

#[test]
fn test_inactive_mixer_renders_silence() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    let id = add_sample(&engine, "single", SamplePlayerMode::SingleBasic)?;
    let shared = shared(&engine, id);
    let mut renderer = engine.renderer();
    engine.reactor().key_press(id, 1.0)?;

    assert!(is_silent(&render(&mut renderer)));
    assert_eq!(shared.tracker.load(), 0);

    engine.enable();
    assert!(!is_silent(&render(&mut renderer)));
    Ok(())
}

#[test]
fn test_preview_plays_while_tracks_are_locked() -> Result<(), EngineError> {
    let (engine, _) = test_engine();
    engine.set_wave(PREVIEW_CHANNEL_ID, Some(test_wave(WAVE_FRAMES)))?;
    let mut renderer = engine.renderer();
    engine.enable();

    engine.reactor().key_press(PREVIEW_CHANNEL_ID, 1.0)?;
    let _lock = engine.model().lock();
    let out = render(&mut renderer);
    assert_eq!(out.frame(0)[0], wave_left(0));
    Ok(())
}
