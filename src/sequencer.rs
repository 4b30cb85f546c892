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

//! The loop transport. Control threads start, stop and rewind it through
//! `Transport`; the audio thread turns each block into a list of timed events
//! with `Sequencer::advance`.

use std::{f32::consts::PI, fmt, sync::Arc};

use crate::{
    actions::Actions,
    audio::buffer::AudioBuffer,
    channel::shared::WeakAtomic,
    error::EngineError,
    quantizer::{Quantizer, QuantizerAction},
    Frame,
};

/// Quantizer action for a rewind on the next boundary.
pub const SEQUENCER_REWIND: QuantizerAction = 0;

const NO_REWIND: Frame = Frame::MAX;

/// Length of a metronome click in seconds.
const CLICK_SECONDS: f32 = 0.02;
const CLICK_BEAT_HZ: f32 = 880.0;
const CLICK_BAR_HZ: f32 = 1760.0;
const CLICK_GAIN: f32 = 0.5;

/// Tempo and grid. Lives in the document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SequencerSettings {
    pub bpm: f32,
    pub beats: u32,
    pub bars: u32,
    /// Subdivisions of a beat that quantized actions snap to. Zero disables
    /// quantization.
    pub quantize: u32,
    pub metronome: bool,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        SequencerSettings {
            bpm: 120.0,
            beats: 4,
            bars: 1,
            quantize: 0,
            metronome: false,
        }
    }
}

impl SequencerSettings {
    pub fn frames_in_beat(&self, sample_rate: u32) -> Frame {
        if self.bpm <= 0.0 {
            return 0;
        }
        (sample_rate as f32 * 60.0 / self.bpm) as Frame
    }

    pub fn frames_in_loop(&self, sample_rate: u32) -> Frame {
        self.frames_in_beat(sample_rate) * self.beats as Frame
    }

    pub fn frames_in_bar(&self, sample_rate: u32) -> Frame {
        self.frames_in_loop(sample_rate) / self.bars.max(1) as Frame
    }

    /// Distance between quantization boundaries, zero when disabled.
    pub fn quantizer_step(&self, sample_rate: u32) -> Frame {
        if self.quantize == 0 {
            return 0;
        }
        self.frames_in_beat(sample_rate) / self.quantize as Frame
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    /// The loop starts over.
    FirstBeat,
    Bar,
    /// The transport jumped back to the start.
    Rewind,
    /// Recorded actions sit on this frame.
    Actions,
}

/// Something that happens at `delta` frames into the current block.
/// `global_frame` is the loop position, used to look up actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub event_type: EventType,
    pub delta: Frame,
    pub global_frame: Frame,
}

/// Transport state shared between control threads and the audio thread.
pub struct Transport {
    running: WeakAtomic<bool>,
    current_frame: WeakAtomic<Frame>,
    rewind_at: WeakAtomic<Frame>,
    quantizer: Quantizer<Transport>,
}

impl Transport {
    pub fn new() -> Transport {
        let mut quantizer = Quantizer::new();
        quantizer.schedule(SEQUENCER_REWIND, |transport: &Transport, delta| {
            transport.rewind_at.store(delta)
        });
        Transport {
            running: WeakAtomic::new(false),
            current_frame: WeakAtomic::new(0),
            rewind_at: WeakAtomic::new(NO_REWIND),
            quantizer,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load()
    }

    pub fn start(&self) {
        self.running.store(true);
    }

    pub fn stop(&self) {
        self.running.store(false);
    }

    pub fn current_frame(&self) -> Frame {
        self.current_frame.load()
    }

    /// Jumps back to the start of the loop. While running the jump happens on
    /// the audio thread, on the next quantization boundary if `quantized`.
    pub fn rewind(&self, quantized: bool) -> Result<(), EngineError> {
        if !self.is_running() {
            self.current_frame.store(0);
            return Ok(());
        }
        if quantized {
            return self.quantizer.trigger(SEQUENCER_REWIND);
        }
        self.rewind_at.store(0);
        Ok(())
    }

    fn take_rewind(&self) -> Option<Frame> {
        let at = self.rewind_at.load();
        if at == NO_REWIND {
            return None;
        }
        self.rewind_at.store(NO_REWIND);
        Some(at)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::new()
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("running", &self.running)
            .field("current_frame", &self.current_frame)
            .field("quantizer", &self.quantizer)
            .finish()
    }
}

struct Click {
    bar: bool,
    position: usize,
}

/// Beat and bar clicks mixed into the output.
struct Metronome {
    beat: Vec<f32>,
    bar: Vec<f32>,
    click: Option<Click>,
}

impl Metronome {
    fn new(sample_rate: u32) -> Metronome {
        let frames = (sample_rate as f32 * CLICK_SECONDS) as usize;
        let tone = |hz: f32| -> Vec<f32> {
            (0..frames)
                .map(|i| {
                    let t = i as f32 / sample_rate as f32;
                    let envelope = 1.0 - i as f32 / frames as f32;
                    (2.0 * PI * hz * t).sin() * envelope * envelope * CLICK_GAIN
                })
                .collect()
        };
        Metronome {
            beat: tone(CLICK_BEAT_HZ),
            bar: tone(CLICK_BAR_HZ),
            click: None,
        }
    }

    fn render(&mut self, out: &mut AudioBuffer, start: Frame, beat: Frame, bar: Frame, total: Frame) {
        if beat == 0 || total == 0 {
            return;
        }
        let bar = bar.max(1);
        let mut frame = start;
        for i in 0..out.count_frames() {
            if frame % beat == 0 {
                self.click = Some(Click {
                    bar: frame % bar == 0,
                    position: 0,
                });
            }
            if let Some(click) = &mut self.click {
                let table = if click.bar { &self.bar } else { &self.beat };
                match table.get(click.position) {
                    Some(sample) => {
                        out.frame_mut(i).iter_mut().for_each(|s| *s += *sample);
                        click.position += 1;
                    }
                    None => self.click = None,
                }
            }
            frame = (frame + 1) % total;
        }
    }
}

/// The audio thread side of the transport.
pub struct Sequencer {
    transport: Arc<Transport>,
    sample_rate: u32,
    events: Vec<Event>,
    block_start: Frame,
    metronome: Metronome,
}

impl Sequencer {
    pub fn new(transport: Arc<Transport>, sample_rate: u32, buffer_size: Frame) -> Sequencer {
        Sequencer {
            transport,
            sample_rate,
            // Worst case: a grid event and an action event on every frame,
            // plus one rewind.
            events: Vec::with_capacity(buffer_size * 2 + 1),
            block_start: 0,
            metronome: Metronome::new(sample_rate),
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Moves the transport forward by `frames` and returns the events that
    /// fall into this block, ordered by delta.
    pub fn advance(
        &mut self,
        settings: &SequencerSettings,
        frames: Frame,
        actions: &Actions,
    ) -> &[Event] {
        self.events.clear();

        let total = settings.frames_in_loop(self.sample_rate);
        if total == 0 {
            return &self.events;
        }
        let bar = settings.frames_in_bar(self.sample_rate).max(1);
        let start = self.transport.current_frame.load() % total;
        self.block_start = start;

        let step = settings.quantizer_step(self.sample_rate);
        self.transport
            .quantizer
            .advance(start..start + frames, step, &self.transport);
        let rewind_at = self.transport.take_rewind();

        let mut frame = start;
        for delta in 0..frames {
            if rewind_at == Some(delta) {
                frame = 0;
                self.push(EventType::Rewind, delta, 0);
            }
            if frame == 0 {
                self.push(EventType::FirstBeat, delta, frame);
            } else if frame % bar == 0 {
                self.push(EventType::Bar, delta, frame);
            }
            if !actions.on_frame(frame).is_empty() {
                self.push(EventType::Actions, delta, frame);
            }
            frame = (frame + 1) % total;
        }
        self.transport.current_frame.store(frame);

        &self.events
    }

    /// Loop position at the start of the last advanced block.
    pub fn block_start(&self) -> Frame {
        self.block_start
    }

    /// Events produced by the last `advance`.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Mixes the metronome for the block produced by the last `advance`.
    pub fn render_metronome(&mut self, out: &mut AudioBuffer, settings: &SequencerSettings) {
        if !settings.metronome {
            return;
        }
        self.metronome.render(
            out,
            self.block_start,
            settings.frames_in_beat(self.sample_rate),
            settings.frames_in_bar(self.sample_rate),
            settings.frames_in_loop(self.sample_rate),
        );
    }

    fn push(&mut self, event_type: EventType, delta: Frame, global_frame: Frame) {
        if self.events.len() < self.events.capacity() {
            self.events.push(Event {
                event_type,
                delta,
                global_frame,
            });
        }
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("transport", &self.transport)
            .field("sample_rate", &self.sample_rate)
            .field("events", &self.events.len())
            .finish()
    }
}
