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
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    audio::buffer::{AudioBuffer, Peak},
    error::EngineError,
    midi::event::MidiEvent,
    quantizer::Quantizer,
    rendering::sample_reactions,
    resampler::{Resampler, ResamplerQuality},
    Frame,
};

/// Playback or recording status of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    Empty,
    Off,
    Wait,
    Play,
    Ending,
}

/// A value that fits in 64 bits and can live in a `WeakAtomic`.
pub trait AtomicValue: Copy {
    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

impl AtomicValue for bool {
    fn to_bits(self) -> u64 {
        self as u64
    }

    fn from_bits(bits: u64) -> Self {
        bits != 0
    }
}

impl AtomicValue for usize {
    fn to_bits(self) -> u64 {
        self as u64
    }

    fn from_bits(bits: u64) -> Self {
        bits as usize
    }
}

impl AtomicValue for f32 {
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl AtomicValue for ChannelStatus {
    fn to_bits(self) -> u64 {
        match self {
            ChannelStatus::Empty => 0,
            ChannelStatus::Off => 1,
            ChannelStatus::Wait => 2,
            ChannelStatus::Play => 3,
            ChannelStatus::Ending => 4,
        }
    }

    fn from_bits(bits: u64) -> Self {
        match bits {
            1 => ChannelStatus::Off,
            2 => ChannelStatus::Wait,
            3 => ChannelStatus::Play,
            4 => ChannelStatus::Ending,
            _ => ChannelStatus::Empty,
        }
    }
}

impl AtomicValue for Peak {
    fn to_bits(self) -> u64 {
        (f32::to_bits(self.left) as u64) << 32 | f32::to_bits(self.right) as u64
    }

    fn from_bits(bits: u64) -> Self {
        Peak {
            left: f32::from_bits((bits >> 32) as u32),
            right: f32::from_bits(bits as u32),
        }
    }
}

/// A relaxed atomic cell. Readers on the audio thread poll it once per
/// block, so no ordering with other memory is promised.
pub struct WeakAtomic<T> {
    bits: AtomicU64,
    _value: PhantomData<T>,
}

impl<T: AtomicValue> WeakAtomic<T> {
    pub fn new(value: T) -> WeakAtomic<T> {
        WeakAtomic {
            bits: AtomicU64::new(value.to_bits()),
            _value: PhantomData,
        }
    }

    pub fn load(&self) -> T {
        T::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: T) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl<T: AtomicValue + fmt::Debug> fmt::Debug for WeakAtomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.load().fmt(f)
    }
}

/// How a sample channel renders the current block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Normal,
    Rewind,
    Stop,
}

/// A deferred playback transition that takes effect `offset` frames into the
/// block that consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderCommand {
    pub mode: RenderMode,
    pub offset: Frame,
}

impl RenderCommand {
    pub fn new(mode: RenderMode, offset: Frame) -> RenderCommand {
        RenderCommand { mode, offset }
    }
}

/// Sizes used when building shared channel state.
#[derive(Clone, Copy, Debug)]
pub struct SharedSettings {
    pub buffer_size: Frame,
    pub channels: usize,
    pub midi_queue_size: usize,
    pub render_queue_size: usize,
    pub resampler_quality: ResamplerQuality,
}

/// Scratch data touched only by whoever renders the channel.
pub struct RenderState {
    /// The channel's output for the current block.
    pub audio_buffer: AudioBuffer,
    /// MIDI events drained from the queue for the plugin stage.
    pub midi_buffer: Vec<MidiEvent>,
    /// Pitch shifter, sample channels only.
    pub resampler: Option<Resampler>,
}

/// Per-channel state shared between control threads and the audio thread.
/// It outlives document swaps: every copy of a channel points at the same
/// instance.
pub struct ChannelShared {
    /// Read position inside the wave.
    pub tracker: WeakAtomic<Frame>,
    pub play_status: WeakAtomic<ChannelStatus>,
    pub rec_status: WeakAtomic<ChannelStatus>,
    /// Whether recorded actions are replayed.
    pub read_actions: WeakAtomic<bool>,
    /// Gain taken from note velocity.
    pub volume_internal: WeakAtomic<f32>,
    /// Sample channels only.
    pub quantizer: Option<Quantizer<ChannelShared>>,
    /// Last status light sent, see `lightning::status_code`.
    pub lit: WeakAtomic<usize>,

    midi_sender: Sender<MidiEvent>,
    midi_receiver: Receiver<MidiEvent>,
    render_queue: Option<(Sender<RenderCommand>, Receiver<RenderCommand>)>,
    render_state: Mutex<RenderState>,
}

impl ChannelShared {
    /// Shared state for every channel type except sample channels.
    pub fn new(settings: &SharedSettings) -> ChannelShared {
        let (midi_sender, midi_receiver) = crossbeam_channel::bounded(settings.midi_queue_size);
        ChannelShared {
            tracker: WeakAtomic::new(0),
            play_status: WeakAtomic::new(ChannelStatus::Off),
            rec_status: WeakAtomic::new(ChannelStatus::Off),
            read_actions: WeakAtomic::new(false),
            volume_internal: WeakAtomic::new(1.0),
            quantizer: None,
            lit: WeakAtomic::new(usize::MAX),
            midi_sender,
            midi_receiver,
            render_queue: None,
            render_state: Mutex::new(RenderState {
                audio_buffer: AudioBuffer::new(settings.buffer_size, settings.channels),
                midi_buffer: Vec::with_capacity(settings.midi_queue_size),
                resampler: None,
            }),
        }
    }

    /// Shared state for a sample channel, with render queue, quantizer and
    /// resampler. The channel starts out empty.
    pub fn new_sample(settings: &SharedSettings) -> Result<ChannelShared, EngineError> {
        let mut shared = ChannelShared::new(settings);
        shared.play_status.store(ChannelStatus::Empty);
        shared.render_queue = Some(crossbeam_channel::bounded(settings.render_queue_size));
        shared.quantizer = Some(sample_reactions::quantizer());
        shared.render_state.get_mut().resampler = Some(Resampler::new(
            settings.resampler_quality,
            settings.channels,
        )?);
        Ok(shared)
    }

    pub fn is_playing(&self) -> bool {
        matches!(
            self.play_status.load(),
            ChannelStatus::Play | ChannelStatus::Ending
        )
    }

    /// Queues a MIDI event for the next block. Returns false when the queue
    /// is full and the event was dropped.
    pub fn push_midi(&self, event: MidiEvent) -> bool {
        self.midi_sender.try_send(event).is_ok()
    }

    /// Moves every queued MIDI event into `buffer`, replacing its contents.
    pub fn drain_midi(&self, buffer: &mut Vec<MidiEvent>) {
        buffer.clear();
        while buffer.len() < buffer.capacity() {
            match self.midi_receiver.try_recv() {
                Ok(event) => buffer.push(event),
                Err(_) => break,
            }
        }
    }

    /// Queues a render command. Returns false for channels without a render
    /// queue or when the queue is full.
    pub fn push_render_command(&self, command: RenderCommand) -> bool {
        match &self.render_queue {
            Some((sender, _)) => sender.try_send(command).is_ok(),
            None => false,
        }
    }

    /// Empties the render queue and returns the newest command.
    pub fn take_render_command(&self) -> Option<RenderCommand> {
        let (_, receiver) = self.render_queue.as_ref()?;
        let mut last = None;
        while let Ok(command) = receiver.try_recv() {
            last = Some(command);
        }
        last
    }

    /// Scratch state for rendering. Never waits: returns None if someone else
    /// holds it, which only happens while the buffer is being resized.
    pub fn render_state(&self) -> Option<MutexGuard<'_, RenderState>> {
        self.render_state.try_lock()
    }

    /// Reallocates the channel buffer. The audio callback must be stopped.
    pub fn set_buffer_size(&self, frames: Frame, channels: usize) {
        self.render_state.lock().audio_buffer.alloc(frames, channels);
    }
}

impl fmt::Debug for ChannelShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelShared")
            .field("tracker", &self.tracker)
            .field("play_status", &self.play_status)
            .field("rec_status", &self.rec_status)
            .field("read_actions", &self.read_actions)
            .field("volume_internal", &self.volume_internal)
            .field("quantizer", &self.quantizer)
            .field("lit", &self.lit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn settings() -> SharedSettings {
        SharedSettings {
            buffer_size: 64,
            channels: 2,
            midi_queue_size: 128,
            render_queue_size: 4,
            resampler_quality: ResamplerQuality::Linear,
        }
    }

    #[test]
    fn test_weak_atomic_values() {
        let volume = WeakAtomic::new(0.25f32);
        assert_eq!(volume.load(), 0.25);
        volume.store(-1.5);
        assert_eq!(volume.load(), -1.5);

        let status = WeakAtomic::new(ChannelStatus::Wait);
        status.store(ChannelStatus::Ending);
        assert_eq!(status.load(), ChannelStatus::Ending);

        let peak = WeakAtomic::new(Peak {
            left: 0.5,
            right: 0.75,
        });
        assert_eq!(
            peak.load(),
            Peak {
                left: 0.5,
                right: 0.75
            }
        );
    }

    #[test]
    fn test_concurrent_midi_producers() {
        let shared = Arc::new(ChannelShared::new(&settings()));
        let producers = 8;
        let per_producer = 16;

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for n in 0..per_producer {
                        assert!(shared.push_midi(MidiEvent::note_on(p as u8, n as u8, 100)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("producer panicked");
        }

        let mut buffer = Vec::with_capacity(128);
        shared.drain_midi(&mut buffer);
        assert_eq!(buffer.len(), producers * per_producer);
        for p in 0..producers as u8 {
            let notes: Vec<u8> = buffer
                .iter()
                .filter(|e| e.channel() == p)
                .map(|e| e.note())
                .collect();
            // Each producer's events arrive in order and intact.
            assert_eq!(notes, (0..per_producer as u8).collect::<Vec<_>>());
        }
        assert!(buffer.iter().all(|e| e.velocity() == 100 && e.status() == 0x90));
    }

    #[test]
    fn test_full_midi_queue_drops() {
        let mut settings = settings();
        settings.midi_queue_size = 2;
        let shared = ChannelShared::new(&settings);
        assert!(shared.push_midi(MidiEvent::note_on(0, 1, 1)));
        assert!(shared.push_midi(MidiEvent::note_on(0, 2, 1)));
        assert!(!shared.push_midi(MidiEvent::note_on(0, 3, 1)));
    }

    #[test]
    fn test_render_queue_last_command_wins() -> Result<(), EngineError> {
        let shared = ChannelShared::new_sample(&settings())?;
        assert_eq!(shared.play_status.load(), ChannelStatus::Empty);
        assert!(shared.push_render_command(RenderCommand::new(RenderMode::Normal, 10)));
        assert!(shared.push_render_command(RenderCommand::new(RenderMode::Stop, 20)));
        assert_eq!(
            shared.take_render_command(),
            Some(RenderCommand::new(RenderMode::Stop, 20))
        );
        assert_eq!(shared.take_render_command(), None);
        Ok(())
    }

    #[test]
    fn test_render_queue_only_for_samples() {
        let shared = ChannelShared::new(&settings());
        assert!(!shared.push_render_command(RenderCommand::new(RenderMode::Normal, 0)));
        assert!(shared.quantizer.is_none());
    }

    #[test]
    fn test_set_buffer_size() {
        let shared = ChannelShared::new(&settings());
        shared.set_buffer_size(256, 2);
        let state = shared.render_state().expect("state should be free");
        assert_eq!(state.audio_buffer.count_frames(), 256);
    }
}
