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
//! Fixtures shared by the unit tests.

use std::{error::Error, path::Path, sync::Arc};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::{
    audio::buffer::AudioBuffer,
    channel::{shared::SharedSettings, ChannelShared},
    engine::Engine,
    midi::{event::MidiEvent, mock::RecordingOutput},
    plugin::{DirectPluginHost, Plugin},
    resampler::ResamplerQuality,
    wave::Wave,
};

pub const SAMPLE_RATE: u32 = 44100;

pub fn shared_settings() -> SharedSettings {
    SharedSettings {
        buffer_size: 64,
        channels: 2,
        midi_queue_size: 128,
        render_queue_size: 16,
        resampler_quality: ResamplerQuality::Linear,
    }
}

/// A stereo wave where every sample is non-zero and unique. Left is positive,
/// right is the negated left.
pub fn test_wave(frames: usize) -> Arc<Wave> {
    let mut data = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let value = (i + 1) as f32 / (frames + 1) as f32;
        data.push(value);
        data.push(-value);
    }
    Arc::new(Wave::new(
        1,
        AudioBuffer::from_interleaved(data, 2),
        SAMPLE_RATE,
        Path::new("test.wav"),
    ))
}

pub fn sample_shared() -> ChannelShared {
    ChannelShared::new_sample(&shared_settings()).expect("sample channel state")
}

pub fn midi_shared() -> ChannelShared {
    ChannelShared::new(&shared_settings())
}

/// An engine on the test settings, recording what it sends to MIDI out.
pub fn test_engine() -> (Engine, Arc<RecordingOutput>) {
    let output = Arc::new(RecordingOutput::new());
    let engine = Engine::new(
        SAMPLE_RATE,
        shared_settings(),
        output.clone(),
        Arc::new(DirectPluginHost),
    )
    .expect("engine");
    (engine, output)
}

/// Writes 16 bit interleaved samples to a wav file.
pub fn write_wav(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
) -> Result<(), Box<dyn Error>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Remembers the last block it saw.
pub struct RecordingPlugin {
    name: String,
    last_peak: Mutex<f32>,
    midi: Mutex<Vec<MidiEvent>>,
}

impl RecordingPlugin {
    pub fn new(name: &str) -> RecordingPlugin {
        RecordingPlugin {
            name: name.to_string(),
            last_peak: Mutex::new(0.0),
            midi: Mutex::new(Vec::new()),
        }
    }

    pub fn last_peak(&self) -> f32 {
        *self.last_peak.lock()
    }

    pub fn midi(&self) -> Vec<MidiEvent> {
        self.midi.lock().clone()
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, buffer: &mut AudioBuffer, midi: &[MidiEvent]) {
        let peak = buffer.peak();
        *self.last_peak.lock() = peak.left.max(peak.right);
        self.midi.lock().extend_from_slice(midi);
    }
}
