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
use std::{error::Error, fmt, sync::Arc};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use tracing::{error, info, span, Level};

use super::{
    buffer::AudioBuffer,
    thread_priority::{ThreadPlan, ThreadRole},
};
use crate::{engine::Engine, rendering::renderer::Renderer, Frame};

/// An output device as reported by cpal.
pub struct DeviceInfo {
    name: String,
    host_id: cpal::HostId,
    max_channels: u16,
}

impl DeviceInfo {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Lists output devices of every available host.
pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    let mut devices: Vec<DeviceInfo> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                devices.push(DeviceInfo {
                    name: device.name()?,
                    host_id,
                    max_channels,
                });
            }
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}

/// An open output stream driving the engine's renderer. The engine counts as
/// streaming until this is dropped.
pub struct Stream {
    name: String,
    engine: Arc<Engine>,
    stream: Option<cpal::Stream>,
}

impl Stream {
    /// Opens `device`, or the default output device, and starts rendering.
    pub fn start(engine: Arc<Engine>, device: Option<&str>) -> Result<Stream, Box<dyn Error>> {
        let span = span!(Level::INFO, "start stream (cpal)");
        let _enter = span.enter();

        let host = cpal::default_host();
        let device = match device {
            Some(name) => host
                .output_devices()?
                .find(|device| device.name().is_ok_and(|n| n.trim() == name))
                .ok_or_else(|| format!("no device found with name {}", name))?,
            None => host
                .default_output_device()
                .ok_or("no default output device")?,
        };
        let name = device.name()?;

        let config = cpal::StreamConfig {
            channels: engine.channels() as u16,
            sample_rate: engine.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(engine.buffer_size() as u32),
        };
        let sample_format = device.default_output_config()?.sample_format();

        engine.set_streaming(true);
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build::<f32>(&device, &config, &engine),
            cpal::SampleFormat::I16 => build::<i16>(&device, &config, &engine),
            cpal::SampleFormat::I32 => build::<i32>(&device, &config, &engine),
            cpal::SampleFormat::U16 => build::<u16>(&device, &config, &engine),
            other => Err(format!("unsupported sample format {}", other).into()),
        };
        let stream = match stream.and_then(|stream| {
            stream.play()?;
            Ok(stream)
        }) {
            Ok(stream) => stream,
            Err(e) => {
                engine.set_streaming(false);
                return Err(e);
            }
        };
        engine.enable();

        info!(
            device = name,
            sample_rate = config.sample_rate,
            buffer_size = engine.buffer_size(),
            format = %sample_format,
            "Output stream started."
        );
        Ok(Stream {
            name,
            engine,
            stream: Some(stream),
        })
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.engine.disable();
        // Stop the callback before the engine may resize buffers again.
        self.stream.take();
        self.engine.set_streaming(false);
        info!(device = self.name, "Output stream stopped.");
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    engine: &Engine,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: SizedSample + FromSample<f32>,
{
    let mut callback = Callback::new(
        engine.renderer(),
        engine.buffer_size(),
        engine.channels(),
    );
    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| callback.fill(data),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?)
}

/// Runs the renderer in whole blocks and hands the device as many frames as
/// it asks for, keeping the rest of a block for the next call.
struct Callback {
    renderer: Renderer,
    block: AudioBuffer,
    /// Next frame of `block` to hand out. Equal to the block size when empty.
    position: Frame,
    priority: ThreadPlan,
    /// The callback thread is only known once cpal first calls in.
    priority_set: bool,
}

impl Callback {
    fn new(renderer: Renderer, buffer_size: Frame, channels: usize) -> Callback {
        Callback {
            renderer,
            block: AudioBuffer::new(buffer_size, channels),
            position: buffer_size,
            priority: ThreadRole::AudioCallback.plan(),
            priority_set: false,
        }
    }

    fn fill<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T]) {
        if !self.priority_set {
            self.priority_set = true;
            self.priority.apply();
        }

        let channels = self.block.count_channels();
        for out in data.chunks_mut(channels) {
            if self.position >= self.block.count_frames() {
                self.renderer.render(&mut self.block, None);
                self.position = 0;
            }
            for (sample, value) in out.iter_mut().zip(self.block.frame(self.position)) {
                *sample = T::from_sample(*value);
            }
            self.position += 1;
        }
    }
}
