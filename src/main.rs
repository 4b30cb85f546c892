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
use std::{error::Error, path::Path, sync::Arc, thread};

use clap::{crate_version, Parser, Subcommand};
use loopdeck::{
    audio::{self, thread_priority::ThreadRole},
    config,
    engine::Engine,
    midi::{self, event::MidiEvent},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A loop-based sample and MIDI channel player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads a configuration and its waves without opening any device.
    Check {
        /// The path to the engine config.
        config_path: String,
    },
    /// Starts the engine and plays until interrupted.
    Start {
        /// The path to the engine config.
        config_path: String,
        /// Overrides the configured audio device.
        #[arg(short, long)]
        device_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Check { config_path } => {
            let config_path = Path::new(&config_path);
            let config = config::load(config_path)?;
            let engine = Engine::from_config(
                &config,
                base_dir(config_path),
                Arc::new(midi::NullOutput),
            )?;

            let channels = engine.model().get().tracks().count();
            println!(
                "{} is valid: {} channels, {} Hz, {} frames per block.",
                config_path.display(),
                channels,
                engine.sample_rate(),
                engine.buffer_size()
            );
        }
        Commands::Start {
            config_path,
            device_name,
        } => {
            let config_path = Path::new(&config_path);
            let config = config::load(config_path)?;
            let midi_config = config.midi();

            let midi_output: Arc<dyn midi::Output> = match midi_config.output() {
                Some(name) => midi::get_output(name, config.queues().midi_queue_size())?,
                None => Arc::new(midi::NullOutput),
            };
            let engine = Arc::new(Engine::from_config(
                &config,
                base_dir(config_path),
                midi_output,
            )?);

            let midi_input = match midi_config.input() {
                Some(name) => Some(watch_midi_input(
                    midi::get_input(name)?,
                    engine.clone(),
                    config.queues().midi_queue_size(),
                )?),
                None => None,
            };

            let audio_config = config.audio();
            let device_name = device_name.as_deref().or(audio_config.device());
            let stream = audio::Stream::start(engine.clone(), device_name)?;
            engine.start_sequencer();

            info!(stream = %stream, "Playing. Press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;

            engine.stop_sequencer();
            if let Some(input) = midi_input {
                input.stop_watch_events();
            }
            drop(stream);
        }
    }

    Ok(())
}

/// Wave paths in a config are relative to the config file.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or(Path::new("."))
}

/// Routes incoming MIDI to the engine from a dedicated thread. The thread
/// ends once the input stops watching and drops its sender.
fn watch_midi_input(
    input: Arc<dyn midi::Input>,
    engine: Arc<Engine>,
    queue_size: usize,
) -> Result<Arc<dyn midi::Input>, Box<dyn Error>> {
    let (sender, receiver) = crossbeam_channel::bounded::<MidiEvent>(queue_size);
    input.watch_events(sender)?;
    let priority = ThreadRole::MidiIn.plan();

    thread::Builder::new()
        .name("midi-in".to_string())
        .spawn(move || {
            priority.apply();
            for event in receiver {
                if let Err(e) = engine.reactor().dispatch_midi_input(event) {
                    warn!(err = %e, "Unable to dispatch MIDI event");
                }
            }
        })?;
    info!(input = %input, "Watching MIDI input.");
    Ok(input)
}
