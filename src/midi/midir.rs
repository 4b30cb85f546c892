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
use std::{error::Error, fmt, thread};

use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputPort};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use super::event::MidiEvent;
use crate::audio::thread_priority::ThreadRole;

/// A midir output. Events are handed to a sender thread that owns the port
/// connection, so `send` never waits on the device.
pub struct Output {
    name: String,
    sender: Sender<MidiEvent>,
}

impl Output {
    /// Connects to the first output port whose name contains `name`.
    pub fn get(name: &str, queue_size: usize) -> Result<Output, Box<dyn Error>> {
        let span = span!(Level::INFO, "open MIDI output (midir)");
        let _enter = span.enter();

        let output = MidiOutput::new("loopdeck output")?;
        let (port_name, port) = find_port(
            output.ports(),
            |port: &MidiOutputPort| output.port_name(port),
            name,
        )?;
        let mut connection = output.connect(&port, "loopdeck output")?;
        let (sender, receiver) = crossbeam_channel::bounded::<MidiEvent>(queue_size);
        let priority = ThreadRole::MidiOut.plan();

        thread::Builder::new()
            .name(String::from("midi-out"))
            .spawn(move || {
                priority.apply();
                // Ends once every sender is gone.
                for event in receiver {
                    if let Err(e) = connection.send(event.as_bytes()) {
                        error!(err = e.to_string(), "Error sending MIDI event.");
                    }
                }
                connection.close();
            })?;

        info!(device = port_name, "Opened MIDI output.");
        Ok(Output {
            name: port_name,
            sender,
        })
    }
}

impl super::Output for Output {
    fn send(&self, event: MidiEvent) {
        // Dropped when the sender thread falls behind.
        let _ = self.sender.try_send(event);
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Output)", self.name)
    }
}

/// A midir input port. Watching connects to it and forwards every channel
/// message that parses.
pub struct Input {
    name: String,
    port: MidiInputPort,
    event_connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl Input {
    /// Finds the first input port whose name contains `name`.
    pub fn get(name: &str) -> Result<Input, Box<dyn Error>> {
        let input = MidiInput::new("loopdeck input listing")?;
        let (port_name, port) = find_port(
            input.ports(),
            |port: &MidiInputPort| input.port_name(port),
            name,
        )?;
        Ok(Input {
            name: port_name,
            port,
            event_connection: Mutex::new(None),
        })
    }
}

impl super::Input for Input {
    fn watch_events(&self, sender: Sender<MidiEvent>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "watch MIDI events (midir)");
        let _enter = span.enter();

        let mut event_connection = self.event_connection.lock();
        if event_connection.is_some() {
            return Err("Already watching events.".into());
        }

        let input = MidiInput::new("loopdeck input")?;
        *event_connection = Some(input.connect(
            &self.port,
            "loopdeck input watcher",
            move |_, raw_event, _| match MidiEvent::parse(raw_event) {
                Ok(event) => {
                    debug!(event = ?event, "Received MIDI event.");
                    if sender.try_send(event).is_err() {
                        warn!("MIDI input queue is full, dropping event.");
                    }
                }
                Err(e) => debug!(err = e.to_string(), "Ignoring MIDI message."),
            },
            (),
        )?);

        info!(device = self.name, "Watching MIDI events.");
        Ok(())
    }

    fn stop_watch_events(&self) {
        if let Some(connection) = self.event_connection.lock().take() {
            connection.close();
            info!(device = self.name, "Stopped watching MIDI events.");
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Input)", self.name)
    }
}

/// Picks the single port whose name contains `name`.
fn find_port<P, F>(ports: Vec<P>, port_name: F, name: &str) -> Result<(String, P), Box<dyn Error>>
where
    F: Fn(&P) -> Result<String, midir::PortInfoError>,
{
    let mut matches = Vec::new();
    for port in ports {
        let port_name = port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }

    if matches.is_empty() {
        return Err(format!("no MIDI port found with name {}", name).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many MIDI ports that match ({}), use a less ambiguous name",
            matches
                .iter()
                .map(|(name, _)| name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }
    Ok(matches.swap_remove(0))
}
