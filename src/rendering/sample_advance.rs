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

//! How sample channels follow the sequencer. Audio thread only.

use super::sample_reactions::{play, rewind, stop};
use crate::{
    actions::Action,
    channel::{
        shared::{ChannelShared, ChannelStatus},
        SamplePlayerMode,
    },
    midi::event::MidiEventKind,
    sequencer::{Event, EventType},
    Frame, Id,
};

/// Reacts to one sequencer event. `actions` are the actions recorded on the
/// event's frame, for every channel.
pub fn advance(
    channel_id: Id,
    shared: &ChannelShared,
    mode: SamplePlayerMode,
    event: &Event,
    actions: &[Action],
) {
    let is_loop = mode.is_loop();
    match event.event_type {
        EventType::FirstBeat => on_first_beat(shared, event.delta, is_loop),
        EventType::Bar => on_bar(shared, event.delta, mode),
        EventType::Rewind => {
            if is_loop {
                rewind(shared, event.delta);
            }
        }
        EventType::Actions => {
            if !is_loop && shared.read_actions.load() {
                parse_actions(channel_id, shared, actions, event.delta, mode);
            }
        }
    }
}

fn on_first_beat(shared: &ChannelShared, delta: Frame, is_loop: bool) {
    match shared.play_status.load() {
        ChannelStatus::Play if is_loop => rewind(shared, delta),
        ChannelStatus::Wait => play(shared, delta),
        ChannelStatus::Ending if is_loop => stop(shared, delta),
        _ => {}
    }

    match shared.rec_status.load() {
        ChannelStatus::Wait => {
            shared.rec_status.store(ChannelStatus::Play);
            shared.read_actions.store(true);
        }
        ChannelStatus::Ending => {
            shared.rec_status.store(ChannelStatus::Off);
            shared.read_actions.store(false);
        }
        _ => {}
    }
}

fn on_bar(shared: &ChannelShared, delta: Frame, mode: SamplePlayerMode) {
    match (shared.play_status.load(), mode) {
        (ChannelStatus::Play, SamplePlayerMode::LoopRepeat | SamplePlayerMode::LoopOnceBar) => {
            rewind(shared, delta)
        }
        (ChannelStatus::Wait, SamplePlayerMode::LoopOnceBar) => play(shared, delta),
        _ => {}
    }
}

fn parse_actions(
    channel_id: Id,
    shared: &ChannelShared,
    actions: &[Action],
    delta: Frame,
    mode: SamplePlayerMode,
) {
    for action in actions.iter().filter(|action| action.channel_id == channel_id) {
        if action.event.is_kill() {
            if shared.play_status.load() == ChannelStatus::Play {
                stop(shared, delta);
            }
            continue;
        }
        match action.event.kind() {
            MidiEventKind::NoteOn => match shared.play_status.load() {
                ChannelStatus::Off => play(shared, delta),
                ChannelStatus::Play if mode == SamplePlayerMode::SingleRetrig => {
                    rewind(shared, delta)
                }
                ChannelStatus::Play => stop(shared, delta),
                _ => {}
            },
            MidiEventKind::NoteOff => {
                if shared.play_status.load() == ChannelStatus::Play {
                    stop(shared, delta);
                }
            }
            _ => {}
        }
    }
}

/// The playback range ran out (`natural`) or a stop was rendered.
pub fn on_sample_end(shared: &ChannelShared, mode: SamplePlayerMode, natural: bool, seq_running: bool) {
    match shared.play_status.load() {
        ChannelStatus::Play => {
            let single_shot = matches!(
                mode,
                SamplePlayerMode::SingleBasic
                    | SamplePlayerMode::SingleBasicPause
                    | SamplePlayerMode::SinglePress
                    | SamplePlayerMode::SingleRetrig
            );
            if single_shot || (mode.is_loop() && !seq_running) || !natural {
                shared.play_status.store(ChannelStatus::Off);
            } else if matches!(
                mode,
                SamplePlayerMode::LoopOnce | SamplePlayerMode::LoopOnceBar
            ) {
                shared.play_status.store(ChannelStatus::Wait);
            }
        }
        ChannelStatus::Ending => shared.play_status.store(ChannelStatus::Off),
        _ => {}
    }
}
