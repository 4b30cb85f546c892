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

//! Sample channel transitions. These only store atomics and queue render
//! commands, so they are safe on any thread, including the audio thread when
//! called from `sample_advance` or a quantizer callback.

use tracing::warn;

use crate::{
    channel::{
        shared::{ChannelShared, ChannelStatus, RenderCommand, RenderMode},
        SamplePlayerMode,
    },
    error::EngineError,
    quantizer::{Quantizer, QuantizerAction},
    Frame,
};

/// Start playing on the next boundary.
pub const PLAY: QuantizerAction = 0;
/// Restart from the beginning on the next boundary.
pub const REWIND: QuantizerAction = 1;

/// The quantizer every sample channel carries.
pub fn quantizer() -> Quantizer<ChannelShared> {
    let mut quantizer = Quantizer::new();
    quantizer.schedule(PLAY, |shared: &ChannelShared, delta| play(shared, delta));
    quantizer.schedule(REWIND, |shared: &ChannelShared, delta| rewind(shared, delta));
    quantizer
}

pub fn play(shared: &ChannelShared, offset: Frame) {
    shared.play_status.store(ChannelStatus::Play);
    push(shared, RenderMode::Normal, offset);
}

pub fn rewind(shared: &ChannelShared, offset: Frame) {
    push(shared, RenderMode::Rewind, offset);
}

pub fn stop(shared: &ChannelShared, offset: Frame) {
    push(shared, RenderMode::Stop, offset);
}

fn push(shared: &ChannelShared, mode: RenderMode, offset: Frame) {
    // Dropping here leaves the status as is; the next command supersedes it.
    let _ = shared.push_render_command(RenderCommand::new(mode, offset));
}

fn trigger(shared: &ChannelShared, action: QuantizerAction) -> Result<(), EngineError> {
    match &shared.quantizer {
        Some(quantizer) => quantizer.trigger(action),
        None => Err(EngineError::UnknownQuantizerAction(action)),
    }
}

/// A key press. `velocity` is in [0.0, 1.0] and only matters when the channel
/// takes its volume from velocity.
pub fn press(
    shared: &ChannelShared,
    mode: SamplePlayerMode,
    velocity: f32,
    velocity_as_vol: bool,
    can_quantize: bool,
) -> Result<(), EngineError> {
    let status = shared.play_status.load();
    if mode.is_loop() {
        let next = match status {
            ChannelStatus::Off => ChannelStatus::Wait,
            ChannelStatus::Play => ChannelStatus::Ending,
            ChannelStatus::Wait => ChannelStatus::Off,
            ChannelStatus::Ending => ChannelStatus::Play,
            ChannelStatus::Empty => return Ok(()),
        };
        shared.play_status.store(next);
        return Ok(());
    }

    match status {
        ChannelStatus::Off => {
            if velocity_as_vol {
                shared.volume_internal.store(velocity);
            }
            if can_quantize {
                trigger(shared, PLAY)?;
            } else {
                play(shared, 0);
            }
        }
        ChannelStatus::Play => match mode {
            SamplePlayerMode::SingleRetrig => {
                if can_quantize {
                    trigger(shared, REWIND)?;
                } else {
                    rewind(shared, 0);
                }
            }
            SamplePlayerMode::SingleEndless => shared.play_status.store(ChannelStatus::Ending),
            SamplePlayerMode::SingleBasicPause => shared.play_status.store(ChannelStatus::Off),
            _ => stop(shared, 0),
        },
        ChannelStatus::Ending => shared.play_status.store(ChannelStatus::Play),
        ChannelStatus::Wait | ChannelStatus::Empty => {}
    }
    Ok(())
}

/// A key release. Only single press channels care.
pub fn release(shared: &ChannelShared, mode: SamplePlayerMode) {
    if mode != SamplePlayerMode::SinglePress {
        return;
    }
    if shared.play_status.load() == ChannelStatus::Play {
        stop(shared, 0);
    } else if let Some(quantizer) = &shared.quantizer {
        if quantizer.has_been_triggered() {
            quantizer.clear();
        }
    }
}

/// Stops the channel whatever its mode. The tracker goes back to the range
/// start when the stop is rendered, also for a paused channel.
pub fn kill(shared: &ChannelShared) {
    if shared.play_status.load() == ChannelStatus::Wait {
        shared.play_status.store(ChannelStatus::Off);
    }
    stop(shared, 0);
    if let Some(quantizer) = &shared.quantizer {
        quantizer.clear();
    }
}

/// Reaction to the sequencer stopping.
pub fn stop_by_seq(shared: &ChannelShared, is_loop: bool, chans_stop_on_seq_halt: bool) {
    match shared.play_status.load() {
        ChannelStatus::Wait if is_loop => shared.play_status.store(ChannelStatus::Off),
        ChannelStatus::Play => {
            if chans_stop_on_seq_halt && (is_loop || shared.read_actions.load()) {
                stop(shared, 0);
            }
        }
        _ => {}
    }
}

/// Turns action replay on or off. With `treat_recs_as_loops` the change waits
/// for the next first beat while the sequencer runs.
pub fn toggle_read_actions(shared: &ChannelShared, treat_recs_as_loops: bool, seq_running: bool) {
    let read_actions = shared.read_actions.load();
    let rec_status = shared.rec_status.load();

    if read_actions || rec_status == ChannelStatus::Wait {
        stop_read_actions(shared, rec_status, treat_recs_as_loops, seq_running);
    } else if treat_recs_as_loops {
        shared.rec_status.store(ChannelStatus::Wait);
    } else {
        shared.rec_status.store(ChannelStatus::Play);
        shared.read_actions.store(true);
    }
}

fn stop_read_actions(
    shared: &ChannelShared,
    rec_status: ChannelStatus,
    treat_recs_as_loops: bool,
    seq_running: bool,
) {
    if !seq_running || !treat_recs_as_loops {
        shared.rec_status.store(ChannelStatus::Off);
        shared.read_actions.store(false);
        return;
    }
    let next = match rec_status {
        ChannelStatus::Wait => ChannelStatus::Off,
        ChannelStatus::Ending => ChannelStatus::Play,
        _ => ChannelStatus::Ending,
    };
    shared.rec_status.store(next);
}

/// Stops action replay right away.
pub fn kill_read_actions(shared: &ChannelShared) {
    shared.rec_status.store(ChannelStatus::Off);
    shared.read_actions.store(false);
}

/// A wave was loaded into or removed from the channel.
pub fn set_wave_loaded(shared: &ChannelShared, loaded: bool, begin: Frame) {
    if let Some(quantizer) = &shared.quantizer {
        quantizer.clear();
    }
    // Stale commands would otherwise apply to the new wave.
    if shared.take_render_command().is_some() {
        warn!("Dropped pending render command on wave change");
    }
    shared.tracker.store(begin);
    shared.play_status.store(if loaded {
        ChannelStatus::Off
    } else {
        ChannelStatus::Empty
    });
}
