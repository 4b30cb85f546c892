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
use crate::{channel::ChannelType, wave::WaveError, Id};

/// Errors returned by the control-side engine API. Nothing on the audio
/// thread produces these.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("channel {0} not found")]
    ChannelNotFound(Id),

    #[error("channel {id} is a {actual:?} channel, expected {expected:?}")]
    WrongChannelType {
        id: Id,
        expected: ChannelType,
        actual: ChannelType,
    },

    #[error("channel {0} cannot be deleted")]
    InternalChannel(Id),

    #[error("quantizer action {0} is not scheduled")]
    UnknownQuantizerAction(usize),

    #[error("the audio stream is running")]
    StreamRunning,

    #[error("invalid buffer size: {0}")]
    InvalidBufferSize(usize),

    #[error("resampler construction failed: {0}")]
    Resampler(#[from] rubato::ResamplerConstructionError),

    #[error(transparent)]
    Wave(#[from] WaveError),
}
