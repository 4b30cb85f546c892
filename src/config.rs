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
//! The engine configuration file.

use std::path::Path;

use ::config::{Config, Environment, File};
use tracing::info;

mod audio;
mod channel;
mod engine;
mod error;
mod midi;

pub use self::audio::Audio;
pub use self::channel::{Channel, ChannelType};
pub use self::engine::{Behaviors, EngineConfig, Queues, Sequencer};
pub use self::error::ConfigError;
pub use self::midi::Midi;

/// Prefix of environment variables that override the file, e.g.
/// `LOOPDECK__AUDIO__BUFFER_SIZE=256`.
const ENV_PREFIX: &str = "LOOPDECK";

/// Loads the configuration at `path`, with environment overrides applied.
pub fn load(path: &Path) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    config.validate()?;

    info!(
        path = %path.display(),
        channels = config.channels().len(),
        "Loaded configuration."
    );
    Ok(config)
}
