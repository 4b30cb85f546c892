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
//! Scheduling for the threads loopdeck starts itself or runs on: the device
//! callback and the two MIDI threads. Each role has a default priority that
//! the environment can override or turn off.

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, info, warn};

/// A thread loopdeck cares about the scheduling of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadRole {
    /// The cpal callback running the renderer.
    AudioCallback,
    /// Dispatches incoming MIDI to the reactor.
    MidiIn,
    /// Owns the midir output connection.
    MidiOut,
}

impl ThreadRole {
    pub fn name(&self) -> &'static str {
        match self {
            ThreadRole::AudioCallback => "audio callback",
            ThreadRole::MidiIn => "midi-in",
            ThreadRole::MidiOut => "midi-out",
        }
    }

    fn env_var(&self) -> &'static str {
        match self {
            ThreadRole::AudioCallback => "LOOPDECK_THREAD_PRIORITY",
            ThreadRole::MidiIn => "LOOPDECK_MIDI_IN_PRIORITY",
            ThreadRole::MidiOut => "LOOPDECK_MIDI_OUT_PRIORITY",
        }
    }

    /// MIDI input feeds the quantizer, so it sits just under the callback.
    /// Output only drains a queue.
    fn default_priority(&self) -> u8 {
        match self {
            ThreadRole::AudioCallback => 70,
            ThreadRole::MidiIn => 60,
            ThreadRole::MidiOut => 40,
        }
    }

    /// Reads the environment for this role. Done before the thread starts
    /// working so the audio path never touches the environment.
    pub fn plan(self) -> ThreadPlan {
        let priority = parse_priority(
            std::env::var(self.env_var()).ok().as_deref(),
            self.default_priority(),
        );
        let realtime = self == ThreadRole::AudioCallback
            && !parse_flag(std::env::var("LOOPDECK_DISABLE_RT_AUDIO").ok().as_deref());
        ThreadPlan {
            role: self,
            priority,
            realtime,
        }
    }
}

/// `off` leaves the thread alone. Anything that is not a priority in 0-99
/// falls back to `default`.
fn parse_priority(value: Option<&str>, default: u8) -> Option<ThreadPriorityValue> {
    let value = match value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("off") => return None,
        Some(v) => v.parse::<u8>().ok().filter(|n| *n < 100).unwrap_or(default),
        None => default,
    };
    ThreadPriorityValue::try_from(value).ok()
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        v == "1"
            || v.eq_ignore_ascii_case("true")
            || v.eq_ignore_ascii_case("yes")
            || v.eq_ignore_ascii_case("on")
    })
}

/// How one thread should be scheduled.
#[derive(Clone, Copy, Debug)]
pub struct ThreadPlan {
    role: ThreadRole,
    priority: Option<ThreadPriorityValue>,
    realtime: bool,
}

impl ThreadPlan {
    pub fn role(&self) -> ThreadRole {
        self.role
    }

    pub fn priority(&self) -> Option<u8> {
        self.priority.map(|priority| priority.into())
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime
    }

    /// Applies the plan to the calling thread. Returns whether its priority
    /// was raised.
    pub fn apply(&self) -> bool {
        let Some(priority) = self.priority else {
            debug!(thread = self.role.name(), "Leaving thread priority as is");
            return false;
        };

        let tp = ThreadPriority::Crossplatform(priority);
        let mut raised = match set_current_thread_priority(tp) {
            Ok(()) => true,
            Err(e) => {
                debug!(thread = self.role.name(), error = %e, "Failed to raise thread priority");
                false
            }
        };

        #[cfg(unix)]
        if self.realtime {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            match set_thread_priority_and_policy(
                thread_native_id(),
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                Ok(()) => {
                    info!(thread = self.role.name(), "Enabled RT SCHED_FIFO");
                    raised = true;
                }
                Err(e) => {
                    warn!(thread = self.role.name(), error = %e, "Failed to set RT SCHED_FIFO")
                }
            }
        }
        raised
    }
}
