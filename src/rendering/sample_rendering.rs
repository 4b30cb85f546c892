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
use super::{sample_advance::on_sample_end, wave_reader::read_wave};
use crate::{
    audio::buffer::{AudioBuffer, Pan},
    channel::{
        shared::{ChannelShared, ChannelStatus, RenderCommand, RenderMode, RenderState},
        SampleChannel, SamplePlayerMode,
    },
    resampler::Resampler,
    wave::Wave,
    Frame,
};

/// Renders one block of a sample channel into its (already cleared) buffer
/// and consumes the pending render command.
///
/// A `Stop` renders up to its offset and silences the rest. A `Rewind` renders
/// up to its offset and restarts from the range start. A `Normal` starts
/// playback at its offset.
pub fn render(
    sample: &SampleChannel,
    shared: &ChannelShared,
    state: &mut RenderState,
    seq_running: bool,
) {
    // Drained whatever happens, only the newest command counts.
    let command = shared.take_render_command();

    let Some(wave) = sample.wave.as_deref() else {
        return;
    };
    let end = sample.end.min(wave.frames());
    let begin = sample.begin.min(end);

    if !shared.is_playing() {
        if let Some(RenderCommand {
            mode: RenderMode::Rewind | RenderMode::Stop,
            ..
        }) = command
        {
            shared.tracker.store(begin);
        }
        return;
    }

    let pass = Pass {
        wave,
        shared,
        mode: sample.mode,
        pitch: sample.pitch,
        begin,
        end,
        seq_running,
    };
    let RenderState {
        audio_buffer,
        resampler,
        ..
    } = state;
    let tracker = shared.tracker.load().clamp(begin, end);

    let tracker = match command {
        None => pass.render(audio_buffer, resampler, tracker, 0),
        Some(RenderCommand {
            mode: RenderMode::Normal,
            offset,
        }) => pass.render(audio_buffer, resampler, tracker, offset),
        Some(RenderCommand { mode, offset }) => {
            read_wave(wave, audio_buffer, tracker, end, 0, pass.pitch, resampler.as_mut());
            if let Some(resampler) = resampler.as_mut() {
                resampler.last();
            }
            if mode == RenderMode::Rewind {
                pass.render(audio_buffer, resampler, begin, offset)
            } else {
                audio_buffer.clear_from(offset);
                on_sample_end(shared, sample.mode, false, seq_running);
                begin
            }
        }
    };
    shared.tracker.store(tracker);
}

/// Adds live input to an armed, monitoring channel.
pub fn render_input(buffer: &mut AudioBuffer, input: &AudioBuffer) {
    buffer.sum(input, 1.0, Pan::CENTER);
}

struct Pass<'a> {
    wave: &'a Wave,
    shared: &'a ChannelShared,
    mode: SamplePlayerMode,
    pitch: f32,
    begin: Frame,
    end: Frame,
    seq_running: bool,
}

impl Pass<'_> {
    /// Reads from `tracker` until the buffer is full. When the range runs out
    /// the channel either stops or, for looping modes still playing, starts
    /// over within the same block. Returns the new tracker, which sits at
    /// the range end while pitched frames are still queued.
    fn render(
        &self,
        buffer: &mut AudioBuffer,
        resampler: &mut Option<Resampler>,
        mut tracker: Frame,
        mut offset: Frame,
    ) -> Frame {
        loop {
            let result = read_wave(
                self.wave,
                buffer,
                tracker,
                self.end,
                offset,
                self.pitch,
                resampler.as_mut(),
            );
            tracker += result.used;
            offset += result.generated;
            if tracker < self.end {
                break;
            }
            // The buffer filled up before the pitched tail of the range was
            // written. It goes out first thing next block.
            if self.pitch != 1.0
                && resampler
                    .as_ref()
                    .is_some_and(|resampler| resampler.buffered_frames() > 0)
            {
                break;
            }

            tracker = self.begin;
            if let Some(resampler) = resampler.as_mut() {
                resampler.last();
            }
            on_sample_end(self.shared, self.mode, true, self.seq_running);

            let keeps_looping = matches!(
                self.mode,
                SamplePlayerMode::LoopBasic
                    | SamplePlayerMode::LoopRepeat
                    | SamplePlayerMode::SingleEndless
            ) && self.shared.play_status.load() == ChannelStatus::Play;
            let stalled = result.used == 0 && result.generated == 0;
            if !keeps_looping || stalled || offset >= buffer.count_frames() {
                break;
            }
        }
        tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rendering::sample_reactions,
        testutil::{sample_shared, test_wave},
    };

    const BLOCK: usize = 64;

    fn sample(mode: SamplePlayerMode, frames: usize) -> SampleChannel {
        let mut sample = SampleChannel::new(mode);
        sample.set_wave(Some(test_wave(frames)));
        sample
    }

    fn render_block(sample: &SampleChannel, shared: &ChannelShared, seq_running: bool) -> AudioBuffer {
        let mut state = shared.render_state().expect("render state is free");
        state.audio_buffer.clear();
        render(sample, shared, &mut state, seq_running);
        state.audio_buffer.clone()
    }

    fn wave_frame(sample: &SampleChannel, frame: Frame) -> Vec<f32> {
        sample
            .wave
            .as_ref()
            .map(|wave| wave.buffer().frame(frame).to_vec())
            .unwrap_or_default()
    }

    fn is_silent(buffer: &AudioBuffer, range: std::ops::Range<Frame>) -> bool {
        range.into_iter().all(|i| buffer.frame(i).iter().all(|s| *s == 0.0))
    }

    #[test]
    fn test_normal_at_offset() {
        let sample = sample(SamplePlayerMode::SingleBasic, 1000);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        sample_reactions::play(&shared, 16);

        let out = render_block(&sample, &shared, false);
        assert!(is_silent(&out, 0..16));
        assert_eq!(out.frame(16), wave_frame(&sample, 0).as_slice());
        assert_eq!(shared.tracker.load(), BLOCK - 16);

        let out = render_block(&sample, &shared, false);
        assert_eq!(out.frame(0), wave_frame(&sample, BLOCK - 16).as_slice());
    }

    #[test]
    fn test_normal_then_stop_at_zero_is_silent() {
        let sample = sample(SamplePlayerMode::SingleBasic, 1000);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        sample_reactions::play(&shared, 0);
        sample_reactions::stop(&shared, 0);

        let out = render_block(&sample, &shared, false);
        assert!(is_silent(&out, 0..BLOCK));
        assert_eq!(shared.play_status.load(), ChannelStatus::Off);
        assert_eq!(shared.tracker.load(), 0);
    }

    #[test]
    fn test_stop_at_offset() {
        let sample = sample(SamplePlayerMode::SingleBasic, 1000);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        shared.play_status.store(ChannelStatus::Play);
        shared.tracker.store(100);
        sample_reactions::stop(&shared, 10);

        let out = render_block(&sample, &shared, true);
        assert_eq!(out.frame(9), wave_frame(&sample, 109).as_slice());
        assert!(is_silent(&out, 10..BLOCK));
        assert_eq!(shared.play_status.load(), ChannelStatus::Off);
        assert_eq!(shared.tracker.load(), 0);
    }

    #[test]
    fn test_rewind_at_offset() {
        let mut sample = sample(SamplePlayerMode::SingleRetrig, 1000);
        sample.set_range(50, 1000);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 50);
        shared.play_status.store(ChannelStatus::Play);
        shared.tracker.store(300);
        sample_reactions::rewind(&shared, 20);

        let out = render_block(&sample, &shared, false);
        assert_eq!(out.frame(19), wave_frame(&sample, 319).as_slice());
        assert_eq!(out.frame(20), wave_frame(&sample, 50).as_slice());
        assert_eq!(shared.tracker.load(), 50 + BLOCK - 20);
        assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    }

    #[test]
    fn test_single_shot_ends_mid_block() {
        let sample = sample(SamplePlayerMode::SingleBasic, 100);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        shared.play_status.store(ChannelStatus::Play);
        shared.tracker.store(80);

        let out = render_block(&sample, &shared, false);
        assert_eq!(out.frame(19), wave_frame(&sample, 99).as_slice());
        assert!(is_silent(&out, 20..BLOCK));
        assert_eq!(shared.play_status.load(), ChannelStatus::Off);
        assert_eq!(shared.tracker.load(), 0);
    }

    #[test]
    fn test_loop_wraps_within_block() {
        let sample = sample(SamplePlayerMode::LoopBasic, 100);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        shared.play_status.store(ChannelStatus::Play);
        shared.tracker.store(80);

        let out = render_block(&sample, &shared, true);
        assert_eq!(out.frame(19), wave_frame(&sample, 99).as_slice());
        assert_eq!(out.frame(20), wave_frame(&sample, 0).as_slice());
        assert_eq!(shared.tracker.load(), BLOCK - 20);
        assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    }

    #[test]
    fn test_short_loop_fills_block() {
        let sample = sample(SamplePlayerMode::SingleEndless, 10);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        shared.play_status.store(ChannelStatus::Play);

        let out = render_block(&sample, &shared, false);
        assert_eq!(out.frame(63), wave_frame(&sample, 3).as_slice());
        assert_eq!(shared.tracker.load(), 4);
    }

    #[test]
    fn test_loop_stops_at_end_when_sequencer_stopped() {
        let sample = sample(SamplePlayerMode::LoopBasic, 100);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        shared.play_status.store(ChannelStatus::Play);
        shared.tracker.store(80);

        let out = render_block(&sample, &shared, false);
        assert!(is_silent(&out, 20..BLOCK));
        assert_eq!(shared.play_status.load(), ChannelStatus::Off);
    }

    /// Plays a single shot from the start and counts the blocks rendered
    /// before the channel goes off.
    fn blocks_until_off(pitch: f32) -> usize {
        let mut sample = sample(SamplePlayerMode::SingleBasic, 1000);
        sample.set_pitch(pitch);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        sample_reactions::play(&shared, 0);

        let mut blocks = 0;
        while shared.play_status.load() != ChannelStatus::Off && blocks < 1000 {
            render_block(&sample, &shared, false);
            blocks += 1;
        }
        blocks
    }

    #[test]
    fn test_pitched_single_shot_plays_whole_range() {
        // 1000 frames at half speed last 2000 frames, 32 blocks.
        let blocks = blocks_until_off(0.5);
        assert!((32..=33).contains(&blocks), "off after {} blocks", blocks);

        // Double speed: 500 frames, 8 blocks.
        let blocks = blocks_until_off(2.0);
        assert!((8..=9).contains(&blocks), "off after {} blocks", blocks);
    }

    #[test]
    fn test_pitched_loop_seam_keeps_tail() {
        let mut sample = sample(SamplePlayerMode::SingleEndless, 1000);
        sample.set_pitch(0.5);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        sample_reactions::play(&shared, 0);

        let mut previous = 0;
        let mut wrapped_at = None;
        for block in 0..40 {
            render_block(&sample, &shared, false);
            let tracker = shared.tracker.load();
            if tracker < previous && wrapped_at.is_none() {
                wrapped_at = Some(block);
            }
            previous = tracker;
        }
        // The second pass starts once 2000 frames went out, in block 31.
        assert_eq!(wrapped_at, Some(31));
        assert_eq!(shared.play_status.load(), ChannelStatus::Play);
    }

    #[test]
    fn test_idle_channel_drains_queue() {
        let sample = sample(SamplePlayerMode::SingleBasicPause, 1000);
        let shared = sample_shared();
        sample_reactions::set_wave_loaded(&shared, true, 0);
        shared.tracker.store(500);

        // Paused: tracker is kept.
        render_block(&sample, &shared, false);
        assert_eq!(shared.tracker.load(), 500);

        sample_reactions::stop(&shared, 0);
        render_block(&sample, &shared, false);
        assert_eq!(shared.tracker.load(), 0);
        assert_eq!(shared.take_render_command(), None);
    }

    #[test]
    fn test_no_wave_is_silent() {
        let sample = SampleChannel::new(SamplePlayerMode::SingleBasic);
        let shared = sample_shared();
        shared.play_status.store(ChannelStatus::Play);
        sample_reactions::play(&shared, 0);
        let out = render_block(&sample, &shared, false);
        assert!(is_silent(&out, 0..BLOCK));
        assert_eq!(shared.take_render_command(), None);
    }
}
