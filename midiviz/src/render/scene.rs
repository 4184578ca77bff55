use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use log::{info, warn};
use winit::event::ElementState;
use winit::keyboard::KeyCode;

use super::visuals::VisualSettings;
use crate::midi::Score;
use crate::runtime::action::SystemAction;
use crate::state::State;

#[derive(Clone, Copy, Debug, Default)]
struct Player {
    position: f32,
    playing: bool,
    last_time: Option<f32>,
}

#[derive(Clone, Copy, Debug)]
struct Progress {
    step: f32,
    end: f32,
    frames: u64,
    direct: bool,
}

/// Playback position, visual settings and queued window requests. Knows
/// nothing about the GPU.
#[derive(Debug, Default)]
pub struct Scene {
    score: Score,
    midi_path: Option<PathBuf>,
    visuals: VisualSettings,
    player: Player,
    pending: VecDeque<SystemAction>,
    recording: Option<Progress>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            player: Player {
                playing: true,
                ..Player::default()
            },
            ..Self::default()
        }
    }

    pub fn load_score(&mut self, score: Score, path: &Path) {
        info!(
            "'{}': {} notes, {:.1}s",
            path.display(),
            score.notes().len(),
            score.duration()
        );
        self.score = score;
        self.midi_path = Some(path.to_path_buf());
        self.restart();
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn midi_path(&self) -> Option<&Path> {
        self.midi_path.as_deref()
    }

    pub fn visuals(&self) -> &VisualSettings {
        &self.visuals
    }

    pub fn visuals_mut(&mut self) -> &mut VisualSettings {
        &mut self.visuals
    }

    pub fn apply_state(&mut self, state: &State) {
        for key in self.visuals.apply_state(state) {
            warn!("ignoring unknown state key '{}'", key);
        }
    }

    pub fn position(&self) -> f32 {
        self.player.position
    }

    pub fn is_playing(&self) -> bool {
        self.player.playing
    }

    pub fn toggle_playback(&mut self) {
        self.player.playing = !self.player.playing;
    }

    pub fn restart(&mut self) {
        self.seek(0.0);
    }

    pub fn seek(&mut self, position: f32) {
        self.player.position = position.clamp(0.0, self.score.duration());
    }

    pub fn toggle_gui(&mut self) {
        self.visuals.show_gui = !self.visuals.show_gui;
    }

    pub fn request(&mut self, action: SystemAction) {
        self.pending.push_back(action);
    }

    /// Oldest queued request, one per frame.
    pub fn next_action(&mut self) -> SystemAction {
        self.pending.pop_front().unwrap_or_default()
    }

    pub fn key_pressed(&mut self, code: KeyCode, state: ElementState) {
        if state != ElementState::Pressed {
            return;
        }

        match code {
            KeyCode::Space => self.toggle_playback(),
            KeyCode::KeyR => self.restart(),
            KeyCode::KeyI => self.toggle_gui(),
            KeyCode::KeyF => self.request(SystemAction::Fullscreen),
            _ => {}
        }
    }

    /// Moves the playhead for a frame drawn at `time` and returns it. While
    /// recording the playhead moves one frame interval per call instead.
    pub fn advance(&mut self, time: f32) -> f32 {
        let last_time = self.player.last_time.replace(time);

        if let Some(progress) = self.recording.as_mut() {
            self.player.position = progress.frames as f32 * progress.step;
            progress.frames += 1;
            return self.player.position;
        }

        if self.player.playing {
            let delta = last_time.map_or(0.0, |last| (time - last).max(0.0));
            self.player.position += delta;
        }

        self.player.position
    }

    pub fn begin_recording(
        &mut self,
        framerate: u32,
        postroll: f32,
        direct: bool,
    ) {
        self.recording = Some(Progress {
            step: 1.0 / framerate.max(1) as f32,
            end: self.score.duration() + postroll.max(0.0),
            frames: 0,
            direct,
        });
        self.player.playing = true;
        self.restart();
        self.request(SystemAction::FixSize);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn recorded_frames(&self) -> u64 {
        self.recording.map_or(0, |progress| progress.frames)
    }

    /// True once the playhead passed the end of the score plus postroll.
    pub fn recording_complete(&self) -> bool {
        self.recording
            .is_some_and(|progress| self.player.position > progress.end)
    }

    pub fn end_recording(&mut self) {
        let Some(progress) = self.recording.take() else {
            return;
        };

        info!("recorded {} frames", progress.frames);
        self.request(SystemAction::FreeSize);
        if progress.direct {
            self.request(SystemAction::Quit);
        }
    }
}
