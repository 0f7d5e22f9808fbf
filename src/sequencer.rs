// Scene sequencing state machine. The host drives it with timestamped
// calls and audio events; every transition funnels through one entry
// function and one advance-arbitration point, so racing completion
// sources cannot double-advance.

use log::{debug, warn};

use crate::navigation::NavigationGuard;
use crate::progress::ProgressTable;
use crate::subtitle::{Subtitle, SubtitleSpan};
use crate::types::{
    Directive, HostEvent, Notice, PlayState, PlayerConfig, PlayerSnapshot, Scene, Timestamp,
};

/// Engine position: a concrete scene, or the transient restart slot that
/// forces a fresh entry of scene 0 instead of a no-op on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    At(usize),
    Restarting,
}

/// Why a scene transition was requested. The first accepted reason per
/// entry wins; later and stale requests are dropped silently — that race
/// is expected control flow, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdvanceReason {
    AudioFinished,
    TimerElapsed,
    AudioFailed,
    Manual,
}

/// The montage playback engine. Owns the session: scene order, play
/// state, per-scene progress, word highlight, and the audio-resource
/// handshake with the host. Deterministic — it never reads a clock and
/// performs no I/O; the host executes the returned directives.
pub struct MontageEngine {
    scenes: Vec<Scene>,
    config: PlayerConfig,
    state: PlayState,
    slot: Slot,
    /// Bumped on every scene entry. Stamps load tokens and timers, so
    /// anything that fires for an entry the engine has left is detectably
    /// stale.
    epoch: u64,
    progress: ProgressTable,
    guard: NavigationGuard,
    subtitle: Subtitle,
    highlighted_word: Option<usize>,
    /// The host currently holds a loaded audio resource for this entry.
    audio_loaded: bool,
    /// Token of the outstanding `LoadAudio`, if any.
    pending_load: Option<u64>,
    advance_consumed: bool,
    image_failed: bool,
    completed_notified: bool,
}

impl MontageEngine {
    /// Build an engine over `scenes`. The list is re-sorted by
    /// `order_index`; caller ordering is not trusted.
    pub fn new(mut scenes: Vec<Scene>, config: PlayerConfig) -> Self {
        scenes.sort_by_key(|s| s.order_index);
        let progress = ProgressTable::new(scenes.len());
        let guard = NavigationGuard::new(config.navigation_debounce_ms);
        MontageEngine {
            scenes,
            config,
            state: PlayState::Idle,
            slot: Slot::At(0),
            epoch: 0,
            progress,
            guard,
            subtitle: Subtitle::new(""),
            highlighted_word: None,
            audio_loaded: false,
            pending_load: None,
            advance_consumed: false,
            image_failed: false,
            completed_notified: false,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Active scene index; `None` while a restart is in flight.
    pub fn current_scene(&self) -> Option<usize> {
        match self.slot {
            Slot::At(index) if !self.scenes.is_empty() => Some(index),
            _ => None,
        }
    }

    /// Begin the session. An empty scene list completes immediately and
    /// plays nothing. Emits the audio-session setup and image prefetches
    /// up front, then enters scene 0.
    pub fn start(&mut self, now: Timestamp) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.state != PlayState::Idle {
            return out;
        }
        if self.scenes.is_empty() {
            self.state = PlayState::Finished;
            self.notify_completed(&mut out);
            return out;
        }

        out.push(Directive::ConfigureAudioSession {
            config: self.config.audio_session.clone(),
        });
        for scene in &self.scenes {
            if let Some(url) = scene.image_url.as_deref().filter(|u| !u.is_empty()) {
                out.push(Directive::PrefetchImage {
                    url: url.to_string(),
                });
            }
        }

        self.enter(0, now, &mut out);
        out
    }

    /// Advance engine time to `now`. Completes a pending restart and
    /// polls the scene timer.
    pub fn tick(&mut self, now: Timestamp) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.slot == Slot::Restarting && self.state != PlayState::Finished {
            self.enter(0, now, &mut out);
            return out;
        }
        if self.state == PlayState::Playing {
            if let Some(fired) = self.progress.poll(now) {
                if fired.advance {
                    self.request_advance(AdvanceReason::TimerElapsed, fired.epoch, now, &mut out);
                }
            }
        }
        out
    }

    /// Feed a host-reported event back into the engine.
    pub fn handle_event(&mut self, event: HostEvent, now: Timestamp) -> Vec<Directive> {
        let mut out = Vec::new();
        match event {
            HostEvent::AudioLoaded { token, duration_ms } => {
                if self.pending_load != Some(token) {
                    debug!("dropping stale audio load (token {token})");
                    return out;
                }
                self.pending_load = None;
                self.audio_loaded = true;
                if let Slot::At(index) = self.slot {
                    let duration = duration_ms.max(self.config.min_scene_duration_ms);
                    self.progress
                        .start_timer(index, self.epoch, duration, false, now);
                }
                self.state = PlayState::Playing;
            }

            HostEvent::AudioLoadFailed { token, message } => {
                if self.pending_load != Some(token) {
                    debug!("dropping stale audio load failure (token {token})");
                    return out;
                }
                self.pending_load = None;
                warn!("audio load failed, moving on: {message}");
                if let Slot::At(index) = self.slot {
                    self.progress.pin_complete(index);
                }
                let epoch = self.epoch;
                self.request_advance(AdvanceReason::AudioFailed, epoch, now, &mut out);
            }

            HostEvent::AudioStatus {
                token,
                position_ms,
                duration_ms,
                did_just_finish,
            } => {
                if !self.audio_loaded {
                    return out;
                }
                if matches!(token, Some(t) if t != self.epoch) {
                    return out;
                }
                if !matches!(self.state, PlayState::Playing | PlayState::Paused) {
                    return out;
                }
                let Slot::At(index) = self.slot else {
                    return out;
                };

                if duration_ms > 0 {
                    let p = (position_ms as f32 / duration_ms as f32).clamp(0.0, 1.0);
                    self.progress.raise_fraction(index, p);
                    if let Some(word) = self.subtitle.highlight_index(p) {
                        self.highlighted_word = Some(word);
                    }
                }

                if did_just_finish {
                    self.progress.pin_complete(index);
                    self.highlighted_word = self.subtitle.last_word_index();
                    self.progress.cancel_timer();
                    let epoch = self.epoch;
                    self.request_advance(AdvanceReason::AudioFinished, epoch, now, &mut out);
                }
            }

            HostEvent::ImageFailed { scene } => {
                if matches!(self.slot, Slot::At(index) if index == scene) {
                    self.image_failed = true;
                }
            }
        }
        out
    }

    /// Manual next: same terminal logic as natural completion, behind the
    /// navigation guard.
    pub fn next_manual(&mut self, now: Timestamp) -> Vec<Directive> {
        let mut out = Vec::new();
        if !self.guard.try_begin(now) {
            return out;
        }
        if self.state == PlayState::Idle
            || self.state == PlayState::Finished
            || self.slot == Slot::Restarting
        {
            self.guard.cancel();
            return out;
        }

        self.teardown_audio(true, &mut out);
        let epoch = self.epoch;
        self.request_advance(AdvanceReason::Manual, epoch, now, &mut out);
        self.guard.finish();
        out
    }

    /// Manual previous. At scene 0 this restarts the whole montage:
    /// every bar resets and scene 0 is re-entered fresh on the next tick,
    /// rather than doing nothing.
    pub fn previous(&mut self, now: Timestamp) -> Vec<Directive> {
        let mut out = Vec::new();
        if !self.guard.try_begin(now) {
            return out;
        }
        let index = match self.slot {
            Slot::At(index)
                if self.state != PlayState::Idle && self.state != PlayState::Finished =>
            {
                index
            }
            _ => {
                self.guard.cancel();
                return out;
            }
        };

        self.teardown_audio(true, &mut out);
        if index > 0 {
            self.enter(index - 1, now, &mut out);
        } else {
            self.progress.reset_all();
            self.subtitle = Subtitle::new("");
            self.highlighted_word = None;
            self.image_failed = false;
            self.slot = Slot::Restarting;
            self.state = PlayState::Loading;
            self.epoch += 1;
        }
        self.guard.finish();
        out
    }

    /// Pause/resume toggle. Freezes both the audio and the scene timer.
    /// While a load is still in flight, re-enters the current scene
    /// instead.
    pub fn toggle_pause(&mut self, now: Timestamp) -> Vec<Directive> {
        let mut out = Vec::new();
        match self.state {
            PlayState::Playing => {
                if self.audio_loaded {
                    out.push(Directive::PauseAudio);
                }
                self.progress.pause(now);
                self.state = PlayState::Paused;
            }
            PlayState::Paused => {
                if self.audio_loaded {
                    out.push(Directive::ResumeAudio);
                }
                self.progress.resume(now);
                self.state = PlayState::Playing;
            }
            PlayState::Loading => {
                if let Slot::At(index) = self.slot {
                    self.enter(index, now, &mut out);
                }
            }
            PlayState::Idle | PlayState::Finished => {}
        }
        out
    }

    /// Explicit skip: terminate the session without advancing through the
    /// remaining scenes. The shell routes the notice to `onSkip` when one
    /// is registered, else `onComplete`.
    pub fn skip(&mut self, _now: Timestamp) -> Vec<Directive> {
        self.terminate(Notice::Skipped)
    }

    /// Dismissal from an embedding overlay. Same teardown as skip with a
    /// `Closed` notice.
    pub fn close(&mut self, _now: Timestamp) -> Vec<Directive> {
        self.terminate(Notice::Closed)
    }

    /// Unmount: release the audio resource and cancel timers. No
    /// lifecycle notification.
    pub fn shutdown(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        self.teardown_audio(true, &mut out);
        self.progress.cancel_timer();
        self.state = PlayState::Finished;
        out
    }

    /// Read-only view for the host renderer.
    pub fn snapshot(&self) -> PlayerSnapshot {
        let current = self.current_scene();
        PlayerSnapshot {
            state: self.state,
            current_scene: current,
            scene_count: self.scenes.len(),
            progress: self.progress.presented(current),
            highlighted_word: self.highlighted_word,
            subtitle: self.subtitle.text().to_string(),
            image_url: current.and_then(|i| self.scenes[i].image_url.clone()),
            image_failed: self.image_failed,
        }
    }

    /// The active subtitle as render spans with the current highlight.
    pub fn subtitle_spans(&self) -> Vec<SubtitleSpan> {
        self.subtitle.spans(self.highlighted_word)
    }

    /// The one entry point into a scene. Resets per-entry state, bumps
    /// the epoch, and either arms the fallback timer (silent scene) or
    /// asks the host to load the narration.
    fn enter(&mut self, index: usize, now: Timestamp, out: &mut Vec<Directive>) {
        self.teardown_audio(false, out);

        self.slot = Slot::At(index);
        self.epoch += 1;
        self.advance_consumed = false;
        self.image_failed = false;
        self.progress.enter(index);
        self.subtitle = Subtitle::new(self.scenes[index].subtitle_text());
        self.highlighted_word = None;

        match self.scenes[index]
            .audio_url
            .as_deref()
            .filter(|u| !u.is_empty())
        {
            None => {
                self.progress.start_timer(
                    index,
                    self.epoch,
                    self.config.fallback_duration_ms,
                    true,
                    now,
                );
                self.state = PlayState::Playing;
            }
            Some(url) => {
                self.state = PlayState::Loading;
                self.pending_load = Some(self.epoch);
                out.push(Directive::LoadAudio {
                    token: self.epoch,
                    url: url.to_string(),
                });
            }
        }
    }

    /// The single arbitration point for scene transitions. Requests that
    /// are stale (wrong epoch) or late (an earlier reason already won this
    /// entry) are no-ops.
    fn request_advance(
        &mut self,
        reason: AdvanceReason,
        epoch: u64,
        now: Timestamp,
        out: &mut Vec<Directive>,
    ) {
        if self.state == PlayState::Finished {
            return;
        }
        if epoch != self.epoch {
            debug!("dropping stale advance request ({reason:?})");
            return;
        }
        if self.advance_consumed {
            debug!("advance already settled for this entry, dropping {reason:?}");
            return;
        }
        self.advance_consumed = true;

        let Slot::At(index) = self.slot else {
            return;
        };
        self.progress.cancel_timer();
        self.progress.pin_complete(index);

        if index + 1 < self.scenes.len() {
            self.enter(index + 1, now, out);
        } else {
            self.finish(out);
        }
    }

    fn finish(&mut self, out: &mut Vec<Directive>) {
        self.teardown_audio(false, out);
        self.progress.cancel_timer();
        self.state = PlayState::Finished;
        self.notify_completed(out);
    }

    fn notify_completed(&mut self, out: &mut Vec<Directive>) {
        if !self.completed_notified {
            self.completed_notified = true;
            out.push(Directive::Notify {
                notice: Notice::Completed,
            });
        }
    }

    fn terminate(&mut self, notice: Notice) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.state == PlayState::Finished {
            return out;
        }
        self.teardown_audio(true, &mut out);
        self.progress.cancel_timer();
        self.state = PlayState::Finished;
        out.push(Directive::Notify { notice });
        out
    }

    /// Release whatever audio resource the host holds for this engine.
    /// At most one is ever live.
    fn teardown_audio(&mut self, stop_first: bool, out: &mut Vec<Directive>) {
        if self.audio_loaded || self.pending_load.is_some() {
            if stop_first && self.audio_loaded {
                out.push(Directive::StopAudio);
            }
            out.push(Directive::UnloadAudio);
            self.audio_loaded = false;
            self.pending_load = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn scene(order_index: i64, audio_url: Option<&str>, text: &str) -> Scene {
        Scene {
            id: None,
            order_index,
            image_url: None,
            audio_url: audio_url.map(str::to_string),
            voiceover: None,
            text: Some(text.to_string()),
            animation: None,
            year: None,
            duration_ms: None,
            language: None,
        }
    }

    fn engine(scenes: Vec<Scene>) -> MontageEngine {
        MontageEngine::new(scenes, PlayerConfig::default())
    }

    fn load_token(directives: &[Directive]) -> u64 {
        directives
            .iter()
            .find_map(|d| match d {
                Directive::LoadAudio { token, .. } => Some(*token),
                _ => None,
            })
            .expect("expected a LoadAudio directive")
    }

    fn notices(directives: &[Directive]) -> Vec<Notice> {
        directives
            .iter()
            .filter_map(|d| match d {
                Directive::Notify { notice } => Some(*notice),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sorts_scenes_by_order_index() {
        let engine = engine(vec![
            scene(30, None, "third"),
            scene(10, None, "first"),
            scene(20, None, "second"),
        ]);
        let texts: Vec<&str> = engine.scenes().iter().map(|s| s.subtitle_text()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_scene_list_completes_immediately() {
        let mut engine = engine(vec![]);
        let out = engine.start(at(0));
        assert_eq!(notices(&out), vec![Notice::Completed]);
        assert_eq!(engine.state(), PlayState::Finished);
        assert!(engine.tick(at(1_000)).is_empty());
    }

    #[test]
    fn start_configures_audio_and_prefetches_images() {
        let mut scenes = vec![scene(0, None, "a"), scene(1, None, "b")];
        scenes[0].image_url = Some("https://cdn/one.jpg".into());
        scenes[1].image_url = Some("https://cdn/two.jpg".into());
        let mut engine = engine(scenes);

        let out = engine.start(at(0));
        assert!(matches!(out[0], Directive::ConfigureAudioSession { .. }));
        let prefetched: Vec<&str> = out
            .iter()
            .filter_map(|d| match d {
                Directive::PrefetchImage { url } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(prefetched, vec!["https://cdn/one.jpg", "https://cdn/two.jpg"]);
    }

    #[test]
    fn silent_scene_advances_at_fallback_duration() {
        let mut engine = engine(vec![scene(0, None, "a"), scene(1, None, "b")]);
        engine.start(at(0));
        assert_eq!(engine.current_scene(), Some(0));

        engine.tick(at(9_999));
        assert_eq!(engine.current_scene(), Some(0));

        engine.tick(at(10_000));
        assert_eq!(engine.current_scene(), Some(1));
        assert_eq!(engine.snapshot().progress, vec![1.0, 0.0]);
    }

    #[test]
    fn reported_duration_is_floored() {
        let mut engine = engine(vec![scene(0, Some("a.mp3"), "a"), scene(1, None, "b")]);
        let out = engine.start(at(0));
        let token = load_token(&out);
        assert_eq!(engine.state(), PlayState::Loading);

        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 4_000,
            },
            at(100),
        );
        assert_eq!(engine.state(), PlayState::Playing);

        // At the reported 4s mark the floored 10s bar is only at 0.4.
        engine.tick(at(4_100));
        let p = engine.snapshot().progress[0];
        assert!((p - 0.4).abs() < 0.01, "bar at {p}, expected ~0.4");

        // The bar timer alone never advances an audio scene.
        engine.tick(at(10_100));
        assert_eq!(engine.current_scene(), Some(0));
        assert_eq!(engine.snapshot().progress[0], 1.0);
    }

    #[test]
    fn audio_completion_advances_and_pins_progress() {
        let mut engine = engine(vec![scene(0, Some("a.mp3"), "one two"), scene(1, None, "b")]);
        let token = load_token(&engine.start(at(0)));
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 12_000,
            },
            at(100),
        );

        let out = engine.handle_event(
            HostEvent::AudioStatus {
                token: Some(token),
                position_ms: 12_000,
                duration_ms: 12_000,
                did_just_finish: true,
            },
            at(12_100),
        );
        // Departed audio gets unloaded before the next entry.
        assert!(out.contains(&Directive::UnloadAudio));
        assert_eq!(engine.current_scene(), Some(1));
        assert_eq!(engine.snapshot().progress[0], 1.0);
    }

    #[test]
    fn status_updates_drive_word_highlight() {
        let mut engine = engine(vec![scene(0, Some("a.mp3"), "one two three four")]);
        let token = load_token(&engine.start(at(0)));
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 10_000,
            },
            at(0),
        );
        assert_eq!(engine.snapshot().highlighted_word, None);

        engine.handle_event(
            HostEvent::AudioStatus {
                token: Some(token),
                position_ms: 2_600,
                duration_ms: 10_000,
                did_just_finish: false,
            },
            at(2_600),
        );
        assert_eq!(engine.snapshot().highlighted_word, Some(1));

        engine.handle_event(
            HostEvent::AudioStatus {
                token: Some(token),
                position_ms: 10_000,
                duration_ms: 10_000,
                did_just_finish: true,
            },
            at(10_000),
        );
        assert_eq!(engine.snapshot().highlighted_word, Some(3));
    }

    #[test]
    fn double_tap_within_debounce_advances_once() {
        let mut engine = engine(vec![
            scene(0, None, "a"),
            scene(1, None, "b"),
            scene(2, None, "c"),
        ]);
        engine.start(at(0));

        engine.next_manual(at(1_000));
        assert_eq!(engine.current_scene(), Some(1));

        engine.next_manual(at(1_150));
        assert_eq!(engine.current_scene(), Some(1));

        engine.next_manual(at(1_300));
        assert_eq!(engine.current_scene(), Some(2));
    }

    #[test]
    fn previous_at_first_scene_restarts_the_montage() {
        let mut engine = engine(vec![scene(0, None, "a"), scene(1, None, "b")]);
        engine.start(at(0));
        engine.tick(at(4_000));
        assert!(engine.snapshot().progress[0] > 0.0);

        engine.previous(at(4_100));
        assert_eq!(engine.current_scene(), None);
        assert_eq!(engine.snapshot().progress, vec![0.0, 0.0]);

        // The next tick re-enters scene 0 fresh.
        engine.tick(at(4_150));
        assert_eq!(engine.current_scene(), Some(0));
        assert_eq!(engine.state(), PlayState::Playing);

        // The fallback clock restarted from the re-entry, not from start.
        engine.tick(at(10_000));
        assert_eq!(engine.current_scene(), Some(0));
        engine.tick(at(14_150));
        assert_eq!(engine.current_scene(), Some(1));
    }

    #[test]
    fn previous_from_later_scene_steps_back() {
        let mut engine = engine(vec![scene(0, None, "a"), scene(1, None, "b")]);
        engine.start(at(0));
        engine.tick(at(10_000));
        assert_eq!(engine.current_scene(), Some(1));

        engine.previous(at(11_000));
        assert_eq!(engine.current_scene(), Some(0));
        assert_eq!(engine.state(), PlayState::Playing);
    }

    #[test]
    fn completes_exactly_once_and_stays_terminal() {
        let mut engine = engine(vec![scene(0, None, "a")]);
        engine.start(at(0));
        let out = engine.tick(at(10_000));
        assert_eq!(notices(&out), vec![Notice::Completed]);
        assert_eq!(engine.state(), PlayState::Finished);

        assert!(engine.tick(at(20_000)).is_empty());
        assert!(engine.next_manual(at(21_000)).is_empty());
        assert!(engine.previous(at(22_000)).is_empty());
        assert_eq!(engine.state(), PlayState::Finished);
    }

    #[test]
    fn skip_stops_and_unloads_before_notifying() {
        let mut engine = engine(vec![scene(0, Some("a.mp3"), "a"), scene(1, None, "b")]);
        let token = load_token(&engine.start(at(0)));
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 10_000,
            },
            at(0),
        );

        let out = engine.skip(at(2_000));
        assert_eq!(
            out,
            vec![
                Directive::StopAudio,
                Directive::UnloadAudio,
                Directive::Notify {
                    notice: Notice::Skipped
                },
            ]
        );
        assert_eq!(engine.state(), PlayState::Finished);
        // Skip is terminal and never also completes.
        assert!(engine.tick(at(30_000)).is_empty());
    }

    #[test]
    fn close_notifies_closed() {
        let mut engine = engine(vec![scene(0, None, "a")]);
        engine.start(at(0));
        let out = engine.close(at(500));
        assert_eq!(notices(&out), vec![Notice::Closed]);
        assert_eq!(engine.state(), PlayState::Finished);
    }

    #[test]
    fn audio_load_failure_moves_on() {
        let mut engine = engine(vec![scene(0, Some("bad.mp3"), "a"), scene(1, None, "b")]);
        let token = load_token(&engine.start(at(0)));

        engine.handle_event(
            HostEvent::AudioLoadFailed {
                token,
                message: "network".into(),
            },
            at(500),
        );
        assert_eq!(engine.current_scene(), Some(1));
        assert_eq!(engine.snapshot().progress[0], 1.0);
        assert_eq!(engine.state(), PlayState::Playing);
    }

    #[test]
    fn manual_tap_beats_late_natural_completion() {
        let mut engine = engine(vec![
            scene(0, Some("a.mp3"), "a"),
            scene(1, None, "b"),
            scene(2, None, "c"),
        ]);
        let token = load_token(&engine.start(at(0)));
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 10_000,
            },
            at(0),
        );

        engine.next_manual(at(9_990));
        assert_eq!(engine.current_scene(), Some(1));

        // The completion signal scheduled before the tap lands after it.
        engine.handle_event(
            HostEvent::AudioStatus {
                token: Some(token),
                position_ms: 10_000,
                duration_ms: 10_000,
                did_just_finish: true,
            },
            at(10_000),
        );
        assert_eq!(engine.current_scene(), Some(1));
    }

    #[test]
    fn stale_load_result_after_navigation_is_dropped() {
        let mut engine = engine(vec![
            scene(0, Some("a.mp3"), "a"),
            scene(1, Some("b.mp3"), "b"),
        ]);
        let first_token = load_token(&engine.start(at(0)));

        // Navigate away while the load is still in flight.
        let out = engine.next_manual(at(1_000));
        let second_token = load_token(&out);
        assert_ne!(first_token, second_token);

        // The original load finally resolves; it must not start playback.
        engine.handle_event(
            HostEvent::AudioLoaded {
                token: first_token,
                duration_ms: 9_000,
            },
            at(1_100),
        );
        assert_eq!(engine.state(), PlayState::Loading);
        assert_eq!(engine.current_scene(), Some(1));
    }

    #[test]
    fn pause_freezes_the_fallback_clock() {
        let mut engine = engine(vec![scene(0, None, "a"), scene(1, None, "b")]);
        engine.start(at(0));
        engine.tick(at(4_000));

        engine.toggle_pause(at(4_000));
        assert_eq!(engine.state(), PlayState::Paused);
        engine.tick(at(60_000));
        assert_eq!(engine.current_scene(), Some(0));

        engine.toggle_pause(at(60_000));
        assert_eq!(engine.state(), PlayState::Playing);
        engine.tick(at(65_000));
        assert_eq!(engine.current_scene(), Some(0));
        engine.tick(at(66_000));
        assert_eq!(engine.current_scene(), Some(1));
    }

    #[test]
    fn pause_and_resume_are_forwarded_to_loaded_audio() {
        let mut engine = engine(vec![scene(0, Some("a.mp3"), "a")]);
        let token = load_token(&engine.start(at(0)));
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 10_000,
            },
            at(0),
        );

        let out = engine.toggle_pause(at(1_000));
        assert_eq!(out, vec![Directive::PauseAudio]);
        let out = engine.toggle_pause(at(2_000));
        assert_eq!(out, vec![Directive::ResumeAudio]);
    }

    #[test]
    fn image_failure_is_presentational_only() {
        let mut scenes = vec![scene(0, None, "a"), scene(1, None, "b")];
        scenes[0].image_url = Some("https://cdn/one.jpg".into());
        let mut engine = engine(scenes);
        engine.start(at(0));

        engine.handle_event(HostEvent::ImageFailed { scene: 0 }, at(100));
        assert!(engine.snapshot().image_failed);
        assert_eq!(engine.current_scene(), Some(0));

        // The flag does not follow the session into the next scene.
        engine.tick(at(10_000));
        assert!(!engine.snapshot().image_failed);
    }

    #[test]
    fn shutdown_releases_audio_without_notifying() {
        let mut engine = engine(vec![scene(0, Some("a.mp3"), "a")]);
        let token = load_token(&engine.start(at(0)));
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 10_000,
            },
            at(0),
        );

        let out = engine.shutdown();
        assert_eq!(out, vec![Directive::StopAudio, Directive::UnloadAudio]);
        assert!(notices(&out).is_empty());
    }

    /// The walkthrough from the design discussion: silent, short audio,
    /// silent. The short audio's bar runs on the floored duration but the
    /// scene still advances on the audio's own completion.
    #[test]
    fn three_scene_walkthrough() {
        let mut engine = engine(vec![
            scene(0, None, "intro"),
            scene(1, Some("a.mp3"), "one two three"),
            scene(2, None, "outro"),
        ]);
        engine.start(at(0));
        assert_eq!(engine.current_scene(), Some(0));

        // Scene 0: silent, advances at the 10s fallback.
        let out = engine.tick(at(10_000));
        let token = load_token(&out);
        assert_eq!(engine.current_scene(), Some(1));

        // Scene 1: audio reports 4s, floored to a 10s bar.
        engine.handle_event(
            HostEvent::AudioLoaded {
                token,
                duration_ms: 4_000,
            },
            at(10_050),
        );
        engine.tick(at(12_050));
        assert!(engine.snapshot().progress[1] < 0.5);

        // Audio finishes at its real 4s; the scene advances regardless of
        // the bar.
        engine.handle_event(
            HostEvent::AudioStatus {
                token: Some(token),
                position_ms: 4_000,
                duration_ms: 4_000,
                did_just_finish: true,
            },
            at(14_050),
        );
        assert_eq!(engine.current_scene(), Some(2));
        assert_eq!(engine.snapshot().progress[..2], [1.0, 1.0]);

        // Scene 2: silent again; completion ends the session exactly once.
        let out = engine.tick(at(24_050));
        assert_eq!(notices(&out), vec![Notice::Completed]);
        assert_eq!(engine.state(), PlayState::Finished);
    }
}
