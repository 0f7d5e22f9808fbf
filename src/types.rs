// Strong typing over strings. Newtypes for timestamps, serde types for the
// host boundary: scenes in, directives and snapshots out.

use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds. Newtype for type safety.
///
/// The engine never reads a clock; the host stamps every call with one of
/// these (e.g. from `performance.now()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn saturating_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// One narrated unit of the montage: optional audio and image, subtitle
/// text, and a position in the sequence. Immutable for the engine's
/// lifetime. Extra feed fields (`id`, `year`, ...) are carried but inert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub id: Option<u64>,
    /// Playback position. The engine re-sorts by this field; caller
    /// ordering is not trusted.
    pub order_index: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub voiceover: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Advisory only. Actual duration comes from audio metadata or the
    /// configured fallback.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Scene {
    /// Subtitle text: voiceover when present and non-empty, else text,
    /// else empty.
    pub fn subtitle_text(&self) -> &str {
        self.voiceover
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.text.as_deref())
            .unwrap_or("")
    }
}

/// Player behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Scene duration when no audio is attached (milliseconds).
    #[serde(default = "default_fallback_duration_ms")]
    pub fallback_duration_ms: u64,
    /// Minimum progress-animation duration for audio scenes (milliseconds).
    /// Reported audio durations below this are floored to it.
    #[serde(default = "default_min_scene_duration_ms")]
    pub min_scene_duration_ms: u64,
    /// Minimum interval between accepted manual navigations (milliseconds).
    #[serde(default = "default_navigation_debounce_ms")]
    pub navigation_debounce_ms: u64,
    #[serde(default)]
    pub audio_session: AudioSessionConfig,
}

fn default_fallback_duration_ms() -> u64 {
    10_000
}

fn default_min_scene_duration_ms() -> u64 {
    10_000
}

fn default_navigation_debounce_ms() -> u64 {
    300
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            fallback_duration_ms: default_fallback_duration_ms(),
            min_scene_duration_ms: default_min_scene_duration_ms(),
            navigation_debounce_ms: default_navigation_debounce_ms(),
            audio_session: AudioSessionConfig::default(),
        }
    }
}

/// Platform audio-session configuration, applied by the host once at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSessionConfig {
    /// Play even when the device is in silent mode.
    #[serde(default = "default_true")]
    pub plays_in_silent_mode: bool,
    /// Keep playing when the app is backgrounded.
    #[serde(default)]
    pub stays_active_in_background: bool,
    /// Duck other apps' audio while narration plays.
    #[serde(default = "default_true")]
    pub ducks_others: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        AudioSessionConfig {
            plays_in_silent_mode: true,
            stays_active_in_background: false,
            ducks_others: true,
        }
    }
}

/// Session lifecycle notifications. The host shell routes these to its
/// registered callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Completed,
    Skipped,
    Closed,
}

/// Instruction to the host. The engine owns sequencing; the host executes
/// these against the platform audio/image APIs, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Directive {
    /// Apply platform audio-session settings.
    ConfigureAudioSession { config: AudioSessionConfig },
    /// Load the URL and start playing it. `token` must be echoed back in
    /// the resulting `AudioLoaded` / `AudioLoadFailed` event.
    LoadAudio { token: u64, url: String },
    PauseAudio,
    ResumeAudio,
    StopAudio,
    /// Release the loaded (or still-loading) audio resource.
    UnloadAudio,
    /// Opportunistically warm the image cache.
    PrefetchImage { url: String },
    Notify { notice: Notice },
}

/// Event reported by the host back into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    /// The audio for `LoadAudio { token }` is loaded and playing.
    AudioLoaded { token: u64, duration_ms: u64 },
    /// The load failed; the engine recovers by moving on.
    AudioLoadFailed { token: u64, message: String },
    /// Periodic playback-position update from the loaded audio.
    AudioStatus {
        #[serde(default)]
        token: Option<u64>,
        position_ms: u64,
        duration_ms: u64,
        #[serde(default)]
        did_just_finish: bool,
    },
    /// The scene's image failed to display; presentational only.
    ImageFailed { scene: usize },
}

/// Engine play state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayState {
    Idle,
    Loading,
    Playing,
    Paused,
    Finished,
}

/// Read-only view of the session for the host renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub state: PlayState,
    /// Active scene index; `None` while a restart is in flight.
    pub current_scene: Option<usize>,
    pub scene_count: usize,
    /// One bar per scene: 1.0 behind the active scene, its live fraction
    /// at it, 0.0 ahead of it.
    pub progress: Vec<f32>,
    /// Index into the active scene's words; `None` means nothing
    /// highlighted yet.
    pub highlighted_word: Option<usize>,
    pub subtitle: String,
    pub image_url: Option<String>,
    /// The active scene's image failed to display; show a placeholder.
    pub image_failed: bool,
}
