// montage_core: host-driven montage playback engine.
// Sequencing, timing, and advance arbitration live here; the host shell is
// plumbing that executes the returned directives against the platform
// audio/image APIs.

mod error;
mod navigation;
mod progress;
mod sequencer;
mod subtitle;
mod types;

use wasm_bindgen::prelude::*;

pub use error::EngineError;
pub use navigation::NavigationGuard;
pub use progress::{ProgressTable, TimerFired};
pub use sequencer::MontageEngine;
pub use subtitle::{Subtitle, SubtitleSpan};
pub use types::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Montage player exposed to JavaScript.
///
/// Batch JSON interface to minimize JS↔WASM crossings: the host constructs
/// it with the scene list, registers lifecycle callbacks, then drives it
/// with timestamped calls. Every driving call returns the directive batch
/// the host must execute, in order, as JSON.
#[wasm_bindgen]
pub struct Player {
    inner: MontageEngine,
    on_complete: Option<js_sys::Function>,
    on_skip: Option<js_sys::Function>,
    on_close: Option<js_sys::Function>,
}

#[wasm_bindgen]
impl Player {
    /// Create a player from a JSON scene array and a JSON config object
    /// (`"{}"` for defaults).
    #[wasm_bindgen(constructor)]
    pub fn new(scenes_json: &str, config_json: &str) -> Result<Player, JsValue> {
        let scenes: Vec<Scene> = serde_json::from_str(scenes_json)
            .map_err(|e| to_js(EngineError::InvalidScenes(e.to_string())))?;
        let config: PlayerConfig = serde_json::from_str(config_json)
            .map_err(|e| to_js(EngineError::InvalidConfig(e.to_string())))?;

        Ok(Player {
            inner: MontageEngine::new(scenes, config),
            on_complete: None,
            on_skip: None,
            on_close: None,
        })
    }

    /// Called on normal end-of-session.
    pub fn set_on_complete(&mut self, callback: js_sys::Function) {
        self.on_complete = Some(callback);
    }

    /// Called on explicit skip. Falls back to the complete callback when
    /// absent.
    pub fn set_on_skip(&mut self, callback: js_sys::Function) {
        self.on_skip = Some(callback);
    }

    /// Called when the hosting overlay is dismissed. Falls back to the
    /// complete callback when absent.
    pub fn set_on_close(&mut self, callback: js_sys::Function) {
        self.on_close = Some(callback);
    }

    pub fn start(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.start(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn tick(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.tick(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    /// Feed back a host event (`AudioLoaded`, `AudioLoadFailed`,
    /// `AudioStatus`, `ImageFailed`) as JSON.
    pub fn handle_event(&mut self, event_json: &str, now_ms: u64) -> Result<String, JsValue> {
        let event: HostEvent = serde_json::from_str(event_json)
            .map_err(|e| to_js(EngineError::InvalidEvent(e.to_string())))?;
        let out = self.inner.handle_event(event, Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn next(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.next_manual(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn previous(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.previous(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn toggle_pause(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.toggle_pause(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn skip(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.skip(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn close(&mut self, now_ms: u64) -> Result<String, JsValue> {
        let out = self.inner.close(Timestamp::from_millis(now_ms));
        self.dispatch(out)
    }

    pub fn shutdown(&mut self) -> Result<String, JsValue> {
        let out = self.inner.shutdown();
        self.dispatch(out)
    }

    /// Render state as JSON: play state, active scene, progress bars,
    /// subtitle, and highlight.
    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.snapshot()).map_err(|e| to_js(EngineError::from(e)))
    }

    /// The active subtitle as highlight-aware render spans, as JSON.
    pub fn subtitle_spans(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.subtitle_spans())
            .map_err(|e| to_js(EngineError::from(e)))
    }

    /// Invoke registered lifecycle callbacks for any notifications in the
    /// batch, then hand the whole batch to the host as JSON.
    fn dispatch(&self, directives: Vec<Directive>) -> Result<String, JsValue> {
        for directive in &directives {
            if let Directive::Notify { notice } = directive {
                let callback = match notice {
                    Notice::Completed => self.on_complete.as_ref(),
                    Notice::Skipped => self.on_skip.as_ref().or(self.on_complete.as_ref()),
                    Notice::Closed => self.on_close.as_ref().or(self.on_complete.as_ref()),
                };
                if let Some(callback) = callback {
                    let _ = callback.call0(&JsValue::NULL);
                }
            }
        }
        serde_json::to_string(&directives).map_err(|e| to_js(EngineError::from(e)))
    }
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENES: &str = r#"[
        {"orderIndex": 1, "text": "second", "audioUrl": "https://cdn/a.mp3"},
        {"orderIndex": 0, "text": "first"}
    ]"#;

    #[test]
    fn player_creation_works() {
        let player = Player::new(SCENES, "{}");
        assert!(player.is_ok());
    }

    #[test]
    fn start_returns_directive_batch_json() {
        let mut player = Player::new(SCENES, "{}").unwrap();
        let json = player.start(0).unwrap();
        let directives: Vec<Directive> = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            directives[0],
            Directive::ConfigureAudioSession { .. }
        ));
    }

    #[test]
    fn snapshot_reflects_sorted_scene_order() {
        let mut player = Player::new(SCENES, "{}").unwrap();
        player.start(0).unwrap();
        let snapshot = player.snapshot().unwrap();
        // Scene with orderIndex 0 plays first despite being listed second.
        assert!(snapshot.contains(r#""subtitle":"first""#));
    }

    #[test]
    fn handle_event_decodes_host_events() {
        let mut player = Player::new(SCENES, "{}").unwrap();
        player.start(0).unwrap();
        // Silent scene first; a stale load event is simply dropped.
        let json = player
            .handle_event(r#"{"type":"AudioLoaded","token":99,"duration_ms":4000}"#, 10)
            .unwrap();
        let directives: Vec<Directive> = serde_json::from_str(&json).unwrap();
        assert!(directives.is_empty());
    }
}
