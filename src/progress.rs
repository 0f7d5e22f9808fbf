// Per-scene progress arena plus the active scene timer. One fraction slot
// per scene, at most one timer; a timer completion carries the entry epoch
// it was armed for so stale firings are detectable by the sequencer.

use crate::types::Timestamp;

/// Progress table for a whole montage.
#[derive(Debug)]
pub struct ProgressTable {
    slots: Vec<f32>,
    timer: Option<SceneTimer>,
}

/// The timer driving the active scene's bar: fallback duration for silent
/// scenes, floored audio duration for narrated ones.
#[derive(Debug)]
struct SceneTimer {
    scene: usize,
    epoch: u64,
    anchor: Timestamp,
    duration_ms: u64,
    /// Elapsed milliseconds frozen at pause time; `None` while running.
    paused_elapsed_ms: Option<u64>,
    advance_on_complete: bool,
}

/// A timer that ran to completion. `advance` is set for silent-scene
/// timers, whose natural completion drives the scene transition; audio
/// scenes advance on the audio's own completion signal instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub scene: usize,
    pub epoch: u64,
    pub advance: bool,
}

impl ProgressTable {
    pub fn new(scene_count: usize) -> Self {
        ProgressTable {
            slots: vec![0.0; scene_count],
            timer: None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn fraction(&self, scene: usize) -> f32 {
        self.slots.get(scene).copied().unwrap_or(0.0)
    }

    /// Re-entry semantics: cancel whatever timer is running and zero the
    /// entered scene's slot.
    pub fn enter(&mut self, scene: usize) {
        self.timer = None;
        if let Some(slot) = self.slots.get_mut(scene) {
            *slot = 0.0;
        }
    }

    pub fn start_timer(
        &mut self,
        scene: usize,
        epoch: u64,
        duration_ms: u64,
        advance_on_complete: bool,
        now: Timestamp,
    ) {
        self.timer = Some(SceneTimer {
            scene,
            epoch,
            anchor: now,
            duration_ms,
            paused_elapsed_ms: None,
            advance_on_complete,
        });
    }

    pub fn cancel_timer(&mut self) {
        self.timer = None;
    }

    /// Freeze the timer's elapsed time.
    pub fn pause(&mut self, now: Timestamp) {
        if let Some(timer) = &mut self.timer {
            if timer.paused_elapsed_ms.is_none() {
                timer.paused_elapsed_ms = Some(now.saturating_since(timer.anchor));
            }
        }
    }

    /// Re-anchor a frozen timer so elapsed time continues from where it
    /// stopped.
    pub fn resume(&mut self, now: Timestamp) {
        if let Some(timer) = &mut self.timer {
            if let Some(elapsed) = timer.paused_elapsed_ms.take() {
                timer.anchor = Timestamp::from_millis(now.as_millis().saturating_sub(elapsed));
            }
        }
    }

    /// Advance the active timer to `now`. The scene's slot only ever moves
    /// forward. Returns the completion exactly once, after which the timer
    /// is gone.
    pub fn poll(&mut self, now: Timestamp) -> Option<TimerFired> {
        let timer = self.timer.as_ref()?;
        if timer.paused_elapsed_ms.is_some() {
            return None;
        }
        let (scene, epoch, duration_ms, advance) = (
            timer.scene,
            timer.epoch,
            timer.duration_ms,
            timer.advance_on_complete,
        );
        let elapsed = now.saturating_since(timer.anchor);

        let fraction = if duration_ms == 0 {
            1.0
        } else {
            (elapsed as f32 / duration_ms as f32).min(1.0)
        };
        self.raise_fraction(scene, fraction);

        if elapsed >= duration_ms {
            self.pin_complete(scene);
            self.timer = None;
            return Some(TimerFired {
                scene,
                epoch,
                advance,
            });
        }
        None
    }

    /// Monotonic update from an external progress source (audio position).
    pub fn raise_fraction(&mut self, scene: usize, fraction: f32) {
        if let Some(slot) = self.slots.get_mut(scene) {
            let fraction = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            };
            if fraction > *slot {
                *slot = fraction;
            }
        }
    }

    /// Pin a departed (or just-finished) scene at fully watched.
    pub fn pin_complete(&mut self, scene: usize) {
        if let Some(slot) = self.slots.get_mut(scene) {
            *slot = 1.0;
        }
    }

    /// Full restart: every bar back to zero, no timer left running.
    pub fn reset_all(&mut self) {
        self.timer = None;
        for slot in &mut self.slots {
            *slot = 0.0;
        }
    }

    /// Bars as the host renders them: full behind the active scene, live
    /// at it, empty ahead of it.
    pub fn presented(&self, current: Option<usize>) -> Vec<f32> {
        match current {
            Some(active) => (0..self.slots.len())
                .map(|i| {
                    if i < active {
                        1.0
                    } else if i == active {
                        self.slots[i]
                    } else {
                        0.0
                    }
                })
                .collect(),
            None => self.slots.clone(),
        }
    }
}
