// Manual-navigation guard: a transition lock plus a minimum interval
// between accepted commands. Rapid double-taps collapse to one transition.

use crate::types::Timestamp;

#[derive(Debug)]
pub struct NavigationGuard {
    window_ms: u64,
    locked: bool,
    last_accepted: Option<Timestamp>,
}

impl NavigationGuard {
    pub fn new(window_ms: u64) -> Self {
        NavigationGuard {
            window_ms,
            locked: false,
            last_accepted: None,
        }
    }

    /// Try to claim the right to navigate at `now`. Returns false while a
    /// transition holds the lock or `now` is inside the debounce window;
    /// rejected calls must be treated as no-ops.
    pub fn try_begin(&mut self, now: Timestamp) -> bool {
        if self.locked {
            return false;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_since(last) < self.window_ms {
                return false;
            }
        }
        self.locked = true;
        self.last_accepted = Some(now);
        true
    }

    /// Release the lock without consuming the debounce window. Used when a
    /// claimed navigation turns out to be a no-op (session already
    /// transitioning), so the rejection doesn't penalize the next tap.
    pub fn cancel(&mut self) {
        self.locked = false;
        self.last_accepted = None;
    }

    /// Release the lock after a completed transition. The debounce window
    /// keeps running from the accepted timestamp.
    pub fn finish(&mut self) {
        self.locked = false;
    }
}
