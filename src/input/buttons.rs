//! Debounced button latch shared between the GPIO interrupt and the input task.
//!
//! The interrupt handler reports raw edges with a microsecond timestamp.
//! A press starts on the falling edge (pin pulled low) and resolves on the
//! rising edge into a short or long [`Gesture`], queued in edge order.
//! The input task takes the whole queue at once.
//!
//! All state sits behind one `critical_section::Mutex`, held only for the
//! copy/reset.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::config::GestureConfig;

/// Gestures buffered between two input-task polls.
pub const GESTURE_QUEUE_LEN: usize = 8;

/// Physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Enters menus and commits the highlighted entry.
    Select,
    /// Advances the highlighted entry.
    Scroll,
}

impl Button {
    #[inline]
    const fn index(self) -> usize {
        match self {
            Button::Select => 0,
            Button::Scroll => 1,
        }
    }
}

/// A resolved press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Short(Button),
    Long(Button),
}

impl Gesture {
    pub fn button(self) -> Button {
        match self {
            Gesture::Short(b) | Gesture::Long(b) => b,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Track {
    pressed: bool,
    pressed_at: u64,
    last_edge: Option<u64>,
}

impl Track {
    const fn new() -> Self {
        Self {
            pressed: false,
            pressed_at: 0,
            last_edge: None,
        }
    }
}

struct LatchState {
    tracks: [Track; 2],
    queue: Deque<Gesture, GESTURE_QUEUE_LEN>,
    dropped: u32,
}

/// Button edge latch.
pub struct ButtonLatch {
    timing: GestureConfig,
    state: Mutex<RefCell<LatchState>>,
}

impl ButtonLatch {
    pub const fn new(timing: GestureConfig) -> Self {
        Self {
            timing,
            state: Mutex::new(RefCell::new(LatchState {
                tracks: [Track::new(), Track::new()],
                queue: Deque::new(),
                dropped: 0,
            })),
        }
    }

    /// Record a raw edge (interrupt context).
    ///
    /// `pressed` is the logical level after the edge. Edges inside the
    /// debounce window of the last accepted edge on the same button are
    /// ignored. A repeated release is ignored; a repeated press restarts
    /// the press, so each gesture is timed from its own falling edge.
    ///
    /// # Timing
    ///
    /// Bounded: one short critical section, no allocation.
    pub fn on_edge(&self, button: Button, pressed: bool, now_us: u64) {
        let debounce = self.timing.debounce_us;
        let long_press = self.timing.long_press_us;

        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let track = &mut state.tracks[button.index()];

            if let Some(last) = track.last_edge {
                if now_us.saturating_sub(last) < debounce {
                    return;
                }
            }
            if track.pressed == pressed {
                // A press while still "pressed" means the release fell inside
                // the debounce window. Restart timing from this press.
                if pressed {
                    track.last_edge = Some(now_us);
                    track.pressed_at = now_us;
                }
                return;
            }

            track.last_edge = Some(now_us);
            track.pressed = pressed;
            if pressed {
                track.pressed_at = now_us;
                return;
            }

            let held = now_us.saturating_sub(track.pressed_at);
            let gesture = if held >= long_press {
                Gesture::Long(button)
            } else {
                Gesture::Short(button)
            };
            if state.queue.push_back(gesture).is_err() {
                state.dropped = state.dropped.wrapping_add(1);
            }
        });
    }

    /// Take every pending gesture, oldest first (input task).
    pub fn take(&self) -> Deque<Gesture, GESTURE_QUEUE_LEN> {
        critical_section::with(|cs| {
            core::mem::replace(&mut self.state.borrow_ref_mut(cs).queue, Deque::new())
        })
    }

    /// Whether `button` is currently held down.
    pub fn is_pressed(&self, button: Button) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).tracks[button.index()].pressed)
    }

    /// Gestures lost because the queue was full.
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).dropped)
    }
}
