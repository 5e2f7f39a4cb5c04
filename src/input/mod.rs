//! Two-button input: gesture latch (interrupt side) and menu state machine
//! (input task side).
//!
//! # Architecture
//!
//! ```text
//! GPIO edge ISR ──on_edge()──▶ ButtonLatch ──take()──▶ input task ──apply()──▶ AppState
//!                            (critical section)                          │
//!                                                         Transition ◀───┘
//! ```

pub mod buttons;
pub mod menu;
pub mod settings;

pub use buttons::{Button, ButtonLatch, Gesture, GESTURE_QUEUE_LEN};
pub use menu::{AppState, Menu, MenuEffect, Power, Transition, MAIN_MENU_ITEMS};
pub use settings::{wrapped_slice, Settings};
