//! Single-slot inbound message mailbox.
//!
//! The inbound listener overwrites the slot on every line; the display task
//! takes it. Only the most recent message is kept, never a queue.

use std::sync::{Mutex, MutexGuard};

/// Longest message kept, in bytes (receive buffer size minus terminator).
pub const MAX_MESSAGE_LEN: usize = 127;

#[derive(Debug, Default)]
struct Slot {
    text: String,
    unread: bool,
}

/// Most-recent-message holder with an unread flag.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held message and mark it unread.
    ///
    /// Text longer than [`MAX_MESSAGE_LEN`] bytes is truncated on a char
    /// boundary.
    pub fn post(&self, text: &str) {
        let text = truncate_utf8(text, MAX_MESSAGE_LEN);
        let mut slot = self.lock();
        slot.text.clear();
        slot.text.push_str(text);
        slot.unread = true;
    }

    /// Take the message if it has not been read yet.
    pub fn take(&self) -> Option<String> {
        let mut slot = self.lock();
        if !slot.unread {
            return None;
        }
        slot.unread = false;
        Some(slot.text.clone())
    }

    pub fn has_unread(&self) -> bool {
        self.lock().unread
    }

    /// Last message received, read or not.
    pub fn last(&self) -> String {
        self.lock().text.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Slot is plain data; a panicking holder cannot leave it half-written.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mailbox() {
        let mb = Mailbox::new();
        assert!(!mb.has_unread());
        assert_eq!(mb.take(), None);
    }

    #[test]
    fn test_truncates_long_message() {
        let mb = Mailbox::new();
        mb.post(&"x".repeat(300));
        assert_eq!(mb.take().map(|m| m.len()), Some(MAX_MESSAGE_LEN));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; cutting at 3 must back off to 2.
        assert_eq!(truncate_utf8("éé", 3), "é");
        assert_eq!(truncate_utf8("abc", 10), "abc");
    }

    #[test]
    fn test_last_survives_take() {
        let mb = Mailbox::new();
        mb.post("hola");
        mb.take();
        assert_eq!(mb.last(), "hola");
    }
}
