use parking_lot::Mutex;

/// Single-slot hand-off from one producer thread to one consumer thread.
///
/// Contract:
/// - The producer calls [`Mailbox::deliver`] at most once per hand-off; the
///   value moves into the slot and the producer keeps nothing.
/// - The consumer calls [`Mailbox::take`], which empties the slot.
/// - The slot is empty whenever no hand-off is in flight.
///
/// The lock is never contended in practice: a status gate decides which side
/// may touch the slot. It only exists so the move is sound without `unsafe`.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `value` into an empty slot. A full slot is left untouched and the
    /// value is handed back to the caller.
    pub fn deliver(&self, value: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_full(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Drops any undelivered value. Returns `true` if one was present.
    pub fn clear(&self) -> bool {
        self.slot.lock().take().is_some()
    }
}
