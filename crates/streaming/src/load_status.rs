use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of an item's backing resource.
///
/// Pending → Loading → {Loaded | Failed | OpenFailure}; Loaded returns to
/// Pending when the resource has to be fetched again. The discriminants are
/// the stable encoding stored in [`LoadStatusCell`].
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    NotLoaded = 0,
    Pending = 1,
    Loading = 2,
    Loaded = 3,
    Failed = 4,
    OpenFailure = 5,
}

impl LoadStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => LoadStatus::NotLoaded,
            1 => LoadStatus::Pending,
            2 => LoadStatus::Loading,
            3 => LoadStatus::Loaded,
            4 => LoadStatus::Failed,
            5 => LoadStatus::OpenFailure,
            _ => return None,
        })
    }

    pub fn is_failure(self) -> bool {
        matches!(self, LoadStatus::Failed | LoadStatus::OpenFailure)
    }

    /// No worker owns the item in this state.
    pub fn is_settled(self) -> bool {
        !matches!(self, LoadStatus::Pending | LoadStatus::Loading)
    }
}

/// Atomic load status shared between the owning thread and load tasks.
///
/// This is the only field both sides write. Workers claim a load with
/// [`LoadStatusCell::try_claim`]; every other transition is a plain store by
/// whichever side currently owns the item.
#[derive(Debug)]
pub struct LoadStatusCell {
    raw: AtomicU8,
}

impl LoadStatusCell {
    pub fn new(status: LoadStatus) -> Self {
        Self {
            raw: AtomicU8::new(status as u8),
        }
    }

    pub fn get(&self) -> LoadStatus {
        // Only values written through `set`/`compare_exchange` are ever stored.
        LoadStatus::from_u8(self.raw.load(Ordering::Acquire)).unwrap_or(LoadStatus::Failed)
    }

    pub fn set(&self, status: LoadStatus) {
        self.raw.store(status as u8, Ordering::Release);
    }

    /// Atomically replaces `current` with `new`. On failure returns the
    /// status that was observed instead.
    pub fn compare_exchange(&self, current: LoadStatus, new: LoadStatus) -> Result<(), LoadStatus> {
        self.raw
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|seen| LoadStatus::from_u8(seen).unwrap_or(LoadStatus::Failed))
    }

    /// Pending → Loading. Exactly one caller wins per pending load.
    pub fn try_claim(&self) -> bool {
        self.compare_exchange(LoadStatus::Pending, LoadStatus::Loading)
            .is_ok()
    }
}

impl Default for LoadStatusCell {
    fn default() -> Self {
        Self::new(LoadStatus::Loaded)
    }
}
