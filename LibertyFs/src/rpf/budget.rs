//! Counting memory budget for bulk extraction
//!
//! Workers reserve bytes before reading an entry and give them back when the
//! returned [`BudgetToken`] drops. Reservations block while the budget is
//! exhausted.

use parking_lot::{Condvar, Mutex};

/// Shared byte budget.
///
/// A capacity of 0 means unbounded. Requests larger than the capacity are
/// clamped to it, so a single oversized entry waits for the pool to drain
/// instead of blocking forever.
#[derive(Debug)]
pub struct MemoryBudget {
    capacity: u64,
    in_use: Mutex<u64>,
    released: Condvar,
}

impl MemoryBudget {
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Budget sized in mebibytes.
    #[must_use]
    pub fn from_mb(megabytes: u64) -> Self {
        Self::new(megabytes.saturating_mul(1024 * 1024))
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[must_use]
    pub fn in_use(&self) -> u64 {
        *self.in_use.lock()
    }

    /// Block until `bytes` can be reserved.
    pub fn acquire(&self, bytes: u64) -> BudgetToken<'_> {
        if self.capacity == 0 {
            return BudgetToken { budget: self, bytes: 0 };
        }

        let bytes = bytes.min(self.capacity);
        let mut in_use = self.in_use.lock();
        while *in_use + bytes > self.capacity {
            self.released.wait(&mut in_use);
        }
        *in_use += bytes;
        BudgetToken { budget: self, bytes }
    }

    /// Reserve `bytes` if available right now.
    pub fn try_acquire(&self, bytes: u64) -> Option<BudgetToken<'_>> {
        if self.capacity == 0 {
            return Some(BudgetToken { budget: self, bytes: 0 });
        }

        let bytes = bytes.min(self.capacity);
        let mut in_use = self.in_use.lock();
        if *in_use + bytes > self.capacity {
            return None;
        }
        *in_use += bytes;
        Some(BudgetToken { budget: self, bytes })
    }

    fn release(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let mut in_use = self.in_use.lock();
        *in_use = in_use.saturating_sub(bytes);
        self.released.notify_all();
    }
}

/// Reservation held against a [`MemoryBudget`]; released on drop.
#[derive(Debug)]
pub struct BudgetToken<'a> {
    budget: &'a MemoryBudget,
    bytes: u64,
}

impl BudgetToken<'_> {
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for BudgetToken<'_> {
    fn drop(&mut self) {
        self.budget.release(self.bytes);
    }
}
