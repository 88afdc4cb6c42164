//! Module: fault
//!
//! Purpose: Record why the device parked.
//!
//! A mis-programmed EEPROM must never play garbage, so the two programming
//! failures are fail-stop: the outer loop dumps a diagnostic on the serial
//! link, records the fault here, and halts forever. Playback itself has no
//! error conditions. The state is atomic because the record is written from
//! the main loop but may be inspected from another execution context (an
//! attached debugger, or the wake interrupt path).

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Why the device stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// Page program never completed: write-in-progress bit stuck.
    /// Fault data holds the last status register byte.
    EepromWriteTimeout = 1,

    /// Bootstrap saw a leading byte that was neither SOH nor EOT.
    /// Fault data holds the offending byte.
    BootstrapFraming = 2,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::EepromWriteTimeout,
            2 => FaultCode::BootstrapFraming,
            _ => FaultCode::None,
        }
    }
}

/// Thread-safe fault record.
pub struct FaultState {
    active: AtomicBool,
    code: AtomicU8,
    data: AtomicU32,
    count: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Record a fault. Increments the lifetime counter.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Check if a fault is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Get fault data (meaning depends on fault code).
    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Total faults recorded since boot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}
