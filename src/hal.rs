// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Hardware abstraction contract.
//!
//! Everything the interpreter and scheduler need from the outside world goes
//! through this trait: writing output, masking interrupts around a critical
//! section, and reading a monotonic tick count. `StdHal` backs the CLI;
//! `MockHal` backs tests, the same split the teacher draws between a real
//! UART driver and an in-memory mock.

use core::cell::Cell;

/// Host services the VM and scheduler require.
///
/// Implementors must guarantee that `disable_irq`/`enable_irq` nest correctly
/// when used through [`CriticalSection::enter`] — callers never call them
/// directly.
pub trait Hal {
    /// One-time setup (clock, console, timer). Called once before any task
    /// runs.
    fn init(&self);

    /// Write raw bytes to the console/log sink. No line buffering guarantee.
    fn write(&self, bytes: &[u8]);

    /// Flush any buffered output.
    fn flush(&self);

    /// Disable interrupt delivery, returning the previous enabled state.
    fn disable_irq(&self) -> bool;

    /// Restore interrupt delivery to `was_enabled`.
    fn enable_irq(&self, was_enabled: bool);

    /// Halt the CPU until the next interrupt (timer tick or otherwise).
    fn idle_cpu(&self);

    /// Monotonic tick counter, advanced by the timer ISR in a real
    /// deployment. Used by the scheduler to compute sleep wake-up times.
    fn now_ticks(&self) -> u32;
}

/// RAII guard disabling interrupts for its lifetime.
///
/// Grounded in the "guaranteed release on every exit path" requirement:
/// whether the guarded block returns normally, via `?`, or panics during
/// unwinding, `Drop::drop` restores the previous IRQ state exactly once.
pub struct CriticalSection<'a, H: Hal> {
    hal: &'a H,
    was_enabled: bool,
}

impl<'a, H: Hal> CriticalSection<'a, H> {
    #[must_use]
    pub fn enter(hal: &'a H) -> Self {
        let was_enabled = hal.disable_irq();
        Self { hal, was_enabled }
    }
}

impl<H: Hal> Drop for CriticalSection<'_, H> {
    fn drop(&mut self) {
        self.hal.enable_irq(self.was_enabled);
    }
}

/// Host-OS backed [`Hal`] used by the CLI binary.
#[cfg(feature = "std")]
pub struct StdHal {
    start: std::time::Instant,
    irq_enabled: std::sync::atomic::AtomicBool,
}

#[cfg(feature = "std")]
impl StdHal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
            irq_enabled: std::sync::atomic::AtomicBool::new(true),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdHal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Hal for StdHal {
    fn init(&self) {}

    fn write(&self, bytes: &[u8]) {
        use std::io::Write as _;
        let _ = std::io::stdout().write_all(bytes);
    }

    fn flush(&self) {
        use std::io::Write as _;
        let _ = std::io::stdout().flush();
    }

    fn disable_irq(&self) -> bool {
        self.irq_enabled.swap(false, core::sync::atomic::Ordering::SeqCst)
    }

    fn enable_irq(&self, was_enabled: bool) {
        self.irq_enabled
            .store(was_enabled, core::sync::atomic::Ordering::SeqCst);
    }

    fn idle_cpu(&self) {
        std::thread::yield_now();
    }

    fn now_ticks(&self) -> u32 {
        self.start.elapsed().as_millis() as u32 / crate::config::TICK_UNIT_MS
    }
}

/// In-memory [`Hal`] used by tests: captures everything written to it and
/// lets the test advance the tick count explicitly instead of depending on
/// wall-clock time.
pub struct MockHal {
    buf: core::cell::RefCell<alloc::vec::Vec<u8>>,
    irq_enabled: Cell<bool>,
    ticks: Cell<u32>,
}

impl MockHal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: core::cell::RefCell::new(alloc::vec::Vec::new()),
            irq_enabled: Cell::new(true),
            ticks: Cell::new(0),
        }
    }

    /// Snapshot of everything written so far, as UTF-8 (lossy on invalid
    /// bytes, since test programs only ever write text).
    #[must_use]
    pub fn output(&self) -> alloc::string::String {
        alloc::string::String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    /// Advance the mock clock by `delta` ticks.
    pub fn advance(&self, delta: u32) {
        self.ticks.set(self.ticks.get() + delta);
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for MockHal {
    fn init(&self) {}

    fn write(&self, bytes: &[u8]) {
        self.buf.borrow_mut().extend_from_slice(bytes);
    }

    fn flush(&self) {}

    fn disable_irq(&self) -> bool {
        self.irq_enabled.replace(false)
    }

    fn enable_irq(&self, was_enabled: bool) {
        self.irq_enabled.set(was_enabled);
    }

    fn idle_cpu(&self) {}

    fn now_ticks(&self) -> u32 {
        self.ticks.get()
    }
}

#[cfg(test)]
mod hal_test;
