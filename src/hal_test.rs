// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the HAL critical-section guard and mock implementation.

use super::*;

#[test]
fn critical_section_restores_previous_state() {
    let hal = MockHal::new();
    assert!(hal.irq_enabled.get());
    {
        let _guard = CriticalSection::enter(&hal);
        assert!(!hal.irq_enabled.get());
    }
    assert!(hal.irq_enabled.get());
}

#[test]
fn nested_critical_sections_restore_outer_state() {
    let hal = MockHal::new();
    hal.disable_irq();
    {
        let _guard = CriticalSection::enter(&hal);
        assert!(!hal.irq_enabled.get());
    }
    assert!(!hal.irq_enabled.get());
    hal.enable_irq(true);
}

#[test]
fn mock_hal_captures_output() {
    let hal = MockHal::new();
    hal.write(b"hello ");
    hal.write(b"world\n");
    assert_eq!(hal.output(), "hello world\n");
}

#[test]
fn mock_hal_advances_ticks_explicitly() {
    let hal = MockHal::new();
    assert_eq!(hal.now_ticks(), 0);
    hal.advance(5);
    assert_eq!(hal.now_ticks(), 5);
}
