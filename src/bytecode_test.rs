// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;

#[test]
fn decodes_each_operand_shape() {
    let code = [0x01u8, 7, 9, 0x09, 1, 2, 3, 0x41, 0x00, 0x10];
    let mut cur = Cursor::new(&code, 0);
    assert_eq!(cur.fetch_op(), Some(Op::Move));
    assert_eq!(cur.fetch_bb(), Some((7, 9)));
    assert_eq!(cur.fetch_op(), Some(Op::GetConst));
    assert_eq!(cur.fetch_bbb(), Some((1, 2, 3)));
    assert_eq!(cur.fetch_op(), Some(Op::JmpIf));
    assert_eq!(cur.fetch_bs(), Some((0x00, 0x0010)));
}

#[test]
fn unknown_opcode_is_none() {
    let code = [0xFFu8];
    let mut cur = Cursor::new(&code, 0);
    assert_eq!(cur.fetch_op(), None);
}

#[test]
fn jump_to_moves_the_cursor_to_an_absolute_offset() {
    let code = [0u8; 16];
    let mut cur = Cursor::new(&code, 5);
    cur.jump_to(12);
    assert_eq!(cur.pc, 12);
}

#[test]
fn reading_past_the_end_of_the_stream_yields_none() {
    let code = [0x01u8];
    let mut cur = Cursor::new(&code, 0);
    assert_eq!(cur.fetch_op(), Some(Op::Move));
    assert_eq!(cur.fetch_b(), None);
}
