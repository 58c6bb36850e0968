// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! `vm <file.mrb> [<file.mrb> ...]` — load and run up to `MAX_VM_COUNT` RITE
//! binaries concurrently on a single [`Scheduler`], exiting 0 only if every
//! one of them completed without an unhandled exception or load failure.

use rite_vm::hal::StdHal;
use rite_vm::sched::{CreateTaskError, TaskOutcome};
use rite_vm::Scheduler;

use std::process::ExitCode;

/// Equal priority for every program on the command line; the CLI has no
/// syntax for assigning one program a higher priority than another.
const DEFAULT_PRIORITY: u8 = 128;

/// Heap given to the allocator for the whole run. Generous relative to the
/// small sample programs this front-end is meant to exercise; a host with
/// tighter constraints builds its own [`Scheduler`] directly instead of
/// going through this binary.
const DEFAULT_POOL_SIZE: usize = 1 << 20;

fn main() -> ExitCode {
    env_logger::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: vm <file.mrb> [<file.mrb> ...]");
        return ExitCode::FAILURE;
    }

    let mut scheduler = Scheduler::new(StdHal::new(), DEFAULT_POOL_SIZE);
    let mut handles = Vec::with_capacity(paths.len());
    let mut ok = true;

    for path in &paths {
        let bytecode = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("vm: {path}: {err}");
                ok = false;
                continue;
            }
        };
        match scheduler.create_task(&bytecode, DEFAULT_PRIORITY) {
            Ok(handle) => handles.push((path, handle)),
            Err(CreateTaskError::NoFreeSlot) => {
                eprintln!("vm: {path}: no free VM slot (MAX_VM_COUNT reached)");
                ok = false;
            }
            Err(CreateTaskError::Load(e)) => {
                eprintln!("vm: {path}: {e}");
                ok = false;
            }
        }
    }

    scheduler.run();

    for (path, handle) in handles {
        match scheduler.outcome(handle) {
            Some(TaskOutcome::Completed(_)) => {}
            Some(TaskOutcome::Unhandled(_)) => {
                eprintln!("vm: {path}: unhandled exception");
                ok = false;
            }
            None => {
                eprintln!("vm: {path}: task never finished");
                ok = false;
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
