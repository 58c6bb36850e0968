// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cooperative round-robin scheduler, modeled on the upstream `rrt0.c` task
//! loop.
//!
//! Four conceptual queues: dormant (slot unused), ready, waiting (sleeping
//! on a tick deadline), suspended (parked by user request). [`Scheduler::run`]
//! picks the highest-priority ready task (ties broken by insertion order),
//! runs it for one slice, and re-queues it at the tail of its priority class
//! on slice exhaustion. A fixed, `MAX_VM_COUNT`-sized table of task slots is
//! reused across task lifetimes the way the upstream `mrbc_vm[MAX_VM_COUNT]`
//! array is, rather than growing without bound.

use crate::class::{ClassRegistry, BUILTIN_CLASS_COUNT};
use crate::config::{DEFAULT_TIMESLICE_TICK_COUNT, MAX_VM_COUNT, TICK_UNIT_MS};
use crate::error::LoadError;
use crate::hal::{CriticalSection, Hal};
use crate::irep::Program;
use crate::loader;
use crate::mem::TlsfPool;
use crate::symbol::SymbolTable;
use crate::types::{SymId, VmId};
use crate::value::Value;
use crate::vm::{Globals, StepOutcome, Task, World};

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;

/// Instruction budget burned per scheduler tick. [`Task::run_slice`] counts
/// bytecode instructions, not hardware ticks; this is the bridge between the
/// two units. Chosen so a default ten-tick slice runs several hundred
/// instructions before a task yields, long enough to make progress on a
/// tight loop without starving its peers for more than a slice.
const INSTRUCTIONS_PER_TICK: u32 = 64;

fn slice_budget() -> u32 {
    INSTRUCTIONS_PER_TICK * DEFAULT_TIMESLICE_TICK_COUNT as u32
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum TaskState {
    Ready,
    Waiting { wake_tick: u32 },
    Suspended,
}

/// Stable identity for a created task, independent of the (reusable) VM
/// slot backing it. A caller can still look up a terminated task's outcome
/// by handle after its slot has been recycled for a new task.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskHandle(u32);

/// How a finished task's outermost frame ended.
#[derive(Clone, Copy, Debug)]
pub enum TaskOutcome {
    /// The root IREP returned normally.
    Completed(Value),
    /// An exception propagated past the outermost frame with no handler.
    Unhandled(Value),
}

/// Why [`Scheduler::create_task`] could not start a new task.
#[derive(Debug)]
pub enum CreateTaskError {
    /// Every one of `MAX_VM_COUNT` task slots is occupied.
    NoFreeSlot,
    /// The bytecode itself failed to load.
    Load(LoadError),
}

impl fmt::Display for CreateTaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFreeSlot => write!(f, "no free VM slot (MAX_VM_COUNT = {MAX_VM_COUNT})"),
            Self::Load(e) => write!(f, "{e}"),
        }
    }
}

impl From<LoadError> for CreateTaskError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

struct TaskSlot {
    program: Program,
    task: Task,
    priority: u8,
    state: TaskState,
    handle: TaskHandle,
}

/// The scheduler: process-wide interpreter state (allocator, classes,
/// symbols, globals) plus a fixed table of task slots run cooperatively by
/// priority. Owns the [`Hal`] the whole process talks through.
pub struct Scheduler<H: Hal> {
    hal: H,
    pool: TlsfPool,
    classes: ClassRegistry,
    symbols: SymbolTable,
    globals: Globals,
    slots: Vec<Option<TaskSlot>>,
    ready: VecDeque<usize>,
    tick: u32,
    outcomes: Vec<Option<TaskOutcome>>,
}

impl<H: Hal> Scheduler<H> {
    /// Builds a scheduler with `pool_size` bytes of heap, every builtin
    /// symbol and class/method registered, and an empty task table, ready
    /// to accept [`Self::create_task`] calls.
    #[must_use]
    pub fn new(hal: H, pool_size: usize) -> Self {
        let pool = TlsfPool::new(pool_size);
        let mut symbols = SymbolTable::new();
        for name in crate::symbol::BUILTIN_SYMBOLS {
            symbols.intern_builtin(name);
        }
        let builtin_names: [SymId; BUILTIN_CLASS_COUNT] =
            core::array::from_fn(|i| symbols.intern_builtin(crate::class::BUILTIN_CLASS_NAMES[i]));
        let mut classes = ClassRegistry::new(builtin_names[0], builtin_names);
        crate::intrinsics::register_builtins(&mut classes, |name| symbols.lookup(name).expect("builtin symbol preloaded"));

        hal.init();

        let mut slots = Vec::with_capacity(MAX_VM_COUNT);
        slots.resize_with(MAX_VM_COUNT, || None);

        Self {
            hal,
            pool,
            classes,
            symbols,
            globals: Globals::new(),
            slots,
            ready: VecDeque::new(),
            tick: 0,
            outcomes: Vec::new(),
        }
    }

    /// Loads `bytecode` into the first free VM slot at `priority` (1..=255,
    /// lower runs first) and queues it ready, the `vm_open` half of the
    /// upstream `mrbc_create_task`/`vm_open` pair. Returns a handle stable
    /// across the task's lifetime, usable with [`Self::outcome`] even after
    /// its slot is recycled.
    pub fn create_task(&mut self, bytecode: &[u8], priority: u8) -> Result<TaskHandle, CreateTaskError> {
        let slot_index = self.slots.iter().position(Option::is_none).ok_or_else(|| {
            log::warn!("create_task: no free VM slot (MAX_VM_COUNT = {MAX_VM_COUNT})");
            CreateTaskError::NoFreeSlot
        })?;
        let program = loader::load(bytecode, &mut self.pool, &mut self.symbols, &self.classes).map_err(|e| {
            log::warn!("create_task: load failed: {e}");
            e
        })?;
        let handle = self.place_task(slot_index, program, priority);
        log::debug!("create_task: slot {slot_index} -> {handle:?}, priority {priority}");
        Ok(handle)
    }

    /// Test-only seam: places an already-built [`Program`] directly into a
    /// free slot, bypassing the RITE binary loader so tests can hand-assemble
    /// bytecode against `Irep`/`Op` rather than a `.mrb` byte buffer.
    #[cfg(test)]
    pub(crate) fn create_task_from_program(&mut self, program: Program, priority: u8) -> Result<TaskHandle, CreateTaskError> {
        let slot_index = self.slots.iter().position(Option::is_none).ok_or(CreateTaskError::NoFreeSlot)?;
        Ok(self.place_task(slot_index, program, priority))
    }

    fn place_task(&mut self, slot_index: usize, program: Program, priority: u8) -> TaskHandle {
        let vm_id = VmId::new(slot_index as u8 + 1);
        let task = Task::new(vm_id, &program, self.classes.object_class());
        let handle = TaskHandle(self.outcomes.len() as u32);
        self.outcomes.push(None);
        self.slots[slot_index] = Some(TaskSlot {
            program,
            task,
            priority,
            state: TaskState::Ready,
            handle,
        });
        self.insert_ready(slot_index);
        handle
    }

    /// Runs every created task to completion, round-robin by priority.
    /// Returns once no task remains ready or waiting — i.e. every task has
    /// either finished or been left `suspended`.
    pub fn run(&mut self) {
        loop {
            if let Some(slot_index) = self.ready.pop_front() {
                self.run_slot_once(slot_index);
                continue;
            }
            if !self.has_waiting() {
                return;
            }
            // No timer ISR drives `tick()` in this in-process loop; advance
            // the clock ourselves until a sleeping task wakes.
            self.tick();
        }
    }

    fn has_waiting(&self) -> bool {
        self.slots.iter().flatten().any(|s| matches!(s.state, TaskState::Waiting { .. }))
    }

    /// Inserts `slot_index` at the tail of its priority class: the first
    /// ready slot with a strictly lower priority (a larger number) marks
    /// where it splices in, preserving arrival order among equal priorities.
    fn insert_ready(&mut self, slot_index: usize) {
        let priority = self.slots[slot_index].as_ref().expect("inserting an empty slot").priority;
        let pos = self
            .ready
            .iter()
            .position(|&i| self.slots[i].as_ref().expect("ready slot is occupied").priority > priority)
            .unwrap_or(self.ready.len());
        self.ready.insert(pos, slot_index);
    }

    fn run_slot_once(&mut self, slot_index: usize) {
        let hal = &self.hal;
        let mut write = |bytes: &[u8]| hal.write(bytes);
        let mut world = World {
            pool: &mut self.pool,
            classes: &mut self.classes,
            symbols: &mut self.symbols,
            globals: &mut self.globals,
        };
        let slot = self.slots[slot_index].as_mut().expect("scheduled slot is occupied");
        let outcome = slot.task.run_slice(&slot.program, &mut world, &mut write, slice_budget());

        self.tick += DEFAULT_TIMESLICE_TICK_COUNT as u32;
        self.promote_waiting();

        match outcome {
            StepOutcome::TimeSliceExpired => self.insert_ready(slot_index),
            StepOutcome::Completed(v) => self.terminate(slot_index, TaskOutcome::Completed(v)),
            StepOutcome::Unhandled(v) => self.terminate(slot_index, TaskOutcome::Unhandled(v)),
        }
    }

    /// Moves a task to `dormant`, recording its outcome and reclaiming every
    /// heap block tagged with its `VmId` via `free_all`, so the slot and the
    /// memory it used are both available to a later [`Self::create_task`].
    fn terminate(&mut self, slot_index: usize, outcome: TaskOutcome) {
        let slot = self.slots[slot_index].take().expect("terminating an empty slot");
        match outcome {
            TaskOutcome::Completed(_) => log::debug!("{:?}: completed, freeing slot {slot_index}", slot.handle),
            TaskOutcome::Unhandled(_) => log::warn!("{:?}: unhandled exception, freeing slot {slot_index}", slot.handle),
        }
        self.outcomes[slot.handle.0 as usize] = Some(outcome);
        self.pool.free_all(VmId::new(slot_index as u8 + 1));
    }

    /// Puts the task to sleep until `tick + ceil(ms / TICK_UNIT_MS)`,
    /// mirroring `mrbc_sleep_ms` upstream. A no-op if `handle` names a task
    /// that has already finished.
    pub fn sleep_ms(&mut self, handle: TaskHandle, ms: u32) {
        let Some(slot_index) = self.find_slot(handle) else { return };
        self.ready.retain(|&i| i != slot_index);
        let wake = self.tick + ms.div_ceil(TICK_UNIT_MS);
        self.slots[slot_index].as_mut().expect("found slot is occupied").state = TaskState::Waiting { wake_tick: wake };
    }

    /// Gives up the remainder of the current slice, returning the task to
    /// the tail of its priority class without waiting for slice exhaustion.
    pub fn relinquish(&mut self, handle: TaskHandle) {
        let Some(slot_index) = self.find_slot(handle) else { return };
        self.ready.retain(|&i| i != slot_index);
        self.slots[slot_index].as_mut().expect("found slot is occupied").state = TaskState::Ready;
        self.insert_ready(slot_index);
    }

    /// Moves the task to `suspended`; `run` will never schedule it again
    /// until a matching [`Self::resume`].
    pub fn suspend(&mut self, handle: TaskHandle) {
        let Some(slot_index) = self.find_slot(handle) else { return };
        self.ready.retain(|&i| i != slot_index);
        self.slots[slot_index].as_mut().expect("found slot is occupied").state = TaskState::Suspended;
    }

    /// Moves a `suspended` task back to `ready`. A no-op for a task in any
    /// other state.
    pub fn resume(&mut self, handle: TaskHandle) {
        let Some(slot_index) = self.find_slot(handle) else { return };
        let slot = self.slots[slot_index].as_mut().expect("found slot is occupied");
        if slot.state != TaskState::Suspended {
            return;
        }
        slot.state = TaskState::Ready;
        self.insert_ready(slot_index);
    }

    /// Advances the tick counter by one and promotes any `waiting` task
    /// whose deadline has arrived to `ready`. Called from `run`'s idle path
    /// when nothing is runnable; a host with a real timer ISR can instead
    /// wire it directly to that interrupt, guarded the same way with a
    /// critical section around the counter update.
    pub fn tick(&mut self) {
        {
            let _cs = CriticalSection::enter(&self.hal);
            self.tick += 1;
        }
        self.promote_waiting();
    }

    fn promote_waiting(&mut self) {
        let now = self.tick;
        let woken: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                Some(slot) if matches!(slot.state, TaskState::Waiting { wake_tick } if wake_tick <= now) => Some(i),
                _ => None,
            })
            .collect();
        for slot_index in woken {
            self.slots[slot_index].as_mut().expect("woken slot is occupied").state = TaskState::Ready;
            self.insert_ready(slot_index);
        }
    }

    fn find_slot(&self, handle: TaskHandle) -> Option<usize> {
        self.slots.iter().position(|s| matches!(s, Some(slot) if slot.handle == handle))
    }

    /// The final result of a finished task, or `None` if it is still
    /// running, parked, or `handle` is unknown.
    #[must_use]
    pub fn outcome(&self, handle: TaskHandle) -> Option<TaskOutcome> {
        self.outcomes.get(handle.0 as usize).copied().flatten()
    }

    /// Current tick count, exposed for host-side logging/diagnostics.
    #[must_use]
    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// The HAL this scheduler was built with, for a host that wants to read
    /// captured output (e.g. [`crate::hal::MockHal::output`]) after [`Self::run`].
    #[must_use]
    pub fn hal(&self) -> &H {
        &self.hal
    }
}
