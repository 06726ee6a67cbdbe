//! Task control blocks, task creation and destruction

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use alloc::alloc::{alloc, dealloc};

use crate::config::{DEFAULT_PRIORITY, DEFAULT_STACK_SIZE, PRIORITY_COUNT};
use crate::list::Node;
use crate::sched::SCHEDULER;
use crate::stack::{MIN_STACK_SIZE, STACK_ALIGN, initialize_task_stack};

/// The function signature for task entry functions.
///
/// The entry function receives the opaque argument given to
/// [`task_create`]. A task that returns from its entry function is
/// destroyed.
pub type TaskEntry = extern "C" fn(*mut ());

/// Task run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TaskState {
    /// Task exited and is waiting to be reaped.
    Exited,
    /// Task is blocked and cannot run.
    Blocked,
    /// Task is ready but not running.
    Ready,
    /// Task is running.
    Active,
}

/// Why a blocked task is sleeping.
///
/// Drivers record the reason when they put a task to sleep and must
/// present the same reason to wake it, so that one subsystem cannot
/// spuriously wake a task another subsystem has parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockReason {
    /// Not blocked.
    None,
    /// Waiting for received serial data.
    UartRx,
    /// Waiting for space in the serial transmit buffer.
    UartTx,
    /// Waiting for a timer to elapse.
    Timer,
}

/// Task control block. Keeps task state and recordkeeping information.
///
/// The size and layout matter to the exception glue: `stack_top` must be
/// the first field, because the context-switch handler reaches the saved
/// stack pointer by dereferencing the TCB pointer in a single load.
#[repr(C)]
pub(crate) struct Tcb {
    /// Saved top of stack while the task is suspended. MUST be first.
    pub(crate) stack_top: Cell<*mut usize>,
    /// Lowest address of the stack region.
    pub(crate) stack_base: *mut u8,
    /// One past the highest address; where the task's stack starts.
    pub(crate) stack_limit: *mut u8,
    /// Task entry point.
    pub(crate) entry: TaskEntry,
    /// Argument passed to the entry point.
    pub(crate) arg: *mut (),
    /// Human-readable label. May be empty.
    pub(crate) name: &'static str,
    /// Task priority, `0..PRIORITY_COUNT`.
    pub(crate) priority: usize,
    /// Run state.
    pub(crate) state: Cell<TaskState>,
    /// Why the task is blocked, if it is.
    pub(crate) block_cause: Cell<BlockReason>,
    /// Was the stack allocated by the scheduler (freed on reap)?
    pub(crate) stack_owned: bool,
    /// Links this TCB into whichever queue it currently belongs to.
    pub(crate) node: Node<Tcb>,
}

impl Tcb {
    /// A compile-time check that the context-switch handler's single-load
    /// assumption holds.
    const _CHECK: () = const {
        assert!(core::mem::offset_of!(Tcb, stack_top) == 0);
    };

    pub(crate) fn node(&self) -> NonNull<Node<Tcb>> {
        NonNull::from(&self.node)
    }
}

/// An opaque handle to a task.
///
/// Handles are freely copyable; they do not keep the task alive. A handle
/// becomes dangling once the task has been destroyed and reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(pub(crate) NonNull<Tcb>);

// SAFETY: a handle is only a pointer; everything it can reach is guarded
// by the scheduler's critical sections.
unsafe impl Send for TaskHandle {}
unsafe impl Sync for TaskHandle {}

impl TaskHandle {
    pub(crate) fn tcb(self) -> NonNull<Tcb> {
        self.0
    }
}

/// Configuration for a new task.
pub struct TaskConfig {
    /// Human-readable task name. May be empty.
    pub name: &'static str,
    /// Task priority, `0..PRIORITY_COUNT`.
    pub priority: usize,
    /// Stack size in bytes, used when the scheduler allocates the stack.
    /// Ignored when `stack` is given.
    pub stack_size: usize,
    /// Caller-supplied stack region. When absent the scheduler allocates
    /// (and later frees) a stack of `stack_size` bytes.
    pub stack: Option<&'static mut [u8]>,
}

impl TaskConfig {
    /// The default task configuration.
    pub const fn new() -> TaskConfig {
        TaskConfig {
            name: "",
            priority: DEFAULT_PRIORITY,
            stack_size: DEFAULT_STACK_SIZE,
            stack: None,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> TaskConfig {
        TaskConfig::new()
    }
}

fn stack_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size, STACK_ALIGN).ok()
}

/// Create a task. Requires memory allocation to be available.
///
/// The task is appended to the ready queue for its priority and will be
/// scheduled, but does not start (or preempt the caller) immediately.
///
/// Returns `None` if the priority is out of range, the stack is smaller
/// than the scheduler's context frame, or allocation fails. On failure
/// nothing is leaked.
pub fn task_create(entry: TaskEntry, arg: *mut (), cfg: Option<TaskConfig>) -> Option<TaskHandle> {
    let cfg = cfg.unwrap_or_default();
    if cfg.priority >= PRIORITY_COUNT {
        return None;
    }
    let stack_size = match &cfg.stack {
        Some(region) => region.len(),
        None => cfg.stack_size,
    };
    if stack_size < MIN_STACK_SIZE {
        return None;
    }

    let (stack_base, stack_owned) = match cfg.stack {
        Some(region) => (region.as_mut_ptr(), false),
        None => {
            let layout = stack_layout(stack_size)?;
            // SAFETY: `layout` has non-zero size.
            let ptr = unsafe { alloc(layout) };
            if ptr.is_null() {
                return None;
            }
            (ptr, true)
        }
    };
    // SAFETY: `stack_base` is the start of a `stack_size`-byte region.
    let stack_limit = unsafe { stack_base.add(stack_size) };

    // SAFETY: `Tcb` has non-zero size.
    let tcb = unsafe { alloc(Layout::new::<Tcb>()) }.cast::<Tcb>();
    let Some(tcb) = NonNull::new(tcb) else {
        if stack_owned {
            // SAFETY: the stack allocation above used this exact layout.
            unsafe {
                dealloc(
                    stack_base,
                    Layout::from_size_align_unchecked(stack_size, STACK_ALIGN),
                );
            }
        }
        return None;
    };

    // SAFETY: `tcb` is a fresh, properly aligned allocation; the stack
    // region holds at least MIN_STACK_SIZE bytes below `stack_limit`.
    unsafe {
        tcb.as_ptr().write(Tcb {
            stack_top: Cell::new(core::ptr::null_mut()),
            stack_base,
            stack_limit,
            entry,
            arg,
            name: cfg.name,
            priority: cfg.priority,
            state: Cell::new(TaskState::Ready),
            block_cause: Cell::new(BlockReason::None),
            stack_owned,
            node: Node::new(),
        });
        let top = initialize_task_stack(
            stack_limit.cast::<usize>(),
            tcb.as_ref().entry,
            tcb.as_ref().arg,
        );
        tcb.as_ref().stack_top.set(top);
    }

    // Place the task into its ready queue; the scheduler can now pick it.
    critical_section::with(|_| {
        // SAFETY: the node is detached and embedded in the TCB it links.
        unsafe { SCHEDULER.ready[cfg.priority].append(tcb, tcb.as_ref().node()) };
    });

    Some(TaskHandle(tcb))
}

/// Destroy a task. Stops the task permanently.
///
/// Destroying the active task cannot free its resources immediately, since
/// the running code is on the task's own stack; the TCB moves to the
/// exited list and the idle task reaps it later. Destroying any other task
/// removes it from whichever queue it is in and frees it on the spot.
///
/// # Safety
///
/// `task` must refer to a task that has not already been destroyed; a
/// stale handle is the caller's responsibility.
pub unsafe fn task_destroy(task: TaskHandle) {
    let self_destroy = critical_section::with(|_| {
        // SAFETY: the caller guarantees the handle is live.
        let tcb = unsafe { task.tcb().as_ref() };
        if core::ptr::eq(tcb, SCHEDULER.active.get()) {
            // Park the TCB on the exited list; the idle task will reap it.
            tcb.state.set(TaskState::Exited);
            // SAFETY: the active task is a member of no list.
            unsafe { SCHEDULER.exited.append(task.tcb(), tcb.node()) };
            SCHEDULER.active.set(core::ptr::null_mut());
            true
        } else {
            // SAFETY: state tells us which list the node is attached to.
            match tcb.state.get() {
                TaskState::Blocked => unsafe { SCHEDULER.blocked.remove(tcb.node()) },
                TaskState::Ready => unsafe {
                    SCHEDULER.ready[tcb.priority].remove(tcb.node())
                },
                TaskState::Exited => unsafe { SCHEDULER.exited.remove(tcb.node()) },
                TaskState::Active => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("inactive destroyed task is not in any queue");
                }
            }
            false
        }
    });
    if self_destroy {
        // Hand the CPU back; a new task is dispatched and this stack is
        // never returned to.
        crate::asm::trigger_svcall();
    } else {
        // SAFETY: the TCB is detached from every queue, so nothing else
        // can reach it.
        unsafe { free_tcb(task.tcb()) };
    }
}

/// Free a TCB and, if the scheduler allocated it, its stack.
///
/// # Safety
///
/// `tcb` must be detached from every queue and must never be used again.
pub(crate) unsafe fn free_tcb(tcb: NonNull<Tcb>) {
    // SAFETY: per the contract, this is the last reference to the TCB.
    unsafe {
        let stack_base = tcb.as_ref().stack_base;
        let stack_size = tcb.as_ref().stack_limit as usize - stack_base as usize;
        if tcb.as_ref().stack_owned {
            // SAFETY: task_create made this allocation with this layout.
            let layout = Layout::from_size_align_unchecked(stack_size, STACK_ALIGN);
            dealloc(stack_base, layout);
        }
        dealloc(tcb.as_ptr().cast::<u8>(), Layout::new::<Tcb>());
    }
}

/// Where a task lands when its entry function returns. Destroys the task.
pub(crate) extern "C" fn task_exit_trampoline() {
    #[cfg(feature = "defmt")]
    defmt::info!("task '{=str}' exited", crate::sched::active_task_name());
    if let Some(task) = crate::sched::get_active_task() {
        // SAFETY: the active task is live by definition.
        unsafe { task_destroy(task) };
    }
    // Not reached: the supervisor call dispatched another task.
}

// End of File
