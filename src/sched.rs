//! Scheduler state, dispatch, and the task-facing scheduling API

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::Cell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::asm;
use crate::config::{
    IDLE_TASK_NAME, IDLE_TASK_PRIORITY, IDLE_TASK_STACK_SIZE, PRIORITY_COUNT,
};
use crate::list::List;
use crate::task::{BlockReason, TaskConfig, TaskHandle, TaskState, Tcb, task_create};

/// Global scheduler state.
///
/// The exception glue reaches this through its symbol and the offset
/// constants below, so the layout is fixed: the active-task pointer is the
/// first word of the struct, and the first word of a TCB is its saved
/// stack top.
#[repr(C)]
pub(crate) struct Scheduler {
    /// The running task, or null before start and while an exiting task's
    /// supervisor call is picking a successor. The active task is a member
    /// of no queue.
    pub(crate) active: Cell<*mut Tcb>,
    /// One FIFO ready queue per priority level.
    pub(crate) ready: [List<Tcb>; PRIORITY_COUNT],
    /// Blocked tasks, in no particular order.
    pub(crate) blocked: List<Tcb>,
    /// Exited tasks awaiting the idle task's reap loop.
    pub(crate) exited: List<Tcb>,
    /// System tick counter.
    pub(crate) ticks: AtomicU32,
}

impl Scheduler {
    /// The offset, in bytes, to the `active` field.
    pub(crate) const ACTIVE_TASK_OFFSET: usize = core::mem::offset_of!(Scheduler, active);

    /// A compile-time check that the exception glue's single-load
    /// assumption holds.
    const _CHECK: () = const {
        assert!(Self::ACTIVE_TASK_OFFSET == 0);
    };

    const fn new() -> Scheduler {
        Scheduler {
            active: Cell::new(core::ptr::null_mut()),
            ready: [const { List::new() }; PRIORITY_COUNT],
            blocked: List::new(),
            exited: List::new(),
            ticks: AtomicU32::new(0),
        }
    }
}

// SAFETY: every access to the scheduler's queues and active pointer
// happens inside a critical section.
unsafe impl Sync for Scheduler {}

/// The one and only scheduler.
pub(crate) static SCHEDULER: Scheduler = Scheduler::new();

/// Select a new active task from the ready queues.
///
/// Called from the exception glue with interrupts masked. Picks the head
/// of the highest-priority non-empty ready queue, reparents the previously
/// active task onto the queue its state calls for, and makes the pick
/// active. If every ready queue is empty the current task (the idle task)
/// keeps running.
#[unsafe(no_mangle)]
pub(crate) extern "C" fn select_active_task() {
    critical_section::with(|_| {
        // Find the highest priority with tasks ready to run. Priority 0 is
        // not scanned: only the idle task lives there, and it is the
        // fallthrough when everything else is empty.
        let mut prio = PRIORITY_COUNT - 1;
        while prio > 0 && SCHEDULER.ready[prio].is_empty() {
            prio -= 1;
        }
        let Some(new_active) = SCHEDULER.ready[prio].head() else {
            // Nothing else is ready; the running task keeps the CPU. It is
            // re-dispatched, so its state goes back to active even if it
            // had yielded.
            let active = SCHEDULER.active.get();
            if !active.is_null() {
                // SAFETY: the active task is live.
                unsafe { (*active).state.set(TaskState::Active) };
            }
            return;
        };
        // SAFETY: `new_active` came off a ready queue, so it is live and
        // its node is attached to that queue.
        unsafe {
            SCHEDULER.ready[prio].remove(new_active.as_ref().node());
        }

        // Reparent the outgoing task onto the queue its state calls for.
        // Null means either the scheduler is only now starting, or the
        // task destroyed itself (it is already on the exited list).
        let previous = SCHEDULER.active.get();
        if !previous.is_null() {
            // SAFETY: the active task is live; it is a member of no queue.
            let previous = unsafe { &*previous };
            match previous.state.get() {
                TaskState::Blocked => unsafe {
                    SCHEDULER.blocked.append(NonNull::from(previous), previous.node());
                },
                // A self-destroyed task was parked on the exited list by
                // `task_destroy`; it must not be re-appended anywhere.
                TaskState::Exited => {}
                _ => {
                    previous.state.set(TaskState::Ready);
                    unsafe {
                        SCHEDULER.ready[previous.priority]
                            .append(NonNull::from(previous), previous.node());
                    }
                }
            }
        }

        SCHEDULER.active.set(new_active.as_ptr());
        // SAFETY: `new_active` is live.
        unsafe { new_active.as_ref().state.set(TaskState::Active) };
    });
}

/// One system tick: count it, and preempt the running task if a
/// higher-priority task has become ready.
pub(crate) fn tick() {
    SCHEDULER.ticks.fetch_add(1, Ordering::Relaxed);
    #[cfg(feature = "preempt")]
    {
        let preempt = critical_section::with(|_| {
            let active = SCHEDULER.active.get();
            if active.is_null() {
                return false;
            }
            // SAFETY: the active task is live.
            let active_prio = unsafe { (*active).priority };
            // Walk no further down than the running task's own priority.
            let mut prio = PRIORITY_COUNT - 1;
            while prio > active_prio {
                if !SCHEDULER.ready[prio].is_empty() {
                    return true;
                }
                prio -= 1;
            }
            false
        });
        if preempt {
            asm::set_pendsv();
        }
    }
}

/// Get the current time in ticks.
pub fn now() -> u32 {
    SCHEDULER.ticks.load(Ordering::Relaxed)
}

/// The name of the running task, or the empty string if there is none.
pub fn active_task_name() -> &'static str {
    critical_section::with(|_| {
        let active = SCHEDULER.active.get();
        if active.is_null() {
            ""
        } else {
            // SAFETY: the active task is live.
            unsafe { (*active).name }
        }
    })
}

/// Get the active task. Used by driver code that wants to block itself.
pub fn get_active_task() -> Option<TaskHandle> {
    critical_section::with(|_| NonNull::new(SCHEDULER.active.get()).map(TaskHandle))
}

/// Yield execution to the highest-priority task able to run.
///
/// The caller goes to the tail of its own ready queue and resumes when the
/// scheduler next picks it, which is immediately if nothing else is ready.
pub fn task_yield() {
    let yielded = critical_section::with(|_| {
        let active = SCHEDULER.active.get();
        if active.is_null() {
            return false;
        }
        // SAFETY: the active task is live.
        unsafe { (*active).state.set(TaskState::Ready) };
        true
    });
    if yielded {
        asm::set_pendsv();
    }
}

/// Block the running task and switch to a runnable one. Used by drivers.
///
/// Returns only after a matching [`unblock_task`] wakes the task up and
/// the scheduler dispatches it again.
pub fn block_active_task(reason: BlockReason) {
    let blocked = critical_section::with(|_| {
        let active = SCHEDULER.active.get();
        if active.is_null() {
            return false;
        }
        // The context-switch handler moves the task to the blocked list.
        // SAFETY: the active task is live.
        unsafe {
            (*active).state.set(TaskState::Blocked);
            (*active).block_cause.set(reason);
        }
        true
    });
    if blocked {
        asm::set_pendsv();
    }
}

/// Unblock a task. Used by drivers, including from interrupt handlers.
///
/// A no-op unless the task is currently blocked for exactly `reason`, so
/// that one driver cannot wake a task another driver has parked. The task
/// does not run immediately; it is dispatched when the scheduler next
/// picks it (no later than the next tick, if preemption is enabled and it
/// outranks the running task).
///
/// # Safety
///
/// `task` must refer to a task that has not been destroyed.
pub unsafe fn unblock_task(task: TaskHandle, reason: BlockReason) {
    critical_section::with(|_| {
        // SAFETY: the caller guarantees the handle is live.
        let tcb = unsafe { task.tcb().as_ref() };
        if tcb.state.get() != TaskState::Blocked || tcb.block_cause.get() != reason {
            return;
        }
        tcb.state.set(TaskState::Ready);
        tcb.block_cause.set(BlockReason::None);
        // A task that blocked but has not been switched out yet is still
        // active and on no list; the context switch it already requested
        // will requeue it as ready. Only a task that made it onto the
        // blocked list needs moving.
        if core::ptr::eq(tcb, SCHEDULER.active.get()) {
            return;
        }
        // SAFETY: a blocked, non-active task is attached to the blocked
        // list.
        unsafe {
            SCHEDULER.blocked.remove(tcb.node());
            SCHEDULER.ready[tcb.priority].append(task.tcb(), tcb.node());
        }
    });
}

/// Start the scheduler. Does not return.
///
/// Creates the idle task, then issues the supervisor call that resets the
/// main stack and dispatches the highest-priority ready task. If no tasks
/// were created the system sits in the idle loop.
pub fn rtos_start() -> ! {
    let idle_cfg = TaskConfig {
        name: IDLE_TASK_NAME,
        priority: IDLE_TASK_PRIORITY,
        stack_size: IDLE_TASK_STACK_SIZE,
        stack: None,
    };
    if task_create(idle_entry, core::ptr::null_mut(), Some(idle_cfg)).is_none() {
        #[cfg(feature = "defmt")]
        defmt::error!("could not create idle task");
        panic!("could not create idle task");
    }
    asm::trigger_svcall();
    #[cfg(feature = "defmt")]
    defmt::error!("supervisor call returned without starting the scheduler");
    panic!("supervisor call returned without starting the scheduler");
}

/// Idle loop. Runs when no other task can, reaping exited tasks.
extern "C" fn idle_entry(_arg: *mut ()) {
    loop {
        reap_exited_tasks();
        task_yield();
    }
}

/// Free every task on the exited list: its TCB, and its stack if the
/// scheduler allocated it. Runs on the idle task's own stack, never on the
/// stack being freed.
pub(crate) fn reap_exited_tasks() {
    loop {
        let exited = critical_section::with(|_| {
            let head = SCHEDULER.exited.head()?;
            // SAFETY: the head of the exited list is attached to it.
            unsafe { SCHEDULER.exited.remove(head.as_ref().node()) };
            Some(head)
        });
        let Some(tcb) = exited else { break };
        #[cfg(feature = "defmt")]
        defmt::debug!("reaping task '{=str}'", unsafe { tcb.as_ref().name });
        // SAFETY: the TCB is off every queue; nothing else can reach it.
        unsafe { crate::task::free_tcb(tcb) };
    }
}


// End of File
