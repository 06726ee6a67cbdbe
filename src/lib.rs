//! A small preemptive real-time task scheduler for Arm Cortex-M
//!
//! Tasks are created with [`task_create`], each with a fixed priority and
//! its own stack, and dispatched from per-priority FIFO ready queues:
//! the head of the highest non-empty queue runs. Equal-priority tasks
//! never preempt each other; they swap on [`task_yield`] or when they
//! block. With the `preempt` feature (on by default), a higher-priority
//! task becoming ready preempts the running task at the next system tick.
//!
//! Driver code sleeps with [`block_active_task`] and is woken by a
//! matching [`unblock_task`]; the recorded block reason guards against
//! one subsystem waking a task another subsystem parked. A task that
//! returns from its entry function (or destroys itself) is reaped by the
//! idle task, which [`rtos_start`] creates at the lowest priority.
//!
//! The final binary must supply a global allocator, a `critical-section`
//! implementation for the target, and the platform's `hclk_freq` clock
//! query; `rtos_start` takes the CPU and never returns.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod asm;
pub mod config;
mod list;
mod sched;
mod stack;
mod task;

pub use sched::{
    active_task_name, block_active_task, get_active_task, now, rtos_start, task_yield,
    unblock_task,
};
pub use task::{BlockReason, TaskConfig, TaskEntry, TaskHandle, task_create, task_destroy};

/// Shared harness plumbing for the host-side tests: a lock serializing
/// everything that touches the global scheduler or the allocation
/// counters, and a counting global allocator so the reap tests can prove
/// the scheduler frees exactly what it allocated.
#[cfg(test)]
pub(crate) mod test_support {
    use std::alloc::{GlobalAlloc, Layout, System};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard};

    static LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn lock() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    static ALLOCS: AtomicUsize = AtomicUsize::new(0);
    static DEALLOCS: AtomicUsize = AtomicUsize::new(0);
    static ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);
    static DEALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);

    /// Total (allocation, deallocation) call counts so far.
    pub(crate) fn alloc_counts() -> (usize, usize) {
        (ALLOCS.load(Ordering::SeqCst), DEALLOCS.load(Ordering::SeqCst))
    }

    /// Total (allocated, deallocated) byte counts so far.
    pub(crate) fn alloc_bytes() -> (usize, usize) {
        (
            ALLOC_BYTES.load(Ordering::SeqCst),
            DEALLOC_BYTES.load(Ordering::SeqCst),
        )
    }

    struct CountingAllocator;

    unsafe impl GlobalAlloc for CountingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            ALLOCS.fetch_add(1, Ordering::SeqCst);
            ALLOC_BYTES.fetch_add(layout.size(), Ordering::SeqCst);
            unsafe { System.alloc(layout) }
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            DEALLOCS.fetch_add(1, Ordering::SeqCst);
            DEALLOC_BYTES.fetch_add(layout.size(), Ordering::SeqCst);
            unsafe { System.dealloc(ptr, layout) }
        }
    }

    #[global_allocator]
    static GLOBAL: CountingAllocator = CountingAllocator;
}
