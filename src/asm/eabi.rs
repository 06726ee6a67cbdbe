//! Armv7-M EABI exception handlers
//!
//! Both handlers are naked functions: the compiler must not emit a
//! prologue or epilogue that would disturb the stacked exception frame or
//! reuse registers holding task state.

use crate::sched::{self, Scheduler};

/// SVCall handler. Starts the scheduler.
///
/// Issued exactly once, from thread mode, by `rtos_start`. The boot stack
/// is dead from here on, so the main stack pointer is wound back to its
/// reset value from the vector table before the first task is chosen and
/// the system tick is switched on. The exception return unwinds the
/// chosen task's synthetic frame and resumes it in thread mode on the
/// process stack.
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn SVCall() {
    core::arch::naked_asm!(r#"
    // Reset the main stack pointer to the boot value: word 0 of the
    // vector table, found through VTOR (0xE000ED08).
    ldr     r0, =0xE000ED08
    ldr     r0, [r0]
    ldr     r1, [r0]
    msr     msp, r1

    // Pick the first task and start the tick, with interrupts masked
    cpsid   i
    bl      {select_active_task}
    bl      {enable_systick}
    cpsie   i

    // r2 = the active TCB; its first word is the saved stack top
    ldr     r1, ={scheduler}
    ldr     r2, [r1, {active_offset}]
    ldr     r0, [r2]

    // Restore the callee-saved registers and the exception-return value
    ldmia   r0!, {{ r4 - r11, lr }}
    msr     psp, r0

    // The EXC_RETURN in lr sends the core to thread mode, process stack
    bx      lr
    "#,
    scheduler = sym sched::SCHEDULER,
    active_offset = const Scheduler::ACTIVE_TASK_OFFSET,
    select_active_task = sym sched::select_active_task,
    enable_systick = sym super::cpu::enable_systick,
    );
}

/// PendSV handler. Performs a context switch.
///
/// Fires when thread-mode code sets the PendSV-pending bit and every
/// higher-priority exception has finished. On entry the hardware has
/// already pushed xPSR, PC, LR, R12 and R3-R0 onto the process stack; we
/// push the rest, park the stack pointer in the suspended task's TCB,
/// pick a successor, and unwind its saved state the same way. The active
/// task is never null here: only yield, block, and the tick request a
/// pendable service, and all three leave a running task behind.
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn PendSV() {
    core::arch::naked_asm!(r#"
    // r2 = the active TCB
    ldr     r1, ={scheduler}
    ldr     r2, [r1, {active_offset}]

    // Save the suspended task's remaining state under the hardware frame
    mrs     r0, psp
    stmdb   r0!, {{ r4 - r11, lr }}

    // The saved stack top lives in the first word of the TCB
    str     r0, [r2]

    // Choose a successor, with interrupts masked
    cpsid   i
    bl      {select_active_task}
    cpsie   i

    // Reload the (possibly different) active TCB and its stack top
    ldr     r1, ={scheduler}
    ldr     r2, [r1, {active_offset}]
    ldr     r0, [r2]

    ldmia   r0!, {{ r4 - r11, lr }}
    msr     psp, r0

    bx      lr
    "#,
    scheduler = sym sched::SCHEDULER,
    active_offset = const Scheduler::ACTIVE_TASK_OFFSET,
    select_active_task = sym sched::select_active_task,
    );
}
