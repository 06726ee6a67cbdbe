//! Common heap/panic/fault/timestamp support for the demo binaries

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

use core::mem::MaybeUninit;

use defmt_semihosting as _;
use embedded_alloc::LlffHeap;

const HEAP_SIZE: usize = 16 * 1024;

#[global_allocator]
static HEAP: LlffHeap = LlffHeap::empty();

/// Hand the heap its memory. Call once, before creating any tasks.
pub fn init_heap() {
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    // SAFETY: called once, and nothing else touches HEAP_MEM.
    unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
}

/// The AHB clock frequency, queried by the scheduler when it programs the
/// system tick. The demos run from the STM32L4's MSI at its 4 MHz reset
/// default.
#[unsafe(no_mangle)]
fn hclk_freq() -> u32 {
    4_000_000
}

/// Called when a panic occurs.
///
/// Logs the panic to defmt and then crashes the CPU.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::println!("PANIC: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

/// Called when a HardFault occurs.
///
/// Logs the fault to defmt and then crashes the CPU.
#[cortex_m_rt::exception]
unsafe fn HardFault(info: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::println!("FAULT: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

// Tag the defmt logs with the tick count and the running task
defmt::timestamp!("{=u32:010} {=str}", petrel::now(), petrel::active_task_name());

// End of File
