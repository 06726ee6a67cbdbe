//! Three tasks at three priorities, dispatched in priority order
//!
//! Each task logs once and returns, which destroys it; the idle task
//! reaps the remains. Expected log order: "hi", "md", "lo".

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use petrel::{TaskConfig, rtos_start, task_create};
use petrel_demos::init_heap;

#[cortex_m_rt::entry]
fn main() -> ! {
    init_heap();
    defmt::info!("Hello!");
    for (name, priority, entry) in [
        ("lo", 1, lo as petrel::TaskEntry),
        ("hi", 5, hi),
        ("md", 3, md),
    ] {
        let cfg = TaskConfig {
            name,
            priority,
            ..TaskConfig::new()
        };
        if task_create(entry, core::ptr::null_mut(), Some(cfg)).is_none() {
            defmt::panic!("could not create task '{=str}'", name);
        }
    }
    rtos_start();
}

extern "C" fn hi(_arg: *mut ()) {
    defmt::info!("hi");
}

extern "C" fn md(_arg: *mut ()) {
    defmt::info!("md");
}

extern "C" fn lo(_arg: *mut ()) {
    defmt::info!("lo");
}

// End of File
