//! Two equal-priority tasks trading the CPU by yielding
//!
//! Equal priorities never preempt each other, so each log line is a
//! voluntary handover.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use petrel::{TaskConfig, rtos_start, task_create, task_yield};
use petrel_demos::init_heap;

#[cortex_m_rt::entry]
fn main() -> ! {
    init_heap();
    for (name, entry) in [("ping", ping as petrel::TaskEntry), ("pong", pong)] {
        let cfg = TaskConfig {
            name,
            priority: 2,
            ..TaskConfig::new()
        };
        if task_create(entry, core::ptr::null_mut(), Some(cfg)).is_none() {
            defmt::panic!("could not create task '{=str}'", name);
        }
    }
    rtos_start();
}

extern "C" fn ping(_arg: *mut ()) {
    loop {
        defmt::info!("ping");
        task_yield();
    }
}

extern "C" fn pong(_arg: *mut ()) {
    loop {
        defmt::info!("pong");
        task_yield();
    }
}

// End of File
