//! Compile-time configuration for the scheduler

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Number of task priority levels.
///
/// Valid task priorities are `0..PRIORITY_COUNT`, where a higher number
/// means a more urgent task. Priority 0 is reserved by convention for the
/// idle task.
pub const PRIORITY_COUNT: usize = 8;

/// Priority given to tasks created without a configuration.
pub const DEFAULT_PRIORITY: usize = 1;

/// Stack size, in bytes, given to tasks created without a configuration.
pub const DEFAULT_STACK_SIZE: usize = 2048;

/// Name of the idle task.
pub const IDLE_TASK_NAME: &str = "Idle Task";

/// Priority of the idle task. Must be the lowest priority, so that the
/// idle task only runs when nothing else can.
pub const IDLE_TASK_PRIORITY: usize = 0;

/// Stack size, in bytes, of the idle task.
pub const IDLE_TASK_STACK_SIZE: usize = 1024;

/// System tick rate in Hz.
///
/// The tick is the preemption point: on every tick the scheduler checks
/// whether a higher-priority task has become ready. 200 Hz gives a 5 ms
/// tick.
pub const SYSTICK_FREQ_HZ: u32 = 200;

// End of File
