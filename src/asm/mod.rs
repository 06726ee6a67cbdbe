//! Exception glue binding the scheduler to the Cortex-M exception model
//!
//! Three handlers make the scheduler go: the supervisor call starts
//! dispatch, the pendable service performs context switches, and the
//! system tick is the preemption point. The first two are naked assembly
//! in the architecture submodule; everything else here is the small set
//! of CPU services the scheduler needs (with host-side stand-ins so the
//! scheduler core can be exercised by the test harness).

#[cfg(all(
    arm_abi = "eabi",
    not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))
))]
mod eabi;

/// SysTick handler.
///
/// Runs periodically once `enable_systick` has programmed the timer.
/// Counts the tick and, if a higher-priority task has become ready,
/// requests a context switch on exception return. Inert on the host,
/// where the harness drives the scheduler directly.
#[unsafe(no_mangle)]
extern "C" fn SysTick() {
    crate::sched::tick();
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod cpu {
    use crate::config::SYSTICK_FREQ_HZ;

    unsafe extern "Rust" {
        /// The current AHB clock frequency in Hz. Supplied by the
        /// platform's clock driver.
        safe fn hclk_freq() -> u32;
    }

    /// Request a context switch at the next safe point.
    pub(crate) fn set_pendsv() {
        cortex_m::peripheral::SCB::set_pendsv();
    }

    /// Issue the supervisor call that hands the CPU to the scheduler.
    pub(crate) fn trigger_svcall() {
        unsafe { core::arch::asm!("svc 0") };
    }

    /// Program and start the system tick at [`SYSTICK_FREQ_HZ`].
    ///
    /// SysTick counts HCLK / 8, the STM32L4 reset default for the
    /// external clock source. The reload register is 24 bits wide;
    /// overflowing it is unrecoverable.
    pub(super) extern "C" fn enable_systick() {
        use cortex_m::peripheral::syst::SystClkSource;

        let reload = (hclk_freq() / 8) / SYSTICK_FREQ_HZ;
        if reload == 0 || reload > 0x00FF_FFFF {
            #[cfg(feature = "defmt")]
            defmt::error!("oversized systick reload value {=u32}", reload);
            panic!("oversized systick reload value");
        }
        // SAFETY: the scheduler is the only owner of SYST.
        let mut syst = unsafe { cortex_m::Peripherals::steal() }.SYST;
        syst.set_clock_source(SystClkSource::External);
        // The interrupt fires when counting from 1 to 0.
        syst.set_reload(reload - 1);
        syst.clear_current();
        syst.enable_counter();
        syst.enable_interrupt();
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub(crate) use cpu::{set_pendsv, trigger_svcall};

/// Host build of the CPU services: the test harness observes recorded
/// exception requests instead of trapping.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod hosted {
    use core::sync::atomic::{AtomicBool, Ordering};

    static PENDSV_REQUESTED: AtomicBool = AtomicBool::new(false);
    static SVCALL_REQUESTED: AtomicBool = AtomicBool::new(false);

    pub(crate) fn set_pendsv() {
        PENDSV_REQUESTED.store(true, Ordering::SeqCst);
    }

    pub(crate) fn trigger_svcall() {
        SVCALL_REQUESTED.store(true, Ordering::SeqCst);
    }

    /// Consume a pending context-switch request.
    #[cfg(test)]
    pub(crate) fn take_pendsv() -> bool {
        PENDSV_REQUESTED.swap(false, Ordering::SeqCst)
    }

    /// Consume a pending supervisor-call request.
    #[cfg(test)]
    pub(crate) fn take_svcall() -> bool {
        SVCALL_REQUESTED.swap(false, Ordering::SeqCst)
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub(crate) use hosted::{set_pendsv, trigger_svcall};

#[cfg(test)]
pub(crate) use hosted::{take_pendsv, take_svcall};
