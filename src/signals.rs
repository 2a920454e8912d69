//! Interrupt handling for graceful shutdown
//!
//! The Ctrl+C handler sets a global flag. The runner polls it between
//! requests; async tasks such as the monitor loop can await it instead.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use once_cell::sync::Lazy;
use tokio::sync::Notify;

use crate::status::ExitStatus;

/// Global flag for Ctrl+C interrupt handling
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

static INTERRUPT_NOTIFY: Lazy<Notify> = Lazy::new(Notify::new);

/// Ctrl+C presses seen by the handler
static PRESSES: AtomicUsize = AtomicUsize::new(0);

/// Install the process Ctrl+C handler.
///
/// The first press sets the flag so the current request can finish and a
/// summary is printed. A second press exits with status 130 at once.
pub fn install_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        if PRESSES.fetch_add(1, Ordering::SeqCst) > 0 {
            std::process::exit(ExitStatus::Interrupted as i32);
        }
        eprintln!("\nInterrupted, finishing the current request (Ctrl+C again to quit)");
        set_interrupted();
    })
}

/// Check if the application was interrupted (Ctrl+C pressed)
#[inline]
pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Set the interrupted flag and wake every waiter (called from the signal handler)
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
    INTERRUPT_NOTIFY.notify_waiters();
}

/// Reset the interrupted flag
#[inline]
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Resolve once the interrupted flag is set
pub async fn wait_for_interrupt() {
    let notified = INTERRUPT_NOTIFY.notified();
    tokio::pin!(notified);

    loop {
        // Register before checking the flag so a concurrent set is not missed
        notified.as_mut().enable();
        if was_interrupted() {
            return;
        }
        notified.as_mut().await;
        notified.set(INTERRUPT_NOTIFY.notified());
    }
}
