use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::errors::{LeeaError, LeeaResult};

static INTERRUPTS: OnceLock<Arc<AtomicUsize>> = OnceLock::new();

/// Shared view of the interrupt counter for one `evolve` run.
pub(crate) struct StopFlag(Arc<AtomicUsize>);

impl StopFlag {
    pub(crate) fn requested(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

/// Installs the process-wide Ctrl-C handler on first use and resets the
/// counter for a fresh run. The first interrupt requests a stop at the next
/// generation boundary; the second terminates the process.
pub(crate) fn install() -> LeeaResult<StopFlag> {
    if let Some(counter) = INTERRUPTS.get() {
        counter.store(0, Ordering::SeqCst);
        return Ok(StopFlag(counter.clone()));
    }
    let counter = Arc::new(AtomicUsize::new(0));
    let handler = counter.clone();
    ctrlc::set_handler(move || {
        if handler.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!("\nCaught interrupt; stopping after this generation. Interrupt again to abort.");
        } else {
            process::exit(130);
        }
    })
    .map_err(|e| LeeaError::Signal(e.to_string()))?;
    let counter = INTERRUPTS.get_or_init(|| counter).clone();
    counter.store(0, Ordering::SeqCst);
    Ok(StopFlag(counter))
}
