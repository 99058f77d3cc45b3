use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::flag;

/// Raises the returned flag on `SIGINT`, `SIGTERM` or `SIGHUP`.
///
/// The handlers interrupt the server's `poll(2)` wait, after which the loop
/// observes the flag and stops.
pub(crate) fn install_shutdown_flag() -> io::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM, SIGHUP] {
        flag::register(signal, Arc::clone(&shutdown))?;
    }
    Ok(shutdown)
}
