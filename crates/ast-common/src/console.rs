// console.rs — process-wide console print facility
//
// Mirrors the engine's com_printf/com_dprintf/com_error split: everything
// that wants to tell a human something goes through here instead of a bare
// println!/eprintln!, so a redirect (tests, a future remote console) can
// capture it in one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

static VERBOSE: AtomicBool = AtomicBool::new(false);
static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);

/// Enable `log_dev` output. Set once at startup from config/CLI.
pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Begin capturing printed output into a buffer instead of stdout.
pub fn begin_redirect() {
    *RD_BUFFER.lock().unwrap() = Some(String::new());
}

/// Stop capturing and return everything captured since `begin_redirect`.
pub fn end_redirect() -> Option<String> {
    RD_BUFFER.lock().unwrap().take()
}

fn emit(msg: &str) {
    let mut buf = RD_BUFFER.lock().unwrap();
    if let Some(s) = buf.as_mut() {
        s.push_str(msg);
        s.push('\n');
        return;
    }
    drop(buf);
    println!("{msg}");
}

/// Always-on informational message (peer connects, transfers complete, ...).
pub fn log_info(msg: impl AsRef<str>) {
    emit(msg.as_ref());
}

/// Verbose/diagnostic message, gated on `set_verbose`. Used for dropped
/// packets, retransmits, and other high-frequency events.
pub fn log_dev(msg: impl AsRef<str>) {
    if is_verbose() {
        emit(msg.as_ref());
    }
}

/// Non-fatal error: printed, never panics. Used for recoverable failures
/// the caller already decided to swallow.
pub fn log_error(msg: impl AsRef<str>) {
    eprintln!("ERROR: {}", msg.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_captures_info_lines() {
        begin_redirect();
        log_info("hello");
        log_info("world");
        let out = end_redirect().unwrap();
        assert_eq!(out, "hello\nworld\n");
    }

    #[test]
    fn dev_log_gated_by_verbose() {
        // Shares the process-wide VERBOSE flag with other tests in this
        // module; keep this the only test that touches set_verbose.
        set_verbose(false);
        begin_redirect();
        log_dev("quiet");
        assert_eq!(end_redirect().unwrap(), "");

        set_verbose(true);
        begin_redirect();
        log_dev("loud");
        assert_eq!(end_redirect().unwrap(), "loud\n");
        set_verbose(false);
    }
}
