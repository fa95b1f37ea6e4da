//! SIGINT handling for the interactive loop.
//!
//! The handler cannot receive the session state as an argument, so the
//! "a command is executing" flag and the prompt text live in statics. The
//! flag is only written through [`Executing`] guards; the prompt is written
//! once, before the handler is registered.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::os::fd::BorrowedFd;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static EXECUTING: AtomicBool = AtomicBool::new(false);
static PROMPT: OnceLock<Box<[u8]>> = OnceLock::new();

/// Marks a builtin or child process as running until dropped.
#[must_use = "the command counts as executing only while the guard is alive"]
#[derive(Debug)]
pub struct Executing(());

impl Drop for Executing {
    fn drop(&mut self) {
        EXECUTING.store(false, Ordering::SeqCst);
    }
}

/// Switches the governor to the executing state.
pub fn executing() -> Executing {
    EXECUTING.store(true, Ordering::SeqCst);
    Executing(())
}

/// Whether a command is currently executing.
pub fn is_executing() -> bool {
    EXECUTING.load(Ordering::SeqCst)
}

/// Bytes the handler writes for the given state.
fn interrupt_output(executing: bool) -> (&'static [u8], &'static [u8]) {
    let prompt: &'static [u8] = match PROMPT.get() {
        Some(p) if !executing => p,
        _ => &[],
    };
    (b"\n", prompt)
}

extern "C" fn handle_sigint(_signo: nix::libc::c_int) {
    let (newline, prompt) = interrupt_output(EXECUTING.load(Ordering::SeqCst));
    // SAFETY: fd 1 stays open for the life of the process.
    let stdout = unsafe { BorrowedFd::borrow_raw(nix::libc::STDOUT_FILENO) };
    // Nothing useful can be done about a failed write here.
    let _ = nix::unistd::write(stdout, newline);
    if !prompt.is_empty() {
        let _ = nix::unistd::write(stdout, prompt);
    }
}

/// Installs the SIGINT handler. `prompt` is redrawn on interrupts while idle.
pub fn install(prompt: &str) -> nix::Result<()> {
    // A second install keeps the first prompt.
    let _ = PROMPT.set(prompt.as_bytes().into());

    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic load, reads an initialized
    // `OnceLock` and calls write(2).
    unsafe { sigaction(Signal::SIGINT, &action) }?;
    debug!("installed SIGINT handler");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executing_suppresses_prompt() {
        let _ = PROMPT.set(b"sish$ ".as_slice().into());
        let (newline, prompt) = interrupt_output(true);
        assert_eq!(newline, b"\n");
        assert!(prompt.is_empty());
    }

    #[test]
    fn test_idle_redraws_prompt() {
        let _ = PROMPT.set(b"sish$ ".as_slice().into());
        let (newline, prompt) = interrupt_output(false);
        assert_eq!(newline, b"\n");
        assert_eq!(prompt, &**PROMPT.get().unwrap());
    }
}
