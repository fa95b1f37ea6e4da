use crate::command::{Command, EXIT_FAILURE, EXIT_NOT_EXECUTED, ExitCode};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::libc;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, execvp, fork, write};
use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Failures that leave the interpreter unable to run commands at all.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No child process could be created.
    #[error("fork: {0}")]
    Fork(#[source] Errno),
    /// Waiting for the child failed for a reason other than it not existing.
    #[error("wait: {0}")]
    Wait(#[source] Errno),
}

/// Runs `command` as a child process and waits for it to terminate.
///
/// Returns the child's exit code, or [`EXIT_NOT_EXECUTED`] when the program
/// could not be started or was killed by a signal. The redirection files are
/// closed in the parent before waiting, whatever the outcome of the fork.
pub fn launch(command: Command) -> Result<ExitCode, LaunchError> {
    let argv = match command.exec_argv() {
        Ok(argv) => argv,
        Err(e) => {
            eprintln!("{}: {}", command.program(), e);
            return Ok(EXIT_NOT_EXECUTED);
        }
    };
    let (_, redirections) = command.into_parts();
    let stdin = redirections.stdin.as_ref().map(AsRawFd::as_raw_fd);
    let stdout = redirections.stdout.as_ref().map(AsRawFd::as_raw_fd);

    // Anything still buffered belongs before the child's output.
    if let Err(e) = io::stdout().flush() {
        warn!(error = %e, "cannot flush stdout before fork");
    }

    // SAFETY: the child only calls async-signal-safe functions on data
    // prepared before the fork, and never returns.
    let forked = unsafe { fork() };
    match forked {
        Ok(ForkResult::Child) => exec_child(&argv, stdin, stdout),
        Ok(ForkResult::Parent { child }) => {
            drop(redirections);
            debug!(pid = %child, program = ?argv[0], "spawned child");
            wait_for(child)
        }
        Err(errno) => {
            drop(redirections);
            Err(LaunchError::Fork(errno))
        }
    }
}

/// Blocks until `child` terminates and decodes its status.
fn wait_for(child: Pid) -> Result<ExitCode, LaunchError> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                debug!(pid = %child, code, "child exited");
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, signal, core_dumped)) => {
                debug!(pid = %child, ?signal, core_dumped, "child killed by signal");
                return Ok(EXIT_NOT_EXECUTED);
            }
            Ok(status) => trace!(?status, "child changed state"),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                warn!(pid = %child, "child vanished before it could be waited for");
                return Ok(EXIT_NOT_EXECUTED);
            }
            Err(errno) => return Err(LaunchError::Wait(errno)),
        }
    }
}

/// Child side of the fork: install redirections, then replace the process image.
fn exec_child(argv: &[CString], stdin: Option<RawFd>, stdout: Option<RawFd>) -> ! {
    let program = argv[0].to_bytes();

    let installed = stdout
        .map_or(Ok(()), |fd| install_fd(fd, libc::STDOUT_FILENO))
        .and_then(|()| stdin.map_or(Ok(()), |fd| install_fd(fd, libc::STDIN_FILENO)));
    if let Err(errno) = installed {
        child_exit(
            EXIT_FAILURE,
            &[program, b": dup2: ", errno.desc().as_bytes(), b"\n"],
        );
    }

    // The interpreter runs with SIGPIPE ignored, and an ignored disposition
    // survives exec.
    // SAFETY: restoring the default action installs no handler.
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    let errno = match execvp(&argv[0], argv) {
        Err(errno) => errno,
        Ok(never) => match never {},
    };
    if errno == Errno::ENOENT {
        child_exit(EXIT_NOT_EXECUTED, &[program, b": command not found\n"]);
    }
    child_exit(
        EXIT_NOT_EXECUTED,
        &[program, b": ", errno.desc().as_bytes(), b"\n"],
    )
}

/// Makes `fd` available to the new program as `target`.
fn install_fd(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        // Already in place; only the close-on-exec flag has to go.
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map(drop)
    } else {
        dup2(fd, target).map(drop)
    }
}

fn child_exit(code: ExitCode, message: &[&[u8]]) -> ! {
    // SAFETY: fd 2 is inherited from the interpreter and not closed by the child.
    let stderr = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
    for part in message {
        let _ = write(stderr, part);
    }
    // SAFETY: `_exit` skips atexit handlers and stdio buffers that belong to the parent.
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Redirections;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn command(argv: &[&str]) -> Command {
        with_redirections(argv, Redirections::default())
    }

    fn with_redirections(argv: &[&str], redirections: Redirections) -> Command {
        Command::new(argv.iter().map(|s| s.to_string()).collect(), redirections).unwrap()
    }

    #[test]
    fn test_exit_codes_are_passed_through() {
        assert_eq!(launch(command(&["true"])).unwrap(), 0);
        assert_eq!(launch(command(&["false"])).unwrap(), 1);
        assert_eq!(launch(command(&["sh", "-c", "exit 7"])).unwrap(), 7);
    }

    #[test]
    fn test_missing_program_is_not_executed() {
        let status = launch(command(&["sish-test-no-such-program"])).unwrap();
        assert_eq!(status, EXIT_NOT_EXECUTED);
    }

    #[test]
    fn test_killed_by_signal_is_not_executed() {
        let status = launch(command(&["sh", "-c", "kill -9 $$"])).unwrap();
        assert_eq!(status, EXIT_NOT_EXECUTED);
    }

    #[test]
    fn test_sigpipe_kills_child() {
        let status = launch(command(&["sh", "-c", "kill -PIPE $$; exit 0"])).unwrap();
        assert_eq!(status, EXIT_NOT_EXECUTED);
    }

    #[test]
    fn test_interior_nul_is_not_executed() {
        assert_eq!(launch(command(&["ec\0ho"])).unwrap(), EXIT_NOT_EXECUTED);
    }

    #[test]
    fn test_output_redirection() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let redirections = Redirections {
            stdin: None,
            stdout: Some(File::create(&out).unwrap()),
        };

        let status = launch(with_redirections(&["echo", "hello"], redirections)).unwrap();
        assert_eq!(status, 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
    }

    #[test]
    fn test_input_redirection() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::write(&input, "5\n").unwrap();
        let redirections = Redirections {
            stdin: Some(File::open(&input).unwrap()),
            stdout: None,
        };

        let status = launch(with_redirections(
            &["sh", "-c", "read x; exit $x"],
            redirections,
        ))
        .unwrap();
        assert_eq!(status, 5);
    }
}
