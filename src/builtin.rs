use crate::command::{EXIT_FAILURE, EXIT_SUCCESS, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result};
use nix::unistd::{Uid, User, getpid};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Echo argument replaced by the last recorded exit status.
const LAST_STATUS_TOKEN: &str = "$?";

/// Echo argument replaced by the interpreter's process id.
const PID_TOKEN: &str = "$$";

/// A builtin was called with arguments it does not accept.
#[derive(Debug, Error)]
#[error("too many arguments")]
pub struct UsageError;

/// Built-in commands known to the shell at compile time.
///
/// Builtins run inside the interpreter process, so their effects (the working
/// directory, the exit request) persist across commands.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Builds the command from the arguments that follow its name.
    fn from_args(args: &[String]) -> Result<Self, UsageError>;

    /// Executes the command, writing any output to `stdout`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// The fixed set of builtins, matched on the full command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `cd [dir]`
    Cd,
    /// `echo [arg ...]`
    Echo,
    /// `exit`
    Exit,
}

impl Builtin {
    /// Looks up a builtin by the exact command name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            n if n == Cd::name() => Some(Self::Cd),
            n if n == Echo::name() => Some(Self::Echo),
            n if n == Exit::name() => Some(Self::Exit),
            _ => None,
        }
    }

    /// Runs the builtin with the arguments that follow its name.
    ///
    /// Errors are reported on stderr and turned into a failure status.
    pub fn run(self, args: &[String], stdout: &mut dyn Write, env: &mut Environment) -> ExitCode {
        debug!(builtin = ?self, ?args, "dispatching builtin");
        match self {
            Self::Cd => run::<Cd>(args, stdout, env),
            Self::Echo => run::<Echo>(args, stdout, env),
            Self::Exit => run::<Exit>(args, stdout, env),
        }
    }
}

fn run<T: BuiltinCommand>(
    args: &[String],
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> ExitCode {
    let result = T::from_args(args)
        .map_err(anyhow::Error::from)
        .and_then(|cmd| cmd.execute(stdout, env));
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", T::name(), e);
            EXIT_FAILURE
        }
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the current user's home directory.
pub struct Cd {
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_args(args: &[String]) -> Result<Self, UsageError> {
        match args {
            [] => Ok(Self { target: None }),
            [target] => Ok(Self {
                target: Some(target.clone()),
            }),
            _ => Err(UsageError),
        }
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let target = match self.target {
            Some(t) => PathBuf::from(t),
            None => home_dir()?,
        };

        env::set_current_dir(&target).with_context(|| format!("{}", target.display()))?;
        Ok(EXIT_SUCCESS)
    }
}

/// Home directory of the invoking user, from the user database.
fn home_dir() -> Result<PathBuf> {
    let uid = Uid::current();
    let user = User::from_uid(uid)
        .context("getpwuid")?
        .with_context(|| format!("getpwuid: no user database entry for uid {uid}"))?;
    Ok(user.dir)
}

/// Exit shell process
pub struct Exit {
    /// whether arguments were supplied, which is a usage error.
    pub has_args: bool,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    // Arguments never prevent exiting, so they are checked in `execute`.
    fn from_args(args: &[String]) -> Result<Self, UsageError> {
        Ok(Self {
            has_args: !args.is_empty(),
        })
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        if self.has_args {
            eprintln!("{}: {}", Self::name(), UsageError);
            return Ok(EXIT_FAILURE);
        }
        Ok(env.last_status)
    }
}

/// write the arguments to standard output, separated by spaces, followed by a newline.
///
/// `$?` expands to the last exit status and `$$` to the process id.
pub struct Echo {
    /// values to print, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn from_args(args: &[String]) -> Result<Self, UsageError> {
        Ok(Self {
            args: args.to_vec(),
        })
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let words: Vec<String> = self
            .args
            .into_iter()
            .map(|arg| {
                if arg == LAST_STATUS_TOKEN {
                    env.last_status.to_string()
                } else if arg == PID_TOKEN {
                    getpid().to_string()
                } else {
                    arg
                }
            })
            .collect();
        writeln!(stdout, "{}", words.join(" "))?;
        stdout.flush()?;
        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use tempfile::TempDir;

    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn echo(args: &[&str], env: &mut Environment) -> (ExitCode, String) {
        let mut out = Vec::new();
        let code = Builtin::Echo.run(&strings(args), &mut out, env);
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_from_name_is_exact() {
        assert_eq!(Builtin::from_name("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::from_name("echo"), Some(Builtin::Echo));
        assert_eq!(Builtin::from_name("exit"), Some(Builtin::Exit));
        assert_eq!(Builtin::from_name("c"), None);
        assert_eq!(Builtin::from_name("ec"), None);
        assert_eq!(Builtin::from_name("exitt"), None);
        assert_eq!(Builtin::from_name("ls"), None);
    }

    #[test]
    fn test_echo_joins_with_spaces() {
        let mut env = Environment::new("sish");
        assert_eq!(echo(&["hello", "world"], &mut env), (0, "hello world\n".into()));
    }

    #[test]
    fn test_echo_without_args_prints_newline() {
        let mut env = Environment::new("sish");
        assert_eq!(echo(&[], &mut env), (0, "\n".into()));
    }

    #[test]
    fn test_echo_has_no_options() {
        let mut env = Environment::new("sish");
        assert_eq!(echo(&["-n", "--help"], &mut env), (0, "-n --help\n".into()));
    }

    #[test]
    fn test_echo_expands_status_and_pid() {
        let mut env = Environment::new("sish");
        env.last_status = 42;
        let (code, out) = echo(&["$?", "$$", "$?x", "$"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, format!("42 {} $?x $\n", std::process::id()));
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();

        let mut env = Environment::new("sish");
        let code = Builtin::Cd.run(
            &[canonical_temp.to_string_lossy().into_owned()],
            &mut Vec::new(),
            &mut env,
        );

        let new_cwd = fs::canonicalize(env::current_dir().unwrap()).unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, EXIT_SUCCESS);
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_without_args_goes_home() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let home = home_dir().unwrap();

        let mut env = Environment::new("sish");
        let code = Builtin::Cd.run(&[], &mut Vec::new(), &mut env);
        let new_cwd = env::current_dir().unwrap();
        env::set_current_dir(&orig).expect("failed to restore cwd");

        if home.is_dir() {
            assert_eq!(code, EXIT_SUCCESS);
            assert_eq!(
                fs::canonicalize(new_cwd).unwrap(),
                fs::canonicalize(home).unwrap()
            );
        } else {
            assert_eq!(code, EXIT_FAILURE);
        }
    }

    #[test]
    fn test_cd_nonexistent_path_fails() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");

        let mut env = Environment::new("sish");
        let code = Builtin::Cd.run(
            &[missing.to_string_lossy().into_owned()],
            &mut Vec::new(),
            &mut env,
        );

        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_too_many_arguments() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();

        let mut env = Environment::new("sish");
        let code = Builtin::Cd.run(&strings(&["/", "/tmp"]), &mut Vec::new(), &mut env);

        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_exit_keeps_last_status() {
        let mut env = Environment::new("sish");
        env.last_status = 3;
        let code = Builtin::Exit.run(&[], &mut Vec::new(), &mut env);
        assert!(env.should_exit);
        assert_eq!(code, 3);
    }

    #[test]
    fn test_exit_with_args_still_exits_with_failure() {
        let mut env = Environment::new("sish");
        let code = Builtin::Exit.run(&strings(&["1", "2"]), &mut Vec::new(), &mut env);
        assert!(env.should_exit);
        assert_eq!(code, EXIT_FAILURE);
    }
}
