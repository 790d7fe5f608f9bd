//! External command execution.
//!
//! Every subprocess shipgate starts (`git`, `cargo`, the container engine)
//! goes through [`CommandRunner`], so sources and the publish driver can be
//! exercised in tests with a scripted runner instead of real tools.

use std::process::Command;

use camino::Utf8PathBuf;

use tracing::{debug, instrument};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8), trimmed.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs external programs.
pub trait CommandRunner {
    /// Run `program` with `args` to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns the spawn error if the program could not be started.
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// [`CommandRunner`] backed by [`std::process::Command`].
///
/// Inherits the caller's working directory and environment, so `git` and
/// the container engine see the user's credentials and configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(level = "debug", skip(self))]
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        debug!(code = ?result.code, "command finished");
        Ok(result)
    }
}

/// Locate `program` on `PATH`.
pub fn find_program(program: &str) -> Option<Utf8PathBuf> {
    let path = which::which(program).ok()?;
    Utf8PathBuf::from_path_buf(path).ok()
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    //! Scripted runner for tests in this crate and in dependents.

    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::{CommandOutput, CommandRunner};

    /// Replays queued outputs and records every invocation.
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        replies: RefCell<VecDeque<std::io::Result<CommandOutput>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        /// Runner with nothing queued; every call succeeds with empty output.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful reply.
        pub fn ok(self, stdout: &str) -> Self {
            self.replies.borrow_mut().push_back(Ok(CommandOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }));
            self
        }

        /// Queue a non-zero exit.
        pub fn fail(self, code: i32, stderr: &str) -> Self {
            self.replies.borrow_mut().push_back(Ok(CommandOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }));
            self
        }

        /// Queue a spawn failure, as for a program not on `PATH`.
        pub fn missing(self) -> Self {
            self.replies
                .borrow_mut()
                .push_back(Err(std::io::Error::from(std::io::ErrorKind::NotFound)));
            self
        }

        /// Every invocation so far, as `program arg..` lines.
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
            let mut line = program.to_string();
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            self.calls.borrow_mut().push(line);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput {
                    code: Some(0),
                    ..CommandOutput::default()
                }))
        }
    }
}
