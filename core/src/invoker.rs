//! Runs the VPN command-line client and captures what it prints.

use std::env;
use std::process::{Command, Stdio};

use log::debug;

use crate::error::InvocationError;
use crate::platform::CommandRunner;

/// Environment variable overriding the client binary.
pub const CLI_ENV_VAR: &str = "ADGUARD_CMD";
/// Binary looked up on PATH when nothing else is configured.
pub const DEFAULT_CLI: &str = "adguardvpn-cli";

/// Invokes the client binary directly.
///
/// No timeout is applied: a hung client blocks the calling thread until it
/// exits.
#[derive(Debug, Clone)]
pub struct CliInvoker {
    program: String,
    path_prefix: Option<String>,
}

impl CliInvoker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            path_prefix: None,
        }
    }

    /// Resolves the binary from `ADGUARD_CMD`, then `configured`, then the
    /// default name.
    pub fn resolve(configured: Option<&str>) -> Self {
        Self::new(resolve_program(env::var(CLI_ENV_VAR).ok().as_deref(), configured))
    }

    /// Directories searched before the inherited PATH.
    pub fn with_path_prefix(mut self, prefix: Option<String>) -> Self {
        self.path_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null());

        if let Some(prefix) = &self.path_prefix {
            let new_path = match env::var("PATH") {
                Ok(inherited) if !inherited.is_empty() => format!("{prefix}:{inherited}"),
                _ => prefix.clone(),
            };
            debug!("Update PATH to: {new_path}");
            cmd.env("PATH", new_path);
        }

        cmd
    }
}

fn resolve_program(from_env: Option<&str>, configured: Option<&str>) -> String {
    from_env
        .or(configured)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_CLI)
        .to_string()
}

impl CommandRunner for CliInvoker {
    /// Returns stdout followed by stderr. The client spreads status and
    /// warnings across both streams; order between them is not preserved.
    fn run(&self, args: &[&str]) -> Result<String, InvocationError> {
        debug!("running {} {:?}", self.program, args);

        let output = self
            .command(args)
            .output()
            .map_err(|source| InvocationError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(text)
        } else {
            debug!(
                "{} {:?} exited with {:?}: {}",
                self.program,
                args,
                output.status.code(),
                text.trim()
            );
            Err(InvocationError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                output: text,
            })
        }
    }
}
