use crate::markup::{command_text, FENCE};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::Command;

/// Runs a command line on behalf of the conversation.
pub trait ShellExecutor {
    /// Returns combined stdout and stderr of a successful run.
    fn run(&self, command: &str) -> Result<String>;
}

/// `/bin/sh -c` in a fixed working directory.
pub struct SystemShell {
    working_dir: PathBuf,
}

impl SystemShell {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

impl ShellExecutor for SystemShell {
    fn run(&self, command: &str) -> Result<String> {
        let command = command.trim();
        if command.is_empty() {
            bail!("refusing to run an empty command");
        }

        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .output()
            .with_context(|| format!("failed to spawn /bin/sh for '{command}'"))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            bail!(
                "'{command}' exited with {}: {}",
                output.status,
                combined.trim()
            );
        }
        Ok(combined)
    }
}

/// Formats command output for appending to the transcript as an
/// assistant turn.
pub fn wrap_shell_output(command: &str, output: &str) -> String {
    format!("'{command}':\n\n{FENCE}\n{output}\n{FENCE}\n")
}

/// Runs a code line such as `$ ip -br addr` or `uptime` and returns its
/// wrapped output. A leading `$` is optional.
pub fn run_code_line(shell: &dyn ShellExecutor, line: &str) -> Result<String> {
    let command = command_text(line);
    if command.is_empty() {
        bail!("'{}' has no command to run", line.trim());
    }
    let output = shell.run(command)?;
    Ok(wrap_shell_output(command, output.trim_end_matches('\n')))
}
