use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::{Command, ExitStatus, Output};
use tracing::{debug, trace};

/// A builder for executing external commands with unified error handling
pub struct Cmd<'a> {
    command: &'a str,
    args: Vec<&'a str>,
    workdir: Option<&'a Path>,
    envs: Vec<(&'a str, &'a str)>,
}

impl<'a> Cmd<'a> {
    pub fn new(command: &'a str) -> Self {
        Self {
            command,
            args: Vec::new(),
            workdir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: &'a str) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: &[&'a str]) -> Self {
        self.args.extend_from_slice(args);
        self
    }

    /// Set the working directory for the command
    pub fn workdir(mut self, path: &'a Path) -> Self {
        self.workdir = Some(path);
        self
    }

    pub fn env(mut self, key: &'a str, value: &'a str) -> Self {
        self.envs.push((key, value));
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(self.command);
        cmd.args(&self.args);
        if let Some(dir) = self.workdir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    fn output(&self) -> Result<Output> {
        let workdir_display = self.workdir.map(|p| p.display().to_string());
        trace!(command = self.command, args = ?self.args, workdir = ?workdir_display, "cmd:start");
        self.build().output().with_context(|| {
            format!(
                "Failed to execute command: {} {}",
                self.command,
                self.args.join(" ")
            )
        })
    }

    /// Execute the command and return the output
    /// Returns an error if the command fails (non-zero exit code)
    pub fn run(self) -> Result<Output> {
        let output = self.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(
                command = self.command,
                args = ?self.args,
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                "cmd:run failure"
            );
            return Err(anyhow!(
                "Command failed: {} {}\n{}",
                self.command,
                self.args.join(" "),
                stderr.trim()
            ));
        }
        trace!(command = self.command, "cmd:run success");
        Ok(output)
    }

    /// Execute the command and return stdout as a trimmed string
    pub fn run_and_capture_stdout(self) -> Result<String> {
        let output = self.run()?;
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    /// Execute the command, returning Ok(true) if it succeeds, Ok(false) if it fails
    pub fn run_as_check(self) -> Result<bool> {
        let success = self.output()?.status.success();
        trace!(command = self.command, success, "cmd:check result");
        Ok(success)
    }

    /// Run with inherited stdio, returning the exit status.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        debug!(command = self.command, args = ?self.args, "cmd:interactive");
        self.build().status().with_context(|| {
            format!(
                "Failed to execute command: {} {}",
                self.command,
                self.args.join(" ")
            )
        })
    }
}

/// Run `argv` inside `workdir` with extra environment, failing on non-zero exit.
pub fn run_in_dir(argv: &[String], workdir: &Path, env_vars: &[(&str, &str)]) -> Result<()> {
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| anyhow!("No command given"))?;
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    let mut cmd = Cmd::new(program).args(&rest).workdir(workdir);
    for &(key, value) in env_vars {
        cmd = cmd.env(key, value);
    }

    let status = cmd.run_interactive()?;
    if !status.success() {
        return Err(anyhow!(
            "Command failed with exit code {}: {}",
            status.code().unwrap_or(-1),
            argv.join(" ")
        ));
    }
    Ok(())
}
