// src/runner.rs

//! Running shell scripts inside a target root
//!
//! Stage scripts and trigger scripts never run directly on the host. They
//! are fed to a shell inside a container whose filesystem is assembled from
//! the target root's standard directories. [`ScriptRunner`] is the seam the
//! orchestrator and installer use, so tests can swap in a recording runner.

use crate::config::Context;
use crate::error::{Error, Result};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, error, warn};

/// Root subdirectories bind-mounted into the container when present
const ROOT_DIRS: &[&str] = &[
    "bin", "etc", "lib", "lib64", "sbin", "tmp", "usr", "var", "builddir", "destdir",
];

/// An extra bind mount for one script invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub guest: String,
    pub read_only: bool,
}

impl Mount {
    pub fn new<P: Into<PathBuf>>(host: P, guest: &str) -> Self {
        Self {
            host: host.into(),
            guest: guest.to_string(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn to_volume_arg(&self) -> String {
        let mut arg = format!("{}:{}", self.host.display(), self.guest);
        if self.read_only {
            arg.push_str(":ro");
        }
        arg
    }
}

/// Executes a script against a target root
pub trait ScriptRunner {
    /// Run `script` with the root's directories available
    ///
    /// A non-zero exit is a `ScriptExecutionError` carrying the captured
    /// output.
    fn run_script(&self, root: &Path, script: &str, mounts: &[Mount]) -> Result<()>;
}

/// Runs scripts in a fresh container per invocation (`podman run --rm -i`)
#[derive(Debug, Clone)]
pub struct ContainerRunner {
    program: String,
    image: String,
    shell: String,
    host_dir: PathBuf,
    base_dir: PathBuf,
}

impl ContainerRunner {
    pub fn new(ctx: &Context) -> Self {
        let runner = &ctx.config.runner;
        Self {
            program: runner.program.clone(),
            image: runner.image.clone(),
            shell: runner.shell.clone(),
            host_dir: ctx.config.host_dir.clone(),
            base_dir: ctx.config.base_dir.clone(),
        }
    }

    /// Arguments passed to the container program
    ///
    /// Only root subdirectories that exist are mounted.
    pub fn command_args(&self, root: &Path, mounts: &[Mount]) -> Result<Vec<String>> {
        let host_dir = std::path::absolute(&self.host_dir)?;
        let base_dir = std::path::absolute(&self.base_dir)?;
        let root = std::path::absolute(root)?;

        let mut volumes = vec![
            Mount::new(host_dir, "/hostdir"),
            Mount::new(base_dir.join("etc"), "/etc/x10").read_only(),
        ];
        for dir in ROOT_DIRS {
            let host = root.join(dir);
            if host.exists() {
                volumes.push(Mount::new(host, &format!("/{}", dir)));
            }
        }
        volumes.extend(mounts.iter().cloned());

        let mut args: Vec<String> = vec!["run".into(), "--rm".into(), "-i".into()];
        for volume in &volumes {
            args.push("-v".to_string());
            args.push(volume.to_volume_arg());
        }
        args.push(self.image.clone());
        args.push(self.shell.clone());
        args.push("-e".to_string());
        args.push("-x".to_string());

        Ok(args)
    }
}

/// Collect lines from a child stream, logging each at debug level
fn drain<R: Read>(label: &str, stream: R) -> Vec<String> {
    let mut lines = Vec::new();
    for line in BufReader::new(stream).lines().map_while(std::io::Result::ok) {
        debug!("[{}] {}", label, line);
        lines.push(line);
    }
    lines
}

impl ScriptRunner for ContainerRunner {
    fn run_script(&self, root: &Path, script: &str, mounts: &[Mount]) -> Result<()> {
        fs::create_dir_all(&self.host_dir)?;
        fs::create_dir_all(root.join("destdir"))?;
        fs::create_dir_all(root.join("builddir"))?;

        let args = self.command_args(root, mounts)?;
        debug!("{} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::IoError(format!("Failed to start {}: {}", self.program, e)))?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::IoError(format!(
                "Failed to attach to {} stdio",
                self.program
            )));
        };

        let (status, stdout_lines, stderr_lines) = thread::scope(|scope| {
            let out = scope.spawn(move || drain("stdout", stdout));
            let err = scope.spawn(move || drain("stderr", stderr));

            let written = stdin
                .write_all(script.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"));
            if let Err(e) = written {
                warn!("Failed to feed script to {}: {}", self.program, e);
            }
            drop(stdin);

            let status = child.wait();
            let stdout_lines = out.join().unwrap_or_default();
            let stderr_lines = err.join().unwrap_or_default();
            (status, stdout_lines, stderr_lines)
        });

        let status = status
            .map_err(|e| Error::IoError(format!("Failed to wait for {}: {}", self.program, e)))?;

        if !status.success() {
            error!("Stage failed.");
            error!("Failing stage stdout output is:");
            for line in &stdout_lines {
                error!("  {}", line);
            }
            error!("Failing stage stderr output is:");
            for line in &stderr_lines {
                error!("  {}", line);
            }
            return Err(Error::ScriptExecutionError {
                status: status.to_string(),
                stdout: stdout_lines,
                stderr: stderr_lines,
            });
        }

        Ok(())
    }
}
