use crate::command::{Invocation, Redirect};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

// CommandRunner executes one invocation to completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Spawns invocations as real child processes, one at a time.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        let program = invocation.program.as_str();

        if which::which(program).is_err() {
            bail!("{} not found in PATH, is it installed?", program);
        };

        let stdout = match &invocation.stdout {
            Redirect::Truncate(path) => Stdio::from(open_output(path, false)?),
            Redirect::Append(path) => Stdio::from(open_output(path, true)?),
            Redirect::Inherit => Stdio::inherit(),
        };

        let stdin = match invocation.stdin {
            Some(_) => Stdio::piped(),
            None => Stdio::inherit(),
        };

        let mut child = Command::new(program)
            .args(&invocation.args)
            .stdin(stdin)
            .stdout(stdout)
            .spawn()
            .with_context(|| format!("Couldn't start {}", program))?;

        if let (Some(input), Some(mut pipe)) = (&invocation.stdin, child.stdin.take()) {
            // a child that never reads its stdin closes the pipe early
            match pipe.write_all(format!("{}\n", input).as_bytes()).await {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(e).with_context(|| format!("Couldn't write to {} stdin", program))
                }
                _ => {}
            }
            drop(pipe);
        }

        let status = child.wait().await?;
        if !status.success() {
            bail!("{} failed: {}", program, status);
        }

        Ok(())
    }
}

fn open_output(path: &Path, append: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);

    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    options
        .open(path)
        .with_context(|| format!("Couldn't open output file {}", path.display()))
}
