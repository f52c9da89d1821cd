use crate::command::{self, Invocation};
use crate::config::Databases;
use crate::connection::Connection;
use crate::options::{DumpOptions, OutputTarget};
use crate::runner::{CommandRunner, ProcessRunner};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::fs;

/// What a finished dump produced.
#[derive(Debug)]
pub struct DumpReport {
    pub target: OutputTarget,
    pub invocations: Vec<Invocation>,
    // progress and debug lines, in the order they were logged
    pub messages: Vec<String>,
}

pub async fn dump(
    databases: &Databases,
    alias: &str,
    options: &DumpOptions,
) -> Result<DumpReport> {
    let connection = databases.get(alias)?;

    produce_dump(connection, options, &ProcessRunner).await
}

pub async fn produce_dump<R>(
    connection: &Connection,
    options: &DumpOptions,
    runner: &R,
) -> Result<DumpReport>
where
    R: CommandRunner + ?Sized,
{
    produce_dump_at(connection, options, runner, Local::now()).await
}

async fn produce_dump_at<R>(
    connection: &Connection,
    options: &DumpOptions,
    runner: &R,
    now: DateTime<Local>,
) -> Result<DumpReport>
where
    R: CommandRunner + ?Sized,
{
    let engine = connection.engine()?;
    let target = options.output_target(&connection.name, now);

    let mut invocations = command::build(engine, connection, options, &target)?;

    if let Some(compress) = options.compress.as_deref() {
        match command::compression(compress, &target)? {
            Some(invocation) => invocations.push(invocation),
            None => warn!("Skipping compression, the dump is written to stdout"),
        }
    }

    if !options.destination.exists() {
        fs::create_dir_all(&options.destination).with_context(|| {
            format!(
                "Couldn't create destination {}",
                options.destination.display()
            )
        })?;
    }

    let mut messages = vec![];

    if !options.is_quiet() {
        log_message(
            &mut messages,
            format!(
                "Doing {} backup of database \"{}\" into {}",
                engine.label(),
                connection.name,
                target
            ),
        );
    }

    for invocation in invocations.iter() {
        if options.debug {
            log_message(&mut messages, invocation.to_string());
        }

        runner.run(invocation).await?;
    }

    Ok(DumpReport {
        target,
        invocations,
        messages,
    })
}

fn log_message(messages: &mut Vec<String>, message: String) {
    info!("{}", message);
    messages.push(message);
}
