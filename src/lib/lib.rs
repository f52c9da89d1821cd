mod command;
mod config;
mod connection;
mod dump;
mod options;
mod runner;

pub use command::{Invocation, Redirect};
pub use config::{Databases, Engine};
pub use connection::Connection;
pub use dump::{produce_dump, DumpReport};
pub use options::{DumpOptions, OutputTarget, STDOUT_FILENAME};
pub use runner::{CommandRunner, ProcessRunner};

pub async fn dump_database(
    databases: &Databases,
    alias: &str,
    options: &DumpOptions,
) -> anyhow::Result<DumpReport> {
    dump::dump(databases, alias, options).await
}
