use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};

/// Filename meaning "write the dump to standard output".
pub const STDOUT_FILENAME: &str = "-";

#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub destination: PathBuf,
    pub filename: Option<String>,
    pub compress: Option<String>,
    pub raw_args: String,
    pub quiet: bool,
    pub debug: bool,
    // postgres only, rely on ~/.pgpass instead of feeding the password
    pub pgpass: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            destination: PathBuf::from("backups"),
            filename: None,
            compress: None,
            raw_args: String::new(),
            quiet: false,
            debug: false,
            pgpass: false,
        }
    }
}

impl DumpOptions {
    pub fn writes_to_stdout(&self) -> bool {
        self.filename.as_deref() == Some(STDOUT_FILENAME)
    }

    /// Writing to stdout forces quiet mode so nothing but the dump ends up on stdout.
    pub fn is_quiet(&self) -> bool {
        self.quiet || self.writes_to_stdout()
    }

    /// Splits the raw arguments the way a POSIX shell would, quotes included.
    pub fn raw_arguments(&self) -> Result<Vec<String>> {
        shell_words::split(&self.raw_args)
            .with_context(|| format!("Couldn't parse raw arguments: {}", self.raw_args))
    }

    pub fn output_target(&self, database_name: &str, now: DateTime<Local>) -> OutputTarget {
        match self.filename.as_deref() {
            Some(STDOUT_FILENAME) => OutputTarget::Stdout,
            Some(f) if !f.is_empty() => OutputTarget::File(self.destination.join(f)),
            _ => OutputTarget::File(destination_filename(
                &self.destination,
                database_name,
                now,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::File(path) => write!(f, "{}", path.display()),
            OutputTarget::Stdout => write!(f, "stdout"),
        }
    }
}

pub fn destination_filename(
    destination: &Path,
    database_name: &str,
    now: DateTime<Local>,
) -> PathBuf {
    destination.join(format!(
        "{}_backup_{}.sql",
        database_name,
        now.format("%Y%m%d-%H%M%S")
    ))
}
