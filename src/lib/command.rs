use crate::config::Engine;
use crate::connection::Connection;
use crate::options::{DumpOptions, OutputTarget};
use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::PathBuf;

const MASKED_PASSWORD: &str = "****";

/// Where a child's standard output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Truncate(PathBuf),
    Append(PathBuf),
    Inherit,
}

impl Redirect {
    fn for_target(target: &OutputTarget, append: bool) -> Redirect {
        match (target, append) {
            (OutputTarget::Stdout, _) => Redirect::Inherit,
            (OutputTarget::File(path), false) => Redirect::Truncate(path.clone()),
            (OutputTarget::File(path), true) => Redirect::Append(path.clone()),
        }
    }
}

/// One external process to run: program, argument vector, optional text fed to stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub stdout: Redirect,
}

impl Invocation {
    pub fn new(program: &str, args: Vec<String>, stdout: Redirect) -> Invocation {
        Invocation {
            program: program.to_string(),
            args,
            stdin: None,
            stdout,
        }
    }

    pub fn with_stdin(mut self, input: String) -> Invocation {
        self.stdin = Some(input);
        self
    }
}

// Renders the shell equivalent of the invocation, with any --password= value masked.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;

        for arg in &self.args {
            if arg.starts_with("--password=") {
                write!(f, " --password={}", MASKED_PASSWORD)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }

        match &self.stdout {
            Redirect::Truncate(path) => write!(f, " > {}", path.display()),
            Redirect::Append(path) => write!(f, " >> {}", path.display()),
            Redirect::Inherit => Ok(()),
        }
    }
}

/// Builds the dump invocations for `connection`, in the order they must run.
pub fn build(
    engine: Engine,
    connection: &Connection,
    options: &DumpOptions,
    target: &OutputTarget,
) -> Result<Vec<Invocation>> {
    let raw_args = options.raw_arguments()?;

    let invocations = match engine {
        Engine::MySQL => mysql(connection, raw_args, target),
        Engine::PostgreSQL => postgresql(connection, options.pgpass, raw_args, target),
    };

    Ok(invocations)
}

fn mysql(
    connection: &Connection,
    raw_args: Vec<String>,
    target: &OutputTarget,
) -> Vec<Invocation> {
    let db = connection.name.as_str();

    let mut main_args = vec![];
    if let Some(user) = set(&connection.user) {
        main_args.push(format!("--user={}", user));
    }
    // plaintext in the process table, only masked when displayed
    if let Some(password) = set(&connection.password) {
        main_args.push(format!("--password={}", password));
    }
    if let Some(host) = set(&connection.host) {
        main_args.push(format!("--host={}", host));
    }
    if let Some(port) = set(&connection.port) {
        main_args.push(format!("--port={}", port));
    }
    main_args.extend(raw_args);

    let mut excluded_args = main_args.clone();
    excluded_args.extend(
        skipped_tables(connection).map(|table| format!("--ignore-table={}.{}", db, table)),
    );
    excluded_args.push(db.to_string());

    let mut invocations = vec![Invocation::new(
        Engine::MySQL.dump_binary(),
        excluded_args,
        Redirect::for_target(target, false),
    )];

    if !connection.empty_tables.is_empty() {
        let mut no_data_args = main_args;
        no_data_args.push("--no-data".to_string());
        no_data_args.push(db.to_string());
        no_data_args.extend(connection.empty_tables.iter().cloned());

        invocations.push(Invocation::new(
            Engine::MySQL.dump_binary(),
            no_data_args,
            Redirect::for_target(target, true),
        ));
    }

    invocations
}

fn postgresql(
    connection: &Connection,
    pgpass: bool,
    raw_args: Vec<String>,
    target: &OutputTarget,
) -> Vec<Invocation> {
    let db = connection.name.as_str();
    let password = set(&connection.password).filter(|_| !pgpass);

    let mut main_args = vec![];
    if let Some(user) = set(&connection.user) {
        main_args.push(format!("--username={}", user));
    }
    if password.is_some() {
        main_args.push("--password".to_string());
    }
    if let Some(host) = set(&connection.host) {
        main_args.push(format!("--host={}", host));
    }
    if let Some(port) = set(&connection.port) {
        main_args.push(format!("--port={}", port));
    }
    main_args.extend(raw_args);

    let mut excluded_args = main_args.clone();
    excluded_args
        .extend(skipped_tables(connection).map(|table| format!("--exclude-table={}", table)));
    excluded_args.push(db.to_string());

    let mut invocations = vec![Invocation::new(
        Engine::PostgreSQL.dump_binary(),
        excluded_args,
        Redirect::for_target(target, false),
    )];

    if !connection.empty_tables.is_empty() {
        let mut schema_args = main_args;
        schema_args.push("--schema-only".to_string());
        schema_args.extend(
            connection
                .empty_tables
                .iter()
                .map(|table| format!("--table={}", table)),
        );
        schema_args.push(db.to_string());

        invocations.push(Invocation::new(
            Engine::PostgreSQL.dump_binary(),
            schema_args,
            Redirect::for_target(target, true),
        ));
    }

    match password {
        Some(password) => invocations
            .into_iter()
            .map(|i| i.with_stdin(password.to_string()))
            .collect(),
        None => invocations,
    }
}

/// Runs `<compression command> <outfile>` once the dump is complete.
///
/// Returns `None` when the dump went to stdout, there is no file to compress.
pub fn compression(command: &str, target: &OutputTarget) -> Result<Option<Invocation>> {
    let mut parts = shell_words::split(command)
        .with_context(|| format!("Couldn't parse compression command: {}", command))?;
    if parts.is_empty() {
        bail!("Compression command is empty");
    }

    let path = match target {
        OutputTarget::File(path) => path,
        OutputTarget::Stdout => return Ok(None),
    };

    let program = parts.remove(0);
    parts.push(path.to_string_lossy().to_string());

    Ok(Some(Invocation::new(&program, parts, Redirect::Inherit)))
}

// excluded tables first, then the tables only dumped for their schema
fn skipped_tables(connection: &Connection) -> impl Iterator<Item = &String> {
    connection
        .excluded_tables
        .iter()
        .chain(connection.empty_tables.iter())
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_target() -> OutputTarget {
        OutputTarget::File(PathBuf::from("backups/mydb_backup_20240309-070501.sql"))
    }

    fn count_prefix(invocation: &Invocation, prefix: &str) -> usize {
        invocation
            .args
            .iter()
            .filter(|a| a.starts_with(prefix))
            .count()
    }

    #[test]
    fn test_mysql_empty_table_example() {
        let mut connection = Connection::new("django.db.backends.mysql", "mydb");
        connection.empty_tables = vec!["audit_log".to_string()];

        let invocations = build(
            Engine::MySQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();

        assert_eq!(invocations.len(), 2);
        assert_eq!(
            invocations[0].to_string(),
            "mysqldump --ignore-table=mydb.audit_log mydb > backups/mydb_backup_20240309-070501.sql"
        );
        assert_eq!(
            invocations[1].to_string(),
            "mysqldump --no-data mydb audit_log >> backups/mydb_backup_20240309-070501.sql"
        );
    }

    #[test]
    fn test_mysql_connection_flags() {
        let connection = Connection {
            engine: "mysql".to_string(),
            name: "shop".to_string(),
            user: Some("root".to_string()),
            password: Some("hunter2".to_string()),
            host: Some("127.0.0.1".to_string()),
            port: Some("3306".to_string()),
            ..Default::default()
        };

        let invocations = build(
            Engine::MySQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();

        assert_eq!(invocations.len(), 1);
        let main = &invocations[0];
        assert_eq!(main.program, "mysqldump");
        assert_eq!(
            main.args,
            vec![
                "--user=root",
                "--password=hunter2",
                "--host=127.0.0.1",
                "--port=3306",
                "shop"
            ]
        );
        assert!(main.stdin.is_none());
    }

    #[test]
    fn test_mysql_unset_fields_produce_no_flags() {
        let connection = Connection {
            engine: "mysql".to_string(),
            name: "shop".to_string(),
            user: Some("".to_string()),
            host: Some("db".to_string()),
            ..Default::default()
        };

        let invocations = build(
            Engine::MySQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();
        let main = &invocations[0];

        assert_eq!(count_prefix(main, "--user="), 0);
        assert_eq!(count_prefix(main, "--password="), 0);
        assert_eq!(count_prefix(main, "--host="), 1);
        assert_eq!(count_prefix(main, "--port="), 0);
    }

    #[test]
    fn test_mysql_ignore_table_order() {
        let mut connection = Connection::new("mysql", "shop");
        connection.excluded_tables = vec!["sessions".to_string(), "cache".to_string()];
        connection.empty_tables = vec!["audit_log".to_string(), "events".to_string()];

        let invocations = build(
            Engine::MySQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();

        let ignored: Vec<&String> = invocations[0]
            .args
            .iter()
            .filter(|a| a.starts_with("--ignore-table="))
            .collect();
        assert_eq!(
            ignored,
            vec![
                "--ignore-table=shop.sessions",
                "--ignore-table=shop.cache",
                "--ignore-table=shop.audit_log",
                "--ignore-table=shop.events"
            ]
        );
        assert_eq!(
            invocations[1].args,
            vec!["--no-data", "shop", "audit_log", "events"]
        );
    }

    #[test]
    fn test_mysql_raw_args_follow_connection_flags() {
        let mut connection = Connection::new("mysql", "shop");
        connection.user = Some("root".to_string());
        connection.empty_tables = vec!["audit_log".to_string()];
        let options = DumpOptions {
            raw_args: "--single-transaction --quick".to_string(),
            ..Default::default()
        };

        let invocations = build(Engine::MySQL, &connection, &options, &file_target()).unwrap();

        assert_eq!(
            invocations[0].args,
            vec![
                "--user=root",
                "--single-transaction",
                "--quick",
                "--ignore-table=shop.audit_log",
                "shop"
            ]
        );
        assert_eq!(
            invocations[1].args,
            vec![
                "--user=root",
                "--single-transaction",
                "--quick",
                "--no-data",
                "shop",
                "audit_log"
            ]
        );
    }

    #[test]
    fn test_mysql_password_masked_in_display() {
        let mut connection = Connection::new("mysql", "shop");
        connection.password = Some("hunter2".to_string());

        let invocations = build(
            Engine::MySQL,
            &connection,
            &DumpOptions::default(),
            &OutputTarget::Stdout,
        ).unwrap();

        let rendered = invocations[0].to_string();
        assert_eq!(rendered, "mysqldump --password=**** shop");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_stdout_target_has_no_redirection() {
        let mut connection = Connection::new("mysql", "shop");
        connection.empty_tables = vec!["audit_log".to_string()];

        for engine in [Engine::MySQL, Engine::PostgreSQL] {
            let invocations = build(
                engine,
                &connection,
                &DumpOptions::default(),
                &OutputTarget::Stdout,
            ).unwrap();

            assert_eq!(invocations.len(), 2);
            for invocation in invocations {
                assert_eq!(invocation.stdout, Redirect::Inherit);
                let rendered = invocation.to_string();
                assert!(!rendered.contains(" > "));
                assert!(!rendered.contains(" >> "));
            }
        }
    }

    #[test]
    fn test_postgresql_password_fed_through_stdin() {
        let connection = Connection {
            engine: "django.db.backends.postgresql".to_string(),
            name: "app".to_string(),
            user: Some("app".to_string()),
            password: Some("secret".to_string()),
            host: Some("localhost".to_string()),
            port: Some("5432".to_string()),
            ..Default::default()
        };

        let invocations = build(
            Engine::PostgreSQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();

        assert_eq!(invocations.len(), 1);
        let main = &invocations[0];
        assert_eq!(main.program, "pg_dump");
        assert_eq!(
            main.args,
            vec![
                "--username=app",
                "--password",
                "--host=localhost",
                "--port=5432",
                "app"
            ]
        );
        assert_eq!(main.stdin.as_deref(), Some("secret"));
        assert!(!main.to_string().contains("secret"));
    }

    #[test]
    fn test_postgresql_pgpass_skips_password() {
        let mut connection = Connection::new("postgresql", "app");
        connection.password = Some("secret".to_string());
        let options = DumpOptions {
            pgpass: true,
            ..Default::default()
        };

        let invocations = build(Engine::PostgreSQL, &connection, &options, &file_target()).unwrap();

        assert_eq!(invocations[0].args, vec!["app"]);
        assert!(invocations[0].stdin.is_none());
    }

    #[test]
    fn test_postgresql_empty_tables_pass() {
        let mut connection = Connection::new("postgresql", "app");
        connection.password = Some("secret".to_string());
        connection.excluded_tables = vec!["django_session".to_string()];
        connection.empty_tables = vec!["audit_log".to_string(), "events".to_string()];

        let invocations = build(
            Engine::PostgreSQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();

        assert_eq!(invocations.len(), 2);
        assert_eq!(
            invocations[0].to_string(),
            "pg_dump --password --exclude-table=django_session --exclude-table=audit_log \
             --exclude-table=events app > backups/mydb_backup_20240309-070501.sql"
        );
        assert_eq!(
            invocations[1].args,
            vec![
                "--password",
                "--schema-only",
                "--table=audit_log",
                "--table=events",
                "app"
            ]
        );
        // database name only once on the schema pass
        assert_eq!(
            invocations[1].args.iter().filter(|a| *a == "app").count(),
            1
        );
        assert_eq!(
            invocations[1].stdout,
            Redirect::Append(PathBuf::from("backups/mydb_backup_20240309-070501.sql"))
        );
        assert!(invocations.iter().all(|i| i.stdin.as_deref() == Some("secret")));
    }

    #[test]
    fn test_exclusion_count_matches_tables() {
        let mut connection = Connection::new("postgresql", "app");
        connection.excluded_tables = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        connection.empty_tables = vec!["d".to_string()];

        let pg = build(
            Engine::PostgreSQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();
        assert_eq!(count_prefix(&pg[0], "--exclude-table="), 4);

        let my = build(
            Engine::MySQL,
            &connection,
            &DumpOptions::default(),
            &file_target(),
        ).unwrap();
        assert_eq!(count_prefix(&my[0], "--ignore-table="), 4);
    }

    #[test]
    fn test_compression_invocation() {
        let invocation = compression("gzip", &file_target()).unwrap().unwrap();
        assert_eq!(invocation.program, "gzip");
        assert_eq!(
            invocation.args,
            vec!["backups/mydb_backup_20240309-070501.sql"]
        );

        let invocation = compression("xz -9 --threads=0", &file_target()).unwrap().unwrap();
        assert_eq!(
            invocation.to_string(),
            "xz -9 --threads=0 backups/mydb_backup_20240309-070501.sql"
        );
    }

    #[test]
    fn test_compression_skipped() {
        assert!(compression("gzip", &OutputTarget::Stdout).unwrap().is_none());
    }

    #[test]
    fn test_compression_rejects_empty_command() {
        let err = compression("   ", &file_target()).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(compression("", &OutputTarget::Stdout).is_err());
        assert!(compression("gzip 'unbalanced", &file_target()).is_err());
    }
}
