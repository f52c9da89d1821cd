use crate::connection::Connection;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    MySQL,
    PostgreSQL,
}

impl Engine {
    // engine identifiers are matched by substring, e.g. "django.db.backends.postgresql"
    pub fn new(s: &str) -> Result<Engine> {
        match (s.contains("mysql"), s.contains("postgresql")) {
            (true, false) => Ok(Engine::MySQL),
            (false, true) => Ok(Engine::PostgreSQL),
            _ => bail!("Unsupported engine: backups of {} engine are not implemented", s),
        }
    }

    pub fn from_scheme(scheme: &str) -> Result<Engine> {
        match scheme {
            "mysql" | "mariadb" => Ok(Engine::MySQL),
            "psql" | "postgres" | "postgresql" => Ok(Engine::PostgreSQL),
            _ => bail!("Unsupported engine: no dump tool for {} urls", scheme),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Engine::MySQL => "mysql",
            Engine::PostgreSQL => "postgresql",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Engine::MySQL => "MySQL",
            Engine::PostgreSQL => "PostgreSQL",
        }
    }

    /// Name of the native dump binary looked up on PATH.
    pub fn dump_binary(&self) -> &str {
        match self {
            Engine::MySQL => "mysqldump",
            Engine::PostgreSQL => "pg_dump",
        }
    }
}

/// Connections keyed by alias, as read from the dbdump.toml file.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Databases {
    entries: BTreeMap<String, Connection>,
}

impl Databases {
    pub fn new() -> Databases {
        Databases::default()
    }

    pub fn insert(&mut self, alias: &str, connection: Connection) {
        self.entries.insert(alias.to_string(), connection);
    }

    pub fn get(&self, alias: &str) -> Result<&Connection> {
        match self.entries.get(alias) {
            Some(c) => Ok(c),
            None => bail!(
                "Database {} is not defined in the configuration, configured: [{}]",
                alias,
                self.aliases().join(", ")
            ),
        }
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn from_toml(contents: &str) -> Result<Databases> {
        let databases: Databases = toml::from_str(contents)?;
        Ok(databases)
    }

    pub fn from_url(alias: &str, database_url: &str) -> Result<Databases> {
        let mut databases = Databases::new();
        databases.insert(alias, Connection::from_url(database_url)?);
        Ok(databases)
    }

    pub fn load(path: &Path) -> Result<Databases> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;

        Databases::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
