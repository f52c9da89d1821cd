use anyhow::{bail, Result};
use dbdump::Databases;
use std::{env, path::Path};

pub fn config_file() -> String {
    if let Ok(v) = env::var("DBDUMP_CONFIG") {
        if !v.is_empty() {
            return v;
        }
    }

    "./dbdump.toml".to_string()
}

pub fn database_url() -> Option<String> {
    if let Ok(v) = env::var("DATABASE_URL") {
        if !v.is_empty() {
            return Some(v);
        }
    }

    None
}

// the config file wins, DATABASE_URL only describes the default alias when there is no file
pub fn load_databases(file_path: &str) -> Result<Databases> {
    let path = Path::new(file_path);
    if path.exists() {
        return Databases::load(path);
    }

    match database_url() {
        Some(url) => Databases::from_url("default", &url),
        None => bail!(
            "{} doesn't exist and DATABASE_URL is not set, no databases are configured",
            file_path
        ),
    }
}
