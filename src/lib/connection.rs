use crate::config::Engine;
use anyhow::{bail, Context, Result};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use url::Host;

/// Everything needed to point a native dump tool at one database.
///
/// Optional fields are never `Some("")` when read from a config file or a url,
/// empty values are normalised to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConnection")]
pub struct Connection {
    pub engine: String,
    pub name: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub excluded_tables: Vec<String>,
    pub empty_tables: Vec<String>,
}

impl Connection {
    pub fn new(engine: &str, name: &str) -> Connection {
        Connection {
            engine: engine.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn from_url(database_url: &str) -> Result<Connection> {
        let parsed_db_url = url::Url::parse(database_url)?;
        let engine = Engine::from_scheme(parsed_db_url.scheme())?;

        let name = decode(parsed_db_url.path().trim_start_matches('/'))?;
        if name.is_empty() {
            bail!("Database url is missing the database name");
        }

        // brackets are url syntax, the dump tools want the bare address
        let host = match parsed_db_url.host() {
            Some(Host::Ipv6(addr)) => Some(addr.to_string()),
            Some(h) => non_empty(Some(h.to_string())),
            None => None,
        };

        Ok(Connection {
            engine: engine.as_str().to_string(),
            name,
            user: non_empty(Some(decode(parsed_db_url.username())?)),
            password: non_empty(parsed_db_url.password().map(decode).transpose()?),
            host,
            port: parsed_db_url.port().map(|p| p.to_string()),
            ..Default::default()
        })
    }

    pub fn engine(&self) -> Result<Engine> {
        Engine::new(&self.engine)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Port {
    Number(u16),
    Text(String),
}

impl Port {
    fn into_string(self) -> String {
        match self {
            Port::Number(p) => p.to_string(),
            Port::Text(p) => p,
        }
    }
}

// shape of one alias table in dbdump.toml
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnection {
    url: Option<String>,
    engine: Option<String>,
    name: Option<String>,
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<Port>,
    #[serde(default)]
    excluded_tables: Vec<String>,
    #[serde(default)]
    empty_tables: Vec<String>,
}

impl TryFrom<RawConnection> for Connection {
    type Error = anyhow::Error;

    fn try_from(raw: RawConnection) -> Result<Connection> {
        // explicit fields win over whatever the url provides
        let from_url = match raw.url.as_deref() {
            Some(u) => Connection::from_url(u)?,
            None => Connection::default(),
        };

        let engine = non_empty(raw.engine).unwrap_or(from_url.engine);
        if engine.is_empty() {
            bail!("missing engine, set either engine or url");
        }

        let name = non_empty(raw.name).unwrap_or(from_url.name);
        if name.is_empty() {
            bail!("missing database name, set either name or url");
        }

        Ok(Connection {
            engine,
            name,
            user: non_empty(raw.user).or(from_url.user),
            password: non_empty(raw.password).or(from_url.password),
            host: non_empty(raw.host).or(from_url.host),
            port: non_empty(raw.port.map(Port::into_string)).or(from_url.port),
            excluded_tables: raw.excluded_tables,
            empty_tables: raw.empty_tables,
        })
    }
}

fn decode(component: &str) -> Result<String> {
    let decoded = percent_decode_str(component)
        .decode_utf8()
        .context("Database url contains invalid percent-encoding")?;

    Ok(decoded.into_owned())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
