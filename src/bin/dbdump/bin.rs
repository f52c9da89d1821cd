use clap::{crate_description, crate_version, Arg, ArgAction, Command};
use dbdump::DumpOptions;
use log::{error, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;

mod config;

#[tokio::main]
async fn main() {
    // the dump itself may be written to stdout, keep log lines on stderr
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");

    let matches = Command::new("dbdump")
        .about(crate_description!())
        .version(format!("v{}", crate_version!()))
        .long_about(
            "Dump database into a file. Only MySQL and PostgreSQL engines are supported.",
        )
        .args([
            Arg::new("destination")
                .long("destination")
                .help("Destination (path) where to place database dump file")
                .default_value("backups")
                .action(ArgAction::Set),
            Arg::new("filename")
                .long("filename")
                .help("Name of the file, or - for stdout")
                .action(ArgAction::Set),
            Arg::new("db-name")
                .long("db-name")
                .help("Name of database (as defined in the config file) to dump")
                .default_value("default")
                .action(ArgAction::Set),
            Arg::new("compress")
                .long("compress")
                .help("Optional command to run (e.g., gzip) to compress output file")
                .action(ArgAction::Set),
            Arg::new("quiet")
                .long("quiet")
                .help("Be silent")
                .action(ArgAction::SetTrue),
            Arg::new("debug")
                .long("debug")
                .help("Show commands that are being executed")
                .action(ArgAction::SetTrue),
            Arg::new("pgpass")
                .long("pgpass")
                .help("Use the ~/.pgpass file for password instead of prompting (PostgreSQL only)")
                .action(ArgAction::SetTrue),
            Arg::new("raw-args")
                .long("raw-args")
                .help("Argument(s) to pass to database dump command as is")
                .allow_hyphen_values(true)
                .default_value("")
                .action(ArgAction::Set),
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Config file with the database definitions, defaults to DBDUMP_CONFIG or ./dbdump.toml")
                .action(ArgAction::Set),
        ])
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(config::config_file);

    let databases = match config::load_databases(&config_file) {
        Ok(d) => d,
        Err(err) => {
            error!("Failed to load config file: {:?}", err);
            std::process::exit(1);
        }
    };

    let alias = matches
        .get_one::<String>("db-name")
        .map(String::as_str)
        .unwrap_or("default");

    let options = DumpOptions {
        destination: matches
            .get_one::<String>("destination")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("backups")),
        filename: matches.get_one::<String>("filename").cloned(),
        compress: matches.get_one::<String>("compress").cloned(),
        raw_args: matches
            .get_one::<String>("raw-args")
            .cloned()
            .unwrap_or_default(),
        quiet: matches.get_flag("quiet"),
        debug: matches.get_flag("debug"),
        pgpass: matches.get_flag("pgpass"),
    };

    match dbdump::dump_database(&databases, alias, &options).await {
        Err(err) => {
            error!("{:?}", err);
            std::process::exit(1);
        }
        Ok(report) => {
            if !options.is_quiet() {
                info!("Success, database dumped into {}", report.target);
            }
        }
    };
}
