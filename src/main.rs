#![allow(dead_code)]

mod repl;
mod server;
mod session;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use leafdb::errors::Error;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "leafdb", version = VERSION, about = "Embeddable key-value storage engine.")]
struct Cli {
    /// Directory holding this database's table files.
    #[arg(long, env = "LEAFDB_DIR", default_value = "./data")]
    dir: PathBuf,
    /// Host address to bind to when running as a socket server.
    #[arg(long, env = "LEAFDB_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on when running as a socket server.
    #[arg(long, env = "LEAFDB_PORT", default_value = "4077")]
    port: u16,
    /// Run the line-framed socket server instead of the interactive console.
    #[arg(long, short, env = "LEAFDB_SERVER", default_value = "false")]
    server: bool,
}

fn main() -> ExitCode {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("leafdb.log")
        .expect("failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = if cli.server {
        server::serve(&cli.host, cli.port, cli.dir)
    } else {
        repl::run(cli.dir)
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(Error::IoFailure(e)) if e.kind() == std::io::ErrorKind::Interrupted => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
