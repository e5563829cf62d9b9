//! The line-framed socket protocol from §6: one command per line, one
//! response per line, the same vocabulary `repl::dispatch` already speaks.
//!
//! Grounded on the blocking-accept-loop shape of `mermoldy-mysqlite`'s
//! `main.rs`/`repl::console::start`, generalized from "print to stdout" to
//! "write to whichever stream called". The concurrency model (§5) is
//! single-threaded per table with no cross-table ordering guarantee, so one
//! `Session` is shared across all connections behind a single `Mutex`: each
//! accepted connection gets its own thread, but command execution itself is
//! fully serialized.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use leafdb::errors::Result;

use crate::repl;
use crate::session::Session;

pub fn serve(host: &str, port: u16, data_dir: std::path::PathBuf) -> Result<()> {
    let session = Arc::new(Mutex::new(Session::open(&data_dir)?));
    let listener = TcpListener::bind((host, port))?;
    info!(host, port, "listening");

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        let session = Arc::clone(&session);
        std::thread::spawn(move || {
            if let Err(e) = handle_connection(stream, session) {
                warn!(error = %e, "connection ended with an error");
            }
        });
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, session: Arc<Mutex<Session>>) -> std::io::Result<()> {
    let peer = stream.peer_addr().ok();
    info!(?peer, "client connected");
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        let mut guard = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = repl::dispatch(&mut guard, line);
        drop(guard);

        match result {
            Ok(response) => writer.write_all(response.as_bytes())?,
            Err(e) => {
                error!(?peer, error = %e, "command failed");
                writeln!(writer, "error: {}", e)?;
            }
        }
        writer.flush()?;
    }
    info!(?peer, "client disconnected");
    Ok(())
}
