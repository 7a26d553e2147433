//! cabind - cabin capability bridge daemon
//!
//! Reads UI calls from stdin, one per line, and answers each with one
//! stdout line. UI callbacks (`onOBDData`, `onDownloadProgress`) are
//! written to stdout as scripts as they happen. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! cabind --config /etc/cabin/cabind.toml
//! RUST_LOG=cabin_obd=trace cabind --log-json
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use anyhow::Result;
use cabind::{commands, BridgeConfig, NativeBridge, Reply, StdoutSurface};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cabind")]
#[command(about = "Native capability bridge for a script-driven vehicle UI")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, default_value = "/etc/cabin/cabind.toml")]
    config: PathBuf,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting cabind (cabin capability bridge)");
    let config = BridgeConfig::load(&args.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("cabind-rt")
        .build()?;

    let bridge = NativeBridge::new(&config, Arc::new(StdoutSurface), runtime.handle().clone())?;

    let (tx, rx) = mpsc::channel::<Input>();

    let signal_tx = tx.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            let _ = signal_tx.send(Input::Interrupted);
        }
    });

    std::thread::Builder::new()
        .name("cabind-stdin".into())
        .spawn(move || read_stdin(tx))?;

    info!(config = %args.config.display(), "Ready for commands on stdin");

    // The facade blocks on the runtime, so it is driven from this thread
    while let Ok(input) = rx.recv() {
        let line = match input {
            Input::Line(line) => line,
            Input::Eof | Input::Interrupted => break,
        };
        match commands::parse(&line) {
            Ok(Some(command)) => match command.run(&bridge) {
                Reply::Line(reply) => respond(&reply),
                Reply::Quit => break,
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Rejected command");
                respond("false");
            }
        }
    }

    bridge.shutdown();
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    info!("cabind stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "cabind=info,cabin_obd=debug,cabin_media=info,cabin_update=info".into()
    });

    // stdout carries the UI protocol
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn read_stdin(tx: mpsc::Sender<Input>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => {
                if tx.send(Input::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
    let _ = tx.send(Input::Eof);
}

fn respond(line: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{}", line).and_then(|_| out.flush());
}
