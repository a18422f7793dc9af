//! Command-line driver for the loopback exchange.
//!
//! `demo` runs a source and a register-file responder in one process.
//! `serve` owns the session, reads batch scripts from stdin and lets
//! consumers attach over a Unix socket. `respond` is such a consumer.

mod script;

use std::fs;
use std::io::{self, BufRead};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use exchange::{ExchangeConfig, ExchangeSession, Message, TransactionRunner};
use exchange_control::{serve_stream, ControlClient, ControlError};
use responder::{ConsumerLoop, LoopConfig, RegisterFile, ResponderError};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEMO_SCRIPT: &str = "w50:0048656c6c6f w50:00 r50:5 r51:1";

/// Text rendering helpers used by the CLI commands.
mod render {
    use exchange::{BatchError, ExchangeMetricsSnapshot, Message};
    use responder::LoopStats;

    pub fn hex(bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One finished message, e.g. `#2 r 0x50 [68 65 6c]`.
    pub fn message(index: usize, msg: &Message) -> String {
        let kind = if msg.flags().is_read() { 'r' } else { 'w' };
        format!(
            "#{index} {kind} {:#04x} [{}]",
            msg.address(),
            hex(msg.payload())
        )
    }

    pub fn failure(err: &BatchError) -> String {
        format!("#{} failed: {}", err.index, err.error)
    }

    pub fn metrics(snapshot: &ExchangeMetricsSnapshot) -> String {
        format!(
            "completed={} nacked={} timed_out={} no_consumer={} busy={}",
            snapshot.completed,
            snapshot.nacked,
            snapshot.timed_out,
            snapshot.no_consumer,
            snapshot.busy
        )
    }

    pub fn loop_stats(stats: &LoopStats) -> String {
        format!(
            "acked={} nacked={} abandoned={} idle_polls={}",
            stats.acked, stats.nacked, stats.abandoned, stats.idle_polls
        )
    }
}

/// Drive a single-slot message exchange from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about = "Loopback message exchange", long_about = None)]
struct Cli {
    /// JSON file with exchange settings (`timeout_ms`, `poll_interval_ms`).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the submission timeout, in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scripted batch against an in-process register file.
    Demo {
        /// Device address of the register file.
        #[arg(long, value_parser = parse_u16, default_value = "0x50")]
        address: u16,
        /// Batch script to run instead of the built-in one.
        #[arg(long)]
        script: Option<String>,
    },
    /// Own the session, run batches read from stdin, accept consumers on a socket.
    Serve {
        /// Path of the Unix socket consumers connect to.
        #[arg(long, value_name = "PATH")]
        socket: PathBuf,
    },
    /// Attach a register file to a serving session until stdin closes.
    Respond {
        /// Path of the serving Unix socket.
        #[arg(long, value_name = "PATH")]
        socket: PathBuf,
        /// Device address of the register file.
        #[arg(long, value_parser = parse_u16, default_value = "0x50")]
        address: u16,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    debug!(?config, "exchange config");

    match cli.command {
        Command::Demo { address, script } => {
            handle_demo(config, address, script.as_deref().unwrap_or(DEMO_SCRIPT))
        }
        Command::Serve { socket } => handle_serve(config, &socket),
        Command::Respond { socket, address } => handle_respond(config, &socket, address),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_writer(io::stderr).with_env_filter(env_filter).try_init();
}

fn load_config(path: Option<&Path>) -> Result<ExchangeConfig> {
    let Some(path) = path else {
        return Ok(ExchangeConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read config {path:?}"))?;
    parse_config(&text).with_context(|| format!("invalid config {path:?}"))
}

fn parse_config(text: &str) -> Result<ExchangeConfig> {
    Ok(serde_json::from_str(text)?)
}

fn handle_demo(config: ExchangeConfig, address: u16, script: &str) -> Result<()> {
    let mut batch = script::parse_line(script)?;
    let session = ExchangeSession::new(config);
    let runner = session.register_source()?;
    let consumer = session.open_consumer()?;

    let (stop_tx, stop_rx) = bounded(1);
    let responder = RegisterFile::new(address);
    let loop_config = LoopConfig::from(&config);
    let worker = thread::spawn(move || {
        ConsumerLoop::with_config(consumer, responder, stop_rx, loop_config).run()
    });

    run_and_print(&runner, &mut batch);

    stop_tx.send(())?;
    let (_, stats) = worker
        .join()
        .map_err(|_| anyhow!("responder thread panicked"))??;
    println!("responder: {}", render::loop_stats(&stats));
    println!("session: {}", render::metrics(&session.metrics()));
    Ok(())
}

fn handle_serve(config: ExchangeConfig, socket: &Path) -> Result<()> {
    remove_stale_socket(socket)?;
    let listener =
        UnixListener::bind(socket).with_context(|| format!("failed to bind {socket:?}"))?;
    let session = ExchangeSession::new(config);
    let runner = session.register_source()?;
    info!(socket = %socket.display(), "waiting for a consumer");

    let acceptor_session = Arc::clone(&session);
    thread::spawn(move || accept_consumers(listener, acceptor_session));

    for (lineno, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        let mut batch = match script::parse_line(&line) {
            Ok(batch) => batch,
            Err(err) => {
                eprintln!("line {}: {err:#}", lineno + 1);
                continue;
            }
        };
        if !batch.is_empty() {
            run_and_print(&runner, &mut batch);
        }
    }

    println!("session: {}", render::metrics(&session.metrics()));
    drop(runner);
    fs::remove_file(socket).with_context(|| format!("failed to remove {socket:?}"))?;
    Ok(())
}

fn accept_consumers(listener: UnixListener, session: Arc<ExchangeSession>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    info!("consumer connected");
                    if let Err(err) = serve_stream(session, stream) {
                        warn!(%err, "consumer connection failed");
                    }
                    info!("consumer disconnected");
                });
            }
            Err(err) => warn!(%err, "accept failed"),
        }
    }
}

fn handle_respond(config: ExchangeConfig, socket: &Path, address: u16) -> Result<()> {
    let stream =
        UnixStream::connect(socket).with_context(|| format!("failed to connect {socket:?}"))?;
    let mut client = ControlClient::new(stream);
    client.open().context("failed to open the consumer gate")?;
    info!("register file attached at {address:#04x}");

    let (stop_tx, stop_rx) = bounded::<()>(1);
    thread::spawn(move || {
        match io::copy(&mut io::stdin().lock(), &mut io::sink()) {
            Ok(_) => debug!("stdin closed, stopping responder"),
            Err(err) => debug!(%err, "stdin failed, stopping responder"),
        }
        drop(stop_tx);
    });

    let consumer = ConsumerLoop::with_config(
        client,
        RegisterFile::new(address),
        stop_rx,
        LoopConfig::from(&config),
    );
    match consumer.run() {
        Ok((_, stats)) => {
            println!("responder: {}", render::loop_stats(&stats));
            Ok(())
        }
        Err(ResponderError::Control(ControlError::Io(err))) => {
            info!(%err, "server went away");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_and_print(runner: &TransactionRunner, batch: &mut [Message]) {
    let done = match runner.run_batch(batch) {
        Ok(done) => done,
        Err(err) => {
            for (index, msg) in batch[..err.index].iter().enumerate() {
                println!("{}", render::message(index, msg));
            }
            println!("{}", render::failure(&err));
            return;
        }
    };
    for (index, msg) in batch[..done].iter().enumerate() {
        println!("{}", render::message(index, msg));
    }
}

fn remove_stale_socket(socket: &Path) -> Result<()> {
    match fs::symlink_metadata(socket) {
        Ok(meta) if meta.file_type().is_socket() => {
            fs::remove_file(socket).with_context(|| format!("failed to remove stale {socket:?}"))
        }
        Ok(_) => bail!("{socket:?} exists and is not a socket"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to inspect {socket:?}")),
    }
}

fn parse_u16(input: &str) -> Result<u16, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u16::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u16>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}
