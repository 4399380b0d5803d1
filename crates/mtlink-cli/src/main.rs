//! mtlink: talk to a mesh radio over serial or TCP.
//!
//! ```text
//! mtlink --tcp 192.168.42.1 nodes --json
//! mtlink --serial /dev/ttyUSB0 send --to broadcast "hello mesh"
//! mtlink --config radio.yaml listen
//! ```

mod output;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use mtlink_client::{
    Client, ClientConfig, ClientError, ConfigError, EncryptedPayload, MonotonicClock, PacketHandler, PortPayload,
    ReportHandler, TextMessage, TransportConfig,
};
use mtlink_protocol::{ChannelReport, NodeReport, ReportProgress, BROADCAST_ADDR, DEFAULT_RADIO_PORT};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::output::ReportSummary;

#[derive(Parser)]
#[command(name = "mtlink")]
#[command(author, version, about = "Mesh radio client", long_about = None)]
struct Cli {
    /// Radio reachable over TCP, as HOST or HOST:PORT
    #[arg(long, conflicts_with = "serial")]
    tcp: Option<String>,

    /// Radio on a serial port, e.g. /dev/ttyUSB0
    #[arg(long)]
    serial: Option<String>,

    /// Serial baud rate
    #[arg(long, requires = "serial")]
    baud: Option<u32>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed for request and packet ids
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Serve Prometheus metrics on this address
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request and print the radio's node and channel report
    Nodes {
        /// Give up after this many seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a text message
    Send {
        /// Destination: broadcast, !hex node id, 0x hex or decimal node number
        #[arg(long, default_value = "broadcast")]
        to: String,

        /// Channel index
        #[arg(long, default_value = "0")]
        channel: u32,

        /// Message text
        text: String,
    },

    /// Print mesh packets until interrupted
    Listen {
        /// Print packets as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("interrupted")]
    Interrupted,

    #[error("radio only completed reports with other ids")]
    ReportInvalid,
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_tcp_endpoint(endpoint: &str) -> Result<TransportConfig, CliError> {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| CliError::InvalidArgument(format!("bad TCP port in '{}'", endpoint)))?;
            Ok(TransportConfig::tcp(host, port))
        }
        None => Ok(TransportConfig::tcp(endpoint, DEFAULT_RADIO_PORT)),
    }
}

/// Parse a destination node: `broadcast`, `^all`, `!a1b2c3d4`, `0xa1b2c3d4` or decimal.
fn parse_destination(dest: &str) -> Result<u32, CliError> {
    let bad = || CliError::InvalidArgument(format!("bad destination '{}'", dest));
    match dest {
        "broadcast" | "^all" => Ok(BROADCAST_ADDR),
        _ => {
            if let Some(hex) = dest.strip_prefix('!').or_else(|| dest.strip_prefix("0x")) {
                u32::from_str_radix(hex, 16).map_err(|_| bad())
            } else {
                dest.parse().map_err(|_| bad())
            }
        }
    }
}

fn build_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(endpoint) = &cli.tcp {
        config = config.with_transport(parse_tcp_endpoint(endpoint)?);
    }
    if let Some(port) = &cli.serial {
        let mut transport = TransportConfig::serial(port.clone());
        if let (TransportConfig::Serial { baud_rate, .. }, Some(baud)) = (&mut transport, cli.baud) {
            *baud_rate = baud;
        }
        config = config.with_transport(transport);
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if cli.verbose >= 3 {
        config = config.with_debug(true);
    }
    Ok(config)
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Default)]
struct Collected {
    summary: ReportSummary,
    done: bool,
    /// Completions carrying someone else's id.
    mismatches: u32,
}

/// Collects report entries into a shared [`ReportSummary`].
struct ReportCollector(Rc<RefCell<Collected>>);

impl ReportHandler for ReportCollector {
    fn on_node_report(&mut self, report: Option<&NodeReport>, progress: ReportProgress) {
        let mut collected = self.0.borrow_mut();
        match (report, progress) {
            (Some(node), _) => collected.summary.nodes.push(node.clone()),
            (None, ReportProgress::Done) => collected.done = true,
            (None, _) => {
                warn!("Nodes: radio finished a report we did not ask for");
                collected.mismatches += 1;
            }
        }
    }

    fn on_channel_report(&mut self, report: Option<&ChannelReport>, _progress: ReportProgress) {
        if let Some(channel) = report {
            self.0.borrow_mut().summary.channels.push(channel.clone());
        }
    }
}

/// Prints every mesh packet to stdout.
struct PacketPrinter {
    json: bool,
}

impl PacketPrinter {
    fn print<T: serde::Serialize>(&self, kind: &str, value: &T, line: String) {
        if !self.json {
            println!("{}", line);
            return;
        }
        match serde_json::to_value(value) {
            Ok(mut json) => {
                json["kind"] = serde_json::Value::from(kind);
                println!("{}", json);
            }
            Err(e) => warn!("Listen: failed to encode packet: {}", e),
        }
    }
}

impl PacketHandler for PacketPrinter {
    fn on_text_message(&mut self, message: &TextMessage) {
        self.print("text", message, output::text_line(message));
    }

    fn on_port_payload(&mut self, payload: &PortPayload) {
        self.print("payload", payload, output::payload_line(payload));
    }

    fn on_encrypted(&mut self, payload: &EncryptedPayload) {
        self.print("encrypted", payload, output::encrypted_line(payload));
    }
}

// ============================================================================
// Driving the client
// ============================================================================

type CliClient = Client<Box<dyn mtlink_client::Transport>>;

struct Driver {
    client: CliClient,
    clock: MonotonicClock,
    interrupted: Arc<AtomicBool>,
}

impl Driver {
    /// Pump until `done` holds, sleeping cooperatively when idle.
    async fn run_until(
        &mut self,
        deadline: Option<Instant>,
        mut done: impl FnMut(&CliClient, bool) -> bool,
    ) -> Result<bool, CliError> {
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(CliError::Interrupted);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(false);
            }
            let tick = self.client.pump(self.clock.now())?;
            if done(&self.client, tick.link_up) {
                return Ok(true);
            }
            if !tick.progressed {
                tokio::time::sleep(self.client.idle_pause()).await;
            }
        }
    }

    async fn wait_for_link(&mut self, deadline: Option<Instant>, timeout_secs: u64) -> Result<(), CliError> {
        if self.run_until(deadline, |_, link_up| link_up).await? {
            Ok(())
        } else {
            Err(CliError::Timeout(timeout_secs))
        }
    }
}

async fn nodes(driver: &mut Driver, timeout_secs: u64, json: bool) -> Result<(), CliError> {
    let deadline = Some(Instant::now() + Duration::from_secs(timeout_secs));
    driver.wait_for_link(deadline, timeout_secs).await?;

    let collected = Rc::new(RefCell::new(Collected::default()));
    let id = driver.client.request_report(ReportCollector(collected.clone()))?;
    info!("Nodes: requested report {}", id);

    let finished = driver
        .run_until(deadline, |_, _| collected.borrow().done)
        .await?;
    let collected = collected.borrow();
    if !finished {
        if collected.mismatches > 0 {
            return Err(CliError::ReportInvalid);
        }
        return Err(CliError::Timeout(timeout_secs));
    }

    let summary = &collected.summary;
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        for node in &summary.nodes {
            println!("{}", output::node_line(node));
        }
        if !summary.channels.is_empty() {
            println!();
            for channel in &summary.channels {
                println!("{}", output::channel_line(channel));
            }
        }
    }
    Ok(())
}

async fn send(driver: &mut Driver, to: &str, channel: u32, text: &str) -> Result<(), CliError> {
    const LINK_TIMEOUT_SECS: u64 = 30;
    let dest = parse_destination(to)?;
    let deadline = Some(Instant::now() + Duration::from_secs(LINK_TIMEOUT_SECS));
    driver.wait_for_link(deadline, LINK_TIMEOUT_SECS).await?;

    let id = driver.client.send_text(text, dest, channel)?;
    println!("sent packet {} to {}", id, output::node_id(dest));
    Ok(())
}

async fn listen(driver: &mut Driver, json: bool) -> Result<(), CliError> {
    driver.client.set_packet_handler(PacketPrinter { json });
    match driver.run_until(None, |_, _| false).await {
        Err(CliError::Interrupted) => {
            debug!("Listen: interrupted");
            Ok(())
        }
        other => other.map(|_| ()),
    }
}

#[cfg(feature = "prometheus")]
fn install_metrics(cli: &Cli) -> Result<(), CliError> {
    if let Some(addr) = cli.metrics_addr {
        mtlink_metrics::install_prometheus(addr)
            .map_err(|e| CliError::InvalidArgument(format!("metrics exporter: {}", e)))?;
    }
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(_cli: &Cli) -> Result<(), CliError> {
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    install_metrics(&cli)?;
    let config = build_config(&cli)?;
    let client = Client::connect(config)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("could not install Ctrl-C handler: {}", e);
    }

    let mut driver = Driver {
        client,
        clock: MonotonicClock::new(),
        interrupted,
    };

    match &cli.command {
        Commands::Nodes { timeout_secs, json } => nodes(&mut driver, *timeout_secs, *json).await,
        Commands::Send { to, channel, text } => send(&mut driver, to, *channel, text).await,
        Commands::Listen { json } => listen(&mut driver, *json).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_destination() {
        assert_eq!(parse_destination("broadcast").unwrap(), BROADCAST_ADDR);
        assert_eq!(parse_destination("^all").unwrap(), BROADCAST_ADDR);
        assert_eq!(parse_destination("!a1b2c3d4").unwrap(), 0xa1b2c3d4);
        assert_eq!(parse_destination("0x10").unwrap(), 16);
        assert_eq!(parse_destination("1234").unwrap(), 1234);
        assert!(parse_destination("!zz").is_err());
        assert!(parse_destination("").is_err());
    }

    #[test]
    fn test_parse_tcp_endpoint() {
        assert_eq!(
            parse_tcp_endpoint("10.0.0.5").unwrap(),
            TransportConfig::tcp("10.0.0.5", DEFAULT_RADIO_PORT)
        );
        assert_eq!(
            parse_tcp_endpoint("radio.local:5000").unwrap(),
            TransportConfig::tcp("radio.local", 5000)
        );
        assert!(parse_tcp_endpoint("radio.local:http").is_err());
    }

    #[test]
    fn test_build_config_from_flags() {
        let cli = Cli::parse_from(["mtlink", "--serial", "/dev/ttyACM0", "--baud", "9600", "--seed", "4", "listen"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(
            config.transport,
            Some(TransportConfig::Serial {
                port: "/dev/ttyACM0".to_string(),
                baud_rate: 9600,
            })
        );
        assert_eq!(config.seed, Some(4));
        assert!(!config.debug);
    }

    #[cfg(not(feature = "prometheus"))]
    #[test]
    fn test_metrics_flag_needs_prometheus() {
        assert!(Cli::try_parse_from(["mtlink", "--metrics-addr", "127.0.0.1:9000", "listen"]).is_err());
        let cli = Cli::parse_from(["mtlink", "listen"]);
        assert!(install_metrics(&cli).is_ok());
    }

    #[test]
    fn test_tcp_and_serial_conflict() {
        let result = Cli::try_parse_from(["mtlink", "--tcp", "a", "--serial", "b", "listen"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_collector_records_outcome() {
        let collected = Rc::new(RefCell::new(Collected::default()));
        let mut collector = ReportCollector(collected.clone());
        collector.on_node_report(Some(&NodeReport::default()), ReportProgress::InProgress);
        collector.on_channel_report(Some(&ChannelReport::default()), ReportProgress::InProgress);
        collector.on_node_report(None, ReportProgress::Invalid);
        assert!(!collected.borrow().done);

        collector.on_node_report(None, ReportProgress::Done);
        collector.on_channel_report(None, ReportProgress::Done);

        let collected = collected.borrow();
        assert_eq!(collected.summary.nodes.len(), 1);
        assert_eq!(collected.summary.channels.len(), 1);
        assert_eq!(collected.mismatches, 1);
        assert!(collected.done);
    }
}
