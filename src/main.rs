use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_derive::Parser;
use packet_dump_client::client::client_config::{ClientConfig, RecoveryStrategy, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT};
use packet_dump_client::client::client_events::{ClientEvent, ClientEventNotifier, MAX_REPORTED_MISSING};
use packet_dump_client::client::connection_manager::{ConnectionManager, SessionOutcome};
use packet_dump_client::client::transport::TcpConnector;
use packet_dump_client::output::packet_sink::JsonFileSink;
use packet_dump_client::store::packet_store::PacketStore;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
struct Args {
    #[clap(long, default_value_t = DEFAULT_SERVER_HOST.to_string())]
    host: String,

    #[clap(long, default_value_t = DEFAULT_SERVER_PORT)]
    port: u16,

    #[clap(long, default_value_t = 5)]
    max_reconnect_attempts: u32,

    #[clap(long, default_value_t = 1000)]
    reconnect_interval_ms: u64,

    /// request missing sequence numbers individually instead of re-requesting the full stream
    #[clap(long, default_value_t = false)]
    resend_missing: bool,

    #[clap(long, default_value_t = 1000)]
    resend_timeout_ms: u64,

    #[clap(long, default_value_t = 1000)]
    max_resend_requests: usize,

    #[clap(short, long, default_value = "output.json")]
    output: String,

    /// also save the collected packets if the session gave up with gaps
    #[clap(long, default_value_t = false)]
    save_incomplete: bool,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = ClientConfig::new(args.host, args.port);
    config.max_reconnect_attempts = args.max_reconnect_attempts;
    config.reconnect_interval = Duration::from_millis(args.reconnect_interval_ms);
    config.max_resend_requests = args.max_resend_requests;
    if args.resend_missing {
        config.recovery_strategy = RecoveryStrategy::ResendMissing {
            response_timeout: Duration::from_millis(args.resend_timeout_ms),
        };
    }
    let config = Arc::new(config);

    let events = Arc::new(ClientEventNotifier::new());
    tokio::spawn(report_events(events.subscribe()));

    let connector = Arc::new(TcpConnector::new(&config));
    let mut manager = ConnectionManager::new(config.clone(), connector, events);

    let cancel_handle = manager.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let mut store = PacketStore::new();
    let mut sink = JsonFileSink::new(args.output)
        .with_persist_incomplete(args.save_incomplete);

    let outcome = manager.run(&mut store, &mut sink).await?;
    match outcome {
        SessionOutcome::Complete => Ok(()),
        SessionOutcome::GaveUp { attempts } => {
            Err(anyhow::anyhow!("could not collect all packets from {} after {} reconnect attempts, {} sequence numbers missing, starting with {:?}", config.server_addr(), attempts, store.num_missing(), store.missing_sequences_up_to(MAX_REPORTED_MISSING)))
        }
        SessionOutcome::Cancelled => {
            info!("cancelled");
            Ok(())
        }
    }
}

async fn report_events(mut events: broadcast::Receiver<ClientEvent>) {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Connected { attempt }) => info!("connected to server (attempt {})", attempt),
            Ok(ClientEvent::Disconnected { num_missing: 0, .. }) => info!("connection closed"),
            Ok(ClientEvent::Disconnected { num_missing, first_missing }) => info!("connection closed, {} sequence numbers missing, starting with {:?}", num_missing, first_missing),
            Ok(ClientEvent::TransportError { message }) => error!("transport error: {}", message),
            Ok(ClientEvent::FrameSkipped { error }) => warn!("invalid packet skipped: {}", error),
            Ok(ClientEvent::ReconnectAttempt { attempt, max_attempts }) => info!("reconnecting to server (attempt {} of {})", attempt, max_attempts),
            Ok(ClientEvent::RequestingMissingSequences { sequences }) => info!("requesting missing sequences: {:?}", sequences),
            Ok(ClientEvent::Completed { num_packets }) => info!("all {} packets received", num_packets),
            Ok(ClientEvent::GaveUp { attempts, num_packets }) => error!("giving up after {} reconnect attempts with {} packets", attempts, num_packets),
            Ok(ClientEvent::Cancelled) => info!("session cancelled"),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("skipped {} client events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
