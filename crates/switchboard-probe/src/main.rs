//! Switchboard Probe - one-shot diagnostics client.
//!
//! Opens a WebSocket to a switchboard server, issues a single RPC call on one
//! service, prints the reply and optionally the notifications that follow.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use switchboard::config::TransportConfig;
use switchboard::services::{GenericEvent, GenericService};
use switchboard::transport::websocket;
use switchboard::{ConnectionEvent, Connector, FnSink, RpcMethods};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "switchboard-probe")]
#[command(about = "Issue one RPC call over a switchboard connection")]
struct Args {
    /// Server address (ws:// URL, or host[:port] for the default endpoint)
    #[arg(short, long, default_value = "localhost")]
    url: String,

    /// Service channel to address
    #[arg(short, long)]
    service: String,

    /// Command to call on the service
    #[arg(short, long)]
    command: String,

    /// Call parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    params: String,

    /// Seconds to wait for the reply
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Seconds to keep printing notifications after the reply
    #[arg(long, default_value = "0")]
    listen_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Expand a bare host or host:port into the default WebSocket endpoint.
fn endpoint_url(url: &str) -> String {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        return url.to_string();
    }

    let has_port = url
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        format!("ws://{}{}", url, TransportConfig::DEFAULT_PATH)
    } else {
        format!(
            "ws://{}:{}{}",
            url,
            TransportConfig::DEFAULT_PORT,
            TransportConfig::DEFAULT_PATH
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let params: Value = serde_json::from_str(&args.params).context("--params is not valid JSON")?;
    if !params.is_object() {
        bail!("--params must be a JSON object");
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut builder = Connector::builder();
    let service = builder.service(args.service.clone(), |channel| {
        Ok(GenericService::with_methods(channel, RpcMethods::new(), event_tx))
    })?;
    builder.events(FnSink(|event: ConnectionEvent| info!("Connection event: {:?}", event)));
    let connector = Arc::new(builder.build());

    let url = endpoint_url(&args.url);
    let connection = websocket::connect(connector.clone(), &url)
        .await
        .with_context(|| format!("failed to connect to {}", url))?;

    info!("Calling {}.{}", args.service, args.command);
    let call = service.call(&args.command, params);
    let reply = match tokio::time::timeout(Duration::from_secs(args.timeout_secs), call).await {
        Ok(reply) => reply,
        Err(_) => {
            connector.disconnect();
            bail!("no reply to {} within {}s", args.command, args.timeout_secs);
        }
    };

    let data = match reply {
        Ok(data) => data,
        Err(e) => {
            connector.disconnect();
            bail!(e);
        }
    };
    println!("{}", serde_json::to_string_pretty(&data)?);

    if args.listen_secs > 0 {
        info!("Listening for notifications for {}s", args.listen_secs);
        let deadline = tokio::time::sleep(Duration::from_secs(args.listen_secs));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(GenericEvent::Notification(notification)) => {
                        println!("{}", serde_json::to_string_pretty(&notification)?);
                    }
                    None => break,
                },
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }
    }

    connector.disconnect();
    if tokio::time::timeout(Duration::from_secs(2), connection.closed())
        .await
        .is_err()
    {
        warn!("Connection did not close cleanly");
    }

    Ok(())
}
