//! Headless host for the bridge.
//!
//! Reads host messages as JSON lines on stdin and writes the messages the
//! bridge posts back as JSON lines on stdout.
//!
//! ```text
//! pmobml-host [network_id] [service_id] < messages.jsonl
//! ```

mod demux;
mod headless;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use pmobml::{
    spawn_bridge, BridgeConfigExt, Collaborators, Controller, EngineMessage, HostMessage,
    IpClient, ReqwestTransport, ServiceIds, SystemTimeSource,
};
use pmoconfig::get_config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::demux::PcrDemuxer;
use crate::headless::{TracingCaptions, TracingDocument, TracingPresentation};

fn service_from_args() -> Result<ServiceIds> {
    let mut args = std::env::args().skip(1);
    let mut next_id = |name: &str| -> Result<Option<u16>> {
        args.next()
            .map(|raw| {
                raw.parse::<u16>()
                    .with_context(|| format!("invalid {}: {}", name, raw))
            })
            .transpose()
    };
    Ok(ServiceIds {
        network_id: next_id("network_id")?,
        service_id: next_id("service_id")?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = get_config();
    logging::init_logging(&config);

    let service = service_from_args()?;
    let settings = config.bridge_settings()?;
    let nvram = config.nvram_store()?;
    let ip = Arc::new(IpClient::new(
        Arc::new(ReqwestTransport::new()?),
        settings.api_base_url.clone(),
    ));

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<EngineMessage>();
    let controller = Controller::new(
        settings,
        service,
        Collaborators {
            demuxer: Box::new(PcrDemuxer::new()),
            document: Box::new(TracingDocument),
            captions: Box::new(TracingCaptions),
            presentation: Box::new(TracingPresentation::default()),
            host: Box::new(out_tx.clone()),
            nvram: Box::new(nvram),
            time: Box::new(SystemTimeSource),
        },
    );
    let (bridge, task) = spawn_bridge(controller, ip);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            match message.to_json() {
                Ok(line) => {
                    if stdout.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => warn!(error = %e, "Cannot serialize engine message"),
            }
        }
    });

    info!("Reading host messages from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message = match HostMessage::from_json(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping host message");
                continue;
            }
        };
        if message.expects_reply() {
            if let Some(reply) = bridge.request(message).await {
                let _ = out_tx.send(reply);
            }
        } else {
            bridge.post(message);
        }
    }

    bridge.shutdown();
    let controller = task.await?;
    info!(stats = ?controller.ingest_stats(), "Input closed");

    // The writer ends once every sender is gone
    drop(controller);
    drop(out_tx);
    writer.await?;
    Ok(())
}
