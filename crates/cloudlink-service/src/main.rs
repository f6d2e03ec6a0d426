//! cloudlink device simulator.
//!
//! - Loads `cloudlink.yaml` (or the path given as the first argument)
//! - Publishes through a background publisher whose transport prints
//!   `<event> <payload>` lines on stdout
//! - Treats every stdin line as one inbound cloud event
//! - Ticks every 100 ms; prints statistics on Ctrl-C

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing_subscriber::{fmt, EnvFilter};

use cloudlink_core::error::{CloudError, Result};
use cloudlink_core::protocol::envelope::{CMD_CFG, CMD_SYNC};
use cloudlink_core::protocol::Envelope;
use cloudlink_service::publish::TransportError;
use cloudlink_service::{
    config, AckStatus, BackgroundPublisher, CloudService, PublishFlags, SystemClock, Transport,
};

struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    async fn publish(
        &self,
        event_name: &str,
        payload: &str,
        _flags: PublishFlags,
    ) -> std::result::Result<(), TransportError> {
        let line = format!("{event_name} {payload}\n");
        let mut out = tokio::io::stdout();
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        out.flush().await.map_err(|e| TransportError(e.to_string()))
    }
}

fn on_ping(svc: &CloudService, env: &Envelope) -> Result<i32> {
    svc.send_ack(env, 0)?;
    Ok(0)
}

fn on_cfg(svc: &CloudService, env: &Envelope) -> Result<i32> {
    // Apply on the next loop pass, then ack.
    let env = env.clone();
    svc.defer(move |svc| {
        tracing::info!(fields = env.fields.len(), "applying cfg");
        svc.send_ack(&env, 0).map(|_| ())
    });
    Ok(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "cloudlink.yaml".to_string());
    let cfg = config::load_from_file(&path)?;

    let (publisher, worker) = BackgroundPublisher::spawn(Arc::new(StdoutTransport), &cfg.publisher);
    let svc = CloudService::new(
        cfg.service.clone(),
        Arc::new(publisher.clone()),
        Arc::new(SystemClock::new()),
    )?;

    svc.register_command("ping", on_ping)?;
    svc.register_command(CMD_CFG, on_cfg)?;
    tracing::info!(commands = ?svc.registered_commands(), "cloudlink-service starting");

    let mut sync = svc.begin_command(CMD_SYNC)?;
    sync.insert("fw", env!("CARGO_PKG_VERSION"))?;
    svc.request(sync, |_, status, ack, _payload| {
        match status {
            AckStatus::Success => tracing::info!(ack = ?ack.map(|a| &a.fields), "sync acked"),
            other => tracing::warn!(status = other.as_str(), "sync not acked"),
        }
        0
    })?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(Duration::from_millis(100));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| CloudError::Internal(format!("stdin: {e}")))?;
                let Some(line) = line else { break; };
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(outcome) = svc.dispatch(line.trim()) {
                    tracing::debug!(?outcome, "dispatched");
                }
            }

            _ = ticker.tick() => svc.tick(),

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    publisher.shutdown();
    BackgroundPublisher::join(worker).await;
    eprint!("{}", svc.render_stats());
    Ok(())
}
