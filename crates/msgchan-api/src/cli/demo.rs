//! `msgchan demo`: one notification and one fetch against a doubling listener.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use msgchan_core::ChannelConfig;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::TransportKind;
use crate::link::Link;

const EVENT: &str = "test-event";

/// How long to wait for the notification to come through.
const NOTIFY_WAIT: Duration = Duration::from_secs(2);

/// Values observed by the demo.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    /// Doubled value seen by the listener for the notification.
    pub notified: i64,
    /// Response to the fetch.
    pub fetched: i64,
}

/// Run the demo over `transport` and print the result.
pub async fn run(transport: TransportKind, config: &ChannelConfig, json: bool, quiet: bool) -> Result<()> {
    let link = Link::connect(transport, config);
    let report = exercise(&link).await?;
    link.close().await?;

    if json {
        let out = serde_json::json!({
            "transport": format!("{transport:?}").to_lowercase(),
            "notified": report.notified,
            "fetched": report.fetched,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !quiet {
        println!(
            "{} send({EVENT}, 4) -> listener saw {}",
            style("✓").green().bold(),
            style(report.notified).cyan()
        );
        println!(
            "{} fetch({EVENT}, 6) -> {}",
            style("✓").green().bold(),
            style(report.fetched).cyan()
        );
    }
    Ok(())
}

/// Register the doubling listener on `left` and drive it from `right`.
pub async fn exercise(link: &Link) -> Result<DemoReport> {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    let _sub = link.left.on(EVENT, move |event| {
        let val = 2 * event.data_as::<i64>()?;
        if event.is_fetch() {
            event.send(val)?;
        } else {
            tracing::info!(val, "notification received");
            let _ = seen_tx.send(val);
        }
        Ok(())
    });

    link.right.send(EVENT, 4)?;
    let notified = tokio::time::timeout(NOTIFY_WAIT, seen_rx.recv())
        .await
        .context("notification was not delivered")?
        .context("listener dropped")?;

    let fetched: i64 = link.right.fetch(EVENT, 6, None)?.decode().await?;
    tracing::info!(fetched, "fetch resolved");

    Ok(DemoReport { notified, fetched })
}
