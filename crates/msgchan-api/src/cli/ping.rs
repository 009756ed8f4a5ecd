//! `msgchan ping`: many concurrent fetches against an echo listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use futures_util::future::join_all;
use msgchan_core::{ChannelConfig, ChannelError, FetchOptions};
use serde::Serialize;

use crate::cli::TransportKind;
use crate::link::Link;

const EVENT: &str = "echo";

/// Parameters for one ping run.
#[derive(Debug, Clone, Copy)]
pub struct PingOptions {
    pub count: u32,
    pub timeout_ms: u64,
    pub drop_every: Option<u32>,
}

/// Outcome counts for a ping run.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PingTally {
    pub answered: u32,
    pub timed_out: u32,
    pub rejected: u32,
    pub closed: u32,
}

impl PingTally {
    fn record(&mut self, outcome: &Result<serde_json::Value, ChannelError>) {
        match outcome {
            Ok(_) => self.answered += 1,
            Err(ChannelError::Timeout(_)) => self.timed_out += 1,
            Err(ChannelError::Rejected(_)) => self.rejected += 1,
            Err(_) => self.closed += 1,
        }
    }
}

/// Run the ping over `transport` and print the tally.
pub async fn run(
    transport: TransportKind,
    config: &ChannelConfig,
    opts: PingOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let link = Link::connect(transport, config);
    let started = Instant::now();
    let tally = exercise(&link, opts).await?;
    let elapsed = started.elapsed();
    link.close().await?;

    if json {
        let out = serde_json::json!({
            "transport": format!("{transport:?}").to_lowercase(),
            "count": opts.count,
            "timeout_ms": opts.timeout_ms,
            "elapsed_ms": elapsed_ms(elapsed),
            "tally": tally,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Outcome").fg(Color::Cyan),
            Cell::new("Count").fg(Color::Cyan),
        ]);
    table.add_row(vec![Cell::new("answered"), Cell::new(tally.answered).fg(Color::Green)]);
    table.add_row(vec![Cell::new("timed out"), Cell::new(tally.timed_out).fg(Color::Yellow)]);
    table.add_row(vec![Cell::new("rejected"), Cell::new(tally.rejected).fg(Color::Red)]);
    table.add_row(vec![Cell::new("closed"), Cell::new(tally.closed)]);

    println!("{table}");
    println!(
        "{} fetches in {:.1?} (timeout {}ms)",
        opts.count,
        elapsed,
        opts.timeout_ms
    );
    Ok(())
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Register an echo listener on `left` and fire `opts.count` fetches from `right`.
pub async fn exercise(link: &Link, opts: PingOptions) -> Result<PingTally> {
    let seen = Arc::new(AtomicU32::new(0));
    let drop_every = opts.drop_every.filter(|&n| n > 0);

    let _sub = link.left.on(EVENT, move |event| {
        let n = seen.fetch_add(1, Ordering::Relaxed) + 1;
        if drop_every.is_some_and(|k| n % k == 0) {
            tracing::debug!(id = ?event.id(), "ignoring request");
            return Ok(());
        }
        event.send(event.data().clone())?;
        Ok(())
    });

    let mut fetches = Vec::with_capacity(opts.count as usize);
    for seq in 0..opts.count {
        fetches.push(
            link.right
                .fetch(EVENT, seq, Some(FetchOptions::with_timeout(opts.timeout_ms)))?,
        );
    }

    let mut tally = PingTally::default();
    for outcome in join_all(fetches).await {
        tally.record(&outcome);
    }
    tracing::info!(?tally, pending = link.right.pending_count(), "ping finished");
    Ok(tally)
}
