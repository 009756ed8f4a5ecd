//! msgchan demo CLI entry point.
//!
//! Binary name: `msgchan`
//!
//! Parses CLI arguments, sets up tracing, loads the channel config, then
//! dispatches to the command handler.

mod cli;
mod link;

use clap::Parser;
use clap_complete::generate;
use msgchan_core::ChannelConfig;
use msgchan_observe::{LogOptions, filter_for_verbosity, init_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let log_opts = LogOptions {
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet),
        json: cli.log_json,
        otel: cli.otel,
    };
    init_tracing(&log_opts).map_err(|e| anyhow::anyhow!(e))?;

    // Shell completions don't need a channel
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "msgchan", &mut std::io::stdout());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => msgchan_infra::config::load_channel_config(path).await,
        None => ChannelConfig::default(),
    };

    let result = match cli.command {
        Commands::Demo { transport } => cli::demo::run(transport, &config, cli.json, cli.quiet).await,
        Commands::Ping {
            count,
            timeout,
            drop_every,
            transport,
        } => {
            let opts = cli::ping::PingOptions {
                count,
                timeout_ms: timeout,
                drop_every,
            };
            cli::ping::run(transport, &config, opts, cli.json, cli.quiet).await
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    msgchan_observe::shutdown_tracing();
    result
}
