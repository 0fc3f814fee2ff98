use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::Logger;
use std::io::Write;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;

use rping::cli::Args;
use rping::config::Config;
use rping::export::{export_json, generate_report, write_event};
use rping::ping::{PingEngine, PingEvent};
use rping::prefs::Prefs;
use rping::probe::IcmpSocket;
use rping::state::{SessionStats, Target};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let _logger = Logger::try_with_env_or_str(args.log_spec())
        .context("Invalid log specification")?
        .start()
        .context("Failed to start logger")?;

    let prefs = Prefs::load();
    let config = Config::from_args(&args, &prefs);
    log::debug!("Configuration: {:?}", config);

    // Open the socket before anything else so missing privileges surface first
    let socket = match IcmpSocket::open() {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    let json = args.json;
    let destination = config.destination.clone();
    let engine = PingEngine::new(config, socket, cancel);

    let (result, resolved) = tokio::task::spawn_blocking(move || {
        let mut resolved: Option<Ipv4Addr> = None;
        let stdout = std::io::stdout();
        let result = engine.run(|event| {
            if let PingEvent::Started { address, .. } = event {
                resolved = Some(*address);
            }
            if !json {
                let mut out = stdout.lock();
                if let Err(e) = write_event(event, &mut out).and_then(|_| out.flush()) {
                    log::warn!("Failed to write output: {}", e);
                }
            }
        });
        (result, resolved)
    })
    .await
    .context("Probe engine task failed")?;

    let stats = result.with_context(|| format!("ping {} failed", destination))?;

    print_summary(&destination, resolved, &stats, json)?;

    if stats.received == 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(
    destination: &str,
    resolved: Option<Ipv4Addr>,
    stats: &SessionStats,
    json: bool,
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if json {
        let target = Target::new(
            destination.to_string(),
            resolved.unwrap_or(Ipv4Addr::UNSPECIFIED),
        );
        export_json(&target, stats, &mut out)?;
        writeln!(out)?;
    } else {
        generate_report(destination, &stats.summary(), &mut out)?;
    }

    Ok(())
}
