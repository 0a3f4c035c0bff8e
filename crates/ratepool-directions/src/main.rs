use anyhow::Context;
use clap::Parser;
use ratepool_directions::{
    CliArgs, DirectionsApi, DirectionsConfig, Mode, Result as LookupResult, Trip,
    telemetry::init_telemetry,
};
use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    signal,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// One line of output per trip.
#[derive(Serialize)]
struct Line<'a> {
    #[serde(flatten)]
    trip: &'a Trip,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let mut args = CliArgs::parse();
    let mode = args.mode;
    let inputs = core::mem::take(&mut args.trips);
    let config = DirectionsConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let trips = if inputs.is_empty() {
        read_trips(BufReader::new(tokio::io::stdin()), mode).await?
    } else {
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                Trip::parse_with_mode(input, mode).with_context(|| format!("argument {}", i + 1))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    log_startup_info(&config, trips.len());
    let api = DirectionsApi::new(config)?;

    let results = tokio::select! {
        results = api.try_get_distances(trips) => Some(results),
        () = shutdown_signal() => None,
    };
    api.shutdown().await;

    let res = match results {
        Some(results) => write_results(&results).await,
        None => Err(anyhow::anyhow!("interrupted before all lookups finished")),
    };

    providers.shutdown();
    res
}

/// Reads one trip per line, skipping blank lines and `#` comments.
async fn read_trips<R>(reader: BufReader<R>, mode: Mode) -> anyhow::Result<Vec<Trip>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let mut trips = Vec::new();
    let mut line_no = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        trips.push(Trip::parse_with_mode(line, mode).with_context(|| format!("line {line_no}"))?);
    }

    Ok(trips)
}

async fn write_results(results: &[(Trip, LookupResult<u64>)]) -> anyhow::Result<()> {
    let mut out = String::new();
    for (trip, res) in results {
        let line = Line {
            trip,
            distance: res.as_ref().ok().copied(),
            error: res.as_ref().err().map(ToString::to_string),
        };
        out.push_str(&serde_json::to_string(&line)?);
        out.push('\n');
    }

    let mut stdout = tokio::io::stdout();
    stdout.write_all(out.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

fn log_startup_info(_config: &DirectionsConfig, _trips: usize) {
    #[cfg(feature = "tracing")]
    tracing::info!(
        "Looking up {} trips with {} workers at {}/s (burst {})",
        _trips,
        _config.pool.workers,
        _config.pool.rate,
        _config.pool.burst
    );
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }
}
