use crate::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, Mode};
use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use ratepool::{DEFAULT_OPS_PER_SEC, DEFAULT_WORKERS, PoolConfig};

/// Command line arguments for the `directions` binary.
///
/// Every tunable can also come from the environment (or a `.env` file), so
/// the API key never has to appear on the command line.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "directions",
    version,
    about = "Rate-limited route distance lookups against the Google Directions API"
)]
pub struct CliArgs {
    /// Trips to look up, each as `LAT,LNG:LAT,LNG`.
    ///
    /// When none are given, trips are read from stdin, one per line. Blank
    /// lines and lines starting with `#` are skipped.
    #[arg(value_name = "TRIP")]
    pub trips: Vec<String>,

    /// Travel mode applied to every trip.
    #[arg(short, long, value_enum, default_value_t = Mode::Driving)]
    pub mode: Mode,

    /// Directions API key.
    ///
    /// Environment variable: `DIRECTIONS_API_KEY`
    #[arg(long, env = "DIRECTIONS_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Endpoint the lookups are sent to. Override to point at a proxy or a
    /// mock server.
    ///
    /// Environment variable: `DIRECTIONS_BASE_URL`
    #[arg(long, env = "DIRECTIONS_BASE_URL", default_value_t = String::from(DEFAULT_BASE_URL))]
    pub base_url: String,

    /// Number of lookups allowed to run at the same time.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub num_workers: usize,

    /// Lookups started per second, across all workers.
    ///
    /// Environment variable: `OPS_PER_SEC`
    #[arg(long, env = "OPS_PER_SEC", default_value_t = DEFAULT_OPS_PER_SEC)]
    pub ops_per_sec: u32,

    /// Lookups allowed to start back to back after an idle period. Defaults
    /// to `OPS_PER_SEC` and may not exceed it.
    ///
    /// Environment variable: `BURST`
    #[arg(long, env = "BURST")]
    pub burst: Option<u32>,

    /// Per-request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout_secs: u64,
}

/// Validated settings for a [`DirectionsApi`](crate::DirectionsApi).
#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub pool: PoolConfig,
}

impl DirectionsConfig {
    /// Default endpoint, timeout and pool sizing (10 workers, 8 lookups per
    /// second).
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pool: PoolConfig::default(),
        }
    }
}

impl TryFrom<CliArgs> for DirectionsConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.api_key.trim().is_empty() {
            bail!("DIRECTIONS_API_KEY must not be empty");
        }
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if args.ops_per_sec == 0 {
            bail!("OPS_PER_SEC must be greater than 0");
        }
        if args.burst == Some(0) {
            bail!("BURST must be greater than 0");
        }
        if let Some(burst) = args.burst.filter(|&burst| burst > args.ops_per_sec) {
            bail!(
                "BURST ({burst}) must not exceed OPS_PER_SEC ({})",
                args.ops_per_sec
            );
        }
        if args.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
        }

        let pool = PoolConfig::new(args.num_workers, args.ops_per_sec)
            .with_burst(args.burst.unwrap_or(args.ops_per_sec));

        Ok(Self {
            api_key: args.api_key,
            base_url: args.base_url,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            pool,
        })
    }
}
