use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `quartet-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults matching the reference behavior (one-second pacing and work
/// units). Each field is independently tunable, which also lets tests shrink
/// the simulated durations to milliseconds.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "quartet-tonic-server",
    version,
    about = "A gRPC service demonstrating unary, streaming, and deadline-bound calls"
)]
pub struct CliArgs {
    /// Address to listen on (TCP, or a socket path with --uds).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/quartet.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be
    /// a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Capacity of the response buffer between a streaming handler and the
    /// transport.
    ///
    /// Lower values increase backpressure responsiveness; higher values
    /// enable deeper pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Pacing interval between GreetManyTimes responses, in milliseconds.
    ///
    /// Pacing demonstrates server-paced flow; the response count and order
    /// are the contract, the interval is not.
    ///
    /// Environment variable: `PACE_INTERVAL_MS`
    #[arg(long, env = "PACE_INTERVAL_MS", default_value_t = 1_000)]
    pub pace_interval_ms: u64,

    /// Duration of one unit of simulated work in GreetWithDeadline, in
    /// milliseconds.
    ///
    /// Environment variable: `WORK_UNIT_MS`
    #[arg(long, env = "WORK_UNIT_MS", default_value_t = 1_000)]
    pub work_unit_ms: u64,

    /// Number of simulated work units GreetWithDeadline performs, each
    /// preceded by a cancellation checkpoint.
    ///
    /// Environment variable: `WORK_UNITS`
    #[arg(long, env = "WORK_UNITS", default_value_t = 3)]
    pub work_units: u32,

    /// Seconds to wait for in-flight streams to drain during shutdown before
    /// cancelling them.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub stream_buffer_size: usize,
    pub pace_interval: Duration,
    pub work_unit: Duration,
    pub work_units: u32,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.work_units == 0 {
            bail!("WORK_UNITS must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            stream_buffer_size: args.stream_buffer_size,
            pace_interval: Duration::from_millis(args.pace_interval_ms),
            work_unit: Duration::from_millis(args.work_unit_ms),
            work_units: args.work_units,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}

#[cfg(test)]
impl ServerConfig {
    /// Config with instant pacing and millisecond-scale work units.
    pub(crate) fn for_tests() -> Self {
        Self {
            server_addr: String::from("127.0.0.1:0"),
            uds: false,
            stream_buffer_size: 8,
            pace_interval: Duration::ZERO,
            work_unit: Duration::from_millis(30),
            work_units: 3,
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs::parse_from(["quartet-tonic-server"])
    }

    #[test]
    fn defaults_validate() {
        let config = ServerConfig::try_from(args()).unwrap();
        assert_eq!(config.pace_interval, Duration::from_secs(1));
        assert_eq!(config.work_unit, Duration::from_secs(1));
        assert_eq!(config.work_units, 3);
        assert!(!config.uds);
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let mut args = args();
        args.stream_buffer_size = 0;
        assert!(ServerConfig::try_from(args).is_err());
    }

    #[test]
    fn zero_work_units_is_rejected() {
        let mut args = args();
        args.work_units = 0;
        assert!(ServerConfig::try_from(args).is_err());
    }
}
