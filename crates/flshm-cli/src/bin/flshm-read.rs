//! Prints the current message tick of the `LocalConnection` region, then
//! exits.
//!
//! Exit code 0 on success; non-zero with the failing stage printed to
//! stdout on any failure.

use clap::Parser;
use flshm_core::LocalConnection;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Prints the current message slot's tick.
#[derive(Parser, Debug)]
#[command(name = "flshm-read")]
#[command(about = "Prints the current LocalConnection message tick")]
#[command(version)]
struct Args {
    /// Scope the region host-wide instead of the default per-user scope.
    #[arg(long)]
    per_host: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> Result<u32, String> {
    let mut conn =
        LocalConnection::open(!args.per_host).map_err(|err| format!("open failed: {err}"))?;
    conn.tick().map_err(|err| format!("tick failed: {err}"))
}

fn main() {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(&args) {
        Ok(tick) => println!("{tick}"),
        Err(stage) => {
            println!("{stage}");
            std::process::exit(1);
        },
    }
}
