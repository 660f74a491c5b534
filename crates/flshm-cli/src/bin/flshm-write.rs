//! Writes one message into the `LocalConnection` region from 12 positional
//! arguments, then exits.
//!
//! ```bash
//! flshm-write 42 _foo localhost 1 0 0 -1 0 - 0 ping 0
//! ```
//!
//! Exit code 0 on success; non-zero with the failing stage printed to
//! stdout on any failure.

use clap::Parser;
use flshm_core::{
    AmfVersion, Error, FrameVersion, LocalConnection, Message, Sandbox, VersionedFields,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Writes one `LocalConnection` message from its 12 positional fields.
#[derive(Parser, Debug)]
#[command(name = "flshm-write")]
#[command(about = "Writes one LocalConnection message into the shared-memory region")]
#[command(version)]
struct Args {
    /// Publication tick. Non-zero; 0 is rejected as the empty-slot sentinel.
    tick: u32,
    /// Connection name being addressed.
    name: String,
    /// Sender host identifier.
    host: String,
    /// Protocol version, 1-4.
    version: u8,
    /// Sandboxed flag (0 or 1), used when version >= 2.
    sandboxed: u8,
    /// HTTPS flag (0 or 1), used when version >= 2.
    https: u8,
    /// Sandbox classification, used when version >= 3.
    sandbox: i8,
    /// Sender SWF version, used when version >= 3.
    swfv: u32,
    /// Filesystem path, used when version >= 3 and sandbox == local-with-file.
    /// Pass `-` for none.
    filepath: String,
    /// AMF encoding (0 or 3), used when version >= 4.
    amfv: u8,
    /// Method name being invoked.
    method: String,
    /// Declared payload size. Must match the decoded length of `data_hex`.
    size: usize,
    /// Opaque payload, hex-encoded.
    data_hex: String,

    /// Scope the region host-wide instead of the default per-user scope.
    #[arg(long)]
    per_host: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn build_message(args: &Args) -> Result<Message, String> {
    if args.tick == 0 {
        return Err("tick must be non-zero".to_string());
    }

    let version = FrameVersion::from_u8(args.version)
        .ok_or_else(|| format!("unsupported version {}", args.version))?;

    let data = hex::decode(&args.data_hex).map_err(|err| format!("invalid hex payload: {err}"))?;
    if data.len() != args.size {
        return Err(format!(
            "declared size {} does not match decoded payload length {}",
            args.size,
            data.len()
        ));
    }

    let sandboxed = args.sandboxed != 0;
    let https = args.https != 0;
    let sandbox = Sandbox::from_i8(args.sandbox)
        .ok_or_else(|| format!("unsupported sandbox value {}", args.sandbox))?;
    let filepath = (args.filepath != "-" && sandbox == Sandbox::LocalWithFile)
        .then(|| args.filepath.clone());
    let amfv = AmfVersion::from_u8(args.amfv)
        .ok_or_else(|| format!("unsupported amfv value {}", args.amfv))?;

    let fields = match version {
        FrameVersion::V1 => VersionedFields::V1,
        FrameVersion::V2 => VersionedFields::V2 { sandboxed, https },
        FrameVersion::V3 => VersionedFields::V3 { sandboxed, https, sandbox, swfv, filepath },
        FrameVersion::V4 => VersionedFields::V4 { sandboxed, https, sandbox, swfv, filepath, amfv },
    };

    Ok(Message {
        tick: args.tick,
        name: args.name.clone(),
        host: args.host.clone(),
        method: args.method.clone(),
        fields,
        data,
        amfl: None,
    })
}

fn run(args: &Args) -> Result<(), String> {
    let msg = build_message(args)?;
    let mut conn = LocalConnection::open(!args.per_host).map_err(|err| match err {
        Error::Unavailable(reason) => format!("open failed: {reason}"),
        other => format!("open failed: {other}"),
    })?;
    conn.write(&msg).map_err(|err| format!("write failed: {err}"))?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if let Err(stage) = run(&args) {
        println!("{stage}");
        std::process::exit(1);
    }
}
