//! Sealpost relay binary.
//!
//! CGI-style entry point: one process, one request. The request arrives as
//! a hex string on the command line, via `CONTENT_LENGTH` + stdin, or in
//! `QUERY_STRING`; the response (when the dispatcher produces one) leaves
//! as uppercase hex on stdout. No output means no response.
//!
//! # Usage
//!
//! ```bash
//! # Request on the command line
//! sealpost --data-dir /var/lib/sealpost <hex>
//!
//! # CGI convention
//! CONTENT_LENGTH=64 sealpost --data-dir /var/lib/sealpost < request
//! ```

use std::{
    io::{Read, Write},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use clap::Parser;
use rand::rngs::OsRng;
use sealpost_proto::{MAX_CONTENT_LEN, decode_content, encode_content};
use sealpost_server::{CompilerGenerator, Dispatcher, MutexLock, ServiceConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sealpost message relay
#[derive(Parser, Debug)]
#[command(name = "sealpost")]
#[command(about = "Sealpost message relay service")]
#[command(version)]
struct Args {
    /// Directory holding the registry and queue files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Client source template
    #[arg(long)]
    template: Option<PathBuf>,

    /// External compiler for client artifacts
    #[arg(long, default_value = "cc")]
    compiler: PathBuf,

    /// Scratch directory for generated sources
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Administrator identity hash (64 hex characters)
    #[arg(long)]
    admin: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Hex-encoded request; read from stdin or QUERY_STRING when absent
    request: Option<String>,
}

fn read_request(args: &Args) -> Option<String> {
    if let Some(request) = &args.request {
        return Some(request.clone());
    }

    // CGI body: CONTENT_LENGTH says how much stdin holds.
    if let Ok(length) = std::env::var("CONTENT_LENGTH")
        && let Ok(length) = length.parse::<usize>()
    {
        if length > MAX_CONTENT_LEN {
            tracing::warn!(length, "request body over the content cap");
            return None;
        }
        let mut body = vec![0u8; length];
        if std::io::stdin().read_exact(&mut body).is_err() {
            return None;
        }
        return String::from_utf8(body).ok();
    }

    std::env::var("QUERY_STRING").ok().filter(|s| !s.is_empty())
}

fn admin_hash(args: &Args) -> Option<[u8; 32]> {
    let hex_hash = args.admin.as_deref()?;
    let bytes = hex::decode(hex_hash).ok()?;
    let mut hash = [0u8; 32];
    if bytes.len() != hash.len() {
        tracing::warn!("administrator hash must be 64 hex characters, ignoring");
        return None;
    }
    hash.copy_from_slice(&bytes);
    Some(hash)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let mut config = ServiceConfig::new(args.data_dir.clone());
    if let Some(template) = &args.template {
        config.template_path = template.clone();
    }
    config.compiler_path = args.compiler.clone();
    if let Some(work_dir) = &args.work_dir {
        config.work_dir = work_dir.clone();
    }
    if let Some(hash) = admin_hash(&args) {
        config.admin_id_hash = hash;
    }

    let Some(content) = read_request(&args) else {
        tracing::debug!("no request content");
        return Ok(());
    };

    let raw = match decode_content(content.trim()) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(%err, "undecodable request content");
            return Ok(());
        }
    };

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let generator = CompilerGenerator::from_config(&config);
    let dispatcher = Dispatcher::new(config, generator, MutexLock::new());

    if let Some(response) = dispatcher.handle(&raw, now_ms, &mut OsRng) {
        let mut stdout = std::io::stdout();
        stdout.write_all(encode_content(&response).as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    Ok(())
}
