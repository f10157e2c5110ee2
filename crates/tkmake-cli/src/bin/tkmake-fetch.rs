//! Fetch, verify and unpack one catalog archive.
//!
//! Usage: `tkmake-fetch -o:org -u:url -p:name [-b:branch] -v:version -s:sha256 -r:root`
//! for projects, or with `[-f:file] -c:config -t:type` for toolchains.
//! Exits non-zero if anything fails; the install root is then left untouched.

use tkmake_catalog::{fetch_verify_unpack, DefaultTransport, FetchRequest};
use tracing_subscriber::EnvFilter;

fn run() -> Result<(), tkmake_catalog::CatalogError> {
    let request = FetchRequest::from_args(std::env::args().skip(1))?;
    let transport = DefaultTransport::new()?;
    fetch_verify_unpack(&transport, &request)?;
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_env("TKMAKE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(e) = run() {
        eprintln!("tkmake-fetch: {e}");
        std::process::exit(1);
    }
}
