use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Application-level constants
pub const APP_NAME: &str = "Canonpack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version stamped on every Canonical Policy Package.
pub const SCHEMA_VERSION: &str = "cpp-1.0.0";

/// Default character ceiling for bounded extraction.
/// Municipal development plans run 100-600 pages; 300k characters keeps
/// memory bounded while covering the plans seen in practice.
pub const DEFAULT_CHAR_LIMIT: usize = 300_000;

/// Run identifiers: alphanumeric start, then alphanumeric/underscore/hyphen,
/// 4-64 characters total.
pub const RUN_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_-]{3,63}$";

/// Chunk identifiers: one of the 60 grid cells, e.g. `PA03-DIM05`.
pub const CHUNK_ID_PATTERN: &str = r"^PA(0[1-9]|10)-DIM0[1-6]$";

/// Resolve the directory where error manifests are written.
///
/// Priority:
/// 1. `CANONPACK_MANIFEST_DIR` env var (explicit override, any build)
/// 2. `~/Canonpack/manifests/`
/// 3. `None` when no home directory can be determined (manifest writing
///    is skipped with a warning, never a panic)
pub fn manifest_dir() -> Option<PathBuf> {
    resolve_manifest_dir(std::env::var("CANONPACK_MANIFEST_DIR").ok())
}

fn resolve_manifest_dir(override_dir: Option<String>) -> Option<PathBuf> {
    if let Some(dir) = override_dir {
        return Some(PathBuf::from(dir));
    }

    dirs::home_dir().map(|home| home.join(APP_NAME).join("manifests"))
}

/// Default log filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    "canonpack=info".to_string()
}

/// Initialize tracing for binary consumers and integration tests.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .try_init();
}
