//! Shared plumbing for the `simulate` and `verify` binaries.

use anyhow::{bail, Result};
use std::path::Path;
use tracing_subscriber::FmtSubscriber;

/// Initialise the tracing subscriber.
///
/// Diagnostics go to stderr so the machine-checked stdout of both tools
/// stays clean.
pub fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Refuse paths without the expected extension.
pub fn require_extension(path: &Path, extension: &str) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some(extension) {
        bail!(
            "'{}' must have the .{extension} extension",
            path.display()
        );
    }
    Ok(())
}
