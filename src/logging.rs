use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Warnings (skipped or overflowing regions) always reach stderr; `verbose` adds
/// per-page progress and every font-size probe.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
    Ok(())
}
