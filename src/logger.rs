use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

/// Initialize console logging for the host app.
///
/// The level comes from `RUST_LOG` and defaults to `info`. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logger() {
    let default_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(default_level)
        .try_init()
        .ok();
}

/// Appends a line to the persistent log file in the data directory.
///
/// Used for events worth keeping beyond the console scrollback, e.g. sync
/// cycles that left operations queued.
pub fn log_to_file(message: &str) -> Result<()> {
    crate::config::ensure_data_dir()?;
    let log_path = crate::config::log_file_path()?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logger_is_idempotent() {
        init_logger();
        init_logger();
    }

    #[test]
    fn log_to_file_appends() -> Result<()> {
        log_to_file("sync cycle left 1 operation queued")?;

        let contents = std::fs::read_to_string(crate::config::log_file_path()?)?;
        assert!(contents.contains("sync cycle left 1 operation queued"));
        Ok(())
    }
}
