use flexi_logger::{
    detailed_format, Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
    WriteMode,
};
use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "focusday";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 7;

/// Starts file logging under `log_dir`. Keep the returned handle alive for the
/// lifetime of the process; dropping it flushes and stops the logger.
pub fn init_logging(log_dir: &Path) -> Result<LoggerHandle, FlexiLoggerError> {
    std::fs::create_dir_all(log_dir)?;

    let spec = resolve_spec(
        std::env::var("FOCUSDAY_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let handle = Logger::try_with_str(&spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .start()?;

    install_panic_hook();

    log::info!(
        "event=logger_initialized dir={} spec={spec} version={}",
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(handle)
}

fn default_spec() -> &'static str {
    if cfg!(debug_assertions) {
        "warn,focusday=debug"
    } else {
        "warn,focusday=info"
    }
}

/// `FOCUSDAY_LOG` wins over `RUST_LOG`; blank values are ignored.
fn resolve_spec(focusday_log: Option<String>, rust_log: Option<String>) -> String {
    focusday_log
        .filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec().to_string())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|location| location.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        log::error!("event=panic payload={payload} location={location}");
        default_hook(info);
    }));
}
