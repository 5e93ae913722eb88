use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};

use crate::modules::settings::{cli::SETTINGS, dir::DATA_DIR_MANAGER};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn setup_file_logger() -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
    let level = SETTINGS
        .mailstash_log_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mailstash")
        .filename_suffix("log")
        .max_log_files(SETTINGS.mailstash_max_server_log_files)
        .build(&DATA_DIR_MANAGER.logs_dir)
        .expect("failed to create rolling log appender");

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(non_blocking)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
