use mimalloc::MiMalloc;
use modules::{
    common::{rustls::MailStashTls, signal::SignalManager},
    context::{executors::MailClientExecutors, Initialize},
    database::manager::DatabaseManager,
    error::{code::ErrorCode, MailStashResult},
    logger,
    rest::start_http_server,
    settings::{cli::SETTINGS, dir::DataDirManager},
    tasks::{queue::MailStashTaskQueue, PeriodicTasks},
};
use tracing::{error, info};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
  __  __       _ _ ____  _            _
 |  \/  | __ _(_) / ___|| |_ __ _ ___| |__
 | |\/| |/ _` | | \___ \| __/ _` / __| '_ \
 | |  | | (_| | | |___) | || (_| \__ \ | | |
 |_|  |_|\__,_|_|_|____/ \__\__,_|___/_| |_|

"#;

#[tokio::main]
async fn main() -> MailStashResult<()> {
    logger::initialize_logging();
    info!("{}", LOGO);
    info!("Starting mailstash-server");
    info!("Version:  {}", mailstash_version!());
    info!("Git:      [{}]", env!("GIT_HASH"));

    if let Err(error) = initialize().await {
        eprintln!("{:?}", error);
        return Err(error);
    }

    start_server().await
}

/// Initialize the system by validating settings and starting background tasks.
async fn initialize() -> MailStashResult<()> {
    SETTINGS.validate()?;
    SignalManager::initialize().await?;
    DataDirManager::initialize().await?;
    DatabaseManager::initialize().await?;
    MailStashTls::initialize().await?;
    MailClientExecutors::initialize().await?;
    MailStashTaskQueue::initialize().await?;
    PeriodicTasks::start_background_tasks();
    Ok(())
}

async fn start_server() -> MailStashResult<()> {
    let http_server = tokio::spawn(async move {
        let result = start_http_server().await;
        if let Err(e) = &result {
            error!("Failed to start REST server: {}", e);
        }
        result
    });

    http_server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
}
