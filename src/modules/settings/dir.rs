// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::path::PathBuf;
use std::sync::LazyLock;

use crate::modules::context::Initialize;
use crate::modules::error::{code::ErrorCode, MailStashResult};
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;

pub const META_FILE: &str = "meta.db";
pub const TASK_FILE: &str = "tasks.db";
pub const MIRROR_FILE: &str = "mirror.db";

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> = LazyLock::new(DataDirManager::new);

pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub meta_db: PathBuf,
    pub task_db: PathBuf,
    pub mirror_db: PathBuf,
    pub blobs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl DataDirManager {
    fn new() -> Self {
        let root_dir = PathBuf::from(&SETTINGS.mailstash_root_dir);
        DataDirManager {
            meta_db: root_dir.join(META_FILE),
            task_db: root_dir.join(TASK_FILE),
            mirror_db: root_dir.join(MIRROR_FILE),
            blobs_dir: root_dir.join("blobs"),
            logs_dir: root_dir.join("logs"),
            root_dir,
        }
    }

    fn ensure_subdir(&self, dir: &PathBuf) -> MailStashResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| {
            raise_error!(
                format!("Failed to create data subdirectory {:?}: {}", dir, e),
                ErrorCode::InternalError
            )
        })
    }
}

impl Initialize for DataDirManager {
    async fn initialize() -> MailStashResult<()> {
        DATA_DIR_MANAGER.ensure_subdir(&DATA_DIR_MANAGER.blobs_dir)?;
        DATA_DIR_MANAGER.ensure_subdir(&DATA_DIR_MANAGER.logs_dir)?;
        Ok(())
    }
}
