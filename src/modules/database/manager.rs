// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::modules::context::Initialize;
use crate::modules::error::{code::ErrorCode, MailStashError};
use crate::modules::mirror::MIRROR_MODELS;
use crate::modules::scheduler::nativedb::TASK_MODELS;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::modules::{database::META_MODELS, error::MailStashResult};
use crate::raise_error;
use native_db::{Builder, Database};
use std::sync::{Arc, LazyLock};
use tracing::info;

pub static DB_MANAGER: LazyLock<DatabaseManager> = LazyLock::new(DatabaseManager::new);

pub struct DatabaseManager {
    /// Users, accounts, tokens, attachment records
    meta_db: Arc<Database<'static>>,
    /// Durable job queue
    tasks_db: Arc<Database<'static>>,
    /// Message mirror and FTS index
    mirror_db: Arc<Database<'static>>,
}

impl DatabaseManager {
    #[cfg(not(test))]
    fn new() -> Self {
        let meta_db = Self::init_meta_database().expect("Failed to initialize metadata database");
        let tasks_db =
            Self::init_task_queue_database().expect("Failed to initialize tasks database");
        let mirror_db =
            Self::init_mirror_database().expect("Failed to initialize mirror database");
        DatabaseManager {
            meta_db,
            tasks_db,
            mirror_db,
        }
    }

    #[cfg(test)]
    fn new() -> Self {
        DatabaseManager {
            meta_db: Arc::new(Builder::new().create_in_memory(&META_MODELS).unwrap()),
            tasks_db: Arc::new(Builder::new().create_in_memory(&TASK_MODELS).unwrap()),
            mirror_db: Arc::new(Builder::new().create_in_memory(&MIRROR_MODELS).unwrap()),
        }
    }

    pub fn meta_db(&self) -> &Arc<Database<'static>> {
        &self.meta_db
    }

    pub fn tasks_db(&self) -> &Arc<Database<'static>> {
        &self.tasks_db
    }

    pub fn mirror_db(&self) -> &Arc<Database<'static>> {
        &self.mirror_db
    }

    #[cfg(not(test))]
    fn init_meta_database() -> MailStashResult<Arc<Database<'static>>> {
        let mut database = Builder::new()
            .set_cache_size(
                SETTINGS
                    .mailstash_meta_cache_size
                    .unwrap_or(134217728)
                    .max(67108864),
            ) //default 128MB
            .create(&META_MODELS, DATA_DIR_MANAGER.meta_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    #[cfg(not(test))]
    fn init_task_queue_database() -> MailStashResult<Arc<Database<'static>>> {
        let mut database = Builder::new()
            .set_cache_size(
                SETTINGS
                    .mailstash_task_queue_cache_size
                    .unwrap_or(67108864)
                    .max(67108864),
            ) //default 64MB
            .create(&TASK_MODELS, DATA_DIR_MANAGER.task_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    #[cfg(not(test))]
    fn init_mirror_database() -> MailStashResult<Arc<Database<'static>>> {
        info!(
            "Initializing mirror database at: {:?}",
            &DATA_DIR_MANAGER.mirror_db
        );
        let mut database = Builder::new()
            .set_cache_size(
                SETTINGS
                    .mailstash_mirror_cache_size
                    .unwrap_or(1073741824)
                    .max(67108864),
            ) //default 1GB
            .create(&MIRROR_MODELS, DATA_DIR_MANAGER.mirror_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    #[allow(dead_code)]
    fn handle_database_error(error: native_db::db_type::Error) -> MailStashError {
        match error {
            native_db::db_type::Error::RedbDatabaseError(database_error) => match database_error {
                redb::DatabaseError::DatabaseAlreadyOpen => {
                    raise_error!(
                        "Database is already open by another instance".into(),
                        ErrorCode::InternalError
                    )
                }
                other => {
                    raise_error!(
                        format!("Database error: {:?}", other),
                        ErrorCode::InternalError
                    )
                }
            },
            other => {
                raise_error!(
                    format!("Failed to create database: {:?}", other),
                    ErrorCode::InternalError
                )
            }
        }
    }
}

impl Initialize for DatabaseManager {
    async fn initialize() -> MailStashResult<()> {
        info!(
            "Databases ready under {:?}",
            &DATA_DIR_MANAGER.root_dir
        );
        let _ = DB_MANAGER.meta_db();
        Ok(())
    }
}
