// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::sync::LazyLock;

use native_db::Models;

use crate::modules::database::ModelsAdapter;
use crate::modules::mirror::entity::{FolderUidState, MessageRecord};
use crate::modules::mirror::fts::FtsEntry;

pub mod entity;
pub mod fts;

pub static MIRROR_MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut adapter = ModelsAdapter::new();
    adapter.register_model::<MessageRecord>();
    adapter.register_model::<FtsEntry>();
    adapter.register_model::<FolderUidState>();
    adapter.models
});
