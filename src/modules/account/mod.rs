// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

pub mod entity;
pub mod payload;
pub mod provider;
