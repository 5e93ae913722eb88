// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

pub mod entity;
pub mod jwt;
pub mod refresh;
