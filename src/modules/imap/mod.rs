// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

pub mod client;
pub mod executor;
pub mod manager;
pub mod session;
