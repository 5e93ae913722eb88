// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

pub mod refresh;
pub mod tokens;
