// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use ahash::AHashMap;
use itertools::Itertools;
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

use crate::modules::database::{
    async_find_impl, filter_by_secondary_key_impl, manager::DB_MANAGER, upsert_impl,
};
use crate::modules::error::MailStashResult;
use crate::modules::mirror::entity::MessageRecord;
use crate::utc_now;

/// Words too common to carry signal; matches what a natural-language FTS
/// parser would drop.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "i", "if", "in", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or",
    "our", "she", "so", "that", "the", "their", "them", "they", "this", "to", "was", "we", "were",
    "will", "with", "you", "your",
];

/// One analyzed row per live message, keyed by the message id. The lexeme
/// vector covers `subject ⧺ body ⧺ from`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 21, version = 1)]
#[native_db]
pub struct FtsEntry {
    #[primary_key]
    pub message_id: u64,
    #[secondary_key]
    pub account_id: u64,
    /// (lexeme, term frequency), sorted by lexeme
    pub terms: Vec<(String, u32)>,
    pub received_at: i64,
    pub updated_at: i64,
}

impl FtsEntry {
    pub fn from_message(record: &MessageRecord) -> Self {
        let source = format!("{} {} {}", record.subject, record.body, record.from_addr);
        FtsEntry {
            message_id: record.id,
            account_id: record.account_id,
            terms: analyze(&source),
            received_at: record.received_at,
            updated_at: utc_now!(),
        }
    }

    pub async fn upsert_for(record: &MessageRecord) -> MailStashResult<()> {
        upsert_impl(DB_MANAGER.mirror_db(), Self::from_message(record)).await
    }

    pub async fn find(message_id: u64) -> MailStashResult<Option<FtsEntry>> {
        async_find_impl(DB_MANAGER.mirror_db(), message_id).await
    }

    /// Ranked message ids for a free-text query over the given accounts.
    /// Ordering: match score descending, then `received_at` descending.
    /// A query with no usable lexemes matches nothing.
    pub async fn search(account_ids: &[u64], query: &str) -> MailStashResult<Vec<u64>> {
        let query_terms = analyze(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(u32, i64, u64)> = Vec::new();
        for account_id in account_ids {
            let entries: Vec<FtsEntry> = filter_by_secondary_key_impl(
                DB_MANAGER.mirror_db(),
                FtsEntryKey::account_id,
                *account_id,
            )
            .await?;
            for entry in entries {
                let score = entry.score(&query_terms);
                if score > 0 {
                    scored.push((score, entry.received_at, entry.message_id));
                }
            }
        }
        Ok(scored
            .into_iter()
            .sorted_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)))
            .map(|(_, _, message_id)| message_id)
            .collect())
    }

    fn score(&self, query_terms: &[(String, u32)]) -> u32 {
        query_terms
            .iter()
            .map(|(term, _)| {
                self.terms
                    .binary_search_by(|(lexeme, _)| lexeme.as_str().cmp(term.as_str()))
                    .map(|idx| self.terms[idx].1)
                    .unwrap_or(0)
            })
            .sum()
    }
}

/// Lowercases, splits on non-alphanumeric boundaries, drops one-character
/// tokens and stopwords, and returns (lexeme, frequency) sorted by lexeme.
/// Deterministic for identical input.
pub fn analyze(text: &str) -> Vec<(String, u32)> {
    let mut frequencies: AHashMap<String, u32> = AHashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .filter(|t| !STOPWORDS.contains(t))
    {
        *frequencies.entry(token.to_string()).or_insert(0) += 1;
    }
    frequencies
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::parser::ParsedMail;

    fn record(account_id: u64, uid: u32, subject: &str, body: &str, received_at: i64) -> MessageRecord {
        MessageRecord::from_parsed(
            account_id,
            "INBOX",
            uid,
            ParsedMail {
                message_id: None,
                from: "sender@example.com".into(),
                to: vec![],
                subject: subject.into(),
                body: body.into(),
                html_body: None,
                is_read: false,
                received_at,
                attachments: vec![],
            },
        )
    }

    #[test]
    fn analyzer_is_deterministic_and_filters_noise() {
        let a = analyze("The quarterly REPORT, the report!");
        let b = analyze("The quarterly REPORT, the report!");
        assert_eq!(a, b);
        assert_eq!(
            a,
            vec![("quarterly".to_string(), 1), ("report".to_string(), 2)]
        );
    }

    #[test]
    fn whitespace_only_query_has_no_lexemes() {
        assert!(analyze("   ").is_empty());
        assert!(analyze("a I").is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_score_then_recency() {
        let account_id = 9101;
        let heavy = record(account_id, 1, "invoice invoice", "invoice due", 1_000);
        let light_new = record(account_id, 2, "invoice", "greetings", 3_000);
        let light_old = record(account_id, 3, "invoice", "greetings", 2_000);
        let unrelated = record(account_id, 4, "picnic", "saturday", 9_000);
        let ids = (heavy.id, light_new.id, light_old.id);
        MessageRecord::insert_batch(vec![heavy, light_new, light_old, unrelated])
            .await
            .unwrap();

        let result = FtsEntry::search(&[account_id], "invoice").await.unwrap();
        assert_eq!(result, vec![ids.0, ids.1, ids.2]);
    }

    #[tokio::test]
    async fn empty_query_returns_nothing() {
        let result = FtsEntry::search(&[9102], "  ").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn at_most_one_entry_per_message() {
        let account_id = 9103;
        let row = record(account_id, 5, "hello", "world", 1);
        MessageRecord::insert_batch(vec![row.clone()]).await.unwrap();
        // a second upsert replaces, never duplicates
        FtsEntry::upsert_for(&row).await.unwrap();
        let entries: Vec<FtsEntry> = filter_by_secondary_key_impl(
            DB_MANAGER.mirror_db(),
            FtsEntryKey::account_id,
            account_id,
        )
        .await
        .unwrap();
        assert_eq!(entries.len(), 1);
    }
}
