// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use async_imap::types::{Name, NameAttribute};

use crate::decode_mailbox_name;
use crate::modules::account::provider::Provider;

pub const INBOX: &str = "INBOX";
pub const SENT: &str = "Sent";
pub const DRAFTS: &str = "Drafts";
pub const TRASH: &str = "Trash";
pub const SPAM: &str = "Spam";
pub const ARCHIVE: &str = "Archive";
pub const IMPORTANT: &str = "Important";
pub const STARRED: &str = "Starred";

/// RFC 6154 special-use hint attached to a folder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpecialUse {
    Inbox,
    Sent,
    Drafts,
    Trash,
    Junk,
    Archive,
    All,
    Flagged,
}

/// Provider-agnostic folder descriptor fed to the normalizer.
#[derive(Clone, Debug)]
pub struct FolderDescriptor {
    pub path: String,
    pub delimiter: Option<String>,
    pub special_use: Option<SpecialUse>,
    pub flags: Vec<String>,
    pub provider: Provider,
}

impl FolderDescriptor {
    pub fn new(path: impl Into<String>, provider: Provider) -> Self {
        Self {
            path: path.into(),
            delimiter: None,
            special_use: None,
            flags: Vec::new(),
            provider,
        }
    }

    pub fn from_imap_name(name: &Name, provider: Provider) -> Self {
        let path = decode_mailbox_name!(name.name().to_string());
        let mut special_use = None;
        let mut flags = Vec::new();
        for attribute in name.attributes() {
            match attribute {
                NameAttribute::Sent => special_use = special_use.or(Some(SpecialUse::Sent)),
                NameAttribute::Drafts => special_use = special_use.or(Some(SpecialUse::Drafts)),
                NameAttribute::Trash => special_use = special_use.or(Some(SpecialUse::Trash)),
                NameAttribute::Junk => special_use = special_use.or(Some(SpecialUse::Junk)),
                NameAttribute::Archive => special_use = special_use.or(Some(SpecialUse::Archive)),
                NameAttribute::All => special_use = special_use.or(Some(SpecialUse::All)),
                NameAttribute::Flagged => special_use = special_use.or(Some(SpecialUse::Flagged)),
                NameAttribute::Extension(s) => flags.push(s.to_string()),
                other => flags.push(format!("{:?}", other)),
            }
        }
        Self {
            path,
            delimiter: name.delimiter().map(|d| d.to_owned()),
            special_use,
            flags,
            provider,
        }
    }
}

/// Deterministic mapping from a provider folder descriptor to a canonical
/// name. First match wins; unknown folders pass through unchanged.
pub fn normalize_folder(descriptor: &FolderDescriptor) -> String {
    // 1. Literal INBOX
    if descriptor.path.eq_ignore_ascii_case(INBOX) {
        return INBOX.into();
    }

    // 2. RFC 6154 special-use hint
    if let Some(special_use) = descriptor.special_use {
        return match special_use {
            SpecialUse::Inbox => INBOX,
            SpecialUse::Sent => SENT,
            SpecialUse::Drafts => DRAFTS,
            SpecialUse::Trash => TRASH,
            SpecialUse::Junk => SPAM,
            SpecialUse::Archive | SpecialUse::All => ARCHIVE,
            SpecialUse::Flagged => STARRED,
        }
        .into();
    }

    // 3. Graph / provider canonical display names (whitespace-tolerant)
    let squashed: String = descriptor
        .path
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    match squashed.as_str() {
        "sentitems" | "outbox" => return SENT.into(),
        "deleteditems" => return TRASH.into(),
        "junkemail" => return SPAM.into(),
        "archive" => return ARCHIVE.into(),
        "drafts" => return DRAFTS.into(),
        "conversationhistory" => return ARCHIVE.into(),
        _ => {}
    }

    // 4. IMAP folder flags
    for flag in &descriptor.flags {
        let flag = flag.trim_start_matches('\\');
        if flag.eq_ignore_ascii_case("sent") {
            return SENT.into();
        }
        if flag.eq_ignore_ascii_case("drafts") {
            return DRAFTS.into();
        }
        if flag.eq_ignore_ascii_case("trash") {
            return TRASH.into();
        }
        if flag.eq_ignore_ascii_case("junk") || flag.eq_ignore_ascii_case("spam") {
            return SPAM.into();
        }
        if flag.eq_ignore_ascii_case("archive") {
            return ARCHIVE.into();
        }
        if flag.eq_ignore_ascii_case("flagged") || flag.eq_ignore_ascii_case("starred") {
            return STARRED.into();
        }
    }

    // 5. Provider-scoped names
    if let Some(canonical) = provider_table(descriptor.provider, &descriptor.path) {
        return canonical.into();
    }

    // 6. Substring heuristics on the raw path
    let lowered = descriptor.path.to_lowercase();
    if lowered.contains("sent") {
        return SENT.into();
    }
    if lowered.contains("draft") {
        return DRAFTS.into();
    }
    if lowered.contains("trash") || lowered.contains("deleted") || lowered.contains("bin") {
        return TRASH.into();
    }
    if lowered.contains("spam") || lowered.contains("junk") {
        return SPAM.into();
    }
    if lowered.contains("archive") || lowered.contains("all mail") {
        return ARCHIVE.into();
    }
    if lowered.contains("important") {
        return IMPORTANT.into();
    }
    if lowered.contains("starred") || lowered.contains("flagged") {
        return STARRED.into();
    }

    // 7. Passthrough
    descriptor.path.clone()
}

fn provider_table(provider: Provider, path: &str) -> Option<&'static str> {
    let entries: &[(&str, &str)] = match provider {
        Provider::Gmail => &[
            ("[Gmail]/Sent Mail", SENT),
            ("[Gmail]/All Mail", ARCHIVE),
            ("[Gmail]/Drafts", DRAFTS),
            ("[Gmail]/Trash", TRASH),
            ("[Gmail]/Bin", TRASH),
            ("[Gmail]/Spam", SPAM),
            ("[Gmail]/Starred", STARRED),
            ("[Gmail]/Important", IMPORTANT),
        ],
        Provider::Outlook | Provider::Hotmail => &[
            ("Sent Items", SENT),
            ("Deleted Items", TRASH),
            ("Junk Email", SPAM),
        ],
        Provider::Yahoo => &[("Bulk Mail", SPAM), ("Sent", SENT)],
        Provider::Icloud => &[("Sent Messages", SENT), ("Deleted Messages", TRASH)],
        _ => &[],
    };
    entries
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(path))
        .map(|(_, canonical)| *canonical)
}

const EXCLUDED_PATH_PATTERNS: &[&str] = &[
    "[gmail]/all mail",
    "notes",
    "contacts",
    "calendar",
    "tasks",
    "journal",
    "sync issues",
    "local failures",
    "server failures",
    "yammer root",
];

/// Sync eligibility. The canonical name is consulted first so a folder whose
/// raw path happens to hit an exclusion pattern still syncs when it is the
/// inbox.
pub fn should_sync_folder(path: &str, canonical: &str) -> bool {
    if canonical == INBOX {
        return true;
    }
    let lowered = path.to_lowercase();
    !EXCLUDED_PATH_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// Priority used to order discovered folders, higher first.
pub fn folder_priority(canonical: &str) -> u8 {
    match canonical {
        INBOX => 100,
        SENT => 90,
        DRAFTS => 80,
        IMPORTANT => 75,
        ARCHIVE => 70,
        SPAM => 50,
        TRASH => 40,
        _ => 60,
    }
}

/// Sorts descriptors by canonical priority, descending. Ties keep discovery
/// order (stable sort).
pub fn sort_by_priority(folders: &mut Vec<(FolderDescriptor, String)>) {
    folders.sort_by(|a, b| folder_priority(&b.1).cmp(&folder_priority(&a.1)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str, provider: Provider) -> FolderDescriptor {
        FolderDescriptor::new(path, provider)
    }

    #[test]
    fn gmail_sent_mail_normalizes_to_sent() {
        let d = descriptor("[Gmail]/Sent Mail", Provider::Gmail);
        assert_eq!(normalize_folder(&d), SENT);
    }

    #[test]
    fn inbox_literal_wins_everywhere() {
        for provider in [Provider::Gmail, Provider::Outlook, Provider::Unknown] {
            assert_eq!(normalize_folder(&descriptor("INBOX", provider)), INBOX);
            assert_eq!(normalize_folder(&descriptor("inbox", provider)), INBOX);
        }
    }

    #[test]
    fn special_use_beats_path_heuristics() {
        let mut d = descriptor("Weird Name", Provider::Unknown);
        d.special_use = Some(SpecialUse::Junk);
        assert_eq!(normalize_folder(&d), SPAM);
    }

    #[test]
    fn graph_display_names_are_whitespace_tolerant() {
        assert_eq!(
            normalize_folder(&descriptor("Sent Items", Provider::Outlook)),
            SENT
        );
        assert_eq!(
            normalize_folder(&descriptor("sentitems", Provider::Outlook)),
            SENT
        );
        assert_eq!(
            normalize_folder(&descriptor("Deleted Items", Provider::Outlook)),
            TRASH
        );
        assert_eq!(
            normalize_folder(&descriptor("Junk Email", Provider::Outlook)),
            SPAM
        );
    }

    #[test]
    fn flags_are_consulted_before_provider_table() {
        let mut d = descriptor("Some Folder", Provider::Unknown);
        d.flags = vec!["\\Flagged".into()];
        assert_eq!(normalize_folder(&d), STARRED);
    }

    #[test]
    fn substring_heuristics_catch_localized_variants() {
        assert_eq!(
            normalize_folder(&descriptor("My Sent Stuff", Provider::Unknown)),
            SENT
        );
        assert_eq!(
            normalize_folder(&descriptor("Recycle Bin", Provider::Unknown)),
            TRASH
        );
    }

    #[test]
    fn unknown_folder_passes_through() {
        assert_eq!(
            normalize_folder(&descriptor("Projects", Provider::Gmail)),
            "Projects"
        );
    }

    #[test]
    fn normalization_is_deterministic() {
        let d = descriptor("[Gmail]/Sent Mail", Provider::Gmail);
        assert_eq!(normalize_folder(&d), normalize_folder(&d.clone()));
    }

    #[test]
    fn priority_sort_matches_expected_order() {
        let provider = Provider::Gmail;
        let mut folders: Vec<(FolderDescriptor, String)> = [
            "[Gmail]/Trash",
            "INBOX",
            "Projects",
            "[Gmail]/Sent Mail",
        ]
        .into_iter()
        .map(|path| {
            let d = descriptor(path, provider);
            let canonical = normalize_folder(&d);
            (d, canonical)
        })
        .collect();
        sort_by_priority(&mut folders);
        let paths: Vec<&str> = folders.iter().map(|(d, _)| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["INBOX", "[Gmail]/Sent Mail", "Projects", "[Gmail]/Trash"]
        );
    }

    #[test]
    fn all_mail_is_excluded_from_sync() {
        assert!(!should_sync_folder("[Gmail]/All Mail", ARCHIVE));
        assert!(!should_sync_folder("Sync Issues/Local Failures", "Sync Issues/Local Failures"));
        assert!(should_sync_folder("Projects", "Projects"));
    }

    #[test]
    fn inbox_is_always_eligible() {
        // raw path hits the "notes" pattern but the canonical name is INBOX
        assert!(should_sync_folder("notes/INBOX", INBOX));
    }
}
