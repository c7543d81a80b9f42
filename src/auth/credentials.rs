//! Preset credential set.
//!
//! Accounts are loaded once at startup from `user:password` entries and are
//! immutable for the lifetime of the process. There is no registration path.

use std::collections::HashMap;

/// Ordered, immutable mapping of username to plaintext password.
#[derive(Clone, Default)]
pub struct CredentialSet {
    /// Usernames in order of first appearance.
    order: Vec<String>,
    passwords: HashMap<String, String>,
}

impl CredentialSet {
    /// Parse `user:password` entries. Each entry is split on the first `:`,
    /// both halves are trimmed, and entries without a `:` or with an empty
    /// username are skipped. A repeated username keeps its original position
    /// but takes the last password seen.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            let Some((username, password)) = entry.split_once(':') else {
                continue;
            };
            let username = username.trim();
            if username.is_empty() {
                continue;
            }
            set.insert(username, password.trim());
        }
        set
    }

    /// Parse the comma-separated form used by `AUTH_USERS`
    /// (`user1:pass1,user2:pass2`).
    pub fn parse_list(raw: &str) -> Self {
        Self::parse(raw.split(','))
    }

    fn insert(&mut self, username: &str, password: &str) {
        if self
            .passwords
            .insert(username.to_string(), password.to_string())
            .is_none()
        {
            self.order.push(username.to_string());
        }
    }

    /// Check a username/password pair.
    ///
    /// Plain string equality: these are low-value preset accounts, so the
    /// comparison is not constant-time.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.passwords
            .get(username)
            .is_some_and(|expected| expected == password)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.passwords.contains_key(username)
    }

    /// Usernames in configuration order.
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("usernames", &self.order)
            .finish_non_exhaustive()
    }
}
