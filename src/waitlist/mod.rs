//! Waitlist core: signup and listing against the KV store.
//!
//! State lives entirely in three external keys:
//!   - `waitlist:emails`          — set of all registered (lowercase) emails
//!   - `waitlist:entry:{email}`   — hash with the full signup record
//!   - `waitlist:count`           — running registration counter
//!
//! A signup issues three writes in that order, with no transaction spanning
//! them. A failure mid-sequence leaves the store partially updated; the
//! listing tolerates the resulting gaps (member without an entry hash) by
//! surfacing a null `registeredAt` instead of aborting.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::kv::{KvError, KvStore};

pub const EMAILS_SET_KEY: &str = "waitlist:emails";
pub const COUNT_KEY: &str = "waitlist:count";

/// Hash key for one email's full signup record.
pub fn entry_key(email: &str) -> String {
    format!("waitlist:entry:{email}")
}

/// Basic `local@domain.tld` shape. Deliberately loose — deliverability is
/// the mail provider's problem, this only catches obvious typos.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    // Pattern is a compile-time constant; the unwrap cannot fire.
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

// ─── Types ────────────────────────────────────────────────────────────────────

/// A single signup record, as stored in the entry hash and in snapshot files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub email: String,
    /// ISO-8601 insertion timestamp. Set once, never mutated.
    pub registered_at: String,
    /// Free-text `User-Agent` captured at signup, if the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
}

/// One row of the listing output. `registered_at` is `None` for members
/// whose entry hash is missing (partially-failed prior registration).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEntry {
    pub email: String,
    pub registered_at: Option<String>,
}

/// Full listing: counter value plus entries, most recent first.
///
/// `total` comes from the counter key, not from the set — the two are not
/// cross-validated and may drift after partial failures.
#[derive(Debug, Serialize)]
pub struct WaitlistListing {
    pub total: i64,
    pub entries: Vec<ListedEntry>,
}

/// Registration failure taxonomy. The REST layer maps these onto
/// 400 / 400 / 409 / 500 with user-facing messages.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("email is required")]
    MissingEmail,
    #[error("invalid email format")]
    InvalidFormat,
    #[error("email already registered")]
    Duplicate,
    #[error(transparent)]
    Store(#[from] KvError),
}

// ─── Service ──────────────────────────────────────────────────────────────────

/// Stateless waitlist operations over a shared store handle.
#[derive(Clone)]
pub struct WaitlistService {
    store: Arc<dyn KvStore>,
}

impl WaitlistService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Register an email, exactly once.
    ///
    /// Validation (presence, then format) happens before any store access.
    /// The duplicate check and the subsequent set-add are not atomic as a
    /// pair: two concurrent signups for the same email can both pass the
    /// check. The set-add is a safe union either way; the counter may then
    /// overcount by one. Accepted behavior, see DESIGN.md.
    pub async fn register(
        &self,
        email: Option<&str>,
        client_info: Option<&str>,
    ) -> Result<WaitlistEntry, RegisterError> {
        let email = match email {
            Some(e) if !e.is_empty() => e,
            _ => return Err(RegisterError::MissingEmail),
        };
        if !EMAIL_RE.is_match(email) {
            return Err(RegisterError::InvalidFormat);
        }

        let normalized = email.to_lowercase();
        if self.store.is_member(EMAILS_SET_KEY, &normalized).await? {
            return Err(RegisterError::Duplicate);
        }

        let entry = WaitlistEntry {
            email: normalized.clone(),
            registered_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            client_info: client_info.map(str::to_string),
        };

        // Three separate writes, fixed order, no rollback on failure.
        self.store.add_member(EMAILS_SET_KEY, &normalized).await?;
        self.store
            .write_fields(&entry_key(&normalized), &entry.to_fields())
            .await?;
        self.store.increment(COUNT_KEY).await?;

        info!(email = %normalized, "new waitlist signup");
        Ok(entry)
    }

    /// Read the full waitlist, most recent signup first.
    ///
    /// Read-only. Members missing their entry hash are kept in the output
    /// with a null timestamp and sort after all dated members.
    pub async fn list_all(&self) -> Result<WaitlistListing, KvError> {
        let members = self.store.get_all_members(EMAILS_SET_KEY).await?;
        let total = self.store.get(COUNT_KEY).await?.unwrap_or(0);

        let mut entries: Vec<(Option<DateTime<chrono::FixedOffset>>, ListedEntry)> =
            Vec::with_capacity(members.len());
        for member in members {
            let fields = self.store.read_fields(&entry_key(&member)).await?;
            let registered_at = fields.get("registeredAt").cloned();
            if registered_at.is_none() {
                warn!(email = %member, "waitlist member has no entry record");
            }
            let parsed = registered_at
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok());
            entries.push((
                parsed,
                ListedEntry {
                    email: member,
                    registered_at,
                },
            ));
        }

        // Descending by timestamp; undated members last; stable on ties.
        entries.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        Ok(WaitlistListing {
            total,
            entries: entries.into_iter().map(|(_, e)| e).collect(),
        })
    }
}

impl WaitlistEntry {
    /// Flatten into hash fields for the entry key. Absent `client_info`
    /// stores no field at all rather than an empty string.
    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("email".to_string(), self.email.clone()),
            ("registeredAt".to_string(), self.registered_at.clone()),
        ];
        if let Some(info) = &self.client_info {
            fields.push(("clientInfo".to_string(), info.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryKv;

    fn service() -> WaitlistService {
        WaitlistService::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn distinct_emails_both_register_and_list() {
        let svc = service();
        svc.register(Some("a@example.com"), None).await.unwrap();
        svc.register(Some("b@example.com"), Some("curl/8.0"))
            .await
            .unwrap();

        let listing = svc.list_all().await.unwrap();
        assert_eq!(listing.total, 2);
        let mut emails: Vec<_> = listing.entries.iter().map(|e| e.email.as_str()).collect();
        emails.sort_unstable();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn second_registration_is_a_conflict_and_writes_nothing() {
        let svc = service();
        svc.register(Some("user@example.com"), None).await.unwrap();
        let err = svc
            .register(Some("user@example.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::Duplicate));

        let listing = svc.list_all().await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.entries.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_check_is_case_insensitive() {
        let svc = service();
        svc.register(Some("A@B.com"), None).await.unwrap();
        let err = svc.register(Some("a@b.com"), None).await.unwrap_err();
        assert!(matches!(err, RegisterError::Duplicate));

        let listing = svc.list_all().await.unwrap();
        assert_eq!(listing.entries[0].email, "a@b.com");
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_before_any_write() {
        let svc = service();
        let err = svc.register(Some("not-an-email"), None).await.unwrap_err();
        assert!(matches!(err, RegisterError::InvalidFormat));

        let listing = svc.list_all().await.unwrap();
        assert_eq!(listing.total, 0);
        assert!(listing.entries.is_empty());
    }

    #[tokio::test]
    async fn missing_and_empty_email_are_required_errors() {
        let svc = service();
        assert!(matches!(
            svc.register(None, None).await.unwrap_err(),
            RegisterError::MissingEmail
        ));
        assert!(matches!(
            svc.register(Some(""), None).await.unwrap_err(),
            RegisterError::MissingEmail
        ));
        assert_eq!(svc.list_all().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn whitespace_in_email_is_invalid() {
        let svc = service();
        let err = svc
            .register(Some("user name@example.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidFormat));
    }

    #[tokio::test]
    async fn empty_store_lists_as_empty() {
        let listing = service().list_all().await.unwrap();
        assert_eq!(listing.total, 0);
        assert!(listing.entries.is_empty());
    }

    #[tokio::test]
    async fn listing_is_most_recent_first() {
        let store = Arc::new(MemoryKv::new());
        let svc = WaitlistService::new(store.clone());
        // Write entries with explicit timestamps to avoid same-millisecond ties.
        for (email, ts) in [
            ("first@example.com", "2025-01-01T00:00:00.000Z"),
            ("second@example.com", "2025-06-01T00:00:00.000Z"),
            ("third@example.com", "2025-12-01T00:00:00.000Z"),
        ] {
            svc.register(Some(email), None).await.unwrap();
            store
                .write_fields(
                    &entry_key(email),
                    &[("registeredAt".to_string(), ts.to_string())],
                )
                .await
                .unwrap();
        }

        let listing = svc.list_all().await.unwrap();
        let emails: Vec<_> = listing.entries.iter().map(|e| e.email.as_str()).collect();
        assert_eq!(
            emails,
            vec!["third@example.com", "second@example.com", "first@example.com"]
        );
    }

    #[tokio::test]
    async fn member_without_entry_hash_is_surfaced_not_skipped() {
        let store = Arc::new(MemoryKv::new());
        let svc = WaitlistService::new(store.clone());
        svc.register(Some("whole@example.com"), None).await.unwrap();
        // Simulate a registration that failed after the set-add.
        store
            .add_member(EMAILS_SET_KEY, "torn@example.com")
            .await
            .unwrap();

        let listing = svc.list_all().await.unwrap();
        assert_eq!(listing.entries.len(), 2);
        // Undated member sorts last.
        assert_eq!(listing.entries[0].email, "whole@example.com");
        assert_eq!(listing.entries[1].email, "torn@example.com");
        assert!(listing.entries[1].registered_at.is_none());
    }

    #[tokio::test]
    async fn client_info_is_stored_with_the_entry() {
        let store = Arc::new(MemoryKv::new());
        let svc = WaitlistService::new(store.clone());
        svc.register(Some("ua@example.com"), Some("Mozilla/5.0"))
            .await
            .unwrap();
        svc.register(Some("no-ua@example.com"), None).await.unwrap();

        let fields = store.read_fields(&entry_key("ua@example.com")).await.unwrap();
        assert_eq!(fields.get("clientInfo").map(String::as_str), Some("Mozilla/5.0"));
        assert_eq!(fields.get("email").map(String::as_str), Some("ua@example.com"));

        let fields = store
            .read_fields(&entry_key("no-ua@example.com"))
            .await
            .unwrap();
        assert!(!fields.contains_key("clientInfo"));
    }

    #[tokio::test]
    async fn registered_at_is_rfc3339() {
        let svc = service();
        let entry = svc.register(Some("ts@example.com"), None).await.unwrap();
        assert!(DateTime::parse_from_rfc3339(&entry.registered_at).is_ok());
    }
}
