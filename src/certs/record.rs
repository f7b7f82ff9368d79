//! Certificate status records.

use chrono::{DateTime, Utc};
use serde::Serialize;

const SECS_PER_DAY: i64 = 86_400;

/// Where a certificate came from, as far as its location or issuer tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Letsencrypt,
    Zerossl,
    Local,
    External,
    Unknown,
}

/// Expiry summary for one certificate, derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub domain: String,
    #[serde(rename = "issuer")]
    pub issuer_common_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    #[serde(rename = "daysLeft")]
    pub days_remaining: i64,
    pub is_expired: bool,
    #[serde(rename = "source")]
    pub source_category: SourceCategory,
}

impl CertificateRecord {
    pub fn new(
        domain: String,
        issuer_common_name: String,
        validity: (DateTime<Utc>, DateTime<Utc>),
        source_category: SourceCategory,
        now: DateTime<Utc>,
    ) -> Self {
        let (not_before, not_after) = validity;
        let days_remaining = days_remaining(not_after, now);
        Self {
            domain,
            issuer_common_name,
            not_before,
            not_after,
            days_remaining,
            is_expired: days_remaining < 0,
            source_category,
        }
    }
}

/// Whole days from `now` until `not_after`, truncated toward zero.
pub fn days_remaining(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (not_after - now).num_seconds() / SECS_PER_DAY
}

/// Category from a storage issuer directory name such as
/// `acme-v02.api.letsencrypt.org-directory`.
pub fn classify_issuer_dir(name: &str) -> SourceCategory {
    let lower = name.to_lowercase();
    if lower.contains("letsencrypt") {
        SourceCategory::Letsencrypt
    } else if lower.contains("zerossl") {
        SourceCategory::Zerossl
    } else if lower.contains("local") {
        SourceCategory::Local
    } else {
        SourceCategory::Unknown
    }
}

/// Category from an issuer common name, for certificates found outside storage.
pub fn classify_issuer(common_name: &str) -> SourceCategory {
    let lower = common_name.to_lowercase();
    if lower.contains("let's encrypt") || lower.contains("letsencrypt") {
        SourceCategory::Letsencrypt
    } else if lower.contains("zerossl") {
        SourceCategory::Zerossl
    } else {
        SourceCategory::External
    }
}
