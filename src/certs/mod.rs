//! Certificate inventory subsystem.
//!
//! # Data Flow
//! ```text
//! GET /api/certs
//!     → CertificateInventory::collect (blocking pool)
//!         → scanner.rs: proxy storage tree, then external flat dir
//!         → record.rs: expiry arithmetic, source classification
//!     → Vec<CertificateRecord>
//! ```
//!
//! # Design Decisions
//! - Read-only; nothing is cached or persisted
//! - Unreadable files are skipped, never fail the listing
//! - Storage records come before external ones, each in name order

pub mod record;
pub mod scanner;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::config::CertificatesConfig;

pub use record::{classify_issuer, classify_issuer_dir, days_remaining, CertificateRecord, SourceCategory};
pub use scanner::{parse_cert_file, scan_directory, scan_storage, CertFileError};

/// Locations scanned for certificates.
#[derive(Debug, Clone)]
pub struct CertificateInventory {
    storage_root: PathBuf,
    external_dir: Option<PathBuf>,
}

impl CertificateInventory {
    pub fn new(storage_root: impl Into<PathBuf>, external_dir: Option<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            external_dir,
        }
    }

    pub fn from_config(config: &CertificatesConfig) -> Self {
        Self::new(
            &config.storage_root,
            config.external_dir.as_ref().map(PathBuf::from),
        )
    }

    /// All certificates as of `now`.
    pub fn collect_at(&self, now: DateTime<Utc>) -> Vec<CertificateRecord> {
        let mut records = scan_storage(&self.storage_root, now);
        if let Some(dir) = &self.external_dir {
            records.extend(scan_directory(dir, now));
        }
        records
    }

    /// All certificates as of now, scanned off the async runtime.
    pub async fn collect(&self) -> Vec<CertificateRecord> {
        let inventory = self.clone();
        match tokio::task::spawn_blocking(move || inventory.collect_at(Utc::now())).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Certificate scan task failed");
                Vec::new()
            }
        }
    }
}
