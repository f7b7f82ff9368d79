//! Certificate file discovery and decoding.
//!
//! Two layouts are understood:
//! - proxy storage: `<root>/certificates/<issuer-dir>/<domain>/<domain>.crt`
//! - a flat directory of PEM files (e.g. output of an external ACME client)
//!
//! Files that cannot be read or decoded are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::prelude::*;

use crate::certs::record::{classify_issuer, classify_issuer_dir, CertificateRecord};

const CERT_EXTENSIONS: [&str; 3] = [".pem", ".crt", ".cer"];

#[derive(Debug, Error)]
pub enum CertFileError {
    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} holds no PEM certificate", path.display())]
    NoCertificate { path: PathBuf },

    #[error("{} is not a valid X.509 certificate: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// The fields a record needs from one decoded certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCert {
    pub subject_common_name: String,
    pub issuer_common_name: String,
    pub dns_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ParsedCert {
    /// First DNS subject alternative name, else the subject common name.
    pub fn primary_name(&self) -> &str {
        self.dns_names
            .first()
            .map(String::as_str)
            .unwrap_or(self.subject_common_name.as_str())
    }
}

/// Decode the first certificate in a PEM file.
pub fn parse_cert_file(path: &Path) -> Result<ParsedCert, CertFileError> {
    let data = fs::read(path).map_err(|source| CertFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let der = rustls_pemfile::certs(&mut data.as_slice())
        .next()
        .and_then(Result::ok)
        .ok_or_else(|| CertFileError::NoCertificate {
            path: path.to_path_buf(),
        })?;

    let invalid = |reason: String| CertFileError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    let (_, cert) = X509Certificate::from_der(der.as_ref()).map_err(|e| invalid(e.to_string()))?;

    let dns_names = match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => return Err(invalid(e.to_string())),
    };

    let validity = cert.validity();
    let not_before = to_utc(validity.not_before).ok_or_else(|| invalid("notBefore out of range".into()))?;
    let not_after = to_utc(validity.not_after).ok_or_else(|| invalid("notAfter out of range".into()))?;

    Ok(ParsedCert {
        subject_common_name: first_common_name(cert.subject()),
        issuer_common_name: first_common_name(cert.issuer()),
        dns_names,
        not_before,
        not_after,
    })
}

/// Scan the proxy's certificate storage under `root`.
///
/// A missing `certificates` directory yields no records.
pub fn scan_storage(root: &Path, now: DateTime<Utc>) -> Vec<CertificateRecord> {
    let base = root.join("certificates");
    let mut records = Vec::new();

    for issuer_dir in sorted_entries(&base).into_iter().filter(|p| p.is_dir()) {
        let source = classify_issuer_dir(&file_name(&issuer_dir));

        for domain_dir in sorted_entries(&issuer_dir).into_iter().filter(|p| p.is_dir()) {
            let domain = file_name(&domain_dir);
            let cert_path = domain_dir.join(format!("{domain}.crt"));

            match parse_cert_file(&cert_path) {
                Ok(cert) => records.push(CertificateRecord::new(
                    domain,
                    cert.issuer_common_name,
                    (cert.not_before, cert.not_after),
                    source,
                    now,
                )),
                Err(e) => tracing::debug!(error = %e, "Skipping stored certificate"),
            }
        }
    }
    records
}

/// Scan a flat directory of PEM certificate files.
///
/// Only `.pem`, `.crt` and `.cer` files are read; names containing "key" are skipped.
pub fn scan_directory(dir: &Path, now: DateTime<Utc>) -> Vec<CertificateRecord> {
    sorted_entries(dir)
        .into_iter()
        .filter(|p| !p.is_dir() && is_cert_file_name(&file_name(p)))
        .filter_map(|path| match parse_cert_file(&path) {
            Ok(cert) => Some(cert),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping external certificate");
                None
            }
        })
        .map(|cert| {
            let source = classify_issuer(&cert.issuer_common_name);
            CertificateRecord::new(
                cert.primary_name().to_string(),
                cert.issuer_common_name.clone(),
                (cert.not_before, cert.not_after),
                source,
                now,
            )
        })
        .collect()
}

fn is_cert_file_name(name: &str) -> bool {
    CERT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) && !name.contains("key")
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    paths
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn first_common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn to_utc(time: ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
}
