//! Site extraction: flatten the live config into one record per host.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::caddy::model::{ConfigTree, Handler};

pub use crate::caddy::model::MAX_SUBROUTE_DEPTH;

/// What a site does with its traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    Static,
    Proxy,
    #[default]
    Unknown,
}

/// Summary of one virtual host as served by a single route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteRecord {
    pub domain: String,

    #[serde(rename = "type")]
    pub kind: SiteKind,

    #[serde(rename = "root", skip_serializing_if = "Option::is_none")]
    pub document_root: Option<String>,

    #[serde(rename = "upstream", skip_serializing_if = "Option::is_none")]
    pub upstream_address: Option<String>,

    #[serde(rename = "headers", skip_serializing_if = "Option::is_none")]
    pub response_header_overrides: Option<BTreeMap<String, String>>,

    #[serde(rename = "hasTLS")]
    pub tls_managed: bool,
}

impl SiteRecord {
    fn new(domain: &str, tls_managed: bool) -> Self {
        Self {
            domain: domain.to_string(),
            kind: SiteKind::Unknown,
            document_root: None,
            upstream_address: None,
            response_header_overrides: None,
            tls_managed,
        }
    }
}

/// Extract every (host, route) pair from the config.
///
/// Never fails: a missing or malformed `http` app yields no sites.
pub fn extract_sites(tree: &ConfigTree) -> Vec<SiteRecord> {
    let Some(http) = tree.http_app() else {
        return Vec::new();
    };
    let automated = tls_automated_hosts(tree);

    let mut sites = Vec::new();
    for server in http.servers.values() {
        for route in &server.routes {
            for rule in &route.matchers {
                for host in &rule.host {
                    let mut site = SiteRecord::new(host, automated.contains(host.as_str()));
                    classify_handlers(&mut site, &route.handle);
                    sites.push(site);
                }
            }
        }
    }
    sites
}

/// Find the first site whose domain matches `domain` case-insensitively.
pub fn find_site(tree: &ConfigTree, domain: &str) -> Option<SiteRecord> {
    extract_sites(tree)
        .into_iter()
        .find(|s| s.domain.eq_ignore_ascii_case(domain))
}

/// Hostnames listed as subjects of any TLS automation policy.
pub fn tls_automated_hosts(tree: &ConfigTree) -> HashSet<String> {
    tree.tls_app()
        .and_then(|tls| tls.automation)
        .map(|automation| {
            automation
                .policies
                .into_iter()
                .flat_map(|p| p.subjects)
                .collect()
        })
        .unwrap_or_default()
}

/// Walk a handler chain in order, descending into subroutes.
///
/// Uses an explicit stack of iterators so nesting depth never touches the
/// call stack. The last recognised kind wins; headers accumulate.
fn classify_handlers(site: &mut SiteRecord, handlers: &[Handler]) {
    // (remaining handlers, enclosing subroutes)
    let mut stack: Vec<(std::slice::Iter<'_, Handler>, usize)> = vec![(handlers.iter(), 0)];

    while let Some((top, depth)) = stack.last_mut() {
        let depth = *depth;
        let Some(handler) = top.next() else {
            stack.pop();
            continue;
        };

        match handler {
            Handler::Subroute { routes } => {
                if depth >= MAX_SUBROUTE_DEPTH {
                    tracing::debug!(domain = %site.domain, "Subroute nesting too deep, not descending");
                    continue;
                }
                // Pushed in reverse so the first nested route is walked first.
                for route in routes.iter().rev() {
                    stack.push((route.handle.iter(), depth + 1));
                }
            }
            Handler::FileServer { root } => {
                site.kind = SiteKind::Static;
                if let Some(root) = root.as_deref().filter(|r| !r.is_empty()) {
                    site.document_root = Some(root.to_string());
                }
            }
            Handler::ReverseProxy { upstreams } => {
                site.kind = SiteKind::Proxy;
                if let Some(first) = upstreams.first() {
                    site.upstream_address = Some(first.dial.clone());
                }
            }
            Handler::Headers { response } => {
                let Some(ops) = response else { continue };
                for (name, values) in &ops.set {
                    if let Some(first) = values.first() {
                        site.response_header_overrides
                            .get_or_insert_with(BTreeMap::new)
                            .insert(name.clone(), first.clone());
                    }
                }
            }
            Handler::Unrecognized => {}
        }
    }
}
