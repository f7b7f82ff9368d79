//! Route synthesis for registered services.

use serde_json::{json, Value};

use crate::registry::ServiceDescriptor;

/// Prefix of every route id owned by the sidecar.
pub const ROUTE_ID_PREFIX: &str = "svc-";

/// The `@id` Caddy stores for a service's route.
pub fn route_id(service_name: &str) -> String {
    format!("{ROUTE_ID_PREFIX}{service_name}")
}

/// A serialized route for one service, tagged with its stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFragment {
    id: String,
    body: Value,
}

impl RouteFragment {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn as_json(&self) -> &Value {
        &self.body
    }

    /// Serialized bytes as sent to the admin API.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing a `Value` cannot fail: keys are strings, no custom impls.
        serde_json::to_vec(&self.body).unwrap_or_default()
    }
}

/// Build the route for a service.
///
/// The route matches the service domain, hands off to a subroute that
/// reverse-proxies to the upstream, and is terminal. Same descriptor, same bytes.
pub fn synthesize(service: &ServiceDescriptor) -> RouteFragment {
    let id = route_id(&service.name);
    let body = json!({
        "@id": id,
        "match": [
            {"host": [service.domain]}
        ],
        "handle": [{
            "handler": "subroute",
            "routes": [{
                "handle": [{
                    "handler": "reverse_proxy",
                    "upstreams": [{"dial": service.upstream}]
                }]
            }]
        }],
        "terminal": true
    });
    RouteFragment { id, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caddy::model::{Handler, HttpRoute};

    fn service(name: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.into(),
            domain: "api.example.com".into(),
            upstream: "backend:3000".into(),
        }
    }

    #[test]
    fn test_deterministic() {
        let a = synthesize(&service("api"));
        let b = synthesize(&service("api"));
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.id(), "svc-api");
    }

    #[test]
    fn test_name_drives_id() {
        let a = synthesize(&service("api"));
        let b = synthesize(&service("web"));
        assert_eq!(a.id(), "svc-api");
        assert_eq!(b.id(), "svc-web");
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_shape_reads_back_as_proxy_route() {
        let fragment = synthesize(&service("api"));
        let route: HttpRoute = serde_json::from_value(fragment.as_json().clone()).unwrap();

        assert_eq!(route.id.as_deref(), Some("svc-api"));
        assert!(route.terminal);
        assert_eq!(route.matchers[0].host, vec!["api.example.com"]);
        let Handler::Subroute { routes } = &route.handle[0] else {
            panic!("expected subroute");
        };
        assert!(matches!(
            &routes[0].handle[0],
            Handler::ReverseProxy { upstreams } if upstreams[0].dial == "backend:3000"
        ));
    }

    #[test]
    fn test_values_are_escaped() {
        let mut svc = service("api");
        svc.upstream = "unix//run/app\\sock".into();
        let bytes = synthesize(&svc).to_bytes();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            parsed["handle"][0]["routes"][0]["handle"][0]["upstreams"][0]["dial"],
            "unix//run/app\\sock"
        );
    }
}
