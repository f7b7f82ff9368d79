//! Typed view of the Caddy JSON config tree.
//!
//! Only the parts the sidecar reads are modelled: the `http` app (servers,
//! routes, matchers, handler chains) and the `tls` app's automation policies.
//! Decoding is lenient at every collection: an element that does not fit its
//! expected shape is dropped and its siblings survive, so one odd route or an
//! unfamiliar handler never hides the rest of the config.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Subroute nesting deeper than this is not descended into.
pub const MAX_SUBROUTE_DEPTH: usize = 64;

/// Containers nested deeper than this anywhere in the document are dropped.
const MAX_DOCUMENT_DEPTH: usize = 512;

/// Root config document returned by `GET /config/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigTree {
    /// App name → opaque app document.
    #[serde(default, deserialize_with = "lenient::map")]
    pub apps: BTreeMap<String, Value>,
}

impl ConfigTree {
    /// Decode a raw admin API response. Caddy answers `null` when it runs
    /// without any config; that decodes to an empty tree.
    ///
    /// Nesting depth is not limited while parsing. Subroutes nested past
    /// [`MAX_SUBROUTE_DEPTH`] lose their routes before typed decoding, so a
    /// single deep branch never fails the whole document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        de.disable_recursion_limit();
        let mut value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;

        prune_depth(&mut value);

        let apps = match value {
            Value::Object(mut root) => match root.remove("apps") {
                Some(Value::Object(apps)) => apps.into_iter().collect(),
                _ => BTreeMap::new(),
            },
            _ => BTreeMap::new(),
        };
        Ok(Self { apps })
    }

    /// The `http` app, if present and shaped like one.
    pub fn http_app(&self) -> Option<HttpApp> {
        self.apps.get("http").and_then(|v| HttpApp::deserialize(v).ok())
    }

    /// The `tls` app, if present and shaped like one.
    pub fn tls_app(&self) -> Option<TlsApp> {
        self.apps.get("tls").and_then(|v| TlsApp::deserialize(v).ok())
    }
}

/// The `http` app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpApp {
    /// Server name (`srv0`, `srv1`, ...) → server.
    #[serde(default, deserialize_with = "lenient::map")]
    pub servers: BTreeMap<String, HttpServer>,
}

/// A single HTTP server block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpServer {
    #[serde(default, deserialize_with = "lenient::vec")]
    pub listen: Vec<String>,

    #[serde(default, deserialize_with = "lenient::vec")]
    pub routes: Vec<HttpRoute>,
}

/// One route: matchers plus an ordered handler chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpRoute {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,

    #[serde(rename = "match", default, deserialize_with = "lenient::vec")]
    pub matchers: Vec<MatchRule>,

    #[serde(default, deserialize_with = "lenient::vec")]
    pub handle: Vec<Handler>,

    #[serde(default)]
    pub terminal: bool,
}

/// Host/path matching conditions of a route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchRule {
    #[serde(default, deserialize_with = "lenient::vec")]
    pub host: Vec<String>,

    #[serde(default, deserialize_with = "lenient::vec")]
    pub path: Vec<String>,
}

/// A handler entry, discriminated by its `handler` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum Handler {
    /// Nested routing group.
    Subroute {
        #[serde(default, deserialize_with = "lenient::vec")]
        routes: Vec<HttpRoute>,
    },

    /// Static file serving.
    FileServer {
        #[serde(default)]
        root: Option<String>,
    },

    /// Reverse proxy to one or more upstreams.
    ReverseProxy {
        #[serde(default, deserialize_with = "lenient::vec")]
        upstreams: Vec<Upstream>,
    },

    /// Request/response header manipulation.
    Headers {
        #[serde(default)]
        response: Option<HeaderOps>,
    },

    /// Any handler kind the sidecar does not interpret.
    #[serde(other)]
    Unrecognized,
}

/// A `reverse_proxy` upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Upstream {
    #[serde(default)]
    pub dial: String,
}

/// Response operations of a `headers` handler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderOps {
    #[serde(default)]
    pub set: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub add: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub delete: Vec<String>,
}

/// The `tls` app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsApp {
    #[serde(default, deserialize_with = "lenient::option")]
    pub automation: Option<TlsAutomation>,
}

/// ACME automation section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsAutomation {
    #[serde(default, deserialize_with = "lenient::vec")]
    pub policies: Vec<TlsPolicy>,
}

/// One automation policy and the subjects it covers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsPolicy {
    #[serde(default, deserialize_with = "lenient::vec")]
    pub subjects: Vec<String>,
}

/// Cut the document down to a depth typed decoding can recurse through.
///
/// Walks with an explicit stack. A subroute already nested
/// [`MAX_SUBROUTE_DEPTH`] deep keeps its handler entry but loses its routes,
/// and any container past [`MAX_DOCUMENT_DEPTH`] becomes `null`.
fn prune_depth(root: &mut Value) {
    // (value, json depth, enclosing subroutes)
    let mut stack: Vec<(&mut Value, usize, usize)> = vec![(root, 0, 0)];

    while let Some((value, depth, subroutes)) = stack.pop() {
        if depth >= MAX_DOCUMENT_DEPTH && (value.is_array() || value.is_object()) {
            discard(std::mem::take(value));
            continue;
        }
        match value {
            Value::Object(map) => {
                let subroutes = if is_subroute(map) {
                    if subroutes >= MAX_SUBROUTE_DEPTH {
                        if let Some(routes) = map.get_mut("routes") {
                            discard(std::mem::take(routes));
                        }
                    }
                    subroutes + 1
                } else {
                    subroutes
                };
                stack.extend(map.values_mut().map(|v| (v, depth + 1, subroutes)));
            }
            Value::Array(items) => {
                stack.extend(items.iter_mut().map(|v| (v, depth + 1, subroutes)));
            }
            _ => {}
        }
    }
}

fn is_subroute(map: &Map<String, Value>) -> bool {
    map.get("handler").and_then(Value::as_str) == Some("subroute")
}

/// Drop a value without recursing through its nesting.
fn discard(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => pending.extend(items),
            Value::Object(map) => pending.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

/// Deserializers that drop ill-shaped elements instead of failing the parent.
mod lenient {
    use std::collections::BTreeMap;

    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(entries) => entries
                .into_iter()
                .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|t| (k, t)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
    }
}
