use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "caddy-admin-cli")]
#[command(about = "Management CLI for the Caddy admin sidecar", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CADDY_ADMIN_URL", default_value = "http://localhost:8090")]
    url: String,

    /// Bearer token, if the sidecar requires one.
    #[arg(short, long, env = "CADDY_ADMIN_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether Caddy is reachable
    Status,
    /// List sites from the live config
    Sites,
    /// Show one site
    Site { domain: String },
    /// List certificates and their expiry
    Certs,
    /// List registered services
    Services,
    /// Register (or replace) a service
    Register {
        name: String,
        domain: String,
        upstream: String,
    },
    /// Remove a registered service
    Deregister { name: String },
    /// Re-apply every registered service to Caddy
    Sync,
}

impl Commands {
    fn request(&self) -> (Method, String, Option<Value>) {
        match self {
            Commands::Status => (Method::GET, "/api/status".into(), None),
            Commands::Sites => (Method::GET, "/api/sites".into(), None),
            Commands::Site { domain } => (Method::GET, format!("/api/sites/{domain}"), None),
            Commands::Certs => (Method::GET, "/api/certs".into(), None),
            Commands::Services => (Method::GET, "/api/services".into(), None),
            Commands::Register {
                name,
                domain,
                upstream,
            } => (
                Method::POST,
                "/api/services".into(),
                Some(json!({ "name": name, "domain": domain, "upstream": upstream })),
            ),
            Commands::Deregister { name } => {
                (Method::DELETE, format!("/api/services/{name}"), None)
            }
            Commands::Sync => (Method::POST, "/api/services/sync".into(), None),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let (method, path, body) = cli.command.request();
    let mut request: RequestBuilder = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let ok = print_response(request.send().await?).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the response body; returns whether the status was a success.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: API returned status {status}");
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);
        eprintln!("{message}");
        return Ok(false);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(true)
}
