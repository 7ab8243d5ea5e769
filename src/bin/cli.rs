//! CityPulse CLI
//!
//! Command-line client for a running CityPulse server:
//! - Sign in and keep the token in `CITYPULSE_TOKEN`
//! - Submit and list reports, change their status
//! - Publish and list alerts
//! - Check server status

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "citypulse-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the CityPulse API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Session token from `login`
    #[arg(long, env = "CITYPULSE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and print a session token
    Login {
        email: String,
        #[arg(short, long)]
        password: String,
        /// citizen or authority
        #[arg(short, long, default_value = "citizen")]
        role: String,
    },

    /// Sign out the current token
    Logout,

    /// Report commands
    #[command(subcommand)]
    Report(ReportCommand),

    /// Alert commands
    #[command(subcommand)]
    Alert(AlertCommand),

    /// Show record counts
    Stats,

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommand {
    /// Submit a report (citizens)
    Submit {
        /// Suggestion or Feedback
        #[arg(short = 't', long = "type", default_value = "Suggestion")]
        kind: String,
        title: String,
        description: String,
        #[arg(short, long)]
        location: Option<String>,
    },
    /// List reports
    List {
        /// Only this status (authorities)
        #[arg(short, long)]
        status: Option<String>,
        /// Only this submitter (authorities)
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Change a report's status (authorities)
    Status {
        id: String,
        /// Pending, "In Progress" or Resolved
        status: String,
    },
}

#[derive(Subcommand)]
pub enum AlertCommand {
    /// Publish an alert (authorities)
    Publish { title: String, message: String },
    /// List alerts
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = ApiClient {
        client: Client::new(),
        base: cli.api_url.trim_end_matches('/').to_string(),
        token: cli.token.clone(),
    };

    match cli.command {
        Commands::Login {
            email,
            password,
            role,
        } => {
            let body = json!({"email": email, "password": password, "type": role});
            let session = api.send(api.post("/auth/login").json(&body)).await?;

            let user = &session["user"];
            println!(
                "Signed in as {} ({}, id {})",
                user["name"].as_str().unwrap_or("-"),
                user["type"].as_str().unwrap_or("-"),
                user["id"].as_str().unwrap_or("-"),
            );
            println!();
            println!(
                "export CITYPULSE_TOKEN={}",
                session["token"].as_str().unwrap_or_default()
            );
        }

        Commands::Logout => {
            api.send(api.authed(api.post("/auth/logout"))?).await?;
            println!("Signed out");
        }

        Commands::Report(ReportCommand::Submit {
            kind,
            title,
            description,
            location,
        }) => {
            let body = json!({
                "type": kind,
                "title": title,
                "description": description,
                "location": location,
            });
            let report = api
                .send(api.authed(api.post("/reports"))?.json(&body))
                .await?;
            println!("Submitted report {}", report["id"].as_str().unwrap_or("-"));
        }

        Commands::Report(ReportCommand::List { status, user }) => {
            let mut query = Vec::new();
            if let Some(status) = &status {
                query.push(("status", status.as_str()));
            }
            if let Some(user) = &user {
                query.push(("user_id", user.as_str()));
            }

            let data = api
                .send(api.authed(api.get("/reports"))?.query(&query))
                .await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_reports(&data);
            }
        }

        Commands::Report(ReportCommand::Status { id, status }) => {
            let path = format!("/reports/{}/status", urlencoding::encode(&id));
            let report = api
                .send(api.authed(api.put(&path))?.json(&json!({"status": status})))
                .await?;
            println!(
                "Report {} is now {}",
                id,
                report["status"].as_str().unwrap_or("-")
            );
        }

        Commands::Alert(AlertCommand::Publish { title, message }) => {
            let body = json!({"title": title, "message": message});
            let alert = api
                .send(api.authed(api.post("/alerts"))?.json(&body))
                .await?;
            println!("Published alert {}", alert["id"].as_str().unwrap_or("-"));
        }

        Commands::Alert(AlertCommand::List) => {
            let data = api.send(api.get("/alerts")).await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_alerts(&data);
            }
        }

        Commands::Stats => {
            let stats = api.send(api.authed(api.get("/stats"))?).await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Backend:      {}", stats["backend"].as_str().unwrap_or("-"));
                println!("Reports:      {}", stats["reports"]);
                println!("  Pending:     {}", stats["pending"]);
                println!("  In Progress: {}", stats["in_progress"]);
                println!("  Resolved:    {}", stats["resolved"]);
                println!("Alerts:       {}", stats["alerts"]);
            }
        }

        Commands::Status => {
            let response = api
                .client
                .get(format!("{}/health", api.base))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;

                    println!("CityPulse v{}", health["version"].as_str().unwrap_or("?"));
                    println!();
                    println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
                    println!(
                        "Store: {} ({})",
                        health["store"].as_str().unwrap_or("unknown"),
                        health["backend"].as_str().unwrap_or("-")
                    );
                    println!("WebSocket connections: {}", health["ws_connections"]);

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => bail!("API returned error: {}", resp.status()),
                Err(e) => {
                    eprintln!("Cannot connect to CityPulse API at {}", api.base);
                    eprintln!();
                    eprintln!("Make sure the server is running:");
                    eprintln!("  cargo run --bin citypulse");
                    return Err(e.into());
                }
            }
        }

        Commands::Config { output } => {
            let config = citypulse::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

struct ApiClient {
    client: Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    fn authed(&self, request: RequestBuilder) -> anyhow::Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .context("not signed in: run `citypulse-cli login` and export CITYPULSE_TOKEN")?;
        Ok(request.bearer_auth(token))
    }

    /// Send a request; non-2xx answers become errors carrying the server message
    async fn send(&self, request: RequestBuilder) -> anyhow::Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("cannot reach {}", self.base))?;
        parse_response(response).await
    }
}

async fn parse_response(response: Response) -> anyhow::Result<Value> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(text);
        bail!("request failed ({}): {}", status, message);
    }

    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn print_reports(data: &Value) {
    let reports = match data["reports"].as_array() {
        Some(r) if !r.is_empty() => r,
        _ => {
            println!("No reports");
            return;
        }
    };

    println!(
        "{:<22} {:<11} {:<12} {:<17} {}",
        "ID", "Type", "Status", "Created", "Title"
    );
    println!("{}", "-".repeat(90));

    for report in reports {
        let created = report["createdAt"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<22} {:<11} {:<12} {:<17} {}",
            report["id"].as_str().unwrap_or("-"),
            report["type"].as_str().unwrap_or("-"),
            report["status"].as_str().unwrap_or("-"),
            created,
            report["title"].as_str().unwrap_or("-"),
        );
    }
}

fn print_alerts(data: &Value) {
    let alerts = match data["alerts"].as_array() {
        Some(a) if !a.is_empty() => a,
        _ => {
            println!("No alerts");
            return;
        }
    };

    for alert in alerts {
        println!(
            "[{}] {}",
            alert["createdAt"].as_str().unwrap_or("-"),
            alert["title"].as_str().unwrap_or("-")
        );
        println!("    {}", alert["message"].as_str().unwrap_or(""));
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
