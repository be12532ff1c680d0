use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the relay failover proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8119")]
    url: String,

    #[arg(short, long, env = "RELAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engine status, current balancer and counters
    Status,
    /// Show current settings
    Settings,
    /// List enabled balancers in rotation order
    Balancers,
    /// Rotate to the next balancer
    Switch,
    /// Probe every balancer
    Test,
    /// Show request counters
    Stats,
    /// Zero the request counters
    ResetStats,
    /// Check whether a URL would be relayed
    Check { url: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let call = |method: Method, path: &str| -> RequestBuilder {
        client
            .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
            .headers(headers.clone())
    };

    let request = match &cli.command {
        Commands::Status => call(Method::GET, "/admin/status"),
        Commands::Settings => call(Method::GET, "/admin/settings"),
        Commands::Balancers => call(Method::GET, "/admin/balancers"),
        Commands::Switch => call(Method::POST, "/admin/balancers/switch"),
        Commands::Test => call(Method::GET, "/admin/balancers/test"),
        Commands::Stats => call(Method::GET, "/admin/stats"),
        Commands::ResetStats => call(Method::DELETE, "/admin/stats"),
        Commands::Check { url } => call(Method::GET, "/admin/blocked").query(&[("url", url)]),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
