use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the mesh gateway registry", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Registry API key, sent as a bearer token when set.
    #[arg(short, long, env = "GATEWAY_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered services with breaker state
    Registry,
    /// Gateway health summary
    Health,
    /// Register (or replace) a service endpoint
    Register { name: String, url: String },
    /// Remove a service
    Unregister { name: String },
    /// Refresh a service's last-seen time
    Heartbeat { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let res = match cli.command {
        Commands::Registry => client.get(format!("{base}/registry")).send().await?,
        Commands::Health => client.get(format!("{base}/health")).send().await?,
        Commands::Register { name, url } => {
            client
                .post(format!("{base}/registry"))
                .headers(headers)
                .json(&json!({ "name": name, "url": url }))
                .send()
                .await?
        }
        Commands::Unregister { name } => {
            client
                .delete(format!("{base}/registry/{name}"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Heartbeat { name } => {
            client
                .post(format!("{base}/registry/{name}/heartbeat"))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
