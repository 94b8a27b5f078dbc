use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fleet-cli")]
#[command(about = "Operator CLI for the route optimization job service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an optimization request from a JSON file
    Submit {
        file: PathBuf,
        /// Poll until the job finishes
        #[arg(short, long)]
        wait: bool,
    },
    /// Show a job's status and result
    Poll { id: String },
    /// Cancel a pending or running job
    Cancel { id: String },
    /// Run a pending job inline on the server
    Process { id: String },
    /// Show job counts per status
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let jobs = format!("{}/optimize/jobs", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::Submit { file, wait } => {
            let body: Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let res = client.post(&jobs).json(&body).send().await?;
            let Some(receipt) = print_response(res).await? else {
                return Ok(());
            };
            if wait {
                if let Some(id) = receipt.get("jobId").and_then(Value::as_str) {
                    wait_for_job(&client, &format!("{}/{}", jobs, id)).await?;
                }
            }
        }
        Commands::Poll { id } => {
            let res = client.get(format!("{}/{}", jobs, id)).send().await?;
            print_response(res).await?;
        }
        Commands::Cancel { id } => {
            let res = client.delete(format!("{}/{}", jobs, id)).send().await?;
            print_response(res).await?;
        }
        Commands::Process { id } => {
            let res = client.post(format!("{}/{}/process", jobs, id)).send().await?;
            print_response(res).await?;
        }
        Commands::Stats => {
            let res = client.get(&jobs).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn wait_for_job(client: &reqwest::Client, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let view: Value = client.get(url).send().await?.json().await?;
        let status = view.get("status").and_then(Value::as_str).unwrap_or("unknown");
        if status == "completed" || status == "failed" {
            println!("{}", serde_json::to_string_pretty(&view)?);
            return Ok(());
        }
        eprintln!("job is {}...", status);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

async fn print_response(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(Some(json))
}
