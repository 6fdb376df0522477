use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use roshambo::game::Move;

#[derive(Parser)]
#[command(name = "roshambo-cli")]
#[command(about = "Play against a roshambo server and inspect it", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one round
    Play {
        /// rock, paper or scissors
        choice: Move,
    },
    /// Check server liveness
    Health,
    /// Show the outcome tally
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("roshambo-cli: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Play { choice } => {
            client
                .post(format!("{base}/play"))
                .json(&json!({ "Form": choice }))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{base}/health")).send().await?,
        Commands::Stats => client.get(format!("{base}/stats")).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {status}");
        eprintln!("Response: {}", text.trim_end());
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::String(message)) => println!("{message}"),
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text.trim_end()),
    }
    Ok(())
}
