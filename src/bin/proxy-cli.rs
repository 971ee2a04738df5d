use clap::{Parser, Subcommand};

use tally_proxy::rpc::StatsClient;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Query the proxy's per-path byte counts", long_about = None)]
struct Cli {
    /// RPC endpoint root.
    #[arg(short, long, default_value = "http://127.0.0.1:8079")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every path and its byte total
    Status,
    /// Print the byte total for one path
    Path { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = StatsClient::new(&cli.url);
    let snapshot = client.status().await?;

    match cli.command {
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Path { path } => match snapshot.get(&path) {
            Some(bytes) => println!("{path}\t{bytes}"),
            None => {
                eprintln!("No bytes recorded for {path}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
