use anyhow::Result;
use clap::Parser;

use chatline::{Server, logger::setup_logger};

#[derive(Parser, Debug)]
#[command(name = "chatline")]
#[command(about = "Line-oriented chat server with rooms and private messages", long_about = None)]
struct Args {
    /// Port to listen on
    port: u16,

    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(&args.log_level);

    let server = match Server::bind(&format!("{}:{}", args.host, args.port)).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!("{err:#}");
            std::process::exit(1);
        }
    };

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("ctrl-c received, shutting down");
        })
        .await
}
