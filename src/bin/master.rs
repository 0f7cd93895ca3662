use clap::Parser;
use edge_rm::config::MasterArgs;
use tracing::{error, Level};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = MasterArgs::parse();
    let udp_addr = format!("{}:{}", args.host, args.port)
        .parse()
        .expect("--host/--port must form a valid socket address");

    tracing::info!(%udp_addr, api_port = args.api_port, "starting edge-rm master");

    if let Err(e) = edge_rm::master::run(udp_addr, &args.host, args.api_port).await {
        error!(error = %e, "master exited with an error");
        std::process::exit(1);
    }
}
