use clap::Parser;
use smart_thruster::runtime::RuntimeArgs;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = RuntimeArgs::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = smart_thruster::runtime::run(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
