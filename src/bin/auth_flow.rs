use anyhow::Result;
use clap::Parser;
use sessionauth_server::client::AuthClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drives a running server through register, login, logout and password reset.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the server
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    base_url: String,

    /// Email of the account to create
    #[arg(short, long, default_value = "guillaume@holberton.io")]
    email: String,

    /// Initial password
    #[arg(short, long, default_value = "b4l0u")]
    password: String,

    /// Password set through the reset flow
    #[arg(short, long, default_value = "t4rt1fl3tt3")]
    new_password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    info!("Running account flow against {}", args.base_url);

    let client = AuthClient::new(&args.base_url)?;
    client
        .run_flow(&args.email, &args.password, &args.new_password)
        .await?;

    info!("All checks passed");
    Ok(())
}
