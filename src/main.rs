use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway::app::{self, AppState};
use gateway::auth::cookie::SessionCookie;
use gateway::auth::password::{generate_reset_token, PasswordHasher};
use gateway::auth::TokenCodec;
use gateway::config::{self, Config};
use gateway::registry::ServiceRegistry;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "gateway=debug,clinic_gateway=debug,tower_http=info".into()),
        ))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();

    let result = dispatch(args.command).await;
    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Configuration is only loaded by the commands that use it, so `--help` and
/// the password helpers work without a deployable setup.
async fn dispatch(command: Option<cli::Commands>) -> anyhow::Result<()> {
    match command {
        Some(cli::Commands::Password { cost, command }) => handle_password_command(command, cost),
        Some(cli::Commands::Serve { port }) => {
            let cfg = config::load()?;
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Services) => print_services(&config::load()?),
        Some(cli::Commands::Token { command }) => handle_token_command(command, &config::load()?),
        Some(cli::Commands::Openapi { pretty }) => print_openapi(config::load()?, pretty).await,
        None => {
            let cfg = config::load()?;
            let port = cfg.port;
            run_server(cfg, port).await
        }
    }
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(cfg)?);
    for service in state.registry.iter() {
        tracing::info!("route /api/{}/* -> {}", service.name, service.base_url);
    }

    let app = app::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn print_services(cfg: &Config) -> anyhow::Result<()> {
    let registry = ServiceRegistry::new(cfg.services.clone())?;
    println!("{:<14} {:<22} {}", "SERVICE", "PREFIX", "BASE URL");
    for s in registry.iter() {
        println!(
            "{:<14} {:<22} {}",
            s.name,
            format!("/api/{}", s.name),
            s.base_url
        );
    }
    Ok(())
}

fn handle_token_command(cmd: cli::TokenCommands, cfg: &Config) -> anyhow::Result<()> {
    let codec = TokenCodec::new(&cfg.jwt_secret, cfg.token_ttl()?);
    match cmd {
        cli::TokenCommands::Issue {
            subject,
            role,
            verified,
            banned,
            cookie,
        } => {
            let token = codec.issue(&subject, role, verified, banned)?;
            if cookie {
                let header = SessionCookie::new(&cfg.cookie, codec.ttl()).issue(&token)?;
                println!("Set-Cookie: {}", header.to_str()?);
            } else {
                println!("{}", token);
            }
        }
        cli::TokenCommands::Decode { token } => {
            let claims = codec.decode(&token)?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            println!("expires at {}", claims.expires_at());
        }
    }
    Ok(())
}

fn handle_password_command(cmd: cli::PasswordCommands, cost: u32) -> anyhow::Result<()> {
    let hasher = PasswordHasher::new(cost);
    match cmd {
        cli::PasswordCommands::Hash { password } => {
            println!("{}", hasher.hash(&password)?);
        }
        cli::PasswordCommands::Verify { password, hash } => {
            if hasher.verify(&password, &hash)? {
                println!("Password matches.");
            } else {
                anyhow::bail!("password does not match");
            }
        }
        cli::PasswordCommands::ResetToken => {
            println!("{}", generate_reset_token());
        }
    }
    Ok(())
}

async fn print_openapi(cfg: Config, pretty: bool) -> anyhow::Result<()> {
    let state = AppState::new(cfg)?;
    let merged = state.aggregator.aggregate(state.registry.iter()).await;
    for name in &merged.skipped {
        eprintln!("skipped unreachable service: {}", name);
    }
    let out = if pretty {
        serde_json::to_string_pretty(&merged.document)?
    } else {
        serde_json::to_string(&merged.document)?
    };
    println!("{}", out);
    Ok(())
}
