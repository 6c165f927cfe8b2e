use anyhow::Result;
use clap::{Parser, Subcommand};
use kitea_backend::api;
use kitea_backend::bootstrap;
use kitea_backend::config::KiteaConfig;
use kitea_backend::identity::UserService;
use kitea_backend::telemetry;
use kitea_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Kitea anonymous posting backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Issue a new anonymous user and print its credentials
    CreateUser,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = KiteaConfig::from_env()?;
    let resources = bootstrap::initialize(&config)?;
    tracing::info!(
        base = %config.paths.base.display(),
        database_initialized = resources.database_initialized,
        directories_created = resources.directories_created.len(),
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config, resources.database).await,
        Command::CreateUser => {
            let user = UserService::new(resources.database).create_user()?;
            println!("user #{}", user.user_count);
            println!("username: {}", user.username);
            println!("password: {}", user.password);
            Ok(())
        }
    }
}
