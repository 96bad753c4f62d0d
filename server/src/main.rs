use clap::ArgAction;
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use log::warn;
use std::path::PathBuf;
use std::process::exit;

fn main() {
    let args = CliArgs::parse();
    let dotenv_result = dotenv();

    let env = env_logger::Env::new().filter_or(
        "RUST_LOG",
        match args.global_opts.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    );
    env_logger::Builder::from_env(env).init();
    if dotenv_result.is_err() {
        warn!("Could not read .env file: {}", dotenv_result.unwrap_err());
    }

    let result = match args.command {
        Command::Serve => portal_server::web::serve(),
        Command::Migrate => portal_server::cli::database_migration::run_migrations(),
        Command::AddUser => portal_server::cli::manage_users::add_user(),
        Command::CreateToken { username } => {
            portal_server::cli::manage_users::create_token(&username)
        }
        Command::Positions => portal_server::cli::manage_positions::print_position_list(),
        Command::AddPosition => portal_server::cli::manage_positions::add_position(),
        Command::Appoint => portal_server::cli::manage_positions::add_appointment(),
        Command::AddDocument { path } => portal_server::cli::manage_documents::add_document(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        exit(e.exit_code());
    }
}

/// University portal web application and administration tool
#[derive(Debug, Parser)]
#[clap(name = "portal-server", version)]
pub struct CliArgs {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the portal web application
    Serve,
    /// Migrate the database schema to the latest version
    Migrate,
    /// Create a new user account (interactive)
    AddUser,
    /// Create (or show the existing) API token for a user
    CreateToken {
        /// The username of the account the token belongs to
        username: String,
    },
    /// List student government positions and their current appointees
    Positions,
    /// Create a new student government position (interactive)
    AddPosition,
    /// Appoint a person to a position (interactive)
    Appoint,
    /// Upload a document into the date-partitioned media store (interactive metadata)
    AddDocument {
        /// The path of the document file to upload
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// Verbosity level (can be specified multiple times)
    #[clap(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,
}
