use std::io::{self, Write};

use clap::Parser;
use rocket_db_pools::sqlx::postgres::PgPoolOptions;

use board_api::auth::AuthError;
use board_api::auth::credentials::{CredentialStore, Identity, PgCredentialStore};
use board_api::auth::passwords::{PasswordService, password_policy_violation};

#[derive(Parser, Debug)]
#[command(
    name = "create_admin",
    about = "Provision the first administrator account so that others can be registered through the API"
)]
struct Args {
    /// Login id for the administrator.
    #[arg(long)]
    id: String,

    /// Plaintext password to hash and store.
    #[arg(long)]
    password: String,

    /// Display name embedded in issued tokens.
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let id = args.id.trim();

    if id.is_empty() {
        writeln!(io::stderr(), "error: id must not be empty")?;
        std::process::exit(1);
    }

    if let Some(violation) = password_policy_violation(&args.password) {
        writeln!(io::stderr(), "error: {violation}")?;
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let password_service = PasswordService::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| io::Error::other(format!("password hash failed: {err}")))?;

    let identity = Identity {
        id: id.to_string(),
        secret_hash: password_hash,
        display_name: args.name.trim().to_string(),
        email: args.email,
        phone: args.phone,
    };

    match PgCredentialStore::new(pool).insert_identity(&identity).await {
        Ok(()) => {}
        Err(AuthError::IdentityExists(_)) => {
            writeln!(io::stderr(), "error: an admin with id '{id}' already exists.")?;
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    }

    println!("Created admin '{id}'");
    Ok(())
}
