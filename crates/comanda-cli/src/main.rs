mod export;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use comanda_core::auth::{NewUser, User, hash_password, normalize_email, validate_registration};
use comanda_core::expense::ExpenseFilter;
use comanda_core::report::day_range;
use comanda_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "comanda", version, about = "Restaurant POS administration")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Create a restaurant account
    CreateUser {
        #[arg(long)]
        email: String,

        /// At least 8 characters
        #[arg(long, env = "COMANDA_USER_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        business_name: String,
    },

    /// Export a restaurant's records as CSV
    Export {
        #[arg(value_enum)]
        what: ExportKind,

        /// Account whose records are exported
        #[arg(long)]
        email: String,

        /// First day included (defaults to the start of the current month)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day included (defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete expired login sessions
    PurgeSessions,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Orders,
    Expenses,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("comanda=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = connect_db(cli.database_url.as_deref()).await?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
            tracing::info!("Migrations applied");
        }
        Commands::CreateUser {
            email,
            password,
            business_name,
        } => {
            db.migrate().await?;
            let user = cmd_create_user(&db, &email, &password, &business_name).await?;
            println!("Created {} ({})", user.email, user.id);
        }
        Commands::Export {
            what,
            email,
            from,
            to,
            output,
        } => {
            let today = Utc::now().date_naive();
            let from = match from {
                Some(from) => from,
                None => today
                    .with_day(1)
                    .context("Failed to compute the start of the month")?,
            };
            let to = to.unwrap_or(today);
            cmd_export(&db, what, &email, from, to, output.as_deref()).await?;
        }
        Commands::PurgeSessions => {
            let purged = db.user_repo().purge_expired_sessions().await?;
            println!("Removed {purged} expired sessions");
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using `--database-url` or `DATABASE_URL`.
async fn connect_db(url: Option<&str>) -> Result<Database> {
    let config = match url {
        Some(url) => DatabaseConfig::new(url),
        None => DatabaseConfig::from_env()?,
    };
    Database::connect(&config)
        .await
        .context("Failed to connect to database")
}

async fn cmd_create_user(
    db: &Database,
    email: &str,
    password: &str,
    business_name: &str,
) -> Result<User> {
    let email = normalize_email(email);
    validate_registration(&email, password, business_name)?;

    let user = db
        .user_repo()
        .create(&NewUser {
            email,
            password_hash: hash_password(password)?,
            business_name: business_name.trim().to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "User created");
    Ok(user)
}

async fn cmd_export(
    db: &Database,
    what: ExportKind,
    email: &str,
    from: NaiveDate,
    to: NaiveDate,
    output: Option<&Path>,
) -> Result<()> {
    let Some(user) = db.user_repo().find_by_email(&normalize_email(email)).await? else {
        bail!("No account registered for {email}");
    };

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let written = match what {
        ExportKind::Orders => {
            let (start, end) = day_range(from, to)?;
            let orders = db.order_repo().export(user.id, start, end).await?;
            export::write_orders(writer, &orders)?
        }
        ExportKind::Expenses => {
            let filter = ExpenseFilter {
                from: Some(from),
                to: Some(to),
                ..Default::default()
            };
            let repo = db.expense_repo();
            let mut expenses = repo.list_expenses(user.id, &filter).await?;
            expenses.reverse();
            let suppliers = repo.list_suppliers(user.id).await?;
            export::write_expenses(writer, &expenses, &suppliers)?
        }
    };

    tracing::info!(rows = written, %from, %to, "Export complete");
    Ok(())
}
