mod config;
mod error;

use std::path::{Path, PathBuf};

use audit::{AuditEntry, AuditStore, AuditWriter};
use authz::{CapabilityRegistry, CapabilityResolver, Engine};
use chrono::{Duration, Local, TimeZone, Utc};
use clap::{Parser, Subcommand};
use directory::{DirectoryStore, UserId, ZoneId};

use config::Config;
use error::{Error, Result};

const DIRECTORY_DB: &str = "directory.db";
const AUDIT_DB: &str = "audit.db";

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Zone-scoped authorization and audit core", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding directory.db and audit.db
    #[arg(long, global = true, default_value = ".warden")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and load zones, users, memberships, and grants
    Seed {
        /// Seed configuration file
        #[arg(short, long, default_value = "warden.toml")]
        config: PathBuf,
    },
    /// Dry-run an authorization check (denials are audited, like a real caller)
    Check {
        /// Acting user id
        #[arg(long)]
        user: String,
        /// Action verb (create, update, assign, ...)
        #[arg(long)]
        action: String,
        /// Entity type (lead, pipeline, meeting, ...)
        #[arg(long)]
        entity_type: String,
        /// Zone the entity lives in
        #[arg(long)]
        zone: String,
    },
    /// Compliance report of denied attempts
    Denials {
        /// Look back this many days
        #[arg(long, default_value = "7")]
        days: i64,
        /// Show at most this many entries
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Audit history for one entity, user, or zone
    Logs {
        /// Entity type (requires --entity-id)
        #[arg(long)]
        entity_type: Option<String>,
        /// Entity id (requires --entity-type)
        #[arg(long)]
        entity_id: Option<String>,
        /// Acting user id
        #[arg(long)]
        user: Option<String>,
        /// Zone id
        #[arg(long)]
        zone: Option<String>,
        /// Show at most this many entries
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { config } => cmd_seed(&cli.data_dir, &config),
        Commands::Check {
            user,
            action,
            entity_type,
            zone,
        } => cmd_check(&cli.data_dir, &user, &action, &entity_type, &zone).await,
        Commands::Denials { days, limit } => cmd_denials(&cli.data_dir, days, limit),
        Commands::Logs {
            entity_type,
            entity_id,
            user,
            zone,
            limit,
        } => cmd_logs(&cli.data_dir, entity_type, entity_id, user, zone, limit),
    }
}

fn cmd_seed(data_dir: &Path, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;

    std::fs::create_dir_all(data_dir)?;
    let store = DirectoryStore::open(data_dir.join(DIRECTORY_DB))?;
    // Audit schema is created up front so reports work before any writes.
    AuditStore::open(data_dir.join(AUDIT_DB))?;

    let summary = config.apply(&store)?;

    println!("Seeded {}", data_dir.join(DIRECTORY_DB).display());
    for (code, id) in &summary.zones {
        println!("  zone {code} = {id}");
    }
    for (name, id) in &summary.users {
        println!("  user {name} = {id}");
    }
    println!(
        "  {} membership(s), {} grant(s)",
        summary.memberships, summary.grants
    );
    Ok(())
}

async fn cmd_check(
    data_dir: &Path,
    user: &str,
    action: &str,
    entity_type: &str,
    zone: &str,
) -> Result<()> {
    let user_id: UserId = parse_id(user)?;
    let zone_id: ZoneId = parse_id(zone)?;

    let store = open_directory(data_dir)?;
    let resolver = CapabilityResolver::new(&store);
    let registry = CapabilityRegistry::load(&store)?;
    let engine = Engine::new(&store, &resolver).with_registry(&registry);

    let decision = engine.can_perform_action(user_id, action, entity_type, zone_id);

    match decision.deny_reason() {
        None => println!("ALLOW {entity_type}.{action} in zone {zone_id}"),
        Some(reason) => {
            // Same contract as a real caller: the denial is enqueued
            // before we report the outcome.
            let writer = AuditWriter::spawn(AuditStore::open(data_dir.join(AUDIT_DB))?);
            writer.handle().log_denial(
                zone_id,
                user_id,
                &reason.to_string(),
                entity_type,
                "-",
                None,
                None,
            );
            writer.shutdown().await;
            println!("DENY ({}): {reason}", reason.code());
        }
    }
    Ok(())
}

fn cmd_denials(data_dir: &Path, days: i64, limit: usize) -> Result<()> {
    let store = AuditStore::open(data_dir.join(AUDIT_DB))?;
    let now = Utc::now();
    let denials = store.access_denials(now - Duration::days(days), now, limit);

    if denials.is_empty() {
        println!("No denials in the last {days} day(s).");
        return Ok(());
    }

    println!("{:<20}  {:<36}  {:<12}  REASON", "WHEN", "USER", "ENTITY");
    println!("{}", "-".repeat(100));
    for entry in denials {
        print_entry(&entry);
    }
    Ok(())
}

fn cmd_logs(
    data_dir: &Path,
    entity_type: Option<String>,
    entity_id: Option<String>,
    user: Option<String>,
    zone: Option<String>,
    limit: usize,
) -> Result<()> {
    let store = AuditStore::open(data_dir.join(AUDIT_DB))?;

    let entries = match (entity_type, entity_id, user, zone) {
        (Some(entity_type), Some(entity_id), None, None) => {
            store.entity_logs(&entity_type, &entity_id, limit)
        }
        (None, None, Some(user), None) => store.user_actions(parse_id(&user)?, limit),
        (None, None, None, Some(zone)) => store.zone_logs(parse_id(&zone)?, limit),
        _ => return Err(Error::AmbiguousFilter),
    };

    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    println!("{:<20}  {:<36}  {:<12}  ACTION", "WHEN", "USER", "ENTITY");
    println!("{}", "-".repeat(100));
    for entry in entries {
        print_entry(&entry);
    }
    Ok(())
}

fn print_entry(entry: &AuditEntry) {
    let when = Local
        .from_utc_datetime(&entry.created_at.naive_utc())
        .format("%Y-%m-%d %H:%M:%S");
    let entity = format!("{}/{}", entry.entity_type, entry.entity_id);

    let detail = if entry.is_denial() {
        entry
            .new_value
            .as_ref()
            .and_then(|v| v.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("denied")
            .to_string()
    } else {
        entry.action.clone()
    };
    println!("{when:<20}  {:<36}  {entity:<12}  {detail}", entry.user_id);
}

fn parse_id<T: std::str::FromStr>(value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::InvalidId(value.to_string()))
}

fn open_directory(data_dir: &Path) -> Result<DirectoryStore> {
    let path = data_dir.join(DIRECTORY_DB);
    if !path.exists() {
        return Err(Error::DirectoryNotFound { path });
    }
    Ok(DirectoryStore::open(path)?)
}
