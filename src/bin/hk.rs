use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use holiday_keeper::config::{ProviderConfig, SyncConfig};
use holiday_keeper::database_ops::db::Db;
use holiday_keeper::database_ops::memory::MemoryHolidayStore;
use holiday_keeper::database_ops::nager::NagerProvider;
use holiday_keeper::database_ops::pg_store::PgHolidayStore;
use holiday_keeper::database_ops::store::{HolidayStore, SharedStore};
use holiday_keeper::model::HolidayType;
use holiday_keeper::search::SearchQuery;
use holiday_keeper::sync::HolidayService;
use holiday_keeper::telemetry;
use holiday_keeper::util::env;

#[derive(Parser, Debug)]
#[command(name = "hk", version, about = "holiday-keeper admin CLI")]
struct Cli {
    /// Optional override for the database URL
    #[arg(long, global = true)]
    db_url: Option<String>,
    /// Run against an in-memory store seeded from the provider; nothing is persisted
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Synchronise every stored country for an inclusive year range
    SyncRange { start_year: i32, end_year: i32 },
    /// Synchronise the most recent N years (current year included)
    SyncRecent {
        #[arg(long, default_value_t = 2)]
        years: u32,
    },
    /// Re-fetch and reconcile one country/year
    Refresh { country_code: String, year: i32 },
    /// Delete every holiday of one country/year
    Delete { country_code: String, year: i32 },
    /// Paginated holiday search
    Search {
        country_code: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        /// Comma-separated type filter (e.g. PUBLIC,SCHOOL)
        #[arg(long, value_delimiter = ',')]
        types: Vec<HolidayType>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
    },
    /// Replace the stored country list with the provider's
    SyncCountries,
    /// Print country and holiday row counts
    Counts,
}

#[derive(Serialize)]
struct Counts {
    countries: i64,
    holidays: i64,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_store(cli: &Cli) -> Result<SharedStore> {
    if cli.dry_run {
        info!("dry run: using in-memory store");
        return Ok(Arc::new(MemoryHolidayStore::new()));
    }
    let url = match &cli.db_url {
        Some(u) => u.clone(),
        None => env::db_url()?,
    };
    let max_connections: u32 = env::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&url, max_connections, env::env_flag("AUTO_MIGRATE", false)).await?;
    Ok(Arc::new(PgHolidayStore::new(db)))
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    telemetry::init_tracing("warn,holiday_keeper=info")?;
    let cli = Cli::parse();

    let store = open_store(&cli).await?;
    let provider = NagerProvider::new(&ProviderConfig::from_env()).context("building provider client")?;
    let service = HolidayService::new(store.clone(), Arc::new(provider), SyncConfig::from_env());

    let needs_countries = !matches!(cli.command, Commands::SyncCountries | Commands::Counts);
    if cli.dry_run && needs_countries {
        let n = service.sync_countries().await?;
        info!(countries = n, "dry run: loaded country list");
    }

    match cli.command {
        Commands::SyncRange {
            start_year,
            end_year,
        } => print_json(&service.sync_range(start_year, end_year).await)?,
        Commands::SyncRecent { years } => print_json(&service.sync_recent_years(years).await)?,
        Commands::Refresh { country_code, year } => {
            let code = country_code.to_ascii_uppercase();
            print_json(&service.reconcile_one(&code, year).await?)?
        }
        Commands::Delete { country_code, year } => {
            let code = country_code.to_ascii_uppercase();
            let deleted = service.delete_scope(&code, year).await?;
            print_json(&serde_json::json!({ "country_code": code, "year": year, "deleted_count": deleted }))?
        }
        Commands::Search {
            country_code,
            start_date,
            end_date,
            types,
            page,
            size,
        } => {
            let query = SearchQuery {
                types,
                page,
                size,
                ..SearchQuery::new(country_code.to_ascii_uppercase(), start_date, end_date)
            };
            print_json(&service.search(&query).await?)?
        }
        Commands::SyncCountries => {
            let n = service.sync_countries().await?;
            print_json(&serde_json::json!({ "country_count": n }))?
        }
        Commands::Counts => print_json(&Counts {
            countries: store.count_countries().await?,
            holidays: store.count_all().await?,
        })?,
    }
    Ok(())
}
