use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use resilience_engine::clock::saturating_sub;
use resilience_engine::persistence::{JsonFileStore, PersistedState, StateStore};

#[derive(Parser)]
#[command(name = "state-cli")]
#[command(about = "Inspect the resilience engine's persisted state file", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "resilience_state.json")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Entry counts and age of the snapshot
    Summary,
    /// List dead-lettered requests
    Dlq {
        /// Only show entries for this function
        #[arg(short, long)]
        function: Option<String>,
    },
    /// List cached fallback entries
    Cache,
    /// Drop cache entries older than the TTL and exhausted dead letters
    Prune {
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let store = JsonFileStore::new(&cli.path);

    let Some(mut state) = store.load()? else {
        eprintln!("No state file at {}", cli.path.display());
        return Ok(());
    };

    match cli.command {
        Commands::Summary => {
            let mut by_function: BTreeMap<&str, usize> = BTreeMap::new();
            for entry in &state.dlq_entries {
                *by_function.entry(entry.function_name.as_str()).or_default() += 1;
            }
            let summary = json!({
                "version": state.version,
                "saved_at": state.saved_at,
                "age_secs": (Utc::now() - state.saved_at).num_seconds(),
                "dlq_entries": state.dlq_entries.len(),
                "dlq_by_function": by_function,
                "cache_entries": state.cache_entries.len(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Dlq { function } => {
            let entries: Vec<_> = state
                .dlq_entries
                .iter()
                .filter(|e| function.as_deref().is_none_or(|f| e.function_name == f))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Cache => {
            println!("{}", serde_json::to_string_pretty(&state.cache_entries)?);
        }
        Commands::Prune { ttl_secs } => {
            let (cache_dropped, dlq_dropped) = prune(&mut state, ttl_secs);
            store.save(&state)?;
            println!("Pruned {cache_dropped} cache entries and {dlq_dropped} dead letters");
        }
    }

    Ok(())
}

fn prune(state: &mut PersistedState, ttl_secs: u64) -> (usize, usize) {
    let now = Utc::now();
    let cutoff = saturating_sub(now, Duration::from_secs(ttl_secs));

    let cache_before = state.cache_entries.len();
    state.cache_entries.retain(|e| e.timestamp > cutoff);

    let dlq_before = state.dlq_entries.len();
    state.dlq_entries.retain(|e| !e.is_exhausted());

    state.saved_at = now;
    (
        cache_before - state.cache_entries.len(),
        dlq_before - state.dlq_entries.len(),
    )
}
