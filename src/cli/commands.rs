//! CLI command implementations
//!
//! Every command boots the search subsystem the way a host would:
//! load config, initialize (recovering if needed), do its work, shut down.
//! Output is one JSON object per command.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::config::SearchConfig;
use crate::engine::IndexError;
use crate::entity::{EntityStore, EntryRef, JsonEntityStore};
use crate::search::{IndexLifecycleManager, IndexOperation, SearchError};

use super::args::{Command, CommonArgs};
use super::errors::{CliError, CliResult};
use super::io::print_json;

/// Run a parsed command and print its result
pub fn run_command(command: Command) -> CliResult<()> {
    let output = execute(command)?;
    print_json(&output)
}

/// Run a parsed command and return its JSON result
pub fn execute(command: Command) -> CliResult<Value> {
    match command {
        Command::Status { common } => status(&common),
        Command::Rebuild { common, owner } => rebuild(&common, owner.as_deref()),
        Command::Search {
            common,
            query,
            owner,
            limit,
        } => search(&common, &query, owner.as_deref(), limit),
        Command::Reindex {
            common,
            entry_id,
            owner,
        } => reindex(&common, EntryRef::new(entry_id, owner)),
        Command::Remove {
            common,
            entry_id,
            owner,
        } => remove(&common, EntryRef::new(entry_id, owner)),
    }
}

fn load_config(path: &Path) -> CliResult<SearchConfig> {
    if !path.exists() {
        return Err(CliError::config_error(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    Ok(SearchConfig::load(path)?)
}

/// Load config, build the manager and run startup recovery to completion
fn boot(common: &CommonArgs) -> CliResult<IndexLifecycleManager> {
    let config = load_config(&common.config)?;
    if !config.search_enabled {
        return Err(CliError::search_disabled());
    }
    let entities: Arc<dyn EntityStore> = Arc::new(JsonEntityStore::new(&common.entries));
    let manager = IndexLifecycleManager::new(config, entities)?;
    manager.initialize()?;
    manager.wait_for_pending();
    info!(state = %manager.state(), "search index booted");
    Ok(manager)
}

fn query_failed(e: IndexError) -> CliError {
    SearchError::reader_unavailable("Failed to query index", e).into()
}

/// Shut down, returning `value` only if shutdown succeeded
fn finish(manager: IndexLifecycleManager, value: Value) -> CliResult<Value> {
    manager.shutdown()?;
    Ok(value)
}

/// Report lifecycle state and index statistics
pub fn status(common: &CommonArgs) -> CliResult<Value> {
    let manager = boot(common)?;
    let reader = manager.get_shared_reader()?;
    let metrics = manager.metrics();
    let value = json!({
        "state": manager.state().to_string(),
        "inconsistent_at_startup": manager.is_inconsistent_at_startup(),
        "location": manager.location(),
        "generation": reader.generation(),
        "documents": reader.num_docs(),
        "metrics": {
            "operations_executed": metrics.operations_executed,
            "operations_failed": metrics.operations_failed,
            "rebuilds": metrics.rebuilds,
            "flushes": metrics.flushes,
        },
    });
    drop(reader);
    finish(manager, value)
}

/// Rebuild one owner or the whole index
pub fn rebuild(common: &CommonArgs, owner: Option<&str>) -> CliResult<Value> {
    let manager = boot(common)?;
    manager.execute_now(IndexOperation::RebuildOwnerIndex(owner.map(str::to_string)))?;
    let reader = manager.get_shared_reader()?;
    let documents = match owner {
        Some(owner) => reader.owner_documents(owner).map_err(query_failed)?.len(),
        None => reader.num_docs(),
    };
    let value = json!({
        "rebuilt": owner.unwrap_or("*"),
        "documents": documents,
        "generation": reader.generation(),
    });
    drop(reader);
    finish(manager, value)
}

/// Query the index
pub fn search(
    common: &CommonArgs,
    query: &str,
    owner: Option<&str>,
    limit: usize,
) -> CliResult<Value> {
    let manager = boot(common)?;
    let reader = manager.get_shared_reader()?;
    let hits = match owner {
        Some(owner) => reader.search_owner(owner, query),
        None => reader.search(query),
    }
    .map_err(query_failed)?;
    let total = hits.len();
    let hits: Vec<Value> = hits
        .into_iter()
        .take(limit)
        .map(|doc| {
            json!({
                "entry_id": doc.entry_id,
                "owner": doc.owner,
                "title": doc.title,
                "published_at": doc.published_at.map(|t| t.to_rfc3339()),
            })
        })
        .collect();
    let value = json!({
        "query": query,
        "total": total,
        "hits": hits,
    });
    drop(reader);
    finish(manager, value)
}

/// Re-index one entry
pub fn reindex(common: &CommonArgs, entry: EntryRef) -> CliResult<Value> {
    let manager = boot(common)?;
    manager.execute_now(IndexOperation::ReindexEntry(entry.clone()))?;
    let indexed = manager
        .get_shared_reader()?
        .document(&entry.entry_id)
        .map_err(query_failed)?
        .is_some();
    let value = json!({
        "reindexed": entry.to_string(),
        "indexed": indexed,
    });
    finish(manager, value)
}

/// Remove one entry
pub fn remove(common: &CommonArgs, entry: EntryRef) -> CliResult<Value> {
    let manager = boot(common)?;
    manager.submit_remove(entry.clone())?;
    let value = json!({ "removed": entry.to_string() });
    finish(manager, value)
}
