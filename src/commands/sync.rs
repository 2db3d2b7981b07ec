//! Implementation of the `baton sync` command.

use super::{connect, print_json, resolve_base, resolve_repo};
use crate::best_effort::SkippedStep;
use crate::cli::SyncArgs;
use crate::config::{Config, MergeStrategy};
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, Journal};
use crate::exit_codes;
use crate::sync::{ManagedRules, SyncOptions, SyncResult, sync};
use crate::working_copy::LocalWorkingCopy;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
struct SyncReport {
    #[serde(flatten)]
    result: SyncResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<SkippedStep>,
}

pub fn cmd_sync(args: SyncArgs, config: &Config) -> Result<i32> {
    let copy = args
        .local
        .as_deref()
        .map(|path| LocalWorkingCopy::open(path, &config.remote))
        .transpose()?;

    let slug = resolve_repo(args.repo.as_deref(), copy.as_ref())?;
    let base = resolve_base(args.base.as_deref(), config);
    let options = SyncOptions {
        merge: args.merge,
        pull_local: args.pull,
        strategy: resolve_strategy(args.strategy.as_deref(), config)?,
    };

    let (client, _token) = connect(config, &slug)?;
    let rules = ManagedRules::from_config(config);

    let result = sync(&client, &base, options, &rules, copy.as_ref())?;

    let journal = Journal::in_dir(&config.state_dir());
    let skipped = journal_sync(&journal, &result);

    let code = if result.is_partial() {
        exit_codes::PARTIAL
    } else {
        exit_codes::SUCCESS
    };
    print_json(&SyncReport { result, skipped })?;
    Ok(code)
}

/// `--strategy` wins over the configured merge strategy.
fn resolve_strategy(explicit: Option<&str>, config: &Config) -> Result<MergeStrategy> {
    match explicit {
        None => Ok(config.merge_strategy),
        Some(raw) => MergeStrategy::from_str(raw.trim()).ok_or_else(|| {
            BatonError::UserError(format!(
                "unknown merge strategy '{}' (expected merge, squash or rebase)",
                raw
            ))
        }),
    }
}

/// One `merge` event per attempted merge, then a `sync` summary.
fn journal_sync(journal: &Journal, result: &SyncResult) -> Vec<SkippedStep> {
    let mut events = Vec::new();
    for number in &result.merged {
        events.push(Event::new(EventAction::Merge).with_details(json!({
            "number": number,
            "merged": true,
            "strategy": result.strategy,
        })));
    }
    for failure in &result.failed {
        events.push(Event::new(EventAction::Merge).with_details(json!({
            "number": failure.number,
            "merged": false,
            "kind": failure.kind,
            "reason": failure.reason,
        })));
    }
    events.push(Event::new(EventAction::Sync).with_details(json!({
        "base": result.base,
        "candidates": result.candidates,
        "merged": result.merged.len(),
        "failed": result.failed.len(),
        "local_update": result.local_update,
    })));

    events
        .iter()
        .filter_map(|event| journal.record(event))
        .collect()
}
