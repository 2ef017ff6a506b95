use crate::infra::sample_store;
use clap::Args;
use relief_match::config::AppConfig;
use relief_match::error::AppError;
use relief_match::workflows::matching::seed::load_seed_dir;
use relief_match::workflows::matching::{
    auto_match_types, AutoMatchSummary, MatchPolicy, MemoryReliefStore, ReliefMatchService,
    RequestId, ZipCodeBaseClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Directory of CSV seed files. Defaults to a built-in sample scenario.
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
    /// Request to auto-match. Defaults to 100 from the sample scenario.
    #[arg(long)]
    pub(crate) request_id: Option<u64>,
    /// Run a single policy instead of comparing all of them.
    #[arg(long)]
    pub(crate) policy: Option<String>,
    /// admin, pledges, or auto
    #[arg(long)]
    pub(crate) inventory_priority: Option<String>,
    /// Print each summary as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        seed_dir,
        request_id,
        policy,
        inventory_priority,
        json,
    } = args;

    let config = AppConfig::load()?;
    let request_id = RequestId(request_id.unwrap_or(100));
    let policies: Vec<String> = match policy {
        Some(policy) => vec![policy],
        None => MatchPolicy::ALL
            .iter()
            .map(|policy| policy.label().to_string())
            .collect(),
    };

    println!("Relief auto-match demo");
    println!("Available policies:");
    for entry in auto_match_types() {
        println!(
            "  - {} (type {}): {}",
            entry.name, entry.match_type_id, entry.description
        );
    }

    for policy in policies {
        // Each policy runs against fresh supply so the results are comparable.
        let store = Arc::new(demo_store(seed_dir.as_deref())?);
        let service = ReliefMatchService::new(
            store,
            Arc::new(ZipCodeBaseClient::new(config.distance.clone())),
            config.matching,
            config.distance.timeout,
        );

        println!("\nPolicy '{}' for request {}", policy, request_id);
        match service
            .perform_auto_match(request_id, Some(&policy), inventory_priority.as_deref())
            .await
        {
            Ok(summary) if json => match serde_json::to_string_pretty(&summary) {
                Ok(payload) => println!("{}", payload),
                Err(err) => println!("  Summary unavailable: {}", err),
            },
            Ok(summary) => render_summary(&summary),
            Err(err) => println!("  Auto-match failed: {}", err),
        }
    }

    Ok(())
}

fn demo_store(seed_dir: Option<&Path>) -> Result<MemoryReliefStore, AppError> {
    match seed_dir {
        Some(dir) => {
            let store = MemoryReliefStore::new();
            load_seed_dir(dir, &store)?;
            Ok(store)
        }
        None => sample_store(),
    }
}

fn render_summary(summary: &AutoMatchSummary) {
    if let Some(fallback) = &summary.ranking_fallback {
        println!("  Ranking fell back to fulfillment: {}", fallback.summary());
    }
    println!(
        "- {} matches | {} from admin stock | {} from pledges | {} still needed | request {}",
        summary.matches_created,
        summary.quantity_assigned_by_source.admin,
        summary.quantity_assigned_by_source.pledges,
        summary.quantity_remaining,
        summary.status.label()
    );
    if summary.stale_sources > 0 {
        println!(
            "  {} planned sources changed before commit and were re-planned",
            summary.stale_sources
        );
    }
    for record in &summary.matches {
        let source = match record.pledge_id {
            Some(pledge_id) => format!("pledge {}", pledge_id),
            None => "admin inventory".to_string(),
        };
        println!(
            "    - match {}: {} units from {}",
            record.id, record.match_quantity, source
        );
    }
}
