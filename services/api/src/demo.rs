use crate::infra::{build_engine, LocalServices};
use clap::Args;
use deal_pipeline::config::AppConfig;
use deal_pipeline::error::AppError;
use deal_pipeline::workflows::deal_flow::{
    DealFlow, DealFlowEngine, PipelineError, PipelineStats, PropertyRecord,
};
use deal_pipeline::workflows::discovery::DiscoveryFeedImporter;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

const SAMPLE_FEED: &str = "\
Property ID,Address,List Price,Score,Deal Quality,Listing Type,Owner Financing,Lease To Own,First Time Buyer
MLS-2201,418 Walnut St,189000,91,excellent,foreclosure,yes,no,yes
MLS-2202,77 Harbor View Dr,329000,74,good,,no,yes,no
MLS-2203,1500 Ridge Rd,2450000,88,excellent,,no,no,no
MLS-2204,9 Quarry Ln,142000,38,poor,short sale,no,no,yes
MLS-2205,230 Aspen Ct,265000,62,fair,,no,no,no
";

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV discovery feed to submit
    pub(crate) path: PathBuf,
    /// Seconds to let auto-advancement run before printing results
    #[arg(long, default_value_t = 0)]
    pub(crate) settle_secs: u64,
    /// Override the delay before auto-advancement checks, in seconds
    #[arg(long)]
    pub(crate) auto_advance_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Delay before auto-advancement checks, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub(crate) auto_advance_ms: u64,
    /// Optional CSV discovery feed used instead of the built-in sample
    #[arg(long)]
    pub(crate) feed: Option<PathBuf>,
}

pub(crate) async fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(secs) = args.auto_advance_secs {
        config.pipeline.auto_advance_delay = Duration::from_secs(secs);
    }

    let records = DiscoveryFeedImporter::from_path(&args.path)?;
    let engine = build_engine(&config, &LocalServices::default())?;

    println!(
        "Importing {} record(s) from {}",
        records.len(),
        args.path.display()
    );
    submit_all(&engine, records).await?;

    if args.settle_secs > 0 {
        tokio::time::sleep(Duration::from_secs(args.settle_secs)).await;
    }

    render_flows(&engine)?;
    render_stats(&engine.pipeline_stats()?);
    engine.shutdown();
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        auto_advance_ms,
        feed,
    } = args;

    let mut config = AppConfig::load()?;
    config.pipeline.auto_advance_delay = Duration::from_millis(auto_advance_ms);

    let records = match feed {
        Some(path) => DiscoveryFeedImporter::from_path(path)?,
        None => DiscoveryFeedImporter::from_reader(Cursor::new(SAMPLE_FEED))?,
    };

    let services = LocalServices::default();
    let engine = build_engine(&config, &services)?;

    println!("Deal flow pipeline demo");
    println!(
        "Submitting {} discovered properties (auto-advance every {} ms)",
        records.len(),
        auto_advance_ms
    );
    submit_all(&engine, records).await?;

    // Enough checks for discovery -> qualification -> evaluation -> hot_lead.
    let settle = config.pipeline.auto_advance_delay * 4 + Duration::from_millis(250);
    tokio::time::sleep(settle).await;

    render_flows(&engine)?;
    render_stats(&engine.pipeline_stats()?);

    println!("\nCollaborator activity");
    println!("  Notifications sent: {}", services.notifications.sent().len());
    println!("  Watchlist entries:  {}", services.watchlist.len());
    println!("  Alerts scheduled:   {}", services.alerts.len());

    engine.shutdown();
    Ok(())
}

async fn submit_all(engine: &DealFlowEngine, records: Vec<PropertyRecord>) -> Result<(), AppError> {
    for record in records {
        let subject = record.id.clone();
        match engine.submit_new_record(record).await {
            Ok(flow_id) => println!("  {subject} -> {flow_id}"),
            Err(PipelineError::DuplicateSubject { existing, .. }) => {
                println!("  {subject} skipped: already tracked by {existing}");
            }
            Err(other) => return Err(other.into()),
        }
    }
    Ok(())
}

fn render_flows(engine: &DealFlowEngine) -> Result<(), AppError> {
    let mut flows = engine.list_active_flows()?;
    for stage in engine.catalog().stages() {
        if engine.catalog().is_terminal(&stage.id) {
            flows.extend(engine.list_flows_by_stage(&stage.id)?);
        }
    }

    println!("\nDeal flows");
    for flow in &flows {
        println!("  {}", describe_flow(flow));
    }
    Ok(())
}

fn describe_flow(flow: &DealFlow) -> String {
    let path = flow
        .stage_history
        .iter()
        .map(|entry| entry.stage.as_str())
        .collect::<Vec<_>>()
        .join(" -> ");
    let value = flow
        .estimated_value
        .map(|value| format!("${value:.0}"))
        .unwrap_or_else(|| "n/a".to_string());
    let quality = flow
        .deal_quality
        .map(|quality| quality.label())
        .unwrap_or("unrated");

    format!(
        "{} [{}] priority {:>3} | value {} | quality {} | {}",
        flow.id, flow.subject_id, flow.priority, value, quality, path
    )
}

fn render_stats(stats: &PipelineStats) {
    println!("\nPipeline stats");
    println!(
        "  Total flows: {} ({} active, {} in {})",
        stats.total_flows, stats.active_flows, stats.hot_leads, stats.hot_stage
    );
    for entry in stats.stage_counts.iter().filter(|entry| entry.count > 0) {
        println!("  {:<16} {}", entry.stage_name, entry.count);
    }
    for dwell in &stats.average_dwell_minutes {
        println!(
            "  avg dwell in {:<16} {:.2} min over {} exit(s)",
            dwell.stage.as_str(),
            dwell.average_minutes,
            dwell.samples
        );
    }
}
