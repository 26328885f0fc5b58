//! CLI command implementations for the emulation lab

use crate::config::{ExperimentConfig, LabConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tokio::signal;
use tokio::task::JoinHandle;
use topology::{initial_pathloss, NemEntry, TopologyGraph};
use tracing::info;
use workload::{
    DistributionSampler, EventRunSummary, InstantPacer, LinkEventScheduler, LogSink,
    MulticastPublisher, RealTimePacer, ScheduleError, StopSignal, TrafficPlan,
    TrafficScheduleGenerator,
};

// Random streams derived from the configured seed
const STREAM_LINK_UPDATE: u64 = 0;
const STREAM_LINK_PICKS: u64 = 1;
const STREAM_TRAFFIC: u64 = 2;

pub const SCENARIO_FILE_NAME: &str = "scenario.eel";

fn load_graph(config: &LabConfig) -> Result<TopologyGraph> {
    TopologyGraph::load(&config.topology_file).with_context(|| {
        format!(
            "Failed to load topology {}",
            config.topology_file.display()
        )
    })
}

/// Implementation of the 'topology' command - prints the built graph
pub async fn cmd_topology(config: &LabConfig, json: bool) -> Result<()> {
    let graph = load_graph(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }

    println!("Nodes:");
    println!(
        "  {:<5} {:<4} {:<20} {:<8} {:<15} {}",
        "INDEX", "NEM", "NAME", "AS", "ADDRESS", "DOMAIN"
    );
    for node in graph.nodes_by_index() {
        println!(
            "  {:<5} {:<4} {:<20} {:<8} {:<15} {}{}",
            node.index,
            node.nem_id(),
            node.name,
            node.as_number,
            node.platform_address().to_string(),
            node.domain,
            if node.is_border { " (border)" } else { "" }
        );
    }

    println!("\nLinks:");
    for link in graph.links() {
        println!(
            "  {:<4} {:<20} {:<18} {:<20} {:<18} {:?}",
            link.id,
            link.node1,
            format!("{}/{}", link.node1_ipv4, link.mask1),
            link.node2,
            format!("{}/{}", link.node2_ipv4, link.mask2),
            link.status
        );
    }

    Ok(())
}

/// Implementation of the 'scenario' command - prints the initial pathloss events
pub async fn cmd_scenario(config: &LabConfig) -> Result<()> {
    let graph = load_graph(config)?;
    print!("{}", initial_pathloss(&graph));
    Ok(())
}

/// Implementation of the 'traffic' command - writes per-node schedule files
pub async fn cmd_traffic(config: &LabConfig) -> Result<()> {
    let graph = load_graph(config)?;
    let experiment = config.experiment()?;
    let plan = write_traffic(config, experiment, &graph.registry())?;

    println!(
        "Wrote {} flows for {} nodes to {}",
        plan.flow_count(),
        plan.schedules.len(),
        config.output_dir.display()
    );
    Ok(())
}

/// Implementation of the 'events' command - runs the paced link event scheduler
pub async fn cmd_events(config: &LabConfig, dry_run: bool) -> Result<()> {
    let graph = load_graph(config)?;
    let experiment = config.experiment()?;
    let summary = run_link_events(config, experiment, graph.registry(), dry_run).await?;
    report(&summary);
    Ok(())
}

/// Implementation of the 'run' command - traffic schedules, then link events
pub async fn cmd_run(config: &LabConfig, dry_run: bool) -> Result<()> {
    let experiment = config.experiment()?;
    if !experiment.enabled {
        info!("Experiment is disabled, nothing to run");
        return Ok(());
    }

    let graph = load_graph(config)?;
    let registry = graph.registry();

    let scenario = write_scenario(config, &graph)?;
    info!("Initial pathloss scenario written to {}", scenario.display());

    let plan = write_traffic(config, experiment, &registry)?;
    info!("Traffic plan ready with {} flows", plan.flow_count());

    let summary = run_link_events(config, experiment, registry, dry_run).await?;
    report(&summary);
    Ok(())
}

fn report(summary: &EventRunSummary) {
    let outcome = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    println!(
        "Link events {}: {} epochs, {} updates",
        outcome, summary.epochs, summary.updates
    );
}

fn write_scenario(config: &LabConfig, graph: &TopologyGraph) -> Result<PathBuf> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let path = config.output_dir.join(SCENARIO_FILE_NAME);
    fs::write(&path, initial_pathloss(graph))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn write_traffic(
    config: &LabConfig,
    experiment: &ExperimentConfig,
    registry: &[NemEntry],
) -> Result<TrafficPlan> {
    let mut generator = TrafficScheduleGenerator::new(
        experiment.traffic()?.clone(),
        experiment.duration,
        config.rng_for(STREAM_TRAFFIC),
    )
    .context("Invalid traffic configuration")?;

    let plan = generator
        .generate(registry)
        .context("Traffic generation failed")?;
    plan.write_to_dir(&config.output_dir).with_context(|| {
        format!(
            "Failed to write schedules under {}",
            config.output_dir.display()
        )
    })?;
    Ok(plan)
}

/// Run the scheduler on a blocking thread until it finishes or Ctrl-C stops it
async fn run_link_events(
    config: &LabConfig,
    experiment: &ExperimentConfig,
    registry: Vec<NemEntry>,
    dry_run: bool,
) -> Result<EventRunSummary> {
    let sampler = DistributionSampler::with_rng(
        experiment.link_update()?,
        config.rng_for(STREAM_LINK_UPDATE),
    )
    .context("Invalid link_update distribution")?;
    let picks = config.rng_for(STREAM_LINK_PICKS);
    let stop = StopSignal::new();

    info!(
        "Running link events over {} nodes, {}s per epoch{}",
        registry.len(),
        experiment.duration,
        if dry_run { " (dry run)" } else { "" }
    );

    let mut task: JoinHandle<Result<EventRunSummary, ScheduleError>> = if dry_run {
        let mut scheduler = LinkEventScheduler::new(
            registry,
            sampler,
            experiment.duration,
            InstantPacer::new().with_stop(stop.clone()),
            LogSink::new(),
        )?
        .with_attenuation(experiment.attenuation)
        .with_rng(picks);
        tokio::task::spawn_blocking(move || scheduler.run())
    } else {
        let publisher = MulticastPublisher::connect(&config.event_service)
            .context("Failed to open event service socket")?;
        let mut scheduler = LinkEventScheduler::new(
            registry,
            sampler,
            experiment.duration,
            RealTimePacer::new(stop.clone()),
            publisher,
        )?
        .with_attenuation(experiment.attenuation)
        .with_rng(picks);
        tokio::task::spawn_blocking(move || scheduler.run())
    };

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = signal::ctrl_c() => {
            info!("Interrupted by user");
            stop.stop();
            task.await
        }
    };

    let summary = joined
        .context("Link event task failed")?
        .context("Link event scheduler failed")?;
    Ok(summary)
}
