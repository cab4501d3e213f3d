use anyhow::{Context, Result};
use clap::Parser;
use raster_regress::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum LayoutArg {
    Split,
    Combined,
}

impl From<LayoutArg> for ReportLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Split => ReportLayout::Split,
            LayoutArg::Combined => ReportLayout::Combined,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "raster-regress",
    version,
    about = "Render every catalogued scene and score the frames against reference images"
)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Suite to run (repeatable); all registered suites when omitted
    #[arg(long = "suite")]
    suites: Vec<String>,

    /// Additional TOML catalog of suites (repeatable)
    #[arg(long = "catalog")]
    catalogs: Vec<PathBuf>,

    /// Renderer executable
    #[arg(long)]
    renderer: Option<String>,

    /// Image comparison executable
    #[arg(long)]
    compare: Option<String>,

    /// Comparison metric passed to the comparator (e.g. SSIM, RMSE, AE)
    #[arg(long)]
    metric: Option<ComparisonMetric>,

    /// Maximum concurrently running test cases; 0 for no limit
    #[arg(long)]
    jobs: Option<usize>,

    /// Path of the JSON report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Report layout
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Directory the renderer runs in
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Kill renderer or comparator processes running longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the registered suites and exit
    #[arg(long)]
    list_suites: bool,
}

impl Args {
    fn into_config(self) -> Result<(HarnessConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => HarnessConfig::default(),
        };

        if !self.suites.is_empty() {
            config.suites = self.suites;
        }
        config.catalogs.extend(self.catalogs);
        if let Some(renderer) = self.renderer {
            config.renderer = renderer;
        }
        if let Some(compare) = self.compare {
            config.compare = compare;
        }
        if let Some(metric) = self.metric {
            config.metric = metric;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(report) = self.report {
            config.report_path = report;
        }
        if let Some(layout) = self.layout {
            config.report_layout = layout.into();
        }
        if let Some(work_dir) = self.work_dir {
            config.work_dir = work_dir;
        }
        if self.timeout.is_some() {
            config.process_timeout_secs = self.timeout;
        }

        config.validate()?;
        Ok((config, self.list_suites))
    }
}

async fn run(args: Args) -> Result<bool> {
    let (config, list_suites) = args.into_config()?;
    let registry = config.registry().context("building suite registry")?;

    if list_suites {
        for name in registry.names() {
            let cases = registry.get(name).map(TestSuite::len).unwrap_or_default();
            println!("{name} ({cases} cases)");
        }
        return Ok(true);
    }

    let suite = registry.select(&config.suites)?;
    let orchestrator = Orchestrator::new(config.clone());
    let RunOutcome { mut aggregate, .. } = orchestrator.run(&suite).await?;

    let report = aggregate.finalize(config.report_layout);
    report
        .write_to(&config.report_path)
        .with_context(|| format!("writing report {}", config.report_path.display()))?;

    info!(
        report = %config.report_path.display(),
        passes = aggregate.passes().len(),
        failures = aggregate.failures().len(),
        "report written"
    );
    if let Some(worst) = aggregate.least_similar_failure() {
        info!(
            input = %worst.input,
            output = %worst.output,
            score = ?worst.score,
            metric = %worst.metric,
            "least similar frame"
        );
    }

    Ok(aggregate.failures().is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            error!("{error:#}");
            ExitCode::from(2)
        }
    }
}
