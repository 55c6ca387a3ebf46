use dpsim::pipeline::scenario_path;
use dpsim::{Pipeline, RunConfig, RunContext};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::path::PathBuf;
use std::sync::Arc;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Generate,
    Simulate,
    Analyze,
    All,
}

#[derive(Parser, Debug)]
#[command(about = "Generate, integrate and analyse planetary-system disruption runs")]
struct Args {
    /// Scenario YAML, as a path or a name under `scenarios/`
    #[arg(short, long, default_value = "single_planet.yaml")]
    file_name: String,

    #[arg(long, value_enum, default_value_t = Stage::All)]
    stage: Stage,

    /// Overrides the run directory of the scenario
    #[arg(long)]
    directory: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// load here to keep main clean
fn load_config(args: &Args) -> Result<RunConfig> {
    let scenarios = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let config_path = scenario_path(&args.file_name, &scenarios);
    let mut config = RunConfig::from_yaml_file(&config_path)
        .with_context(|| format!("failed to load scenario {}", config_path.display()))?;
    if let Some(directory) = &args.directory {
        config.directory = directory.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(&args)?;
    let context = RunContext::with_listener(Box::new(|context: &RunContext| {
        debug!("{} {:.1}%", context.task().description, context.progress());
    }));
    let pipeline = Pipeline::with_context(config, Arc::new(context));

    let ok = match args.stage {
        Stage::Generate => pipeline.generate(),
        Stage::Simulate => pipeline.simulate(),
        Stage::Analyze => pipeline.analyze(),
        Stage::All => pipeline.run_all(),
    };
    if !ok {
        bail!("{:?} stage did not complete", args.stage);
    }
    Ok(())
}
