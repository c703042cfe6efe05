use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use sosquery::{EngineConfig, ObservationMode, ObservationOffering, SosEngine, TemporalOperand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sosquery")]
#[command(about = "Query observation data through configured variables", long_about = None)]
struct Args {
    /// Engine configuration file
    #[arg(short, long, default_value = "sosquery.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List offering names
    Offerings,

    /// Describe one offering
    Offering { name: String },

    /// Load variables with positional parameters
    Load {
        /// Variable to load (repeatable)
        #[arg(long = "var", required = true)]
        variables: Vec<String>,

        /// Positional parameter (repeatable)
        #[arg(long = "param")]
        parameters: Vec<String>,
    },

    /// Filter observations
    Observations(ObservationArgs),
}

#[derive(clap::Args, Debug)]
struct ObservationArgs {
    /// Offering whose procedures are used when no --procedure is given
    #[arg(long)]
    offering: Option<String>,

    #[arg(long = "procedure")]
    procedures: Vec<String>,

    /// Simple observed property
    #[arg(long = "property")]
    properties: Vec<String>,

    /// Composite observed property
    #[arg(long = "composite-property")]
    composite_properties: Vec<String>,

    #[arg(long = "feature")]
    features: Vec<String>,

    /// Observations at this instant
    #[arg(long)]
    at: Option<String>,

    /// Observations beginning at or before this instant
    #[arg(long)]
    before: Option<String>,

    /// Observations beginning at or after, or still running at, this instant
    #[arg(long)]
    after: Option<String>,

    /// Observations overlapping a `begin/end` period
    #[arg(long)]
    during: Option<String>,

    /// Return result intervals of this procedure instead of identifiers
    #[arg(long = "results", value_name = "PROCEDURE")]
    results: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sosquery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let engine = SosEngine::open(config)?;

    let output = run(&engine, args.command);
    engine.close();

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

fn run(engine: &SosEngine, command: Command) -> anyhow::Result<serde_json::Value> {
    let provider = engine.provider();
    Ok(match command {
        Command::Offerings => serde_json::to_value(provider.offering_names()?)?,
        Command::Offering { name } => match provider.observation_offering(&name)? {
            Some(offering) => serde_json::to_value(offering)?,
            None => bail!("no offering named '{}'", name),
        },
        Command::Load {
            variables,
            parameters,
        } => {
            let variables: Vec<&str> = variables.iter().map(String::as_str).collect();
            serde_json::to_value(engine.executor().load_data(&variables, &parameters)?)?
        }
        Command::Observations(filter) => observations(engine, filter)?,
    })
}

fn observations(engine: &SosEngine, args: ObservationArgs) -> anyhow::Result<serde_json::Value> {
    let mut filter = engine.filter();
    match &args.results {
        Some(procedure) => filter.init_filter_get_result(procedure)?,
        None => filter.init_filter_observation(ObservationMode::Inline)?,
    }

    if !args.procedures.is_empty() || args.offering.is_some() {
        let offering = match &args.offering {
            Some(name) => engine
                .provider()
                .observation_offering(name)?
                .ok_or_else(|| anyhow!("no offering named '{}'", name))?,
            None => ObservationOffering::default(),
        };
        filter.set_procedure(&args.procedures, &offering)?;
    }
    if !args.properties.is_empty() || !args.composite_properties.is_empty() {
        filter.set_observed_properties(&args.properties, &args.composite_properties)?;
    }
    if !args.features.is_empty() {
        filter.set_feature_of_interest(&args.features)?;
    }
    if let Some(t) = args.at {
        filter.set_time_equals(&TemporalOperand::instant(t))?;
    }
    if let Some(t) = args.before {
        filter.set_time_before(&TemporalOperand::instant(t))?;
    }
    if let Some(t) = args.after {
        filter.set_time_after(&TemporalOperand::instant(t))?;
    }
    if let Some(period) = args.during {
        let (begin, end) = period
            .split_once('/')
            .ok_or_else(|| anyhow!("--during expects begin/end, got '{}'", period))?;
        filter.set_time_during(&TemporalOperand::period(begin, end))?;
    }

    Ok(match args.results {
        Some(_) => serde_json::to_value(filter.filter_result()?)?,
        None => serde_json::to_value(filter.filter_observation()?)?,
    })
}
