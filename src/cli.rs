use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use survey_standardize::config::PipelineConfig;
use survey_standardize::dependencies::{TransformKind, readers_of, upstream_inputs, writers_of};
use survey_standardize::io::{load_df, save_df};
use survey_standardize::pipeline::{PipelineContext, ProcessOptions, process_survey_with_report};
use survey_standardize::reference::Crosswalk;
use survey_standardize::schema;
use survey_standardize::storage::{BatchKey, BatchSink};
use survey_standardize::transforms::declarations;
use survey_standardize::validation::check_preprocessed_input;

#[derive(Parser)]
#[command(
    name = "survey-standardize",
    about = "Standardize transit on-board survey exports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline on a preprocessed Core table
    Process {
        /// Core table (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Route crosswalk CSV
        #[arg(long)]
        crosswalk: PathBuf,

        /// Pipeline configuration JSON. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where to write the Derived table (CSV or Parquet)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Label for log lines and the run summary
        #[arg(long)]
        survey_name: Option<String>,

        #[arg(long)]
        skip_geocoding: bool,

        /// Run without the validation gate (not recommended)
        #[arg(long)]
        skip_validation: bool,

        /// Root of the partitioned batch store
        #[arg(long, requires_all = ["operator", "year"])]
        partition_root: Option<PathBuf>,

        /// Operator partition, used with --partition-root
        #[arg(long)]
        operator: Option<String>,

        /// Survey year partition, used with --partition-root
        #[arg(long)]
        year: Option<i32>,
    },
    /// Check a Core table against the contract without running any stage
    Validate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Stages to leave out of the requirement check
        #[arg(long, value_delimiter = ',')]
        skip: Vec<TransformKind>,
    },
    /// Show which stages write and read a column, and the inputs it derives from
    Explain {
        column: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print every stage's column declarations as JSON
    Stages {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Process {
            input,
            crosswalk,
            config,
            output,
            survey_name,
            skip_geocoding,
            skip_validation,
            partition_root,
            operator,
            year,
        } => {
            let partition = match (partition_root, operator, year) {
                (Some(root), Some(operator), Some(year)) => {
                    Some((BatchSink::new(root), BatchKey::new(operator, year)))
                }
                _ => None,
            };
            let options = ProcessOptions {
                survey_name,
                skip_geocoding,
                skip_validation,
            };
            handle_process(
                &input,
                &crosswalk,
                config.as_deref(),
                output.as_deref(),
                partition,
                &options,
            )
        }
        Commands::Validate {
            input,
            config,
            skip,
        } => handle_validate(&input, config.as_deref(), &skip),
        Commands::Explain { column, config } => handle_explain(&column, config.as_deref()),
        Commands::Stages { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&declarations(&config))?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path).context("Failed to load pipeline config"),
        None => Ok(PipelineConfig::default()),
    }
}

fn handle_process(
    input: &Path,
    crosswalk_path: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    partition: Option<(BatchSink, BatchKey)>,
    options: &ProcessOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let crosswalk = Crosswalk::load(crosswalk_path).context("Failed to load route crosswalk")?;
    let core = load_df(input).context("Failed to load Core table")?;

    let ctx = PipelineContext::new(&config, &crosswalk);
    let (mut derived, report) = process_survey_with_report(core, &ctx, options)?;

    for warning in &report.validation_warnings {
        println!("warning: {warning}");
    }
    println!("{}", report.summary());

    if output.is_none() && partition.is_none() {
        tracing::warn!("No --output or --partition-root given; the Derived table was discarded");
    }
    if let Some(output) = output {
        save_df(&mut derived, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Derived table written to {}", output.display());
    }
    if let Some((sink, key)) = partition {
        let path = sink.write_batch(&mut derived, &key)?;
        println!("Batch stored at {}", path.display());
    }
    Ok(())
}

fn handle_validate(input: &Path, config_path: Option<&Path>, skip: &[TransformKind]) -> Result<()> {
    let config = load_config(config_path)?;
    let core = load_df(input).context("Failed to load Core table")?;
    let report = check_preprocessed_input(&core, &declarations(&config), skip)?;

    if report.is_empty() {
        println!("{} passed validation ({} rows)", input.display(), core.height());
        return Ok(());
    }
    println!("{report}");
    if report.has_errors() {
        anyhow::bail!("{} failed validation", input.display());
    }
    Ok(())
}

fn handle_explain(column: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let declarations = declarations(&config);

    let names = |kinds: Vec<TransformKind>| {
        if kinds.is_empty() {
            "-".to_owned()
        } else {
            kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        }
    };

    println!("{column}");
    match schema::field_kind(column) {
        Some(kind) => println!("  type:            {kind:?}"),
        None => println!("  type:            not part of the schema"),
    }
    println!("  written by:      {}", names(writers_of(&declarations, column)));
    println!("  read by:         {}", names(readers_of(&declarations, column)));

    let inputs = upstream_inputs(&declarations, column);
    if inputs.is_empty() {
        println!("  derived from:    -");
    } else {
        println!("  derived from:    {}", inputs.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_validate_parses_skip_list() {
        let cli = Cli::try_parse_from([
            "survey-standardize",
            "validate",
            "--input",
            "core.csv",
            "--skip",
            "geocoding,tour_purpose",
        ])
        .expect("arguments should parse");
        let Commands::Validate { skip, .. } = cli.command else {
            panic!("expected the validate command");
        };
        assert_eq!(skip, vec![TransformKind::Geocoding, TransformKind::TourPurpose]);
    }

    #[test]
    fn test_partition_root_needs_operator_and_year() {
        let result = Cli::try_parse_from([
            "survey-standardize",
            "process",
            "--input",
            "core.csv",
            "--crosswalk",
            "crosswalk.csv",
            "--partition-root",
            "store",
        ]);
        assert!(result.is_err());
    }
}
