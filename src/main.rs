use std::path::PathBuf;

use anyhow::Result;
use burning_wavelength::config::{
    self, ComputeDevice, DEFAULT_OUTPUT, DEFAULT_SNAPSHOT_DIR, Mode, RunConfig,
};
use burning_wavelength::data::DataPaths;
use burning_wavelength::training::TrainingConfig;
use clap::{Args, Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(version, about = "Estimate wavelengths from filter transmittances")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the classifier, then write estimates for the test set
    Train {
        /// Continue from the stored snapshot instead of fresh parameters
        #[arg(long)]
        resume: bool,
        #[command(flatten)]
        common: Common,
    },
    /// Restore the stored snapshot and write estimates for the test set
    Eval {
        #[command(flatten)]
        common: Common,
    },
}

#[derive(Args)]
struct Common {
    #[arg(long, value_name = "PATH")]
    train_features: PathBuf,
    #[arg(long, value_name = "PATH")]
    train_labels: PathBuf,
    #[arg(long, value_name = "PATH")]
    test_features: PathBuf,
    #[arg(long, value_name = "PATH")]
    test_labels: PathBuf,
    #[arg(long, value_name = "DIR", default_value = DEFAULT_SNAPSHOT_DIR)]
    snapshot_dir: PathBuf,
    /// Estimation table (true, predicted wavelength per row)
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// `gpu` needs the `wgpu` build feature and a graphics adapter
    #[arg(long, value_enum, default_value_t = ComputeDevice::Cpu)]
    device: ComputeDevice,
    /// Training configuration JSON, e.g. the `config.json` of a previous run
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "INT")]
    epochs: Option<usize>,
    #[arg(long, value_name = "INT")]
    batch_size: Option<usize>,
    /// Hidden layer width
    #[arg(long, value_name = "INT")]
    hidden: Option<usize>,
    /// Number of distinct wavelengths
    #[arg(long, value_name = "INT")]
    classes: Option<usize>,
    #[arg(long, value_name = "FLOAT")]
    lr: Option<f64>,
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,
    #[arg(short, long)]
    verbose: bool,
}

impl Common {
    fn into_run_config(self, mode: Mode) -> Result<RunConfig> {
        let mut training = match &self.config {
            Some(path) => config::load_training_config(path)?,
            None => TrainingConfig::wavelength_defaults(),
        };
        if let Some(epochs) = self.epochs {
            training.epoch_num = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            training.batch_size = batch_size;
        }
        if let Some(hidden) = self.hidden {
            training.model.hidden = hidden;
        }
        if let Some(classes) = self.classes {
            training.model.classes = classes;
        }
        if let Some(lr) = self.lr {
            training.learning_rate = lr;
        }
        if let Some(seed) = self.seed {
            training.seed = seed;
        }

        let data = DataPaths {
            train_features: self.train_features,
            train_labels: self.train_labels,
            test_features: self.test_features,
            test_labels: self.test_labels,
        };
        let mut run = RunConfig::new(mode, data, training);
        run.device = self.device;
        run.snapshot_dir = self.snapshot_dir;
        run.output = self.output;
        Ok(run)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_max_level(level)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mode, common) = match cli.command {
        Command::Train { resume, common } => (Mode::Train { resume }, common),
        Command::Eval { common } => (Mode::Eval, common),
    };
    init_logging(common.verbose);

    let run = common.into_run_config(mode)?;
    burning_wavelength::run(&run)?;
    Ok(())
}
