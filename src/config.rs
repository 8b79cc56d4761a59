//! Run configuration: what to do, where the data lives and which device to use.

use std::path::PathBuf;

use burn::config::Config;

use crate::data::DataPaths;
use crate::error::{Error, Result};
use crate::training::TrainingConfig;

pub const DEFAULT_SNAPSHOT_DIR: &str = "./ckpt_nnT_1h_files";
pub const DEFAULT_OUTPUT: &str = "Estimation_by_MSELoss_T_1h.csv";

/// Top-level mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Train for `epoch_num` epochs, then evaluate. With `resume` the stored
    /// snapshot is loaded first; otherwise parameters start fresh.
    Train { resume: bool },
    /// Restore the stored snapshot and evaluate once.
    Eval,
}

/// Where tensors are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ComputeDevice {
    #[default]
    Cpu,
    /// Wgpu backend. Built without the `wgpu` feature this falls back to CPU;
    /// built with it, a graphics adapter must be present or device creation
    /// aborts the run.
    Gpu,
}

/// Everything the entry point needs.
pub struct RunConfig {
    pub mode: Mode,
    pub device: ComputeDevice,
    pub data: DataPaths,
    pub snapshot_dir: PathBuf,
    pub output: PathBuf,
    pub training: TrainingConfig,
}

impl RunConfig {
    pub fn new(mode: Mode, data: DataPaths, training: TrainingConfig) -> Self {
        Self {
            mode,
            device: ComputeDevice::default(),
            data,
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            output: PathBuf::from(DEFAULT_OUTPUT),
            training,
        }
    }

    /// Rejects values the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if t.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if t.model.inputs == 0 || t.model.hidden == 0 || t.model.classes == 0 {
            return Err(Error::InvalidConfig("layer sizes must be positive".into()));
        }
        if !(t.learning_rate.is_finite() && t.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate {} is not a positive number",
                t.learning_rate
            )));
        }
        Ok(())
    }
}

/// Loads a training configuration saved by a previous run (`config.json`).
pub fn load_training_config(path: &std::path::Path) -> Result<TrainingConfig> {
    TrainingConfig::load(path)
        .map_err(|e| Error::InvalidConfig(format!("{}: {e:?}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WaveClassifierConfig;
    use crate::training::adam;

    fn paths() -> DataPaths {
        DataPaths {
            train_features: "a".into(),
            train_labels: "b".into(),
            test_features: "c".into(),
            test_labels: "d".into(),
        }
    }

    #[test]
    fn defaults_match_wavelength_setup() {
        let run = RunConfig::new(Mode::Eval, paths(), TrainingConfig::wavelength_defaults());
        assert_eq!(run.training.batch_size, 5000);
        assert_eq!(run.training.epoch_num, 100000);
        assert_eq!(run.training.model.inputs, 11);
        assert_eq!(run.training.model.hidden, 100);
        assert_eq!(run.training.model.classes, 750);
        assert_eq!(run.training.learning_rate, 1e-5);
        assert_eq!(run.snapshot_dir, PathBuf::from(DEFAULT_SNAPSHOT_DIR));
        assert!(run.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let training = TrainingConfig::wavelength_defaults().with_batch_size(0);
        let run = RunConfig::new(Mode::Train { resume: false }, paths(), training);
        assert!(matches!(run.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn non_positive_learning_rate_is_invalid() {
        let training = TrainingConfig::new(WaveClassifierConfig::new(), adam())
            .with_learning_rate(-1.0);
        let run = RunConfig::new(Mode::Train { resume: false }, paths(), training);
        assert!(matches!(run.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn saved_training_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = TrainingConfig::new(WaveClassifierConfig::new().with_hidden(12), adam())
            .with_epoch_num(7);
        config.save(&path).unwrap();

        let loaded = load_training_config(&path).unwrap();
        assert_eq!(loaded.epoch_num, 7);
        assert_eq!(loaded.model.hidden, 12);
        assert_eq!(loaded.batch_size, 5000);
    }

    #[test]
    fn device_names_parse_from_the_command_line() {
        use clap::ValueEnum;
        assert_eq!(ComputeDevice::from_str("cpu", true), Ok(ComputeDevice::Cpu));
        assert_eq!(ComputeDevice::from_str("GPU", true), Ok(ComputeDevice::Gpu));
        assert!(ComputeDevice::from_str("tpu", true).is_err());
    }
}
