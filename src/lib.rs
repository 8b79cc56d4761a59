//! Wavelength estimation from filter transmittances.
//!
//! Loads transmittance tables, trains (or restores) a one-hidden-layer
//! classifier with Burn and writes the estimated wavelength of every test
//! sample next to its true value.

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod training;

use anyhow::{Context, Result};
use burn::{
    backend::{Autodiff, NdArray, ndarray::NdArrayDevice},
    module::AutodiffModule,
    tensor::backend::AutodiffBackend,
};
use tracing::info;

use checkpoint::SnapshotStore;
use config::{ComputeDevice, Mode, RunConfig};
use data::WavelengthData;
use training::{EpochReport, Evaluation};

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One entry per trained epoch; empty in eval mode
    pub history: Vec<EpochReport>,
    /// Final pass over the test set
    pub evaluation: Evaluation,
    /// `(true, predicted)` wavelength per test sample, in test order
    pub estimates: Vec<(i64, i64)>,
}

/// Runs training and/or evaluation as configured and writes the estimation table.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    match config.device {
        ComputeDevice::Cpu => run_on::<Autodiff<NdArray>>(config, &NdArrayDevice::Cpu),
        ComputeDevice::Gpu => run_accelerated(config),
    }
}

// `WgpuDevice::default()` picks the first adapter and panics when none exists.
#[cfg(feature = "wgpu")]
fn run_accelerated(config: &RunConfig) -> Result<RunSummary> {
    use burn::backend::{Wgpu, wgpu::WgpuDevice};
    run_on::<Autodiff<Wgpu>>(config, &WgpuDevice::default())
}

#[cfg(not(feature = "wgpu"))]
fn run_accelerated(config: &RunConfig) -> Result<RunSummary> {
    tracing::warn!("built without the `wgpu` feature, running on CPU");
    run_on::<Autodiff<NdArray>>(config, &NdArrayDevice::Cpu)
}

fn run_on<B: AutodiffBackend>(config: &RunConfig, device: &B::Device) -> Result<RunSummary> {
    info!("Processor is {device:?}");
    let params = &config.training;

    let data = WavelengthData::load(&config.data, params.model.inputs, params.model.classes)
        .context("loading input tables")?;
    let store = SnapshotStore::new(&config.snapshot_dir, params.epoch_num);

    let (model, history) = match config.mode {
        Mode::Train { resume } => {
            info!("Training...");
            let (model, history) = training::train::<B>(params, &data, &store, resume, device)?;
            (model.valid(), history)
        }
        Mode::Eval => {
            info!("Testing...");
            let model = training::restore_for_eval::<B>(params, &store, device)
                .with_context(|| format!("restoring snapshot from {}", store.dir().display()))?;
            (model, Vec::new())
        }
    };

    let evaluation = training::evaluate(&model, &data.test, device);
    let estimates: Vec<(i64, i64)> = data
        .test
        .labels
        .iter()
        .zip(&evaluation.predictions)
        .map(|(&truth, &pred)| (data.wavelength(truth), data.wavelength(pred)))
        .collect();

    report::write_estimates(&config.output, &estimates)
        .with_context(|| format!("writing {}", config.output.display()))?;
    info!(
        "Test_Acc : {:.2} | elapsed time (sec) : {:.3}",
        evaluation.accuracy * 100.0,
        evaluation.elapsed.as_secs_f64()
    );

    Ok(RunSummary {
        history,
        evaluation,
        estimates,
    })
}
