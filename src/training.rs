//! Training utilities for the wavelength classifier
//!
//! This module provides the fit/evaluate loop:
//! - Mini-batch training with Adam at a fixed learning rate
//! - Sum-of-squared-errors loss between the softmax head and one-hot targets
//! - Per-epoch test accuracy and snapshot overwrite
//! - Arg-max accuracy and prediction extraction for evaluation

use std::time::{Duration, Instant};

use burn::{
    config::Config,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        ElementConversion, Float, Int, Tensor,
        backend::{AutodiffBackend, Backend},
    },
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::checkpoint::SnapshotStore;
use crate::data::{Batcher, Split, WavelengthData};
use crate::error;
use crate::model::{WaveClassifier, WaveClassifierConfig};

/// Hyperparameters of a training run.
#[derive(Config)]
pub struct TrainingConfig {
    pub model: WaveClassifierConfig,
    pub optimizer: AdamConfig,
    #[config(default = 100000)]
    pub epoch_num: usize,
    #[config(default = 5000)]
    pub batch_size: usize,
    /// Fixed step size. Too large a value diverges; nothing adapts it.
    #[config(default = 1e-5)]
    pub learning_rate: f64,
    /// Seed for the per-epoch batch shuffle
    #[config(default = 42)]
    pub seed: u64,
}

impl TrainingConfig {
    /// Defaults for the 11-filter, 750-wavelength setup.
    pub fn wavelength_defaults() -> Self {
        Self::new(WaveClassifierConfig::new(), adam())
    }
}

/// Adam with the usual moment decays and a small epsilon.
pub fn adam() -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-8)
}

/// Summary of one training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// Wall time spent on the training batches
    pub elapsed: Duration,
    /// Total loss divided by the number of training samples
    pub train_loss: f64,
    /// Percentage of training samples predicted correctly during the epoch
    pub train_accuracy: f32,
    /// Percentage of test samples predicted correctly after the epoch
    pub test_accuracy: f32,
}

/// Predictions of a single pass over the test set.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Arg-max class index per test sample
    pub predictions: Vec<usize>,
    /// Fraction of predictions equal to the true class (0.0 to 1.0)
    pub accuracy: f32,
    pub elapsed: Duration,
}

/// Counts samples whose arg-max prediction equals the target class
///
/// # Arguments
/// * `outputs` - Model scores of shape [batch_size, num_classes]
/// * `targets` - True class indices of shape [batch_size]
pub fn correct_predictions<B: Backend>(
    outputs: Tensor<B, 2, Float>,
    targets: Tensor<B, 1, Int>,
) -> usize {
    let predictions: Tensor<B, 1, Int> = outputs.argmax(1).squeeze(1);
    let correct: i64 = predictions
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct as usize
}

/// Calculates classification accuracy
///
/// Compares predicted class indices with true labels and returns
/// the accuracy as a fraction (0.0 to 1.0).
///
/// # Example
/// ```ignore
/// let output = model.probabilities(x_test);
/// let accuracy = calculate_accuracy(output, y_test);
/// println!("Accuracy: {:.2}%", accuracy * 100.0);
/// ```
pub fn calculate_accuracy<B: Backend>(
    outputs: Tensor<B, 2, Float>,
    targets: Tensor<B, 1, Int>,
) -> f32 {
    let total = targets.dims()[0] as f32;
    correct_predictions(outputs, targets) as f32 / total
}

/// Runs the model once over `split` and extracts arg-max predictions.
pub fn evaluate<B: Backend>(
    model: &WaveClassifier<B>,
    split: &Split,
    device: &B::Device,
) -> Evaluation {
    let start = Instant::now();
    let output = model.probabilities(split.features.to_tensor::<B>(device));
    let predictions: Vec<usize> = output
        .argmax(1)
        .into_data()
        .iter::<i64>()
        .map(|class| class as usize)
        .collect();
    let elapsed = start.elapsed();

    let correct = predictions
        .iter()
        .zip(&split.labels)
        .filter(|(pred, truth)| pred == truth)
        .count();

    Evaluation {
        accuracy: correct as f32 / split.len() as f32,
        predictions,
        elapsed,
    }
}

/// Trains the wavelength classifier
///
/// Executes `config.epoch_num` epochs. Every epoch reshuffles the training
/// set, takes one Adam step per mini-batch, evaluates the test set on the
/// inner backend and then overwrites the snapshot in `store`.
///
/// # Arguments
/// * `config` - Model and optimizer hyperparameters
/// * `data` - Training and test splits
/// * `store` - Snapshot location, written after every epoch
/// * `resume` - Start from the stored snapshot instead of fresh parameters
/// * `device` - Device holding the model and every tensor
///
/// # Returns
/// * `Ok((WaveClassifier<B>, Vec<EpochReport>))` - Trained model and one report per epoch
/// * `Err(Error::MissingSnapshot)` - If `resume` is set and no snapshot exists
/// * `Err(Error::Diverged)` - If an epoch's loss is not finite; the previous
///   snapshot is left untouched
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    data: &WavelengthData,
    store: &SnapshotStore,
    resume: bool,
    device: &B::Device,
) -> error::Result<(WaveClassifier<B>, Vec<EpochReport>)> {
    let classes = config.model.classes;
    let mut model = config.model.init::<B>(device);
    let mut optimizer = config.optimizer.init::<B, WaveClassifier<B>>();

    if resume {
        (model, optimizer) = store.restore(model, optimizer, device)?;
        info!(snapshot = %store.model_path().display(), "resuming from snapshot");
    }

    std::fs::create_dir_all(store.dir())?;
    config.save(store.dir().join("config.json"))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut batcher = Batcher::new(data.train.len(), config.batch_size)?;
    let criterion = MseLoss::new();

    let test_features = data.test.features.to_tensor::<B::InnerBackend>(device);
    let test_labels = data.test.labels_tensor::<B::InnerBackend>(device);

    let mut history = Vec::with_capacity(config.epoch_num);

    for epoch in 1..=config.epoch_num {
        let start = Instant::now();
        let mut loss_total = 0.0;
        let mut correct = 0;

        batcher.shuffle(&mut rng);
        for indices in batcher.batches() {
            let batch = data.train.batch::<B>(indices, classes, device)?;
            let output = model.probabilities(batch.features);

            correct += correct_predictions(output.clone(), batch.labels);

            let loss = criterion.forward(output, batch.targets, Reduction::Sum);
            loss_total += loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }
        let elapsed = start.elapsed();

        if !loss_total.is_finite() {
            return Err(error::Error::Diverged { epoch });
        }

        let validation_model = model.valid();
        let test_output = validation_model.probabilities(test_features.clone());
        let test_accuracy = calculate_accuracy(test_output, test_labels.clone());

        let report = EpochReport {
            epoch,
            elapsed,
            train_loss: loss_total / data.train.len() as f64,
            train_accuracy: correct as f32 / data.train.len() as f32 * 100.0,
            test_accuracy: test_accuracy * 100.0,
        };
        info!(
            "elapsed time (min) : {:.2} | Epoch: {} Train_Loss : {:.8} | Train_Acc : {:.2} | Test_Acc : {:.2}",
            report.elapsed.as_secs_f64() / 60.0,
            report.epoch,
            report.train_loss,
            report.train_accuracy,
            report.test_accuracy,
        );
        history.push(report);

        store.save(&model, &optimizer)?;
    }

    Ok((model, history))
}

/// Loads the stored snapshot for evaluation only.
///
/// The optimizer state is restored alongside the parameters, so an
/// incomplete snapshot fails here rather than on the next resume.
pub fn restore_for_eval<B: AutodiffBackend>(
    config: &TrainingConfig,
    store: &SnapshotStore,
    device: &B::Device,
) -> error::Result<WaveClassifier<B::InnerBackend>> {
    let model = config.model.init::<B>(device);
    let optimizer = config.optimizer.init::<B, WaveClassifier<B>>();
    let (model, _optimizer) = store.restore(model, optimizer, device)?;
    Ok(model.valid())
}
