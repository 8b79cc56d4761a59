use std::fs;
use std::path::Path;

use burning_wavelength::config::{ComputeDevice, Mode, RunConfig};
use burning_wavelength::data::DataPaths;
use burning_wavelength::error::Error;
use burning_wavelength::model::WaveClassifierConfig;
use burning_wavelength::training::{TrainingConfig, adam};

fn write_tables(dir: &Path) -> DataPaths {
    // Six filters, wavelengths 500..=503; each wavelength peaks in its own filter.
    let mut train_x = String::new();
    let mut train_y = String::new();
    for i in 0..24 {
        let class = i % 4;
        let row: Vec<String> = (0..6)
            .map(|f| {
                let base = if f == class { 0.9 } else { 0.1 };
                format!("{:.3}", base + (i as f32) * 0.001)
            })
            .collect();
        train_x.push_str(&row.join(","));
        train_x.push('\n');
        train_y.push_str(&format!("{}\n", 500 + class));
    }
    let test_x = "0.9,0.1,0.1,0.1,0.1,0.1\n0.1,0.1,0.9,0.1,0.1,0.1\n0.1,0.9,0.1,0.1,0.1,0.1\n";
    let test_y = "500\n502\n501\n";

    let paths = DataPaths {
        train_features: dir.join("trainT.csv"),
        train_labels: dir.join("trainT_labels.csv"),
        test_features: dir.join("testT.csv"),
        test_labels: dir.join("testT_labels.csv"),
    };
    fs::write(&paths.train_features, train_x).unwrap();
    fs::write(&paths.train_labels, train_y).unwrap();
    fs::write(&paths.test_features, test_x).unwrap();
    fs::write(&paths.test_labels, test_y).unwrap();
    paths
}

fn run_config(dir: &Path, mode: Mode) -> RunConfig {
    let training = TrainingConfig::new(
        WaveClassifierConfig::new()
            .with_inputs(6)
            .with_hidden(8)
            .with_classes(4),
        adam(),
    )
    .with_epoch_num(3)
    .with_batch_size(5)
    .with_learning_rate(1e-2);

    let mut run = RunConfig::new(mode, write_tables(dir), training);
    run.snapshot_dir = dir.join("ckpt");
    run.output = dir.join("estimates.csv");
    run
}

#[test]
fn train_then_eval_reproduces_estimates() {
    let dir = tempfile::tempdir().unwrap();

    let trained =
        burning_wavelength::run(&run_config(dir.path(), Mode::Train { resume: false })).unwrap();
    assert_eq!(trained.history.len(), 3);
    assert!(dir.path().join("ckpt").join("net_epoch3.bin").exists());
    assert!(dir.path().join("ckpt").join("opt_epoch3.bin").exists());

    let truths: Vec<i64> = trained.estimates.iter().map(|&(t, _)| t).collect();
    assert_eq!(truths, vec![500, 502, 501]);
    assert!(trained.estimates.iter().all(|&(_, p)| (500..=503).contains(&p)));
    let written = fs::read_to_string(dir.path().join("estimates.csv")).unwrap();
    assert_eq!(written.lines().count(), 3);

    let evaluated = burning_wavelength::run(&run_config(dir.path(), Mode::Eval)).unwrap();
    assert!(evaluated.history.is_empty());
    assert_eq!(evaluated.estimates, trained.estimates);
    assert_eq!(evaluated.evaluation.accuracy, trained.evaluation.accuracy);
}

#[test]
fn eval_without_snapshot_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = burning_wavelength::run(&run_config(dir.path(), Mode::Eval)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MissingSnapshot { .. })
    ));
    assert!(!dir.path().join("estimates.csv").exists());
}

#[test]
fn test_labels_outside_training_range_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), Mode::Train { resume: false });
    fs::write(&run.data.test_labels, "500\n499\n501\n").unwrap();

    let err = burning_wavelength::run(&run).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::LabelOutOfRange { label: 499, .. })
    ));
}

#[cfg(not(feature = "wgpu"))]
#[test]
fn gpu_request_without_wgpu_runs_on_cpu() {
    let dir = tempfile::tempdir().unwrap();
    let mut run = run_config(dir.path(), Mode::Train { resume: false });
    run.device = ComputeDevice::Gpu;

    let summary = burning_wavelength::run(&run).unwrap();
    assert_eq!(summary.history.len(), 3);
    assert_eq!(summary.estimates.len(), 3);
}

#[test]
fn fractional_training_label_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), Mode::Train { resume: false });
    let labels = fs::read_to_string(&run.data.train_labels).unwrap();
    fs::write(&run.data.train_labels, labels.replacen("500\n", "500.5\n", 1)).unwrap();

    let err = burning_wavelength::run(&run).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::ShapeMismatch(_))
    ));
}
