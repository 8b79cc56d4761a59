//! Data loading utilities for wavelength classification
//!
//! This module reads the four input tables (train/test transmittances and
//! train/test wavelength labels), re-bases the labels onto a zero-based class
//! index and turns samples into Burn tensors for training and evaluation.

use std::fs;
use std::path::{Path, PathBuf};

use burn::tensor::{Float, Int, Tensor, TensorData, backend::Backend};
use polars::prelude::*;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Locations of the four input tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub train_features: PathBuf,
    pub train_labels: PathBuf,
    pub test_features: PathBuf,
    pub test_labels: PathBuf,
}

/// Row-major matrix of filter transmittances, one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl FeatureMatrix {
    /// Builds a matrix from row-major values.
    ///
    /// # Arguments
    /// * `cols` - Number of features per sample
    /// * `values` - Flattened rows, `values.len()` must be a multiple of `cols`
    ///
    /// # Returns
    /// * `Ok(FeatureMatrix)` - The matrix
    /// * `Err(Error::ShapeMismatch)` - If `values` does not split into whole rows
    pub fn new(cols: usize, values: Vec<f32>) -> Result<Self> {
        if cols == 0 || values.len() % cols != 0 {
            return Err(Error::ShapeMismatch(format!(
                "{} values do not form rows of {} features",
                values.len(),
                cols
            )));
        }
        let rows = values.len() / cols;
        Ok(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.cols..(index + 1) * self.cols]
    }

    /// Copies the selected rows, in the given order, into a new flat buffer.
    fn gather(&self, indices: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            out.extend_from_slice(self.row(i));
        }
        out
    }

    /// Converts the whole matrix into a 2D tensor of shape `[rows, cols]`.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2, Float> {
        Tensor::from_data(
            TensorData::new(self.values.clone(), [self.rows, self.cols]),
            device,
        )
    }
}

/// One side of the split: features plus labels already shifted to class indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub features: FeatureMatrix,
    pub labels: Vec<usize>,
}

impl Split {
    fn new(features: FeatureMatrix, labels: Vec<usize>, name: &'static str) -> Result<Self> {
        if features.rows() != labels.len() {
            return Err(Error::ShapeMismatch(format!(
                "{name}: {} feature rows but {} labels",
                features.rows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(Error::EmptyDataset(name));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Class indices as a 1D integer tensor.
    pub fn labels_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1, Int> {
        labels_to_tensor(&self.labels, device)
    }

    /// Assembles the mini-batch made of the samples at `indices`.
    ///
    /// The one-hot target matrix is sized to the batch actually selected, so a
    /// trailing partial batch is encoded without padding.
    pub fn batch<B: Backend>(
        &self,
        indices: &[usize],
        class_num: usize,
        device: &B::Device,
    ) -> Result<Batch<B>> {
        let size = indices.len();
        let labels: Vec<usize> = indices.iter().map(|&i| self.labels[i]).collect();
        let targets = one_hot(&labels, class_num)?;

        Ok(Batch {
            features: Tensor::from_data(
                TensorData::new(self.features.gather(indices), [size, self.features.cols()]),
                device,
            ),
            targets: Tensor::from_data(TensorData::new(targets, [size, class_num]), device),
            labels: labels_to_tensor(&labels, device),
        })
    }
}

/// A mini-batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    /// Shape `[batch, inputs]`
    pub features: Tensor<B, 2, Float>,
    /// One-hot targets, shape `[batch, class_num]`
    pub targets: Tensor<B, 2, Float>,
    /// Class indices, shape `[batch]`
    pub labels: Tensor<B, 1, Int>,
}

/// Training and test splits sharing one label offset.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthData {
    pub train: Split,
    pub test: Split,
    /// Smallest raw training label; subtracted from every label.
    pub min_val: i64,
}

impl WavelengthData {
    /// Reads all four tables from disk and builds both splits.
    ///
    /// # Arguments
    /// * `paths` - Locations of the feature and label tables
    /// * `inputs` - Expected number of feature columns
    /// * `class_num` - Number of output classes; every shifted label must fall below it
    ///
    /// # Returns
    /// * `Ok(WavelengthData)` - Train and test splits plus the label offset
    /// * `Err` - On unreadable tables, shape mismatches or out-of-range labels
    pub fn load(paths: &DataPaths, inputs: usize, class_num: usize) -> Result<Self> {
        let train_features = feature_matrix(&read_table(&paths.train_features)?, inputs)?;
        let train_labels = label_vector(&read_table(&paths.train_labels)?)?;
        let test_features = feature_matrix(&read_table(&paths.test_features)?, inputs)?;
        let test_labels = label_vector(&read_table(&paths.test_labels)?)?;

        let data = Self::from_raw(
            train_features,
            &train_labels,
            test_features,
            &test_labels,
            class_num,
        )?;
        info!(
            train = data.train.len(),
            test = data.test.len(),
            min_val = data.min_val,
            "loaded wavelength tables"
        );
        Ok(data)
    }

    /// Builds both splits from in-memory features and raw wavelength labels.
    ///
    /// Test labels are shifted by the training minimum, not their own.
    pub fn from_raw(
        train_features: FeatureMatrix,
        train_labels: &[i64],
        test_features: FeatureMatrix,
        test_labels: &[i64],
        class_num: usize,
    ) -> Result<Self> {
        if train_features.cols() != test_features.cols() {
            return Err(Error::ShapeMismatch(format!(
                "train has {} features per sample, test has {}",
                train_features.cols(),
                test_features.cols()
            )));
        }
        let min_val = *train_labels
            .iter()
            .min()
            .ok_or(Error::EmptyDataset("training labels"))?;

        let train = Split::new(
            train_features,
            shift_labels(train_labels, min_val, class_num)?,
            "training set",
        )?;
        let test = Split::new(
            test_features,
            shift_labels(test_labels, min_val, class_num)?,
            "test set",
        )?;

        Ok(Self {
            train,
            test,
            min_val,
        })
    }

    /// Maps a class index back to its wavelength.
    pub fn wavelength(&self, class: usize) -> i64 {
        class as i64 + self.min_val
    }
}

/// Reads a header-less CSV table
///
/// # Arguments
/// * `path` - CSV file with one sample per row
///
/// # Returns
/// * `Ok(DataFrame)` - The table with auto-generated column names
/// * `Err` - If the file is missing or not parseable
pub fn read_table(path: &Path) -> Result<DataFrame> {
    debug!(path = %path.display(), "reading table");
    let file = fs::File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(df)
}

/// Converts a feature table into a row-major [`FeatureMatrix`]
///
/// # Arguments
/// * `df` - Table with one column per filter
/// * `inputs` - Required number of columns
///
/// # Returns
/// * `Ok(FeatureMatrix)` - Features as `f32`
/// * `Err` - On a column count other than `inputs` or on empty cells
pub fn feature_matrix(df: &DataFrame, inputs: usize) -> Result<FeatureMatrix> {
    if df.width() != inputs {
        return Err(Error::ShapeMismatch(format!(
            "expected {inputs} feature columns, found {}",
            df.width()
        )));
    }

    let columns: Vec<Vec<f32>> = df
        .get_columns()
        .iter()
        .map(|col| {
            let series = col.as_materialized_series().cast(&DataType::Float32)?;
            series
                .f32()?
                .into_iter()
                .map(|v| v.ok_or_else(|| Error::ShapeMismatch("empty feature cell".into())))
                .collect::<Result<Vec<f32>>>()
        })
        .collect::<Result<_>>()?;

    // Columns arrive one filter at a time; interleave them back into rows.
    let rows = df.height();
    let mut values = Vec::with_capacity(rows * inputs);
    for r in 0..rows {
        values.extend(columns.iter().map(|col| col[r]));
    }

    FeatureMatrix::new(inputs, values)
}

/// Flattens a label table into a vector of integer wavelengths
///
/// Cells are read row by row, so both a single column and a single row of
/// labels are accepted. Float columns are allowed only when every cell holds
/// a whole number; anything else fails instead of being rounded.
pub fn label_vector(df: &DataFrame) -> Result<Vec<i64>> {
    let columns: Vec<Vec<i64>> = df
        .get_columns()
        .iter()
        .map(|col| label_column(col.as_materialized_series()))
        .collect::<Result<_>>()?;

    let mut labels = Vec::with_capacity(df.height() * df.width());
    for r in 0..df.height() {
        labels.extend(columns.iter().map(|col| col[r]));
    }
    Ok(labels)
}

fn label_column(series: &Series) -> Result<Vec<i64>> {
    let empty = || Error::ShapeMismatch("empty label cell".into());

    if series.dtype().is_integer() {
        let ints = series.strict_cast(&DataType::Int64)?;
        return ints
            .i64()?
            .into_iter()
            .map(|v| v.ok_or_else(empty))
            .collect();
    }

    // 2^63 as f64; every whole float below it (and >= -2^63) fits in i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let floats = series.strict_cast(&DataType::Float64)?;
    floats
        .f64()?
        .into_iter()
        .map(|v| {
            let v = v.ok_or_else(empty)?;
            if !v.is_finite() || v.fract() != 0.0 || v < -LIMIT || v >= LIMIT {
                return Err(Error::ShapeMismatch(format!(
                    "label cell {v} is not an integer"
                )));
            }
            Ok(v as i64)
        })
        .collect()
}

/// Shifts raw wavelength labels to zero-based class indices
///
/// # Arguments
/// * `raw` - Wavelength labels
/// * `min_val` - Offset to subtract (the training minimum)
/// * `class_num` - Exclusive upper bound for the shifted index
///
/// # Returns
/// * `Ok(Vec<usize>)` - `raw - min_val` for every label
/// * `Err(Error::LabelOutOfRange)` - If any shifted label falls outside `[0, class_num)`
pub fn shift_labels(raw: &[i64], min_val: i64, class_num: usize) -> Result<Vec<usize>> {
    raw.iter()
        .map(|&label| {
            label
                .checked_sub(min_val)
                .and_then(|shifted| usize::try_from(shifted).ok())
                .filter(|&shifted| shifted < class_num)
                .ok_or(Error::LabelOutOfRange {
                    label,
                    min_val,
                    class_num,
                })
        })
        .collect()
}

/// Row-major one-hot encoding, shape `[labels.len(), class_num]`.
pub fn one_hot(labels: &[usize], class_num: usize) -> Result<Vec<f32>> {
    let mut mat = vec![0.0; labels.len() * class_num];
    for (row, &class) in labels.iter().enumerate() {
        if class >= class_num {
            return Err(Error::ClassOutOfRange { class, class_num });
        }
        mat[row * class_num + class] = 1.0;
    }
    Ok(mat)
}

fn labels_to_tensor<B: Backend>(labels: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let ints: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
    Tensor::from_data(TensorData::new(ints, [labels.len()]), device)
}

/// Shuffled partition of sample indices into mini-batches.
///
/// The order is kept between epochs and reshuffled in place by
/// [`Batcher::shuffle`]. The last batch is shorter when the sample count is
/// not a multiple of the batch size.
#[derive(Debug, Clone)]
pub struct Batcher {
    order: Vec<usize>,
    batch_size: usize,
}

impl Batcher {
    pub fn new(len: usize, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        Ok(Self {
            order: (0..len).collect(),
            batch_size,
        })
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    pub fn batches(&self) -> std::slice::Chunks<'_, usize> {
        self.order.chunks(self.batch_size)
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }
}
