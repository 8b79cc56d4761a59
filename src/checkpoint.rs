//! Snapshot persistence for the classifier and its optimizer.
//!
//! A snapshot is a pair of files in one directory, `net_epoch{N}.bin` for the
//! model record and `opt_epoch{N}.bin` for the Adam moments, where `N` is the
//! configured epoch count. Each save replaces both files; there is no history.
//!
//! The two files are renamed into place one after the other. A crash between
//! the renames leaves a new model next to the previous epoch's optimizer
//! moments: the parameters are still valid, but a resume from that pair
//! starts Adam from moments one epoch old.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    optim::Optimizer,
    record::{BinBytesRecorder, FullPrecisionSettings, Record, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{WaveClassifier, WaveClassifierRecord};

type SnapshotRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Where the latest model and optimizer state live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    dir: PathBuf,
    key: usize,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, epoch_num: usize) -> Self {
        Self {
            dir: dir.into(),
            key: epoch_num,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(format!("net_epoch{}.bin", self.key))
    }

    pub fn optimizer_path(&self) -> PathBuf {
        self.dir.join(format!("opt_epoch{}.bin", self.key))
    }

    /// Overwrites the snapshot with the current model and optimizer state.
    ///
    /// Every file goes through a temporary sibling that is renamed into
    /// place, so a crash mid-write leaves the previous snapshot intact.
    pub fn save<B, O>(&self, model: &WaveClassifier<B>, optimizer: &O) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<WaveClassifier<B>, B>,
    {
        fs::create_dir_all(&self.dir)?;

        let model_bytes = encode::<B, _>(model.clone().into_record())?;
        let optim_bytes = encode::<B, _>(optimizer.to_record())?;

        write_atomic(&self.model_path(), &model_bytes)?;
        write_atomic(&self.optimizer_path(), &optim_bytes)?;
        debug!(dir = %self.dir.display(), "snapshot written");
        Ok(())
    }

    /// Loads the snapshot into `model` and `optimizer`.
    ///
    /// # Errors
    /// `Error::MissingSnapshot` if either file is absent; there is no fallback
    /// to fresh parameters. `Error::ShapeMismatch` if the stored layers differ
    /// from those of `model`.
    pub fn restore<B, O>(
        &self,
        model: WaveClassifier<B>,
        optimizer: O,
        device: &B::Device,
    ) -> Result<(WaveClassifier<B>, O)>
    where
        B: AutodiffBackend,
        O: Optimizer<WaveClassifier<B>, B>,
    {
        let model_record: WaveClassifierRecord<B> = decode(&self.model_path(), device)?;
        let optim_record = decode::<B, O::Record>(&self.optimizer_path(), device)?;

        let expected = model.layer_sizes();
        let [inputs, hidden] = model_record.fc1.weight.val().dims();
        let [_, classes] = model_record.fc2.weight.val().dims();
        let stored = [inputs, hidden, classes];
        if stored != expected {
            return Err(Error::ShapeMismatch(format!(
                "snapshot {} has layers {stored:?}, configuration expects {expected:?}",
                self.model_path().display()
            )));
        }
        debug!(dir = %self.dir.display(), "snapshot restored");
        Ok((
            model.load_record(model_record),
            optimizer.load_record(optim_record),
        ))
    }
}

fn encode<B: Backend, R: Record<B>>(record: R) -> Result<Vec<u8>> {
    Ok(Recorder::<B>::record(
        &SnapshotRecorder::default(),
        record,
        (),
    )?)
}

fn decode<B: Backend, R: Record<B>>(path: &Path, device: &B::Device) -> Result<R> {
    if !path.exists() {
        return Err(Error::MissingSnapshot {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    Ok(Recorder::<B>::load(
        &SnapshotRecorder::default(),
        bytes,
        device,
    )?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
