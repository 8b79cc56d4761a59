//! Writes the estimation table: one `true,predicted` wavelength pair per test sample.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;

/// Writes `(true, predicted)` wavelength pairs as a header-less CSV.
pub fn write_estimates(path: &Path, pairs: &[(i64, i64)]) -> Result<()> {
    let truth: Vec<i64> = pairs.iter().map(|&(t, _)| t).collect();
    let predicted: Vec<i64> = pairs.iter().map(|&(_, p)| p).collect();
    let mut df = polars::df!(
        "wavelength" => truth,
        "estimate" => predicted
    )?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(false)
        .finish(&mut df)?;

    info!(path = %path.display(), rows = pairs.len(), "estimation table written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_truth_then_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("estimates.csv");
        write_estimates(&path, &[(405, 405), (410, 409), (401, 430)]).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert_eq!(body, "405,405\n410,409\n401,430\n");
    }

    #[test]
    fn empty_table_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estimates.csv");
        write_estimates(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
