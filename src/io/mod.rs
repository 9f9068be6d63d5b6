// src/io/mod.rs
pub mod poscar;

use crate::enumeration::driver::{DerivativeRecord, EnumerationResult};
use crate::error::Result;
use crate::model::{ParentCell, Structure};
use crate::operations::build_derivative_structure;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Parent structures are read from POSCAR/CONTCAR/.vasp files
pub fn load_structure(path: impl AsRef<Path>) -> Result<Structure> {
    Ok(poscar::parse(path)?)
}

pub fn write_results_json(path: impl AsRef<Path>, result: &EnumerationResult) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;
    log::info!("Results written to {:?}", path);
    Ok(())
}

pub fn read_results_json(path: impl AsRef<Path>) -> Result<EnumerationResult> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// One POSCAR per record, named `POSCAR_<index>_<n>` with `n` counting
/// within the index. Returns the written paths.
pub fn write_derivative_poscars(
    dir: impl AsRef<Path>,
    parent: &ParentCell,
    records: &[DerivativeRecord],
    species: &[String],
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(records.len());
    let mut counter = 0usize;
    let mut last_index = None;

    for record in records {
        if last_index != Some(record.index) {
            last_index = Some(record.index);
            counter = 0;
        }
        counter += 1;

        let mut structure = build_derivative_structure(parent, &record.hnf_matrix(), &record.labeling, species)?;
        structure.formula = format!("{} index {} hnf {:?}", structure.formula, record.index, record.hnf);

        let path = dir.join(format!("POSCAR_{}_{}", record.index, counter));
        poscar::write(&path, &structure)?;
        written.push(path);
    }

    log::debug!("Wrote {} POSCAR files to {:?}", written.len(), dir);
    Ok(written)
}
