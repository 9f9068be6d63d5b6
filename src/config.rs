// src/config.rs

use crate::enumeration::driver::EnumerationOptions;
use crate::enumeration::labeling::DEFAULT_DENSE_TABLE_LIMIT;
use crate::error::{EnumError, Result};
use crate::utils::logger;
use directories::ProjectDirs;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

// --- Main Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnumConfig {
  /// Parent structure (POSCAR)
  pub structure: Option<PathBuf>,

  pub min_index: i64,
  pub max_index: i64,
  pub num_type: usize,
  /// Element names for species 0..num_type; letters when empty
  pub species: Vec<String>,

  pub reduce_by_lattice_symmetry: bool,
  pub symprec: f64,
  /// Largest denominator accepted when snapping coordinates to fractions
  pub max_denominator: i64,
  pub check_uniqueness: bool,

  pub max_results: Option<usize>,
  pub time_limit_secs: Option<u64>,
  pub dense_table_limit: u64,
  /// Worker threads, 0 = one per core
  pub threads: usize,

  pub output_dir: PathBuf,
  pub write_poscar: bool,
  pub log_level: String,
}

impl Default for EnumConfig {
  fn default() -> Self {
    Self {
      structure: None,
      min_index: 1,
      max_index: 4,
      num_type: 2,
      species: Vec::new(),
      reduce_by_lattice_symmetry: true,
      symprec: 1e-4,
      max_denominator: 24,
      check_uniqueness: false,
      max_results: None,
      time_limit_secs: None,
      dense_table_limit: DEFAULT_DENSE_TABLE_LIMIT,
      threads: 0,
      output_dir: PathBuf::from("dsenum_out"),
      write_poscar: false,
      log_level: "info".to_string(),
    }
  }
}

impl EnumConfig {
  /// Loads config from standard OS location (e.g., ~/.config/dsenum/settings.json)
  pub fn load() -> (Self, String) {
    Self::load_from(&Self::get_path())
  }

  pub fn load_from(path: &Path) -> (Self, String) {
    if path.exists() {
      match File::open(path) {
        Ok(file) => {
          let reader = BufReader::new(file);
          match serde_json::from_reader(reader) {
            Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
            Err(e) => (Self::default(), format!("Error parsing config: {}", e)),
          }
        }
        Err(e) => (Self::default(), format!("Error opening config: {}", e)),
      }
    } else {
      (
        Self::default(),
        "No config found. Using defaults.".to_string(),
      )
    }
  }

  /// Saves config to standard OS location
  pub fn save(&self) -> String {
    let path = Self::get_path();
    match self.save_to(&path) {
      Ok(()) => format!("Config saved to {:?}", path),
      Err(e) => format!("Failed to save config: {}", e),
    }
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, self)?;
    writer.flush()?;
    Ok(())
  }

  pub fn get_path() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("org", "dsenum", "dsenum") {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }

  pub fn validate(&self) -> Result<()> {
    self.to_options().validate()?;
    if !self.species.is_empty() && self.species.len() != self.num_type {
      return Err(EnumError::configuration(format!(
        "{} species names given for num_type = {}",
        self.species.len(),
        self.num_type
      )));
    }
    if !(self.symprec > 0.0) {
      return Err(EnumError::configuration(format!("symprec must be positive, got {}", self.symprec)));
    }
    if self.max_denominator < 1 {
      return Err(EnumError::configuration("max_denominator must be >= 1"));
    }
    if self.log_level_filter().is_none() {
      return Err(EnumError::configuration(format!("unknown log level '{}'", self.log_level)));
    }
    Ok(())
  }

  pub fn to_options(&self) -> EnumerationOptions {
    EnumerationOptions {
      min_index: self.min_index,
      max_index: self.max_index,
      num_type: self.num_type,
      reduce_by_lattice_symmetry: self.reduce_by_lattice_symmetry,
      check_uniqueness: self.check_uniqueness,
      max_results: self.max_results,
      dense_table_limit: self.dense_table_limit,
    }
  }

  /// Names used when writing structures: configured ones, else A, B, C, ...
  pub fn species_names(&self) -> Vec<String> {
    if !self.species.is_empty() {
      return self.species.clone();
    }
    (0..self.num_type)
      .map(|i| match u8::try_from(i) {
        Ok(k) if k < 26 => char::from(b'A' + k).to_string(),
        _ => format!("X{}", i),
      })
      .collect()
  }

  pub fn log_level_filter(&self) -> Option<LevelFilter> {
    logger::parse_level(&self.log_level)
  }
}
