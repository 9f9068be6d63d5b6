//! Command-line argument parsing for dsenum

use crate::config::EnumConfig;
use clap::Parser;
use std::path::PathBuf;

/// Derivative structure enumeration
#[derive(Parser, Debug)]
#[command(name = "dsenum")]
#[command(author, version, about = "Enumerate symmetry-distinct derivative structures of a parent crystal", long_about = None)]
pub struct Cli {
    /// Parent structure in POSCAR format
    #[arg(value_name = "STRUCTURE")]
    pub structure: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Smallest superlattice index
    #[arg(long)]
    pub min_index: Option<i64>,

    /// Largest superlattice index
    #[arg(short = 'n', long)]
    pub max_index: Option<i64>,

    /// Number of species
    #[arg(short = 'k', long)]
    pub num_type: Option<usize>,

    /// Species names, comma separated (e.g. Cu,Au)
    #[arg(short, long, value_delimiter = ',')]
    pub species: Option<Vec<String>>,

    /// Keep superlattices that are equivalent under the lattice point group
    #[arg(long)]
    pub no_reduce: bool,

    /// Symmetry search tolerance
    #[arg(long)]
    pub symprec: Option<f64>,

    /// Largest denominator of fractional coordinates
    #[arg(long)]
    pub max_denominator: Option<i64>,

    /// Verify that no two results are equivalent
    #[arg(long)]
    pub check_uniqueness: bool,

    /// Stop after this many structures
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub time_limit: Option<u64>,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Output directory for results.json and POSCAR files
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write one POSCAR per derivative structure
    #[arg(long)]
    pub poscar: bool,

    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Store the effective settings as the new defaults
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Command-line values override the loaded settings
    pub fn apply(&self, cfg: &mut EnumConfig) {
        if let Some(p) = &self.structure {
            cfg.structure = Some(p.clone());
        }
        if let Some(v) = self.min_index {
            cfg.min_index = v;
        }
        if let Some(v) = self.max_index {
            cfg.max_index = v;
        }
        if let Some(v) = self.num_type {
            cfg.num_type = v;
        }
        if let Some(names) = &self.species {
            cfg.species = names.iter().map(|s| s.trim().to_string()).collect();
            if self.num_type.is_none() {
                cfg.num_type = cfg.species.len();
            }
        }
        if self.no_reduce {
            cfg.reduce_by_lattice_symmetry = false;
        }
        if let Some(v) = self.symprec {
            cfg.symprec = v;
        }
        if let Some(v) = self.max_denominator {
            cfg.max_denominator = v;
        }
        if self.check_uniqueness {
            cfg.check_uniqueness = true;
        }
        if self.max_results.is_some() {
            cfg.max_results = self.max_results;
        }
        if self.time_limit.is_some() {
            cfg.time_limit_secs = self.time_limit;
        }
        if let Some(v) = self.threads {
            cfg.threads = v;
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if self.poscar {
            cfg.write_poscar = true;
        }
        if self.quiet {
            cfg.log_level = "error".to_string();
        } else if self.verbose == 1 {
            cfg.log_level = "debug".to_string();
        } else if self.verbose > 1 {
            cfg.log_level = "trace".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "dsenum", "POSCAR", "-n", "6", "--species", "Cu,Au,Ag", "--no-reduce", "-vv", "--max-results", "10",
        ]);
        let mut cfg = EnumConfig::default();
        cli.apply(&mut cfg);

        assert_eq!(cfg.structure, Some(PathBuf::from("POSCAR")));
        assert_eq!(cfg.max_index, 6);
        assert_eq!(cfg.min_index, 1);
        assert_eq!(cfg.num_type, 3);
        assert_eq!(cfg.species, vec!["Cu", "Au", "Ag"]);
        assert!(!cfg.reduce_by_lattice_symmetry);
        assert_eq!(cfg.max_results, Some(10));
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["dsenum"]);
        let mut cfg = EnumConfig {
            num_type: 3,
            check_uniqueness: true,
            ..Default::default()
        };
        let before = cfg.clone();
        cli.apply(&mut cfg);
        assert_eq!(cfg, before);
    }
}
