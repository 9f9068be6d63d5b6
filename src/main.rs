use clap::Parser;
use dsenum::cli::Cli;
use dsenum::enumeration::{enumerate_derivative_structures, EnumerationControl};
use dsenum::utils::{logger, report};
use dsenum::{io, EnumConfig, EnumError, ParentCell, ParentSymmetry, Result};
use log::LevelFilter;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut cfg, msg) = match &cli.config {
        Some(path) => EnumConfig::load_from(path),
        None => EnumConfig::load(),
    };
    cli.apply(&mut cfg);

    let _ = logger::init(cfg.log_level_filter().unwrap_or(LevelFilter::Info));
    log::debug!("{}", msg);

    match run(&cli, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, cfg: &EnumConfig) -> Result<()> {
    cfg.validate()?;
    if cli.save_config {
        log::info!("{}", cfg.save());
    }

    let path = cfg
        .structure
        .as_ref()
        .ok_or_else(|| EnumError::configuration("no parent structure given"))?;

    if cfg.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .build_global()
            .map_err(|e| EnumError::configuration(format!("thread pool: {}", e)))?;
    }

    // 1. Parent and its symmetry
    let structure = io::load_structure(path)?;
    log::info!("Loaded {:?} ({} atoms)", path, structure.atoms.len());
    let parent = ParentCell::from_structure(&structure, cfg.max_denominator, cfg.symprec)?;
    let symmetry = ParentSymmetry::analyze(&parent, cfg.symprec, cfg.max_denominator)?;
    println!("{}", report::parent_summary(&parent, symmetry.space_group_number));

    // 2. Enumerate
    let control = match cfg.time_limit_secs {
        Some(secs) => EnumerationControl::with_time_limit(Duration::from_secs(secs)),
        None => EnumerationControl::new(),
    };
    let result = enumerate_derivative_structures(&parent, &symmetry, &cfg.to_options(), &control)?;

    // 3. Report and write
    let species = cfg.species_names();
    println!("{}", report::summary_table(&result.summary));
    print!("{}", report::records_table(&result.records, &species, 20));

    io::write_results_json(cfg.output_dir.join("results.json"), &result)?;
    if cfg.write_poscar {
        let paths = io::write_derivative_poscars(cfg.output_dir.join("poscar"), &parent, &result.records, &species)?;
        log::info!("Wrote {} POSCAR files to {:?}", paths.len(), cfg.output_dir.join("poscar"));
    }

    Ok(())
}
