// src/enumeration/driver.rs
//
// Runs the whole pipeline for a range of indices: superlattices, their
// reduction, and labeling enumeration per superlattice in parallel.

use crate::enumeration::control::EnumerationControl;
use crate::enumeration::labeling::{LabelingEnumerator, DEFAULT_DENSE_TABLE_LIMIT};
use crate::enumeration::permutation::build_permutation_groups;
use crate::enumeration::smith::decompose_smith_normal_form;
use crate::enumeration::superlattice::{count_snf_classes, generate_all_superlattices, reduce_by_symmetry};
use crate::error::{EnumError, Result};
use crate::model::{ParentCell, ParentSymmetry};
use crate::utils::linalg::{matrix_rows, IntMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct EnumerationOptions {
    pub min_index: i64,
    pub max_index: i64,
    pub num_type: usize,
    pub reduce_by_lattice_symmetry: bool,
    pub check_uniqueness: bool,
    /// Stop once this many labelings were found
    pub max_results: Option<usize>,
    pub dense_table_limit: u64,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            min_index: 1,
            max_index: 4,
            num_type: 2,
            reduce_by_lattice_symmetry: true,
            check_uniqueness: false,
            max_results: None,
            dense_table_limit: DEFAULT_DENSE_TABLE_LIMIT,
        }
    }
}

impl EnumerationOptions {
    pub fn validate(&self) -> Result<()> {
        if self.min_index < 1 {
            return Err(EnumError::configuration(format!(
                "min_index must be >= 1, got {}",
                self.min_index
            )));
        }
        if self.max_index < self.min_index {
            return Err(EnumError::configuration(format!(
                "max_index {} is below min_index {}",
                self.max_index, self.min_index
            )));
        }
        if self.num_type == 0 {
            return Err(EnumError::configuration("num_type must be positive"));
        }
        if self.max_results == Some(0) {
            return Err(EnumError::configuration("max_results must be positive when set"));
        }
        Ok(())
    }
}

/// One inequivalent derivative structure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeRecord {
    pub index: i64,
    pub hnf: Vec<Vec<i64>>,
    pub snf_diagonal: Vec<i64>,
    pub labeling: Vec<usize>,
}

impl DerivativeRecord {
    pub fn hnf_matrix(&self) -> IntMatrix {
        let n = self.hnf.len();
        IntMatrix::from_fn(n, n, |i, j| self.hnf[i][j])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub index: i64,
    pub num_hnf: usize,
    pub num_reduced_hnf: usize,
    pub num_snf_classes: usize,
    pub num_labelings: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumerationSummary {
    pub num_type: usize,
    pub num_site_parent: usize,
    pub indices: Vec<IndexSummary>,
    pub total: usize,
    /// Stopped early by the result budget, deadline or an external cancel
    pub truncated: bool,
    pub elapsed_secs: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumerationResult {
    pub summary: EnumerationSummary,
    pub records: Vec<DerivativeRecord>,
}

/// Enumerate derivative structures of `parent` for every index in
/// `[min_index, max_index]`.
///
/// Superlattices are processed in parallel; the records keep the
/// deterministic (index, HNF, labeling) order of a sequential run.
pub fn enumerate_derivative_structures(
    parent: &ParentCell,
    symmetry: &ParentSymmetry,
    options: &EnumerationOptions,
    control: &EnumerationControl,
) -> Result<EnumerationResult> {
    options.validate()?;
    let start = Instant::now();

    let mut indices = Vec::new();
    let mut work: Vec<(i64, IntMatrix)> = Vec::new();
    for index in options.min_index..=options.max_index {
        let all = generate_all_superlattices(index)?;
        let reduced = if options.reduce_by_lattice_symmetry {
            reduce_by_symmetry(&all, &symmetry.lattice_rotations)
        } else {
            all.clone()
        };
        indices.push(IndexSummary {
            index,
            num_hnf: all.len(),
            num_reduced_hnf: reduced.len(),
            num_snf_classes: count_snf_classes(&all)?,
            num_labelings: 0,
        });
        work.extend(reduced.into_iter().map(|hnf| (index, hnf)));
    }

    log::info!(
        "Enumerating {} superlattices (index {}..={}, {} species, {} parent sites)",
        work.len(),
        options.min_index,
        options.max_index,
        options.num_type,
        parent.num_sites()
    );

    let found = AtomicUsize::new(0);
    let outcomes: Vec<Result<Vec<DerivativeRecord>>> = work
        .par_iter()
        .map(|(index, hnf)| enumerate_superlattice(*index, hnf, parent, symmetry, options, control, &found))
        .collect();

    let (mut records, mut truncated) = collect_in_work_order(outcomes)?;
    if let Some(max) = options.max_results {
        if records.len() > max {
            records.truncate(max);
            truncated = true;
        }
    }

    for summary in &mut indices {
        summary.num_labelings = records.iter().filter(|r| r.index == summary.index).count();
    }
    if truncated {
        log::warn!("Enumeration stopped early after {} structures", records.len());
    }

    let summary = EnumerationSummary {
        num_type: options.num_type,
        num_site_parent: parent.num_sites(),
        indices,
        total: records.len(),
        truncated,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    log::info!("Found {} derivative structures in {:.2}s", summary.total, summary.elapsed_secs);

    Ok(EnumerationResult { summary, records })
}

/// Records of every item before the first cancelled one. Later batches are
/// dropped so a partial result is a prefix of the sequential run.
fn collect_in_work_order(outcomes: Vec<Result<Vec<DerivativeRecord>>>) -> Result<(Vec<DerivativeRecord>, bool)> {
    let mut records = Vec::new();
    let mut truncated = false;
    for outcome in outcomes {
        match outcome {
            Ok(batch) if !truncated => records.extend(batch),
            Ok(_) => {}
            Err(EnumError::Cancelled) => truncated = true,
            Err(e) => return Err(e),
        }
    }
    Ok((records, truncated))
}

fn enumerate_superlattice(
    index: i64,
    hnf: &IntMatrix,
    parent: &ParentCell,
    symmetry: &ParentSymmetry,
    options: &EnumerationOptions,
    control: &EnumerationControl,
    found: &AtomicUsize,
) -> Result<Vec<DerivativeRecord>> {
    control.check()?;

    let groups = build_permutation_groups(
        hnf,
        parent.num_sites(),
        Some(parent.displacements.as_slice()),
        &symmetry.rotations,
        &symmetry.translations,
    )?;
    let num_sites = groups.translation.num_sites();

    let mut enumerator = LabelingEnumerator::new(num_sites, options.num_type, &groups.translation, &groups.full)?
        .with_control(control)
        .with_dense_table_limit(options.dense_table_limit);
    let labelings = enumerator.inequivalent_labelings()?;

    if options.check_uniqueness && !enumerator.check_uniqueness(&labelings)? {
        return Err(EnumError::internal(
            format!("HNF {:?}", matrix_rows(hnf)),
            "two returned labelings lie in the same orbit",
        ));
    }

    if let Some(max) = options.max_results {
        let before = found.fetch_add(labelings.len(), Ordering::SeqCst);
        if before + labelings.len() >= max {
            control.cancel();
        }
    }

    log::debug!(
        "HNF {:?}: {} labelings ({} site permutations)",
        matrix_rows(hnf),
        labelings.len(),
        groups.full.len()
    );

    let hnf_rows = matrix_rows(hnf);
    let snf_diagonal = decompose_smith_normal_form(hnf)?.diagonal();
    Ok(labelings
        .into_iter()
        .map(|labeling| DerivativeRecord {
            index,
            hnf: hnf_rows.clone(),
            snf_diagonal: snf_diagonal.clone(),
            labeling,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumeration::fixtures::{cubic_rotations, fcc_rotations};
    use crate::utils::linalg::frac_vector;
    use num_rational::Rational64;

    const FCC: [[f64; 3]; 3] = [[0.0, 1.8, 1.8], [1.8, 0.0, 1.8], [1.8, 1.8, 0.0]];
    const SC: [[f64; 3]; 3] = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]];

    fn options(min_index: i64, max_index: i64) -> EnumerationOptions {
        EnumerationOptions {
            min_index,
            max_index,
            check_uniqueness: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fcc_binary_summary() {
        let parent = ParentCell::primitive(FCC, "Cu");
        let symmetry = ParentSymmetry::from_lattice_rotations(fcc_rotations());
        let result =
            enumerate_derivative_structures(&parent, &symmetry, &options(1, 4), &EnumerationControl::new()).unwrap();

        let counts: Vec<(usize, usize, usize)> = result
            .summary
            .indices
            .iter()
            .map(|s| (s.num_hnf, s.num_reduced_hnf, s.num_labelings))
            .collect();
        assert_eq!(counts, vec![(1, 1, 0), (7, 2, 2), (13, 3, 3), (35, 7, 12)]);
        assert_eq!(result.summary.total, 17);
        assert!(!result.summary.truncated);

        // records come in index order
        assert!(result.records.windows(2).all(|w| w[0].index <= w[1].index));
        let first = &result.records[0];
        assert_eq!(first.index, 2);
        assert_eq!(first.hnf_matrix().nrows(), 3);
        assert_eq!(first.snf_diagonal.iter().product::<i64>(), 2);
    }

    #[test]
    fn test_sc_binary_and_unreduced() {
        let parent = ParentCell::primitive(SC, "Cu");
        let symmetry = ParentSymmetry::from_lattice_rotations(cubic_rotations());
        let result =
            enumerate_derivative_structures(&parent, &symmetry, &options(2, 3), &EnumerationControl::new()).unwrap();
        assert_eq!(result.summary.indices[0].num_labelings, 3);
        assert_eq!(result.summary.indices[1].num_labelings, 3);

        // without merging superlattices the same structures appear once per HNF
        let opts = EnumerationOptions {
            reduce_by_lattice_symmetry: false,
            ..options(2, 2)
        };
        let result = enumerate_derivative_structures(&parent, &symmetry, &opts, &EnumerationControl::new()).unwrap();
        assert_eq!(result.summary.indices[0].num_reduced_hnf, 7);
        assert_eq!(result.summary.total, 7);
    }

    #[test]
    fn test_two_site_parent() {
        let half = Rational64::new(1, 2);
        let zero = Rational64::from_integer(0);
        let parent = ParentCell::new(
            SC,
            vec![frac_vector(&[zero, zero, zero]), frac_vector(&[half, half, half])],
            vec!["Cs".into(), "Cl".into()],
        )
        .unwrap();
        let symmetry = ParentSymmetry::from_lattice_rotations(cubic_rotations());
        let result =
            enumerate_derivative_structures(&parent, &symmetry, &options(1, 2), &EnumerationControl::new()).unwrap();
        assert_eq!(result.summary.num_site_parent, 2);
        assert_eq!(result.summary.indices[0].num_labelings, 1);
        assert!(result.records.iter().all(|r| r.labeling.len() == 2 * r.index as usize));
    }

    fn hcp() -> ParentCell {
        let a = 3.2;
        let c = a * (8.0f64 / 3.0).sqrt();
        let lattice = [[a, 0.0, 0.0], [-a / 2.0, a * 3.0f64.sqrt() / 2.0, 0.0], [0.0, 0.0, c]];
        let third = Rational64::new(1, 3);
        let two_thirds = Rational64::new(2, 3);
        ParentCell::new(
            lattice,
            vec![
                frac_vector(&[third, two_thirds, Rational64::new(1, 4)]),
                frac_vector(&[two_thirds, third, Rational64::new(3, 4)]),
            ],
            vec!["Mg".into(), "Mg".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_hcp_binary_with_screw_operations() {
        let parent = hcp();
        let symmetry = ParentSymmetry::analyze(&parent, 1e-4, 24).unwrap();
        assert_eq!(symmetry.space_group_number, 194);
        assert!(symmetry.translations.iter().any(|t| t[2] == Rational64::new(1, 2)));

        let result =
            enumerate_derivative_structures(&parent, &symmetry, &options(1, 3), &EnumerationControl::new()).unwrap();
        let counts: Vec<usize> = result.summary.indices.iter().map(|s| s.num_labelings).collect();
        assert_eq!(counts, vec![1, 7, 30]);
    }

    #[test]
    fn test_decoration_breaking_lattice_symmetry() {
        // Cs and Cl stacked along z: tetragonal parent on a cubic lattice
        let half = Rational64::new(1, 2);
        let zero = Rational64::from_integer(0);
        let parent = ParentCell::new(
            SC,
            vec![frac_vector(&[zero, zero, zero]), frac_vector(&[zero, zero, half])],
            vec!["Cs".into(), "Cl".into()],
        )
        .unwrap();
        let symmetry = ParentSymmetry::analyze(&parent, 1e-4, 24).unwrap();

        let result =
            enumerate_derivative_structures(&parent, &symmetry, &options(2, 2), &EnumerationControl::new()).unwrap();
        assert_eq!(result.summary.indices[0].num_reduced_hnf, 5);
        assert_eq!(result.summary.total, 17);

        // the cubic holohedry would merge superlattices along z with those along x
        let cubic = ParentSymmetry {
            lattice_rotations: cubic_rotations(),
            ..symmetry.clone()
        };
        let merged =
            enumerate_derivative_structures(&parent, &cubic, &options(2, 2), &EnumerationControl::new()).unwrap();
        assert_eq!(merged.summary.indices[0].num_reduced_hnf, 3);
        assert!(merged.summary.total < result.summary.total);
    }

    #[test]
    fn test_partial_result_is_prefix() {
        let record = |index: i64| DerivativeRecord {
            index,
            hnf: vec![vec![index]],
            snf_diagonal: vec![index],
            labeling: vec![0, 1],
        };
        let outcomes = vec![
            Ok(vec![record(2)]),
            Err(EnumError::Cancelled),
            Ok(vec![record(3), record(3)]),
            Err(EnumError::Cancelled),
        ];
        let (records, truncated) = collect_in_work_order(outcomes).unwrap();
        assert_eq!(records, vec![record(2)]);
        assert!(truncated);

        let failed = vec![Err(EnumError::Cancelled), Err(EnumError::configuration("bad"))];
        assert!(matches!(collect_in_work_order(failed), Err(EnumError::Configuration(_))));

        let (records, truncated) = collect_in_work_order(vec![Ok(vec![record(2)]), Ok(vec![])]).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!truncated);
    }

    #[test]
    fn test_result_budget() {
        let parent = ParentCell::primitive(FCC, "Cu");
        let symmetry = ParentSymmetry::from_lattice_rotations(fcc_rotations());
        let opts = EnumerationOptions {
            max_results: Some(3),
            ..options(2, 4)
        };
        let result = enumerate_derivative_structures(&parent, &symmetry, &opts, &EnumerationControl::new()).unwrap();
        assert!(result.records.len() <= 3);
        assert!(result.summary.truncated);
        assert_eq!(result.summary.total, result.records.len());
    }

    #[test]
    fn test_cancelled_before_start() {
        let parent = ParentCell::primitive(FCC, "Cu");
        let symmetry = ParentSymmetry::from_lattice_rotations(fcc_rotations());
        let control = EnumerationControl::new();
        control.cancel();
        let result = enumerate_derivative_structures(&parent, &symmetry, &options(1, 3), &control).unwrap();
        assert!(result.records.is_empty());
        assert!(result.summary.truncated);
        // superlattice statistics are still reported
        assert_eq!(result.summary.indices[2].num_hnf, 13);
    }

    #[test]
    fn test_invalid_options() {
        let parent = ParentCell::primitive(SC, "Cu");
        let symmetry = ParentSymmetry::from_lattice_rotations(cubic_rotations());
        for opts in [
            options(0, 2),
            options(3, 2),
            EnumerationOptions { num_type: 0, ..options(1, 2) },
        ] {
            assert!(matches!(
                enumerate_derivative_structures(&parent, &symmetry, &opts, &EnumerationControl::new()),
                Err(EnumError::Configuration(_))
            ));
        }
    }
}
