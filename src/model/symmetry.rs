// src/model/symmetry.rs
//
// Parent symmetry from moyo, converted to exact integer rotations and rational
// translations in the parent's fractional basis.

use crate::error::{EnumError, Result};
use crate::model::ParentCell;
use crate::utils::linalg::{matrix_rows, snap_to_rational, wrap_unit, FracVector, IntMatrix};
use moyo::base::{AngleTolerance, Cell, Lattice};
use moyo::data::Setting;
use moyo::MoyoDataset;
use nalgebra::{Matrix3, Vector3};
use num_rational::Rational64;
use std::collections::HashSet;

/// Everything the enumeration needs to know about the parent's symmetry
#[derive(Clone, Debug)]
pub struct ParentSymmetry {
    pub space_group_number: i32,
    /// Space-group operations `x -> R x + t` of the decorated parent
    pub rotations: Vec<IntMatrix>,
    pub translations: Vec<FracVector>,
    /// Distinct rotation parts of `rotations`, used to merge equivalent
    /// superlattices. Bare-lattice rotations that the decoration breaks are
    /// not included.
    pub lattice_rotations: Vec<IntMatrix>,
}

impl ParentSymmetry {
    pub fn analyze(parent: &ParentCell, symprec: f64, max_denominator: i64) -> Result<Self> {
        let dataset = run_moyo(parent.lattice, &parent.frac_coords(), &site_numbers(parent), symprec)?;
        let (rotations, translations) = operations_of(&dataset, max_denominator, symprec)?;
        let lattice_rotations = distinct_rotations(&rotations);
        let holohedry = lattice_point_group(parent.lattice, symprec)?;

        log::info!(
            "Parent space group #{}: {} operations, point group order {} (lattice {})",
            dataset.number,
            rotations.len(),
            lattice_rotations.len(),
            holohedry.len()
        );

        Ok(Self {
            space_group_number: dataset.number,
            rotations,
            translations,
            lattice_rotations,
        })
    }

    /// Symmetry given directly as lattice rotations with no fractional
    /// translations
    pub fn from_lattice_rotations(rotations: Vec<IntMatrix>) -> Self {
        let translations = vec![FracVector::from_element(3, Rational64::from_integer(0)); rotations.len()];
        Self {
            space_group_number: 0,
            lattice_rotations: distinct_rotations(&rotations),
            rotations,
            translations,
        }
    }
}

/// Space-group operations of the parent in its own fractional basis
pub fn parent_symmetry_operations(
    parent: &ParentCell,
    symprec: f64,
    max_denominator: i64,
) -> Result<(Vec<IntMatrix>, Vec<FracVector>)> {
    let dataset = run_moyo(parent.lattice, &parent.frac_coords(), &site_numbers(parent), symprec)?;
    operations_of(&dataset, max_denominator, symprec)
}

/// Holohedry of the lattice, found from a cell holding a single atom
pub fn lattice_point_group(lattice: [[f64; 3]; 3], symprec: f64) -> Result<Vec<IntMatrix>> {
    let dataset = run_moyo(lattice, &[[0.0; 3]], &[1], symprec)?;
    let rotations: Vec<IntMatrix> = dataset
        .operations
        .iter()
        .map(|op| rotation_matrix(&op.rotation))
        .collect();
    Ok(distinct_rotations(&rotations))
}

/// Rotations with repeats removed, first occurrence kept
pub fn distinct_rotations(rotations: &[IntMatrix]) -> Vec<IntMatrix> {
    let mut seen = HashSet::new();
    rotations
        .iter()
        .filter(|r| seen.insert(matrix_rows(r)))
        .cloned()
        .collect()
}

fn site_numbers(parent: &ParentCell) -> Vec<i32> {
    let mut unique: Vec<&String> = Vec::new();
    parent
        .site_elements
        .iter()
        .map(|e| match unique.iter().position(|u| *u == e) {
            Some(i) => i as i32 + 1,
            None => {
                unique.push(e);
                unique.len() as i32
            }
        })
        .collect()
}

fn run_moyo(
    lattice: [[f64; 3]; 3],
    frac_coords: &[[f64; 3]],
    numbers: &[i32],
    symprec: f64,
) -> Result<MoyoDataset> {
    let l = lattice;
    let lattice_mat = Matrix3::new(
        l[0][0], l[0][1], l[0][2],
        l[1][0], l[1][1], l[1][2],
        l[2][0], l[2][1], l[2][2],
    );
    let positions = frac_coords
        .iter()
        .map(|p| Vector3::new(p[0], p[1], p[2]))
        .collect();

    let cell = Cell::new(Lattice::new(lattice_mat), positions, numbers.to_vec());
    MoyoDataset::new(&cell, symprec, AngleTolerance::Default, Setting::Spglib, true)
        .map_err(|e| EnumError::Symmetry(format!("{:?}", e)))
}

fn rotation_matrix(r: &Matrix3<i32>) -> IntMatrix {
    IntMatrix::from_fn(3, 3, |i, j| r[(i, j)] as i64)
}

fn operations_of(
    dataset: &MoyoDataset,
    max_denominator: i64,
    tolerance: f64,
) -> Result<(Vec<IntMatrix>, Vec<FracVector>)> {
    let mut rotations = Vec::with_capacity(dataset.operations.len());
    let mut translations = Vec::with_capacity(dataset.operations.len());

    for (k, op) in dataset.operations.iter().enumerate() {
        let mut t = Vec::with_capacity(3);
        for i in 0..3 {
            let x = op.translation[i];
            let r = snap_to_rational(x, max_denominator, tolerance).ok_or_else(|| {
                EnumError::Symmetry(format!(
                    "translation {:.6} of operation #{} is not a fraction with denominator <= {}",
                    x, k, max_denominator
                ))
            })?;
            t.push(wrap_unit(r));
        }
        rotations.push(rotation_matrix(&op.rotation));
        translations.push(FracVector::from_vec(t));
    }

    Ok((rotations, translations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::linalg::frac_vector;

    const CUBIC: [[f64; 3]; 3] = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]];

    #[test]
    fn test_simple_cubic() {
        let parent = ParentCell::primitive(CUBIC, "Cu");
        let sym = ParentSymmetry::analyze(&parent, 1e-4, 24).unwrap();
        assert_eq!(sym.space_group_number, 221);
        assert_eq!(sym.rotations.len(), 48);
        assert_eq!(sym.lattice_rotations.len(), 48);
        assert!(sym.translations.iter().all(|t| t.iter().all(|x| *x == Rational64::from_integer(0))));
    }

    #[test]
    fn test_fcc_primitive_lattice() {
        let fcc = [[0.0, 2.0, 2.0], [2.0, 0.0, 2.0], [2.0, 2.0, 0.0]];
        let rotations = lattice_point_group(fcc, 1e-4).unwrap();
        assert_eq!(rotations.len(), 48);
        for r in &rotations {
            assert_eq!(crate::utils::linalg::determinant(r).abs(), 1);
        }
    }

    #[test]
    fn test_two_site_parent() {
        let half = Rational64::new(1, 2);
        let zero = Rational64::from_integer(0);
        let parent = ParentCell::new(
            CUBIC,
            vec![frac_vector(&[zero, zero, zero]), frac_vector(&[half, half, half])],
            vec!["Cs".into(), "Cl".into()],
        )
        .unwrap();
        let (rotations, translations) = parent_symmetry_operations(&parent, 1e-4, 24).unwrap();
        assert_eq!(rotations.len(), 48);
        assert_eq!(translations.len(), 48);

        // same element on both sites: body-centred, translations by (1/2,1/2,1/2) appear
        let bcc = ParentCell::new(CUBIC, parent.displacements.clone(), vec!["Fe".into(), "Fe".into()]).unwrap();
        let (rotations, translations) = parent_symmetry_operations(&bcc, 1e-4, 24).unwrap();
        assert_eq!(translations.len(), 96);
        assert!(translations.iter().any(|t| t[0] == half));
        assert_eq!(distinct_rotations(&rotations).len(), 48);
    }

    #[test]
    fn test_decoration_lowers_point_group() {
        let half = Rational64::new(1, 2);
        let zero = Rational64::from_integer(0);
        let parent = ParentCell::new(
            CUBIC,
            vec![frac_vector(&[zero, zero, zero]), frac_vector(&[zero, zero, half])],
            vec!["Cs".into(), "Cl".into()],
        )
        .unwrap();
        let sym = ParentSymmetry::analyze(&parent, 1e-4, 24).unwrap();
        assert_eq!(sym.space_group_number, 123);
        assert_eq!(sym.rotations.len(), 16);
        assert_eq!(sym.lattice_rotations.len(), 16);
        assert_eq!(lattice_point_group(CUBIC, 1e-4).unwrap().len(), 48);

        // only rotations that keep z along z survive
        for r in &sym.lattice_rotations {
            assert_eq!(r[(2, 2)].abs(), 1);
        }
    }
}
