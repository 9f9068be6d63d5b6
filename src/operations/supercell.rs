// src/operations/supercell.rs

use crate::enumeration::permutation::SiteIndexing;
use crate::error::{EnumError, Result};
use crate::model::structure::{Atom, ParentCell, Structure};
use crate::utils::linalg::{frac_to_cart, rational_to_f64, solve_rational, to_rational, wrap_unit, IntMatrix};
use nalgebra::DMatrix;

/// Decorate the superlattice `hnf` of `parent` with `labeling`.
///
/// Atom `i` sits on canonical site `i` and carries `species[labeling[i]]`.
pub fn build_derivative_structure(
    parent: &ParentCell,
    hnf: &IntMatrix,
    labeling: &[usize],
    species: &[String],
) -> Result<Structure> {
    if let Some(&bad) = labeling.iter().find(|&&s| s >= species.len()) {
        return Err(EnumError::configuration(format!(
            "labeling uses species {} but only {} species names are given",
            bad,
            species.len()
        )));
    }

    let mut structure = build(parent, hnf, Some(labeling), |site, _| species[labeling[site]].clone())?;
    structure.formula = structure.composition_label();
    Ok(structure)
}

/// Undecorated superlattice: every site keeps its parent element
pub fn build_superlattice(parent: &ParentCell, hnf: &IntMatrix) -> Result<Structure> {
    let mut structure = build(parent, hnf, None, |_, parent_site| parent.site_elements[parent_site].clone())?;
    structure.formula = format!("{} superlattice", structure.composition_label());
    Ok(structure)
}

fn build<F>(parent: &ParentCell, hnf: &IntMatrix, labeling: Option<&[usize]>, element_of: F) -> Result<Structure>
where
    F: Fn(usize, usize) -> String,
{
    if hnf.shape() != (3, 3) {
        return Err(EnumError::InvalidDimension {
            rows: hnf.nrows(),
            cols: hnf.ncols(),
        });
    }
    let sites = SiteIndexing::new(hnf, parent.num_sites(), Some(parent.displacements.as_slice()))?;
    if let Some(labeling) = labeling {
        if labeling.len() != sites.num_sites() {
            return Err(EnumError::configuration(format!(
                "labeling has {} entries for {} sites",
                labeling.len(),
                sites.num_sites()
            )));
        }
    }

    // Supercell vector k = sum_i H[i][k] * a_i
    let a = parent.lattice;
    let mut lattice = [[0.0; 3]; 3];
    for (k, row) in lattice.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = (0..3).map(|i| hnf[(i, k)] as f64 * a[i][c]).sum();
        }
    }

    // Parent fractional coordinates of every site as matrix columns, then
    // solve H x = p for the supercell fractional coordinates
    let num_sites = sites.num_sites();
    let mut parent_frac = DMatrix::zeros(3, num_sites);
    for site in 0..num_sites {
        parent_frac.set_column(site, &sites.parent_frac_coords(site));
    }
    let super_frac = solve_rational(&to_rational(hnf), &parent_frac).ok_or_else(|| {
        EnumError::internal(format!("HNF {}", hnf), "superlattice basis is singular")
    })?;

    let atoms = (0..num_sites)
        .map(|site| {
            let (parent_site, _) = sites.unravel(site);
            let f = super_frac.column(site).map(wrap_unit);
            let frac = [rational_to_f64(f[0]), rational_to_f64(f[1]), rational_to_f64(f[2])];
            Atom {
                element: element_of(site, parent_site),
                position: frac_to_cart(frac, lattice),
                original_index: site,
            }
        })
        .collect();

    Ok(Structure {
        lattice,
        atoms,
        formula: String::new(),
    })
}
