// src/model/structure.rs

use crate::error::{EnumError, Result};
use crate::utils::linalg::{
    cart_to_frac, frac_to_cart, rational_to_f64, snap_to_rational, wrap_unit, FracVector,
};
use num_rational::Rational64;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Atom {
    pub element: String,
    /// Cartesian position
    pub position: [f64; 3],
    /// Canonical site index within the cell it was built for
    #[serde(skip)]
    pub original_index: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Structure {
    // Lattice vectors: [a_vec, b_vec, c_vec]
    pub lattice: [[f64; 3]; 3],
    pub atoms: Vec<Atom>,
    #[serde(skip)]
    pub formula: String,
}

impl Structure {
    /// Reduced formula label such as "Cu3Au" in order of first appearance
    pub fn composition_label(&self) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for atom in &self.atoms {
            match counts.iter_mut().find(|(e, _)| *e == atom.element) {
                Some((_, n)) => *n += 1,
                None => counts.push((atom.element.clone(), 1)),
            }
        }
        counts
            .into_iter()
            .map(|(e, n)| if n == 1 { e } else { format!("{}{}", e, n) })
            .collect()
    }
}

/// Parent lattice plus its sites as exact fractional displacements.
///
/// Every site of the parent is a decoration site of the derivative
/// structures built on top of it.
#[derive(Clone, Debug)]
pub struct ParentCell {
    pub lattice: [[f64; 3]; 3],
    pub displacements: Vec<FracVector>,
    /// Element of each parent site, used to tell sites apart in symmetry search
    pub site_elements: Vec<String>,
}

impl ParentCell {
    pub fn new(
        lattice: [[f64; 3]; 3],
        displacements: Vec<FracVector>,
        site_elements: Vec<String>,
    ) -> Result<Self> {
        if displacements.is_empty() {
            return Err(EnumError::configuration("parent cell has no sites"));
        }
        if displacements.len() != site_elements.len() {
            return Err(EnumError::configuration(format!(
                "{} displacements but {} site elements",
                displacements.len(),
                site_elements.len()
            )));
        }
        if displacements.iter().any(|d| d.len() != 3) {
            return Err(EnumError::configuration("parent displacements must be 3-dimensional"));
        }
        let displacements = displacements.iter().map(|d| d.map(wrap_unit)).collect();
        Ok(Self {
            lattice,
            displacements,
            site_elements,
        })
    }

    /// Single site at the origin
    pub fn primitive(lattice: [[f64; 3]; 3], element: &str) -> Self {
        Self {
            lattice,
            displacements: vec![FracVector::from_element(3, Rational64::from_integer(0))],
            site_elements: vec![element.to_string()],
        }
    }

    /// Snap the atoms of a Cartesian structure onto rational fractional
    /// coordinates with denominators up to `max_denominator`.
    pub fn from_structure(structure: &Structure, max_denominator: i64, tolerance: f64) -> Result<Self> {
        let mut displacements = Vec::with_capacity(structure.atoms.len());
        let mut site_elements = Vec::with_capacity(structure.atoms.len());

        for (i, atom) in structure.atoms.iter().enumerate() {
            let frac = cart_to_frac(atom.position, structure.lattice)
                .ok_or_else(|| EnumError::configuration("parent lattice is singular"))?;
            let mut coords = Vec::with_capacity(3);
            for &x in &frac {
                let r = snap_to_rational(x, max_denominator, tolerance).ok_or_else(|| {
                    EnumError::configuration(format!(
                        "site {} ({}) coordinate {:.6} is not a fraction with denominator <= {}",
                        i, atom.element, x, max_denominator
                    ))
                })?;
                coords.push(r);
            }
            displacements.push(FracVector::from_vec(coords));
            site_elements.push(atom.element.clone());
        }

        Self::new(structure.lattice, displacements, site_elements)
    }

    pub fn num_sites(&self) -> usize {
        self.displacements.len()
    }

    pub fn frac_coords(&self) -> Vec<[f64; 3]> {
        self.displacements
            .iter()
            .map(|d| [rational_to_f64(d[0]), rational_to_f64(d[1]), rational_to_f64(d[2])])
            .collect()
    }

    pub fn to_structure(&self) -> Structure {
        let atoms = self
            .frac_coords()
            .into_iter()
            .zip(&self.site_elements)
            .enumerate()
            .map(|(i, (frac, element))| Atom {
                element: element.clone(),
                position: frac_to_cart(frac, self.lattice),
                original_index: i,
            })
            .collect();
        Structure {
            lattice: self.lattice,
            atoms,
            formula: "parent".to_string(),
        }
    }
}
