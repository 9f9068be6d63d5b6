// src/enumeration/permutation.rs
//
// Canonical site indexing of a superlattice and the permutation groups that
// translations and parent symmetry operations induce on its sites.

use crate::enumeration::smith::{decompose_smith_normal_form, SmithNormalForm};
use crate::enumeration::superlattice::stabilizes;
use crate::error::{EnumError, Result};
use crate::utils::linalg::{
    determinant, inverse_unimodular, matrix_rows, to_rational, wrap_unit, FracVector, IntMatrix,
};
use nalgebra::DVector;
use num_rational::Rational64;
use std::collections::HashSet;
use std::fmt;

/// Bijection on site indices; position `i` holds the image of site `i`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permutation(Vec<usize>);

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Permutation((0..n).collect())
    }

    /// Wrap an image sequence. Bijectivity is checked by [`validate_permutations`].
    pub fn new(images: Vec<usize>) -> Self {
        Permutation(images)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn images(&self) -> &[usize] {
        &self.0
    }

    pub fn image(&self, site: usize) -> usize {
        self.0[site]
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &p)| i == p)
    }

    pub fn is_bijection(&self) -> bool {
        let n = self.0.len();
        let mut seen = vec![false; n];
        for &p in &self.0 {
            if p >= n || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        true
    }

    /// `(self ∘ other)(i) = self(other(i))`
    pub fn compose(&self, other: &Permutation) -> Permutation {
        Permutation(other.0.iter().map(|&i| self.0[i]).collect())
    }

    pub fn inverse(&self) -> Permutation {
        let mut inv = vec![0; self.0.len()];
        for (i, &p) in self.0.iter().enumerate() {
            inv[p] = i;
        }
        Permutation(inv)
    }

    /// Act on a site-ordered sequence: `out[i] = values[self(i)]`
    pub fn act<T: Copy>(&self, values: &[T]) -> Vec<T> {
        self.0.iter().map(|&p| values[p]).collect()
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Check that every element is a bijection on `[0, num_sites)` and that no
/// element repeats.
pub fn validate_permutations(perms: &[Permutation], num_sites: usize) -> Result<()> {
    let mut seen = HashSet::with_capacity(perms.len());
    for (k, p) in perms.iter().enumerate() {
        if p.len() != num_sites || !p.is_bijection() {
            return Err(EnumError::internal(
                "validate_permutations",
                format!("element #{} is not a permutation of {} sites: {}", k, num_sites, p),
            ));
        }
        if !seen.insert(p) {
            return Err(EnumError::internal(
                "validate_permutations",
                format!("element #{} duplicates an earlier permutation: {}", k, p),
            ));
        }
    }
    Ok(())
}

/// Immutable, validated set of site permutations
#[derive(Clone, Debug)]
pub struct PermutationGroup {
    num_sites: usize,
    elements: Vec<Permutation>,
}

impl PermutationGroup {
    pub fn new(num_sites: usize, elements: Vec<Permutation>) -> Result<Self> {
        validate_permutations(&elements, num_sites)?;
        Ok(Self { num_sites, elements })
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Permutation> {
        self.elements.iter()
    }

    pub fn elements(&self) -> &[Permutation] {
        &self.elements
    }

    pub fn contains(&self, p: &Permutation) -> bool {
        self.elements.contains(p)
    }

    /// Closure under composition (quadratic; for validation only)
    pub fn is_closed(&self) -> bool {
        let set: HashSet<&Permutation> = self.elements.iter().collect();
        self.elements
            .iter()
            .all(|a| self.elements.iter().all(|b| set.contains(&a.compose(b))))
    }
}

/// Maps superlattice sites to `(parent_site, f_1, .., f_d)` with `f_k` in
/// `[0, D_kk)`, `D` being the SNF of the HNF. Site indices unravel row-major
/// over `shape = (num_site_parent, D_11, .., D_dd)`.
#[derive(Clone, Debug)]
pub struct SiteIndexing {
    hnf: IntMatrix,
    snf: SmithNormalForm,
    left_inv: IntMatrix,
    shape: Vec<usize>,
    displacement_set: Vec<FracVector>,
}

impl SiteIndexing {
    pub fn new(
        hnf: &IntMatrix,
        num_site_parent: usize,
        displacement_set: Option<&[FracVector]>,
    ) -> Result<Self> {
        let snf = decompose_smith_normal_form(hnf)?;
        let dim = snf.dim();

        if determinant(hnf) <= 0 {
            return Err(EnumError::configuration(format!(
                "HNF {:?} must have a positive determinant",
                matrix_rows(hnf)
            )));
        }
        if num_site_parent == 0 {
            return Err(EnumError::configuration("parent cell has no sites"));
        }

        let displacement_set: Vec<FracVector> = match displacement_set {
            Some(ds) => {
                if ds.len() != num_site_parent {
                    return Err(EnumError::configuration(format!(
                        "displacement set has {} entries but the parent has {} sites",
                        ds.len(),
                        num_site_parent
                    )));
                }
                if let Some(bad) = ds.iter().find(|d| d.len() != dim) {
                    return Err(EnumError::configuration(format!(
                        "displacement of length {} in a {}-dimensional lattice",
                        bad.len(),
                        dim
                    )));
                }
                ds.iter().map(|d| d.map(wrap_unit)).collect()
            }
            None if num_site_parent == 1 => vec![FracVector::from_element(dim, Rational64::from_integer(0))],
            None => {
                return Err(EnumError::configuration(format!(
                    "{} parent sites need an explicit displacement set",
                    num_site_parent
                )))
            }
        };

        for (i, a) in displacement_set.iter().enumerate() {
            if displacement_set[i + 1..].contains(a) {
                return Err(EnumError::configuration(format!(
                    "parent sites {} and another site coincide",
                    i
                )));
            }
        }

        let left_inv = inverse_unimodular(&snf.left).ok_or_else(|| {
            EnumError::internal(
                format!("HNF {:?}", matrix_rows(hnf)),
                "left SNF factor is not unimodular",
            )
        })?;

        let mut shape = vec![num_site_parent];
        shape.extend(snf.diagonal().iter().map(|&d| d as usize));

        Ok(Self {
            hnf: hnf.clone(),
            snf,
            left_inv,
            shape,
            displacement_set,
        })
    }

    pub fn hnf(&self) -> &IntMatrix {
        &self.hnf
    }

    pub fn snf(&self) -> &SmithNormalForm {
        &self.snf
    }

    pub fn dim(&self) -> usize {
        self.hnf.nrows()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn num_site_parent(&self) -> usize {
        self.shape[0]
    }

    /// Superlattice index, `det(HNF)`
    pub fn index(&self) -> usize {
        self.shape[1..].iter().product()
    }

    pub fn num_sites(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn displacement_set(&self) -> &[FracVector] {
        &self.displacement_set
    }

    /// Row-major ravel of `(parent_site, factors mod D)`
    pub fn ravel(&self, parent_site: usize, factors: &[i64]) -> usize {
        let mut idx = parent_site;
        for (k, &f) in factors.iter().enumerate() {
            let d = self.shape[k + 1];
            idx = idx * d + f.rem_euclid(d as i64) as usize;
        }
        idx
    }

    pub fn unravel(&self, site: usize) -> (usize, Vec<i64>) {
        let mut factors = vec![0i64; self.dim()];
        let mut rest = site;
        for k in (0..self.dim()).rev() {
            let d = self.shape[k + 1];
            factors[k] = (rest % d) as i64;
            rest /= d;
        }
        (rest, factors)
    }

    /// Group element of a parent lattice point: `L * n mod D`
    pub fn lattice_factors(&self, lattice_point: &DVector<i64>) -> Vec<i64> {
        let f = &self.snf.left * lattice_point;
        f.iter()
            .enumerate()
            .map(|(k, v)| v.rem_euclid(self.shape[k + 1] as i64))
            .collect()
    }

    /// Fractional coordinate of a site in the parent basis: `d_s + L^-1 f`
    pub fn parent_frac_coords(&self, site: usize) -> FracVector {
        let (s, factors) = self.unravel(site);
        let lattice_point = &self.left_inv * DVector::from_vec(factors);
        &self.displacement_set[s] + lattice_point.map(Rational64::from_integer)
    }

    /// The `index` pure translations of the superlattice, identity first
    pub fn translation_group(&self) -> Result<PermutationGroup> {
        let num_sites = self.num_sites();
        let mut elements = Vec::with_capacity(self.index());

        for t in 0..self.index() {
            let (_, shift) = self.unravel(t);
            let images = (0..num_sites)
                .map(|site| {
                    let (s, factors) = self.unravel(site);
                    let moved: Vec<i64> = factors.iter().zip(&shift).map(|(f, t)| f + t).collect();
                    self.ravel(s, &moved)
                })
                .collect();
            elements.push(Permutation::new(images));
        }

        PermutationGroup::new(num_sites, elements).map_err(|e| self.with_context(e, "translations"))
    }

    /// Site permutation induced by `x -> rotation * x + translation`.
    ///
    /// The operation must already stabilize the superlattice. Every image is
    /// split into an integer lattice point and a fractional part in [0, 1),
    /// which must equal one of the displacement vectors exactly.
    pub fn operation_permutation(
        &self,
        rotation: &IntMatrix,
        translation: &FracVector,
    ) -> Result<Permutation> {
        let rot = to_rational(rotation);
        let mut images = Vec::with_capacity(self.num_sites());

        for site in 0..self.num_sites() {
            let moved = &rot * self.parent_frac_coords(site) + translation;
            let lattice_point = moved.map(|x| x.floor().to_integer());
            let frac_part = moved.map(wrap_unit);

            let target = self
                .displacement_set
                .iter()
                .position(|d| *d == frac_part)
                .ok_or_else(|| {
                    EnumError::internal(
                        format!("HNF {:?}", matrix_rows(&self.hnf)),
                        format!(
                            "image {} of site {} matches no displacement",
                            frac_part.transpose(),
                            site
                        ),
                    )
                })?;

            images.push(self.ravel(target, &self.lattice_factors(&lattice_point)));
        }

        let perm = Permutation::new(images);
        validate_permutations(std::slice::from_ref(&perm), self.num_sites())
            .map_err(|e| self.with_context(e, "symmetry operation"))?;
        Ok(perm)
    }

    fn with_context(&self, err: EnumError, what: &str) -> EnumError {
        match err {
            EnumError::InternalConsistency { detail, .. } => EnumError::internal(
                format!("HNF {:?}, {}", matrix_rows(&self.hnf), what),
                detail,
            ),
            other => other,
        }
    }
}

/// Translation group and full symmetry group of one superlattice
#[derive(Clone, Debug)]
pub struct PermutationGroups {
    pub translation: PermutationGroup,
    pub full: PermutationGroup,
    /// Indices of the input operations that map the superlattice onto itself
    pub stabilizer: Vec<usize>,
}

/// Build the site permutation groups of the superlattice `hnf`.
///
/// `rotations[k]`/`translations[k]` form the parent's k-th symmetry operation
/// in fractional coordinates. Operations that do not map the superlattice onto
/// itself are skipped; a surviving operation whose site images cannot be
/// matched, or are not a bijection, aborts with `InternalConsistency`.
pub fn build_permutation_groups(
    hnf: &IntMatrix,
    num_site_parent: usize,
    displacement_set: Option<&[FracVector]>,
    rotations: &[IntMatrix],
    translations: &[FracVector],
) -> Result<PermutationGroups> {
    if rotations.len() != translations.len() {
        return Err(EnumError::configuration(format!(
            "{} rotations but {} translations",
            rotations.len(),
            translations.len()
        )));
    }

    let sites = SiteIndexing::new(hnf, num_site_parent, displacement_set)?;
    let dim = sites.dim();
    let translation = sites.translation_group()?;

    let mut operations = vec![Permutation::identity(sites.num_sites())];
    let mut stabilizer = Vec::new();

    for (k, (r, t)) in rotations.iter().zip(translations).enumerate() {
        if r.shape() != (dim, dim) || t.len() != dim {
            return Err(EnumError::configuration(format!(
                "operation #{} does not act on a {}-dimensional lattice",
                k, dim
            )));
        }
        if !stabilizes(hnf, r) {
            log::trace!("operation #{} does not stabilize {:?}", k, matrix_rows(hnf));
            continue;
        }
        let perm = sites.operation_permutation(r, t).map_err(|e| match e {
            EnumError::InternalConsistency { context, detail } => {
                EnumError::internal(format!("{}, operation #{}", context, k), detail)
            }
            other => other,
        })?;
        stabilizer.push(k);
        operations.push(perm);
    }

    // translations x stabilizing operations
    let mut seen = HashSet::new();
    let mut elements = Vec::new();
    for g in &operations {
        for t in translation.iter() {
            let p = t.compose(g);
            if seen.insert(p.clone()) {
                elements.push(p);
            }
        }
    }
    let full = PermutationGroup::new(sites.num_sites(), elements)
        .map_err(|e| sites.with_context(e, "full symmetry group"))?;

    log::debug!(
        "HNF {:?}: {} sites, {} translations, {}/{} operations stabilize, full group {}",
        matrix_rows(hnf),
        sites.num_sites(),
        translation.len(),
        stabilizer.len(),
        rotations.len(),
        full.len()
    );

    Ok(PermutationGroups {
        translation,
        full,
        stabilizer,
    })
}
