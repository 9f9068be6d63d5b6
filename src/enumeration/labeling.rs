// src/enumeration/labeling.rs
//
// Species colorings of superlattice sites and their reduction to one
// representative per orbit under (species relabeling x site permutations).

use crate::enumeration::control::EnumerationControl;
use crate::enumeration::permutation::PermutationGroup;
use crate::error::{EnumError, Result};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Species id per site, in canonical site order
pub type Labeling = Vec<usize>;

/// Default upper bound on `num_type^num_sites` for a dense validity table
pub const DEFAULT_DENSE_TABLE_LIMIT: u64 = 1 << 26;

/// Bijection between labelings and `[0, num_type^num_sites)`.
///
/// Little-endian mixed radix: `key = sum_i labeling[i] * num_type^i`.
#[derive(Clone, Debug)]
pub struct LabelingEncoder {
    num_sites: usize,
    num_type: usize,
    capacity: u64,
}

impl LabelingEncoder {
    pub fn new(num_sites: usize, num_type: usize) -> Result<Self> {
        if num_type == 0 {
            return Err(EnumError::configuration("number of species must be positive"));
        }
        let capacity = u32::try_from(num_sites)
            .ok()
            .and_then(|n| (num_type as u64).checked_pow(n))
            .ok_or_else(|| {
                EnumError::configuration(format!(
                    "{}^{} labelings do not fit a 64-bit key",
                    num_type, num_sites
                ))
            })?;
        Ok(Self {
            num_sites,
            num_type,
            capacity,
        })
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn num_type(&self) -> usize {
        self.num_type
    }

    /// Number of distinct keys, `num_type^num_sites`
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Configuration error unless `labeling` has one species id below
    /// `num_type` per site
    pub fn check(&self, labeling: &[usize]) -> Result<()> {
        if labeling.len() != self.num_sites {
            return Err(EnumError::configuration(format!(
                "labeling has {} entries for {} sites",
                labeling.len(),
                self.num_sites
            )));
        }
        if let Some(&s) = labeling.iter().find(|&&s| s >= self.num_type) {
            return Err(EnumError::configuration(format!(
                "species id {} out of range for {} species",
                s, self.num_type
            )));
        }
        Ok(())
    }

    pub fn encode(&self, labeling: &[usize]) -> u64 {
        labeling
            .iter()
            .rev()
            .fold(0u64, |key, &species| key * self.num_type as u64 + species as u64)
    }

    pub fn decode(&self, mut key: u64) -> Labeling {
        let base = self.num_type as u64;
        (0..self.num_sites)
            .map(|_| {
                let species = (key % base) as usize;
                key /= base;
                species
            })
            .collect()
    }
}

/// "Still a representative" flag per encoded labeling
#[derive(Clone, Debug)]
pub enum ValidityTable {
    /// One flag per key, all valid initially
    Dense(Vec<bool>),
    /// Keys marked invalid; everything else is valid
    Sparse(HashSet<u64>),
}

impl ValidityTable {
    /// Dense when `capacity <= dense_limit`, sparse otherwise
    pub fn new(capacity: u64, dense_limit: u64) -> Self {
        match usize::try_from(capacity) {
            Ok(len) if capacity <= dense_limit => ValidityTable::Dense(vec![true; len]),
            _ => ValidityTable::Sparse(HashSet::new()),
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, ValidityTable::Dense(_))
    }

    pub fn is_valid(&self, key: u64) -> bool {
        match self {
            ValidityTable::Dense(flags) => flags[key as usize],
            ValidityTable::Sparse(invalid) => !invalid.contains(&key),
        }
    }

    pub fn mark_invalid(&mut self, key: u64) {
        match self {
            ValidityTable::Dense(flags) => flags[key as usize] = false,
            ValidityTable::Sparse(invalid) => {
                invalid.insert(key);
            }
        }
    }

    pub fn mark_valid(&mut self, key: u64) {
        match self {
            ValidityTable::Dense(flags) => flags[key as usize] = true,
            ValidityTable::Sparse(invalid) => {
                invalid.remove(&key);
            }
        }
    }
}

/// Lexicographic stream of every labeling in which all species occur
#[derive(Clone, Debug)]
pub struct PossibleLabelings {
    num_type: usize,
    next: Option<Labeling>,
}

impl PossibleLabelings {
    pub fn new(num_sites: usize, num_type: usize) -> Self {
        let next = (num_type > 0 && num_type <= num_sites).then(|| vec![0; num_sites]);
        Self { num_type, next }
    }

    fn advance(&self, current: &[usize]) -> Option<Labeling> {
        let mut succ = current.to_vec();
        for pos in (0..succ.len()).rev() {
            succ[pos] += 1;
            if succ[pos] < self.num_type {
                return Some(succ);
            }
            succ[pos] = 0;
        }
        None
    }

    fn uses_all_species(&self, labeling: &[usize]) -> bool {
        let mut present = vec![false; self.num_type];
        for &s in labeling {
            present[s] = true;
        }
        present.into_iter().all(|p| p)
    }
}

impl Iterator for PossibleLabelings {
    type Item = Labeling;

    fn next(&mut self) -> Option<Labeling> {
        loop {
            let current = self.next.take()?;
            self.next = self.advance(&current);
            if self.uses_all_species(&current) {
                return Some(current);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumerationPhase {
    GeneratePossible,
    RemoveTranslationAndSpeciesDuplicates,
    RemoveSymmetryDuplicates,
    Done,
}

impl fmt::Display for EnumerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EnumerationPhase::GeneratePossible => "generate possible labelings",
            EnumerationPhase::RemoveTranslationAndSpeciesDuplicates => {
                "remove translation and species duplicates"
            }
            EnumerationPhase::RemoveSymmetryDuplicates => "remove symmetry duplicates",
            EnumerationPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Labeling enumeration for one (superlattice, num_type) pair.
///
/// Owns its validity table; the permutation groups are borrowed read-only so
/// that parallel runs over the same superlattice can share them.
pub struct LabelingEnumerator<'a> {
    encoder: LabelingEncoder,
    translation_group: &'a PermutationGroup,
    full_group: &'a PermutationGroup,
    species_permutations: Vec<Vec<usize>>,
    table: ValidityTable,
    dense_table_limit: u64,
    control: Option<&'a EnumerationControl>,
    phase: EnumerationPhase,
}

impl<'a> LabelingEnumerator<'a> {
    pub fn new(
        num_sites: usize,
        num_type: usize,
        translation_group: &'a PermutationGroup,
        full_group: &'a PermutationGroup,
    ) -> Result<Self> {
        for (name, group) in [("translation", translation_group), ("symmetry", full_group)] {
            if group.num_sites() != num_sites {
                return Err(EnumError::configuration(format!(
                    "{} group acts on {} sites, expected {}",
                    name,
                    group.num_sites(),
                    num_sites
                )));
            }
        }
        let encoder = LabelingEncoder::new(num_sites, num_type)?;
        let species_permutations = (0..num_type).permutations(num_type).collect();

        Ok(Self {
            encoder,
            translation_group,
            full_group,
            species_permutations,
            table: ValidityTable::Sparse(HashSet::new()),
            dense_table_limit: DEFAULT_DENSE_TABLE_LIMIT,
            control: None,
            phase: EnumerationPhase::GeneratePossible,
        })
    }

    pub fn with_control(mut self, control: &'a EnumerationControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_dense_table_limit(mut self, limit: u64) -> Self {
        self.dense_table_limit = limit;
        self
    }

    pub fn phase(&self) -> EnumerationPhase {
        self.phase
    }

    pub fn encoder(&self) -> &LabelingEncoder {
        &self.encoder
    }

    /// Fresh validity table plus the stream of candidate labelings.
    /// Restarts the state machine.
    pub fn generate_possible_labelings(&mut self) -> PossibleLabelings {
        self.table = ValidityTable::new(self.encoder.capacity(), self.dense_table_limit);
        log::trace!(
            "{} sites, {} species: {} validity table over {} keys",
            self.encoder.num_sites(),
            self.encoder.num_type(),
            if self.table.is_dense() { "dense" } else { "sparse" },
            self.encoder.capacity()
        );
        self.phase = EnumerationPhase::RemoveTranslationAndSpeciesDuplicates;
        PossibleLabelings::new(self.encoder.num_sites(), self.encoder.num_type())
    }

    /// First sweep: translations x species relabelings. Superperiodic
    /// labelings are dropped.
    pub fn remove_translation_and_species_duplicates<I>(&mut self, labelings: I) -> Result<Vec<Labeling>>
    where
        I: IntoIterator<Item = Labeling>,
    {
        self.expect_phase(EnumerationPhase::RemoveTranslationAndSpeciesDuplicates)?;

        let mut unique = Vec::new();
        let mut visited = 0usize;
        let mut superperiodic = 0usize;

        for labeling in labelings {
            self.check_control()?;
            self.encoder.check(&labeling)?;
            visited += 1;

            let key = self.encoder.encode(&labeling);
            if !self.table.is_valid(key) {
                continue;
            }

            let is_superperiodic = self
                .translation_group
                .iter()
                .filter(|t| !t.is_identity())
                .any(|t| t.act(&labeling) == labeling);
            if is_superperiodic {
                self.table.mark_invalid(key);
                superperiodic += 1;
                continue;
            }

            self.sweep_orbit(&labeling, self.translation_group);
            unique.push(labeling);
        }

        log::trace!(
            "translation sweep: {} candidates, {} superperiodic, {} left",
            visited,
            superperiodic,
            unique.len()
        );
        self.phase = EnumerationPhase::RemoveSymmetryDuplicates;
        Ok(unique)
    }

    /// Second sweep over the full symmetry group
    pub fn remove_symmetry_duplicates<I>(&mut self, labelings: I) -> Result<Vec<Labeling>>
    where
        I: IntoIterator<Item = Labeling>,
    {
        self.expect_phase(EnumerationPhase::RemoveSymmetryDuplicates)?;

        let mut unique = Vec::new();
        for labeling in labelings {
            self.check_control()?;
            self.encoder.check(&labeling)?;
            if !self.table.is_valid(self.encoder.encode(&labeling)) {
                continue;
            }
            self.sweep_orbit(&labeling, self.full_group);
            unique.push(labeling);
        }

        log::trace!("symmetry sweep: {} left", unique.len());
        self.phase = EnumerationPhase::Done;
        Ok(unique)
    }

    pub fn remove_duplicates<I>(&mut self, labelings: I) -> Result<Vec<Labeling>>
    where
        I: IntoIterator<Item = Labeling>,
    {
        let reduced = self.remove_translation_and_species_duplicates(labelings)?;
        self.remove_symmetry_duplicates(reduced)
    }

    /// Full pipeline: generate, then both sweeps
    pub fn inequivalent_labelings(&mut self) -> Result<Vec<Labeling>> {
        let possible = self.generate_possible_labelings();
        self.remove_duplicates(possible)
    }

    /// True when no two labelings share an orbit under species relabeling x
    /// full symmetry group. Quadratic in the group and species counts.
    pub fn check_uniqueness(&self, labelings: &[Labeling]) -> Result<bool> {
        for labeling in labelings {
            self.encoder.check(labeling)?;
        }
        let position: HashMap<u64, usize> = labelings
            .iter()
            .enumerate()
            .map(|(i, l)| (self.encoder.encode(l), i))
            .collect();
        if position.len() != labelings.len() {
            return Ok(false);
        }

        Ok(labelings.iter().enumerate().all(|(i, labeling)| {
            self.species_permutations.iter().all(|sp| {
                let exchanged: Labeling = labeling.iter().map(|&s| sp[s]).collect();
                self.full_group.iter().all(|p| {
                    let key = self.encoder.encode(&p.act(&exchanged));
                    position.get(&key).map_or(true, |&j| j == i)
                })
            })
        }))
    }

    /// Mark the whole orbit of `labeling` invalid, then the labeling itself valid
    fn sweep_orbit(&mut self, labeling: &[usize], group: &PermutationGroup) {
        let Self {
            encoder,
            species_permutations,
            table,
            ..
        } = self;

        for sp in species_permutations.iter() {
            let exchanged: Labeling = labeling.iter().map(|&s| sp[s]).collect();
            for p in group.iter() {
                table.mark_invalid(encoder.encode(&p.act(&exchanged)));
            }
        }
        table.mark_valid(encoder.encode(labeling));
    }

    fn expect_phase(&self, expected: EnumerationPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EnumError::internal(
                "labeling enumerator",
                format!("cannot {} while in phase '{}'", expected, self.phase),
            ))
        }
    }

    fn check_control(&self) -> Result<()> {
        match self.control {
            Some(control) => control.check(),
            None => Ok(()),
        }
    }
}

/// One representative labeling per orbit, in generation order
pub fn enumerate_inequivalent_labelings(
    num_sites: usize,
    num_type: usize,
    translation_group: &PermutationGroup,
    full_group: &PermutationGroup,
) -> Result<Vec<Labeling>> {
    LabelingEnumerator::new(num_sites, num_type, translation_group, full_group)?.inequivalent_labelings()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumeration::fixtures::fcc_rotations;
    use crate::enumeration::permutation::{build_permutation_groups, PermutationGroups};
    use crate::enumeration::superlattice::{generate_all_superlattices, reduce_by_symmetry};
    use crate::utils::linalg::{int_matrix, FracVector};
    use num_rational::Rational64;
    use proptest::prelude::*;

    fn chain_groups(n: i64, mirror: bool) -> PermutationGroups {
        let (rotations, translations) = if mirror {
            (vec![int_matrix(&[&[-1]])], vec![FracVector::from_element(1, Rational64::from_integer(0))])
        } else {
            (vec![], vec![])
        };
        build_permutation_groups(&int_matrix(&[&[n]]), 1, None, &rotations, &translations).unwrap()
    }

    #[test]
    fn test_possible_labelings() {
        let all: Vec<Labeling> = PossibleLabelings::new(4, 2).collect();
        assert_eq!(all.len(), 14);
        assert_eq!(all[0], vec![0, 0, 0, 1]);
        assert_eq!(all[13], vec![1, 1, 1, 0]);
        assert!(all.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(PossibleLabelings::new(3, 3).count(), 6);
        assert_eq!(PossibleLabelings::new(2, 3).count(), 0);
    }

    #[test]
    fn test_chain_of_four() {
        let groups = chain_groups(4, false);
        let mut enumerator =
            LabelingEnumerator::new(4, 2, &groups.translation, &groups.full).unwrap();

        let possible: Vec<Labeling> = enumerator.generate_possible_labelings().collect();
        assert_eq!(possible.len(), 14);

        let unique = enumerator.remove_duplicates(possible).unwrap();
        assert_eq!(unique, vec![vec![0, 0, 0, 1], vec![0, 0, 1, 1]]);
        assert!(enumerator.check_uniqueness(&unique).unwrap());
        assert_eq!(enumerator.phase(), EnumerationPhase::Done);
    }

    #[test]
    fn test_chain_with_mirror() {
        let groups = chain_groups(4, true);
        assert_eq!(groups.full.len(), 8);
        let unique = enumerate_inequivalent_labelings(4, 2, &groups.translation, &groups.full).unwrap();
        assert_eq!(unique.len(), 2);

        let groups = chain_groups(5, true);
        let mut enumerator = LabelingEnumerator::new(5, 3, &groups.translation, &groups.full).unwrap();
        let unique = enumerator.inequivalent_labelings().unwrap();
        assert!(enumerator.check_uniqueness(&unique).unwrap());
        assert!(!unique.is_empty());
    }

    #[test]
    fn test_all_species_distinct() {
        let groups = chain_groups(3, false);
        let unique = enumerate_inequivalent_labelings(3, 3, &groups.translation, &groups.full).unwrap();
        assert_eq!(unique, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_single_species() {
        let groups = chain_groups(1, false);
        assert_eq!(
            enumerate_inequivalent_labelings(1, 1, &groups.translation, &groups.full).unwrap(),
            vec![vec![0]]
        );
        // a uniform coloring of a larger cell is superperiodic
        let groups = chain_groups(3, false);
        assert!(enumerate_inequivalent_labelings(3, 1, &groups.translation, &groups.full)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_sparse_table_matches_dense() {
        let groups = chain_groups(6, true);
        let dense = LabelingEnumerator::new(6, 2, &groups.translation, &groups.full)
            .unwrap()
            .inequivalent_labelings()
            .unwrap();
        let mut enumerator = LabelingEnumerator::new(6, 2, &groups.translation, &groups.full)
            .unwrap()
            .with_dense_table_limit(0);
        let sparse = enumerator.inequivalent_labelings().unwrap();
        assert_eq!(dense, sparse);
        assert!(enumerator.check_uniqueness(&sparse).unwrap());
    }

    #[test]
    fn test_check_uniqueness_detects_duplicates() {
        let groups = chain_groups(4, false);
        let enumerator = LabelingEnumerator::new(4, 2, &groups.translation, &groups.full).unwrap();
        // translation images
        assert!(!enumerator.check_uniqueness(&[vec![0, 0, 0, 1], vec![0, 0, 1, 0]]).unwrap());
        // species exchange
        assert!(!enumerator.check_uniqueness(&[vec![0, 0, 0, 1], vec![1, 1, 1, 0]]).unwrap());
        assert!(enumerator.check_uniqueness(&[vec![0, 0, 0, 1], vec![0, 0, 1, 1]]).unwrap());
    }

    #[test]
    fn test_fcc_binary() {
        let rotations = fcc_rotations();
        let translations = vec![FracVector::from_element(3, Rational64::from_integer(0)); rotations.len()];
        let expected = [(2, 2), (3, 3), (4, 12)];

        for (index, count) in expected {
            let reduced = reduce_by_symmetry(&generate_all_superlattices(index).unwrap(), &rotations);
            let mut total = 0;
            for hnf in &reduced {
                let groups = build_permutation_groups(hnf, 1, None, &rotations, &translations).unwrap();
                let mut enumerator =
                    LabelingEnumerator::new(index as usize, 2, &groups.translation, &groups.full).unwrap();
                let unique = enumerator.inequivalent_labelings().unwrap();
                assert!(enumerator.check_uniqueness(&unique).unwrap(), "duplicates for {}", hnf);
                total += unique.len();
            }
            assert_eq!(total, count, "fcc binary index {}", index);
        }
    }

    #[test]
    fn test_phase_order_is_enforced() {
        let groups = chain_groups(2, false);
        let mut enumerator = LabelingEnumerator::new(2, 2, &groups.translation, &groups.full).unwrap();
        assert!(matches!(
            enumerator.remove_symmetry_duplicates(vec![vec![0, 1]]),
            Err(EnumError::InternalConsistency { .. })
        ));
    }

    #[test]
    fn test_cancelled_run() {
        let groups = chain_groups(4, false);
        let control = EnumerationControl::new();
        control.cancel();
        let mut enumerator = LabelingEnumerator::new(4, 2, &groups.translation, &groups.full)
            .unwrap()
            .with_control(&control);
        assert!(matches!(enumerator.inequivalent_labelings(), Err(EnumError::Cancelled)));
    }

    #[test]
    fn test_configuration_errors() {
        let groups = chain_groups(4, false);
        assert!(matches!(
            LabelingEnumerator::new(3, 2, &groups.translation, &groups.full),
            Err(EnumError::Configuration(_))
        ));
        assert!(matches!(LabelingEncoder::new(4, 0), Err(EnumError::Configuration(_))));
        assert!(matches!(LabelingEncoder::new(64, 2), Err(EnumError::Configuration(_))));
        assert_eq!(LabelingEncoder::new(63, 2).unwrap().capacity(), 1 << 63);
    }

    #[test]
    fn test_malformed_labelings_are_rejected() {
        let groups = chain_groups(4, true);
        let mut enumerator = LabelingEnumerator::new(4, 2, &groups.translation, &groups.full).unwrap();
        assert!(matches!(
            enumerator.check_uniqueness(&[vec![0, 0, 2, 1]]),
            Err(EnumError::Configuration(_))
        ));
        assert!(matches!(
            enumerator.check_uniqueness(&[vec![0, 1]]),
            Err(EnumError::Configuration(_))
        ));

        let _ = enumerator.generate_possible_labelings();
        assert!(matches!(
            enumerator.remove_translation_and_species_duplicates(vec![vec![0, 0, 0, 1], vec![0, 3, 0, 1]]),
            Err(EnumError::Configuration(_))
        ));

        let _ = enumerator.generate_possible_labelings();
        let reduced = enumerator
            .remove_translation_and_species_duplicates(vec![vec![0, 0, 0, 1]])
            .unwrap();
        assert_eq!(reduced.len(), 1);
        assert!(matches!(
            enumerator.remove_symmetry_duplicates(vec![vec![0, 0, 1]]),
            Err(EnumError::Configuration(_))
        ));
    }

    #[test]
    fn test_encoding_is_little_endian() {
        let encoder = LabelingEncoder::new(3, 3).unwrap();
        assert_eq!(encoder.encode(&[1, 0, 0]), 1);
        assert_eq!(encoder.encode(&[0, 0, 1]), 9);
        assert_eq!(encoder.encode(&[2, 2, 2]), encoder.capacity() - 1);
    }

    proptest! {
        #[test]
        fn prop_encode_decode(num_type in 1usize..5, labels in prop::collection::vec(0usize..5, 1..12)) {
            let labeling: Labeling = labels.into_iter().map(|s| s % num_type).collect();
            let encoder = LabelingEncoder::new(labeling.len(), num_type).unwrap();
            let key = encoder.encode(&labeling);
            prop_assert!(key < encoder.capacity());
            prop_assert_eq!(encoder.decode(key), labeling);
        }
    }
}
