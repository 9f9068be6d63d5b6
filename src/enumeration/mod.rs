// src/enumeration/mod.rs
pub mod control;
pub mod driver;
pub mod labeling;
pub mod permutation;
pub mod smith;
pub mod superlattice;

#[cfg(test)]
pub(crate) mod fixtures;

pub use control::EnumerationControl;
pub use driver::{
    enumerate_derivative_structures, DerivativeRecord, EnumerationOptions, EnumerationResult,
    EnumerationSummary, IndexSummary,
};
pub use labeling::{enumerate_inequivalent_labelings, Labeling, LabelingEnumerator};
pub use permutation::{build_permutation_groups, Permutation, PermutationGroup, PermutationGroups};
pub use smith::{decompose_smith_normal_form, SmithNormalForm};
pub use superlattice::{generate_all_superlattices, reduce_by_symmetry};
