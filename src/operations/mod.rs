pub mod supercell;

pub use supercell::{build_derivative_structure, build_superlattice};
