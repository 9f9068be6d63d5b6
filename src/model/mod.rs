//src/model/mod.rs
pub mod structure;
pub mod symmetry;

// Re-exports for cleaner imports
pub use structure::{Atom, ParentCell, Structure};
pub use symmetry::{distinct_rotations, lattice_point_group, parent_symmetry_operations, ParentSymmetry};
