// src/lib.rs

pub mod cli;
pub mod config;
pub mod enumeration;
pub mod error;
pub mod io;
pub mod model;
pub mod operations;
pub mod utils;

pub use config::EnumConfig;
pub use enumeration::{
    build_permutation_groups, decompose_smith_normal_form, enumerate_derivative_structures,
    enumerate_inequivalent_labelings, generate_all_superlattices, reduce_by_symmetry,
    EnumerationControl, EnumerationOptions,
};
pub use error::{EnumError, Result};
pub use model::{ParentCell, ParentSymmetry, Structure};
