#![warn(missing_docs)]

//! # Cmapper Library
//!
//! This library computes residue-residue contact probability maps over
//! multi-model PDB ensembles, such as trajectories exported from molecular
//! dynamics runs. Frames are split into contiguous blocks, processed by
//! independent workers, and the per-worker contact counts are summed and
//! normalized at the end.
//!
//! Results are returned as plain matrices and can be converted to Polars
//! DataFrames for output.

mod aggregate;
mod contacts;
mod details;
mod distance;
mod engine;
mod error;
mod frames;
mod gromacs;
mod partition;
mod records;
mod residues;
mod selection;
mod utils;

// Re-export key public types
pub use aggregate::{reduce, ContactCounts, ContactMatrix, Normalization, PartialMap, Reduced};
pub use contacts::{get_contact_map, matrix_to_df, triplets_to_df};
pub use details::{atomic_contacts, atomic_contacts_to_df, AtomContact};
pub use distance::{switch_function, CountPolicy, DistanceEvaluator};
pub use engine::{
    compute_contact_map, reference_records, run_worker, ContactJob, ContactMap, ContactSettings,
    MapSide, RayonPool, SerialPool, WorkerPool,
};
pub use error::{CmapError, Result};
pub use frames::{FrameReader, FrameRef, FrameSource};
pub use gromacs::{write_index_file, write_index_group, write_posres, IndexGroup};
pub use partition::{partition, FrameBlock};
pub use records::{parse_atom_lines, read_atom_records, AtomLine, AtomRecord};
pub use residues::{MoleculeType, ResidueKey, Subgroup, Vocabulary};
pub use selection::{
    AtomClass, AtomCriterion, AtomSelection, AtomSelector, DihedralKind, ResidueAtoms,
    ResidueQuery, ResidueRanges,
};
pub use utils::{
    append_extension, rank_path, write_df_to_file, write_whitespace_table, DataFrameFileType,
};
