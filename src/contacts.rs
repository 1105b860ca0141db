//! Contact map analysis of multi-model structure ensembles.
//!
//! This module ties the frame index, atom selection and parallel engine
//! together and converts the results into Polars DataFrames.

use crate::aggregate::ContactMatrix;
use crate::engine::{
    compute_contact_map, reference_records, ContactJob, ContactMap, ContactSettings, MapSide,
    RayonPool, WorkerPool,
};
use crate::error::Result;
use crate::frames::FrameSource;
use crate::residues::{ResidueKey, Vocabulary};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Calculate the residue-residue contact probability map of an ensemble.
///
/// # Arguments
///
/// * `input` - Multi-model PDB file
/// * `receptor` - Receptor residues and atom criterion (matrix rows)
/// * `ligand` - Ligand residues and atom criterion (matrix columns)
/// * `settings` - Cutoff, switch, count policy and normalization
/// * `vocab` - Residue and atom classification tables
/// * `num_workers` - Number of workers, 0 for all available cores
/// * `max_frames` - Only use the first N frames
///
/// # Example
///
/// ```no_run
/// use cmapper::{get_contact_map, AtomCriterion, ContactSettings, MapSide, ResidueQuery, Vocabulary};
/// use std::path::Path;
///
/// let side = |tokens: &[&str]| MapSide {
///     query: ResidueQuery::from_triplets(&tokens.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap(),
///     criterion: "CA".parse::<AtomCriterion>().unwrap(),
/// };
/// let map = get_contact_map(
///     Path::new("md.pdb"),
///     &side(&["A", "1", "250"]),
///     &side(&["B", "1", "30"]),
///     &ContactSettings::default(),
///     &Vocabulary::default(),
///     0,
///     None,
/// )
/// .unwrap();
/// println!("{} frames", map.frames);
/// ```
pub fn get_contact_map(
    input: &Path,
    receptor: &MapSide,
    ligand: &MapSide,
    settings: &ContactSettings,
    vocab: &Vocabulary,
    num_workers: usize,
    max_frames: Option<usize>,
) -> Result<ContactMap> {
    let source = FrameSource::open(input)?;
    let mut frames = source.scan()?;
    if let Some(n) = max_frames {
        frames.truncate(n);
        debug!("Keeping the first {} frames", frames.len());
    }

    let reference = reference_records(&source, &frames, vocab)?;
    let job = ContactJob::prepare(&reference, receptor, ligand, settings)?;

    let pool = RayonPool::new(num_workers)?;
    debug!("Using {} worker(s)", pool.workers());
    let map = compute_contact_map(&source, &frames, &job, &pool, settings.normalization)?;
    info!(
        "Processed {} frames for {} x {} residues",
        map.frames,
        map.receptor_labels.len(),
        map.ligand_labels.len()
    );
    Ok(map)
}

/// Convert a contact matrix into a wide DataFrame.
///
/// The first column `NDX` holds the receptor residue labels, followed by one
/// column per ligand residue.
pub fn matrix_to_df(
    receptor_labels: &[ResidueKey],
    ligand_labels: &[ResidueKey],
    matrix: &ContactMatrix,
) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(ligand_labels.len() + 1);
    columns.push(Column::new(
        "NDX".into(),
        receptor_labels
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<String>>(),
    ));
    for (j, lig) in ligand_labels.iter().enumerate() {
        columns.push(Column::new(
            lig.to_string().into(),
            (0..receptor_labels.len())
                .map(|i| matrix.get(i, j))
                .collect::<Vec<f64>>(),
        ));
    }
    DataFrame::new(columns)
}

/// Convert `(receptor, ligand, probability)` triplets into a long DataFrame.
pub fn triplets_to_df(triplets: &[(ResidueKey, ResidueKey, f64)]) -> PolarsResult<DataFrame> {
    df!(
        "Receptor" => triplets.iter().map(|x| x.0.to_string()).collect::<Vec<String>>(),
        "Ligand" => triplets.iter().map(|x| x.1.to_string()).collect::<Vec<String>>(),
        "Contact_probability" => triplets.iter().map(|x| x.2).collect::<Vec<f64>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{AtomClass, AtomCriterion, ResidueQuery};

    fn side(tokens: &[&str]) -> MapSide {
        let tokens: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        MapSide {
            query: ResidueQuery::from_triplets(&tokens).unwrap(),
            criterion: AtomCriterion::Class(AtomClass::CAlpha),
        }
    }

    fn ensemble_map(max_frames: Option<usize>) -> ContactMap {
        let root = env!("CARGO_MANIFEST_DIR");
        let settings = ContactSettings {
            cutoff: 4.0,
            ..Default::default()
        };
        get_contact_map(
            &Path::new(root).join("test-data/ensemble.pdb"),
            &side(&["A", "1", "2"]),
            &side(&["A", "10", "10"]),
            &settings,
            &Vocabulary::default(),
            2,
            max_frames,
        )
        .unwrap()
    }

    #[test]
    fn wide_matrix_table() {
        let map = ensemble_map(None);
        let df = matrix_to_df(&map.receptor_labels, &map.ligand_labels, &map.probabilities).unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(
            df.get_column_names_str(),
            vec!["NDX", "10_A"]
        );
        let values = df.column("10_A").unwrap().f64().unwrap();
        assert!((values.get(0).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(values.get(1), Some(0.0));
    }

    #[test]
    fn long_triplet_table() {
        let map = ensemble_map(None);
        let df = triplets_to_df(&map.triplets()).unwrap();
        assert_eq!(df.height(), 2);
        let nonzero = df
            .lazy()
            .filter(col("Contact_probability").gt(lit(0.0)))
            .collect()
            .unwrap();
        assert_eq!(nonzero.height(), 1);
        assert_eq!(
            nonzero.column("Receptor").unwrap().str().unwrap().get(0),
            Some("1_A")
        );
    }

    #[test]
    fn frame_cap() {
        let map = ensemble_map(Some(2));
        assert_eq!(map.frames, 2);
        assert_eq!(map.probabilities.get(0, 0), 1.0);
    }
}
