//! Atom-level contacts between polar atoms of the reference frame.

use crate::records::AtomRecord;
use crate::selection::AtomSelection;
use polars::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::{debug, trace};

/// Elements considered for atom-level contacts.
const POLAR_ELEMENTS: [&str; 4] = ["P", "S", "N", "O"];

/// Receptor atom position tagged with its index in the receptor selection.
type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// A close ligand-receptor atom pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomContact {
    /// Ligand residue as `RES_resi_subgroup`
    pub ligand_residue: String,
    /// Receptor residue as `RES_resi_subgroup`
    pub receptor_residue: String,
    /// Ligand atom name
    pub ligand_atom: String,
    /// Receptor atom name
    pub receptor_atom: String,
    /// Distance in Å
    pub distance: f64,
}

fn is_polar(atom: &AtomRecord) -> bool {
    POLAR_ELEMENTS.contains(&atom.element.to_uppercase().as_str())
}

/// Find all polar atom pairs within `cutoff` of each other.
///
/// Results are ordered by ligand atom, then by receptor atom, both in selection
/// order.
pub fn atomic_contacts(
    reference: &[AtomRecord],
    receptor: &AtomSelection,
    ligand: &AtomSelection,
    cutoff: f64,
) -> Vec<AtomContact> {
    let receptor_points: Vec<IndexedPoint> = receptor
        .positions
        .iter()
        .enumerate()
        .filter(|(_, &p)| is_polar(&reference[p]))
        .map(|(i, &p)| {
            let pos = reference[p].pos;
            GeomWithData::new([pos.x, pos.y, pos.z], i)
        })
        .collect();
    debug!(
        "Searching {} polar receptor atoms within {cutoff} Å of the ligand",
        receptor_points.len()
    );
    let tree = RTree::bulk_load(receptor_points);
    let max_distance_squared = cutoff * cutoff;

    let mut contacts = Vec::new();
    for &lig_pos in &ligand.positions {
        let lig_atom = &reference[lig_pos];
        if !is_polar(lig_atom) {
            continue;
        }
        let query = [lig_atom.pos.x, lig_atom.pos.y, lig_atom.pos.z];
        let mut hits: Vec<usize> = tree
            .locate_within_distance(query, max_distance_squared)
            .map(|point| point.data)
            .collect();
        hits.sort_unstable();

        for i in hits {
            let rec_atom = &reference[receptor.positions[i]];
            let distance = (lig_atom.pos - rec_atom.pos).norm();
            trace!(
                "{} {} - {} {}: {distance:.3}",
                lig_atom.detail_label(),
                lig_atom.name,
                rec_atom.detail_label(),
                rec_atom.name
            );
            contacts.push(AtomContact {
                ligand_residue: lig_atom.detail_label(),
                receptor_residue: rec_atom.detail_label(),
                ligand_atom: lig_atom.name.clone(),
                receptor_atom: rec_atom.name.clone(),
                distance,
            });
        }
    }
    contacts
}

/// Convert atom contacts into a Polars DataFrame.
pub fn atomic_contacts_to_df(res: &[AtomContact]) -> PolarsResult<DataFrame> {
    df!(
        "ligand_residue" => res.iter().map(|x| x.ligand_residue.to_owned()).collect::<Vec<String>>(),
        "receptor_residue" => res.iter().map(|x| x.receptor_residue.to_owned()).collect::<Vec<String>>(),
        "ligand_atom" => res.iter().map(|x| x.ligand_atom.to_owned()).collect::<Vec<String>>(),
        "receptor_atom" => res.iter().map(|x| x.receptor_atom.to_owned()).collect::<Vec<String>>(),
        "distance" => res.iter().map(|x| x.distance).collect::<Vec<f64>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reference_records;
    use crate::frames::FrameSource;
    use crate::residues::Vocabulary;
    use crate::selection::{AtomClass, AtomCriterion, AtomSelector, ResidueQuery};
    use std::path::Path;

    fn reference() -> Vec<AtomRecord> {
        let root = env!("CARGO_MANIFEST_DIR");
        let source = FrameSource::open(&Path::new(root).join("test-data/ensemble.pdb")).unwrap();
        let frames = source.scan().unwrap();
        reference_records(&source, &frames, &Vocabulary::default()).unwrap()
    }

    fn select(records: &[AtomRecord], tokens: &[&str]) -> AtomSelection {
        let tokens: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        let query = ResidueQuery::from_triplets(&tokens).unwrap();
        AtomSelector::new(records).select_query(&query, &AtomCriterion::Class(AtomClass::AllAtom))
    }

    #[test]
    fn polar_contacts_within_cutoff() {
        let records = reference();
        let receptor = select(&records, &["A", "1", "2"]);
        let ligand = select(&records, &["B", "20", "20"]);

        let contacts = atomic_contacts(&records, &receptor, &ligand, 6.0);
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        assert_eq!(contact.ligand_atom, "O1");
        assert_eq!(contact.receptor_atom, "N");
        assert_eq!(contact.receptor_residue, "ALA_1_mainchain");
        assert_eq!(contact.ligand_residue, "LIG_20_Unknown");
        assert!((contact.distance - 32.04_f64.sqrt()).abs() < 1e-9);

        assert!(atomic_contacts(&records, &receptor, &ligand, 5.0).is_empty());
    }

    #[test]
    fn contacts_table() {
        let records = reference();
        let receptor = select(&records, &["A", "10", "10"]);
        let ligand = select(&records, &["A", "1", "1"]);
        let contacts = atomic_contacts(&records, &receptor, &ligand, 3.5);
        let pairs: Vec<(&str, &str)> = contacts
            .iter()
            .map(|c| (c.ligand_atom.as_str(), c.receptor_atom.as_str()))
            .collect();
        assert_eq!(pairs, vec![("N", "N"), ("O", "O")]);

        let df = atomic_contacts_to_df(&contacts).unwrap();
        assert_eq!(df.shape(), (2, 5));
        assert_eq!(df.column("distance").unwrap().f64().unwrap().get(0), Some(3.0));
    }
}
