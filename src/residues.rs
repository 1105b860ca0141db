use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Mainchain atom names of an amino acid.
pub const MAINCHAIN_ATOMS: [&str; 4] = ["CA", "N", "C", "O"];

/// Heavy atom names that make up amino acid side chains.
pub const SIDECHAIN_ATOMS: [&str; 32] = [
    "CZ2", "OE2", "OE1", "OG1", "CD1", "CD2", "CG2", "NE", "NZ", "OD1", "ND1", "ND2", "OD2", "CB",
    "CZ3", "CG", "CZ", "NH1", "CE", "CE1", "NH2", "CG1", "CD", "OH", "OG", "SG", "CH2", "NE1",
    "CE3", "SD", "NE2", "CE2",
];

const DNA_RESIDUES: [&str; 4] = ["DA", "DT", "DC", "DG"];
const RNA_RESIDUES: [&str; 4] = ["A", "G", "C", "U"];

/// Residue names treated as protein when no library file is supplied.
const AMINO_ACIDS: [&str; 34] = [
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET",
    "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL", // standard
    "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "CYX", "CYM", "ASH", "GLH", "LYN", "MSE", "SEC",
    "PYL",
];

/// Atom name to subgroup category for nucleotides.
const NUCLEIC_SUBGROUPS: [(&str, &str); 29] = [
    ("P", "phosphate"),
    ("OP1", "phosphate"),
    ("OP2", "phosphate"),
    ("O1P", "phosphate"),
    ("O2P", "phosphate"),
    ("O5'", "phosphate"),
    ("C5'", "sugar"),
    ("C4'", "sugar"),
    ("O4'", "sugar"),
    ("C3'", "sugar"),
    ("O3'", "sugar"),
    ("C2'", "sugar"),
    ("O2'", "sugar"),
    ("C1'", "sugar"),
    ("N1", "base"),
    ("C2", "base"),
    ("O2", "base"),
    ("N2", "base"),
    ("N3", "base"),
    ("C4", "base"),
    ("O4", "base"),
    ("N4", "base"),
    ("C5", "base"),
    ("C6", "base"),
    ("O6", "base"),
    ("N6", "base"),
    ("N7", "base"),
    ("C8", "base"),
    ("N9", "base"),
];

/// The struct for a residue identifier.
///
/// Chain and sequence number are assumed stable across all frames of one ensemble.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub struct ResidueKey {
    /// Chain identifier
    pub chain: char,
    /// Residue sequence number
    pub resi: isize,
}

impl ResidueKey {
    /// Key of residue `resi` on `chain`.
    pub fn new(chain: char, resi: isize) -> Self {
        Self { chain, resi }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.resi, self.chain)
    }
}

/// Kind of molecule a residue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoleculeType {
    /// Amino acid residue
    Protein,
    /// Deoxyribonucleotide
    Dna,
    /// Ribonucleotide
    Rna,
    /// Anything else, e.g. ligands and solvent
    Unknown,
}

impl fmt::Display for MoleculeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoleculeType::Protein => write!(f, "Protein"),
            MoleculeType::Dna => write!(f, "DNA"),
            MoleculeType::Rna => write!(f, "RNA"),
            MoleculeType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Structural subgroup of an atom within its residue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subgroup {
    /// Amino acid N, CA, C or O
    Mainchain,
    /// Amino acid side chain heavy atom
    Sidechain,
    /// Category from the nucleotide table, e.g. `phosphate`
    Nucleic(String),
    /// Not found in any table
    Unknown,
}

impl fmt::Display for Subgroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subgroup::Mainchain => write!(f, "mainchain"),
            Subgroup::Sidechain => write!(f, "sidechain"),
            Subgroup::Nucleic(name) => write!(f, "{name}"),
            Subgroup::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Residue and atom name tables used to classify atom records.
///
/// The built-in tables can be replaced with `*.lib` files. A library file that
/// cannot be read leaves its table empty and everything it would have matched
/// is classified as `Unknown`.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    protein: HashSet<String>,
    dna: HashSet<String>,
    rna: HashSet<String>,
    nucleic_subgroups: HashMap<String, String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            protein: AMINO_ACIDS.iter().map(|s| s.to_string()).collect(),
            dna: DNA_RESIDUES.iter().map(|s| s.to_string()).collect(),
            rna: RNA_RESIDUES.iter().map(|s| s.to_string()).collect(),
            nucleic_subgroups: NUCLEIC_SUBGROUPS
                .iter()
                .map(|(atom, group)| (atom.to_string(), group.to_string()))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Replace the protein residue names with the third column of every
    /// non-comment line in `path`.
    pub fn with_protein_library(mut self, path: &Path) -> Self {
        self.protein = read_library(path)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|fields| fields.get(2).cloned())
                    .collect()
            })
            .unwrap_or_default();
        debug!("Loaded {} protein residue names", self.protein.len());
        self
    }

    /// Replace the nucleotide subgroup table. Each non-comment line maps the atom
    /// name in the last column to the category in the second column.
    pub fn with_nucleic_library(mut self, path: &Path) -> Self {
        self.nucleic_subgroups = read_library(path)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|fields| fields.len() >= 2)
                    .map(|fields| (fields[fields.len() - 1].clone(), fields[1].clone()))
                    .collect()
            })
            .unwrap_or_default();
        debug!(
            "Loaded {} nucleotide atom categories",
            self.nucleic_subgroups.len()
        );
        self
    }

    /// Molecule type of a residue name.
    pub fn molecule_type(&self, resn: &str) -> MoleculeType {
        if self.protein.contains(resn) {
            MoleculeType::Protein
        } else if self.dna.contains(resn) {
            MoleculeType::Dna
        } else if self.rna.contains(resn) {
            MoleculeType::Rna
        } else {
            MoleculeType::Unknown
        }
    }

    /// Subgroup of an atom within a residue of the given type.
    pub fn subgroup(&self, moltype: MoleculeType, atom_name: &str) -> Subgroup {
        match moltype {
            MoleculeType::Protein => {
                if MAINCHAIN_ATOMS.contains(&atom_name) {
                    Subgroup::Mainchain
                } else if SIDECHAIN_ATOMS.contains(&atom_name) {
                    Subgroup::Sidechain
                } else {
                    Subgroup::Unknown
                }
            }
            MoleculeType::Dna | MoleculeType::Rna => self
                .nucleic_subgroups
                .get(atom_name)
                .map_or(Subgroup::Unknown, |group| Subgroup::Nucleic(group.clone())),
            MoleculeType::Unknown => Subgroup::Unknown,
        }
    }
}

/// Split every non-comment line of a library file into whitespace fields.
fn read_library(path: &Path) -> Option<Vec<Vec<String>>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(
            content
                .lines()
                .filter(|line| !line.contains('#'))
                .map(|line| line.split_whitespace().map(str::to_string).collect())
                .collect(),
        ),
        Err(e) => {
            warn!(
                "Could not read library file {}: {e}. Affected atoms will be classified as Unknown",
                path.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn classify_protein_atoms() {
        let vocab = Vocabulary::default();
        let moltype = vocab.molecule_type("LYS");
        assert_eq!(moltype, MoleculeType::Protein);
        assert_eq!(vocab.subgroup(moltype, "CA"), Subgroup::Mainchain);
        assert_eq!(vocab.subgroup(moltype, "NZ"), Subgroup::Sidechain);
        assert_eq!(vocab.subgroup(moltype, "HZ1"), Subgroup::Unknown);
    }

    #[test]
    fn classify_nucleotides() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.molecule_type("DA"), MoleculeType::Dna);
        assert_eq!(vocab.molecule_type("U"), MoleculeType::Rna);
        assert_eq!(vocab.molecule_type("HOH"), MoleculeType::Unknown);
        assert_eq!(
            vocab.subgroup(MoleculeType::Dna, "P"),
            Subgroup::Nucleic("phosphate".to_string())
        );
        assert_eq!(vocab.subgroup(MoleculeType::Unknown, "CA"), Subgroup::Unknown);
    }

    #[test]
    fn missing_library_degrades_to_unknown() {
        let vocab = Vocabulary::default()
            .with_protein_library(Path::new("/nonexistent/amino-acid.lib"))
            .with_nucleic_library(Path::new("/nonexistent/nucleic-acid.lib"));
        assert_eq!(vocab.molecule_type("ALA"), MoleculeType::Unknown);
        assert_eq!(vocab.subgroup(MoleculeType::Rna, "P"), Subgroup::Unknown);
    }

    #[test]
    fn load_library_files() {
        let mut amino = tempfile::NamedTempFile::new().unwrap();
        writeln!(amino, "# index code name").unwrap();
        writeln!(amino, "1 A ALA").unwrap();
        writeln!(amino, "2 X NLE").unwrap();
        let mut nucleic = tempfile::NamedTempFile::new().unwrap();
        writeln!(nucleic, "# index category atom").unwrap();
        writeln!(nucleic, "1 backbone P").unwrap();

        let vocab = Vocabulary::default()
            .with_protein_library(amino.path())
            .with_nucleic_library(nucleic.path());
        assert_eq!(vocab.molecule_type("NLE"), MoleculeType::Protein);
        assert_eq!(vocab.molecule_type("GLY"), MoleculeType::Unknown);
        assert_eq!(
            vocab.subgroup(MoleculeType::Dna, "P"),
            Subgroup::Nucleic("backbone".to_string())
        );
        assert_eq!(vocab.subgroup(MoleculeType::Dna, "C1'"), Subgroup::Unknown);
    }

    #[test]
    fn residue_label() {
        assert_eq!(ResidueKey::new('A', 42).to_string(), "42_A");
    }
}
