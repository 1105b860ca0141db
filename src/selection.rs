//! Atom selections resolved on a reference frame.
//!
//! A selection stores frame positions (indices into the frame's atom records),
//! so it can be applied to every later frame without resolving names again.
//! Frames must therefore share the same atom order.

use crate::error::{CmapError, Result};
use crate::records::AtomRecord;
use crate::residues::{ResidueKey, MAINCHAIN_ATOMS};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Atom substituted for the missing side chain of glycine in side-chain-noH selections.
const GLY_PLACEHOLDER_ATOM: &str = "H";

const BACKBONE_ATOMS: [&str; 2] = ["CA", "N"];
const PHI_ATOMS: [(&str, isize); 4] = [("C", -1), ("N", 0), ("CA", 0), ("C", 0)];
const PSI_ATOMS: [(&str, isize); 4] = [("N", 0), ("CA", 0), ("C", 0), ("N", 1)];

/// Named groups of atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomClass {
    /// Alpha carbons
    CAlpha,
    /// N, CA, C and O
    Mainchain,
    /// CA and N
    Backbone,
    /// Every atom
    AllAtom,
    /// Atoms that are not hydrogens by name or element
    NonHydrogen,
    /// Atoms outside the mainchain, hydrogens included
    SideChain,
    /// Side chain heavy atoms. Glycine contributes its `H` atom instead
    SideChainNoH,
}

/// Backbone dihedral angles written as atom quadruplets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DihedralKind {
    /// C(i-1), N, CA, C
    Phi,
    /// N, CA, C, N(i+1)
    Psi,
    /// Both, PHI first for every residue
    PhiPsi,
}

/// How atoms are picked within the selected residues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomCriterion {
    /// Atoms with any of these names
    Names(Vec<String>),
    /// A named group of atoms
    Class(AtomClass),
    /// Dihedral quadruplets instead of single atoms
    Dihedral(DihedralKind),
}

impl FromStr for AtomCriterion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let criterion = match s {
            "" => return Err("empty atom type".to_string()),
            "CA" | "Ca" | "alpha" | "Alpha" | "Alpha-Carbon" => {
                AtomCriterion::Class(AtomClass::CAlpha)
            }
            "main" | "mainchain" | "Mainchain" | "MainChain" => {
                AtomCriterion::Class(AtomClass::Mainchain)
            }
            "back" | "backbone" | "Backbone" | "BackBone" => {
                AtomCriterion::Class(AtomClass::Backbone)
            }
            "all" | "all-atom" | "All-Atom" | "ALL" => AtomCriterion::Class(AtomClass::AllAtom),
            "noH" | "non-H" | "non-hydrogen" | "Non-H" | "no-h" | "heavy" => {
                AtomCriterion::Class(AtomClass::NonHydrogen)
            }
            "side" | "side-chain" | "sidechain" | "Sidechain" => {
                AtomCriterion::Class(AtomClass::SideChain)
            }
            "side-chain-noH" | "sidechain-noH" => AtomCriterion::Class(AtomClass::SideChainNoH),
            "PHI" | "phi" => AtomCriterion::Dihedral(DihedralKind::Phi),
            "PSI" | "psi" => AtomCriterion::Dihedral(DihedralKind::Psi),
            "PHI_PSI" | "phi_psi" => AtomCriterion::Dihedral(DihedralKind::PhiPsi),
            name => AtomCriterion::Names(vec![name.to_string()]),
        };
        Ok(criterion)
    }
}

impl AtomCriterion {
    /// Selects exactly the alpha carbons.
    pub fn is_calpha(&self) -> bool {
        match self {
            AtomCriterion::Class(AtomClass::CAlpha) => true,
            AtomCriterion::Names(names) => names.len() == 1 && names[0] == "CA",
            _ => false,
        }
    }

    fn matches(&self, atom: &AtomRecord) -> bool {
        let name = atom.name.as_str();
        let heavy = !atom.is_hydrogen && atom.element != "H";
        match self {
            AtomCriterion::Names(names) => names.iter().any(|n| n == name),
            AtomCriterion::Class(class) => match class {
                AtomClass::CAlpha => name == "CA",
                AtomClass::Mainchain => MAINCHAIN_ATOMS.contains(&name),
                AtomClass::Backbone => BACKBONE_ATOMS.contains(&name),
                AtomClass::AllAtom => true,
                AtomClass::NonHydrogen => heavy,
                AtomClass::SideChain => !MAINCHAIN_ATOMS.contains(&name),
                AtomClass::SideChainNoH => {
                    if atom.resn == "GLY" {
                        name == GLY_PLACEHOLDER_ATOM
                    } else {
                        !MAINCHAIN_ATOMS.contains(&name) && heavy
                    }
                }
            },
            AtomCriterion::Dihedral(_) => false,
        }
    }
}

/// Serial of the atom, or its 1-based frame position if the serial is unreadable.
fn index_number(pos: usize, atom: &AtomRecord) -> usize {
    atom.serial.unwrap_or(pos + 1)
}

/// Union of inclusive residue number intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidueRanges(Vec<RangeInclusive<isize>>);

impl ResidueRanges {
    /// Add the interval `start..=end`.
    pub fn push(&mut self, start: isize, end: isize) {
        self.0.push(start..=end);
    }

    /// Whether any interval covers `resi`.
    pub fn contains(&self, resi: isize) -> bool {
        self.0.iter().any(|r| r.contains(&resi))
    }

    /// Every residue number covered, interval by interval.
    pub fn residues(&self) -> impl Iterator<Item = isize> + '_ {
        self.0.iter().flat_map(|r| r.clone())
    }
}

/// Chains and residue numbers of one side of the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidueQuery {
    /// Chain identifiers in order of first mention
    pub chains: Vec<char>,
    /// Residue numbers, shared by all chains
    pub ranges: ResidueRanges,
}

impl ResidueQuery {
    /// Parse repeated `chain start end` triplets, e.g. `A 1 250 B 1 30`.
    pub fn from_triplets(tokens: &[String]) -> Result<Self> {
        if tokens.is_empty() || tokens.len() % 3 != 0 {
            return Err(CmapError::InvalidArgument(format!(
                "residue selection needs `chain start end` triplets, got {tokens:?}"
            )));
        }
        let mut query = ResidueQuery::default();
        for triplet in tokens.chunks(3) {
            let mut chain_chars = triplet[0].chars();
            let chain = match (chain_chars.next(), chain_chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(CmapError::InvalidArgument(format!(
                        "chain identifier must be one character, got '{}'",
                        triplet[0]
                    )))
                }
            };
            let parse = |s: &str| {
                s.parse::<isize>().map_err(|e| {
                    CmapError::InvalidArgument(format!("bad residue number '{s}': {e}"))
                })
            };
            let (start, end) = (parse(&triplet[1])?, parse(&triplet[2])?);
            if start > end {
                return Err(CmapError::InvalidArgument(format!(
                    "residue range {start}-{end} is empty"
                )));
            }
            if !query.chains.contains(&chain) {
                query.chains.push(chain);
            }
            query.ranges.push(start, end);
        }
        Ok(query)
    }

    /// Whether the atom lies in one of the chains and ranges.
    pub fn matches(&self, atom: &AtomRecord) -> bool {
        self.chains.contains(&atom.chain) && self.ranges.contains(atom.resi)
    }
}

/// The selected atoms of one residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueAtoms {
    /// Residue the atoms belong to
    pub key: ResidueKey,
    /// Frame positions of the atoms
    pub positions: Vec<usize>,
}

/// Ordered atoms matching a selection query, grouped by residue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomSelection {
    /// Frame positions in record order
    pub positions: Vec<usize>,
    /// Atom serial numbers, parallel to `positions`. Atoms without a readable
    /// serial get their 1-based frame position
    pub serials: Vec<usize>,
    /// Residues in order of first appearance
    pub residues: Vec<ResidueAtoms>,
    /// Four-atom serial tuples for dihedral criteria, `-1` where unresolved
    pub dihedrals: Vec<[i64; 4]>,
}

impl AtomSelection {
    /// Number of selected atoms.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if neither atoms nor dihedrals were selected.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.dihedrals.is_empty()
    }

    /// Largest frame position referenced, used to validate later frames.
    pub fn max_position(&self) -> Option<usize> {
        self.positions.iter().copied().max()
    }
}

/// Resolves selection queries against the atom records of one frame.
pub struct AtomSelector<'a> {
    records: &'a [AtomRecord],
}

impl<'a> AtomSelector<'a> {
    /// Selector over the records of one frame.
    pub fn new(records: &'a [AtomRecord]) -> Self {
        Self { records }
    }

    /// Atoms of `chains` and `ranges` matching `criterion`, in record order.
    ///
    /// Dihedral criteria fill `dihedrals` and leave the atom lists empty.
    pub fn select(
        &self,
        chains: &[char],
        ranges: &ResidueRanges,
        criterion: &AtomCriterion,
    ) -> AtomSelection {
        if let AtomCriterion::Dihedral(kind) = criterion {
            return AtomSelection {
                dihedrals: self.dihedrals(chains, ranges, *kind),
                ..Default::default()
            };
        }

        let mut selection = AtomSelection::default();
        let mut res2idx: HashMap<ResidueKey, usize> = HashMap::new();
        for (pos, atom) in self.records.iter().enumerate() {
            if !(chains.contains(&atom.chain)
                && ranges.contains(atom.resi)
                && criterion.matches(atom))
            {
                continue;
            }
            selection.positions.push(pos);
            selection.serials.push(index_number(pos, atom));
            let key = atom.key();
            let idx = *res2idx.entry(key).or_insert_with(|| {
                selection.residues.push(ResidueAtoms {
                    key,
                    positions: Vec::new(),
                });
                selection.residues.len() - 1
            });
            selection.residues[idx].positions.push(pos);
        }
        selection
    }

    /// Select with a parsed residue query.
    pub fn select_query(&self, query: &ResidueQuery, criterion: &AtomCriterion) -> AtomSelection {
        self.select(&query.chains, &query.ranges, criterion)
    }

    /// All residues matching the query, regardless of atom type, in record order.
    pub fn residue_keys(&self, query: &ResidueQuery) -> Vec<ResidueKey> {
        let mut keys: Vec<ResidueKey> = Vec::new();
        for atom in self.records.iter().filter(|a| query.matches(a)) {
            let key = atom.key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// PHI/PSI quadruplets for every residue number in `ranges`.
    pub fn dihedrals(
        &self,
        chains: &[char],
        ranges: &ResidueRanges,
        kind: DihedralKind,
    ) -> Vec<[i64; 4]> {
        let mut tuples = Vec::new();
        for resi in ranges.residues() {
            if matches!(kind, DihedralKind::Phi | DihedralKind::PhiPsi) {
                tuples.push(self.resolve_tuple(chains, resi, &PHI_ATOMS));
            }
            if matches!(kind, DihedralKind::Psi | DihedralKind::PhiPsi) {
                tuples.push(self.resolve_tuple(chains, resi, &PSI_ATOMS));
            }
        }
        tuples
    }

    fn resolve_tuple(&self, chains: &[char], resi: isize, atoms: &[(&str, isize); 4]) -> [i64; 4] {
        let mut tuple = [-1; 4];
        for (slot, (name, offset)) in tuple.iter_mut().zip(atoms) {
            if let Some((pos, atom)) = self.records.iter().enumerate().rev().find(|(_, a)| {
                chains.contains(&a.chain) && a.resi == resi + offset && a.name == *name
            }) {
                *slot = index_number(pos, atom) as i64;
            }
        }
        tuple
    }
}
