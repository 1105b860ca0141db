//! Fixed-column ATOM/HETATM records.
//!
//! Columns follow the PDB layout (0-based byte offsets): serial `6..11`,
//! atom name `12..16`, residue name `17..20`, chain `21`, residue number `22..26`,
//! coordinates `30..38`, `38..46`, `46..54` and element `76..78`.

use crate::error::CmapError;
use crate::residues::{MoleculeType, ResidueKey, Subgroup, Vocabulary};
use nalgebra::Vector3;
use tracing::{debug, trace};

/// Shortest line that still carries all three coordinates.
const MIN_RECORD_LEN: usize = 54;

/// Typed fields of one ATOM or HETATM line.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomLine {
    /// Atom serial number, `None` if the column is blank or unreadable
    pub serial: Option<usize>,
    /// Atom name, e.g. `CA`
    pub name: String,
    /// Residue name, e.g. `LYS`
    pub resn: String,
    /// Chain identifier
    pub chain: char,
    /// Residue sequence number
    pub resi: isize,
    /// Cartesian coordinates in Å
    pub pos: Vector3<f64>,
    /// Element symbol, guessed from the atom name if the column is empty
    pub element: String,
}

impl AtomLine {
    /// Check the record type of a line.
    pub fn is_atom_record(line: &str) -> bool {
        line.starts_with("ATOM") || line.starts_with("HETATM")
    }

    /// Parse a fixed-width line, reporting which field failed.
    pub fn parse(line: &str) -> Result<Self, String> {
        if !Self::is_atom_record(line) {
            return Err("not an ATOM/HETATM record".to_string());
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.len() < MIN_RECORD_LEN {
            return Err(format!(
                "record has {} columns, at least {MIN_RECORD_LEN} required",
                line.len()
            ));
        }

        let serial = parse_serial(field(line, 6, 11, "serial")?);
        let name = field(line, 12, 16, "atom name")?.to_string();
        if name.is_empty() {
            return Err("empty atom name".to_string());
        }
        let resn = field(line, 17, 20, "residue name")?.to_string();
        let chain = line
            .get(21..22)
            .and_then(|c| c.chars().next())
            .ok_or_else(|| "missing chain identifier".to_string())?;
        let resi = field(line, 22, 26, "residue number")?
            .parse::<isize>()
            .map_err(|e| format!("bad residue number: {e}"))?;
        let mut coords = [0.0; 3];
        for (i, start) in [30, 38, 46].into_iter().enumerate() {
            coords[i] = field(line, start, start + 8, "coordinate")?
                .parse::<f64>()
                .map_err(|e| format!("bad coordinate: {e}"))?;
        }

        let element = match line.get(76..78).map(str::trim) {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => name
                .chars()
                .find(|c| c.is_ascii_alphabetic())
                .map(|c| c.to_string())
                .unwrap_or_default(),
        };

        Ok(Self {
            serial,
            name,
            resn,
            chain,
            resi,
            pos: Vector3::new(coords[0], coords[1], coords[2]),
            element,
        })
    }

    /// Chain and residue number of the atom.
    pub fn key(&self) -> ResidueKey {
        ResidueKey::new(self.chain, self.resi)
    }
}

/// Decimal serial, or the hexadecimal form some MD engines write past 99999.
fn parse_serial(text: &str) -> Option<usize> {
    let serial = text
        .parse::<usize>()
        .ok()
        .or_else(|| usize::from_str_radix(text, 16).ok());
    if serial.is_none() {
        trace!("Unreadable atom serial '{text}'");
    }
    serial
}

fn field<'a>(line: &'a str, start: usize, end: usize, what: &str) -> Result<&'a str, String> {
    line.get(start..end)
        .map(str::trim)
        .ok_or_else(|| format!("cannot read {what} columns {start}..{end}"))
}

/// A classified atom from a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    /// Atom serial number, if readable
    pub serial: Option<usize>,
    /// Atom name
    pub name: String,
    /// Element symbol
    pub element: String,
    /// Residue name
    pub resn: String,
    /// Residue sequence number
    pub resi: isize,
    /// Chain identifier
    pub chain: char,
    /// Atom name starts with `H`
    pub is_hydrogen: bool,
    /// Molecule type of the residue
    pub moltype: MoleculeType,
    /// Structural subgroup of the atom
    pub subgroup: Subgroup,
    /// Cartesian coordinates in Å
    pub pos: Vector3<f64>,
}

impl AtomRecord {
    /// Classify a parsed line with the residue and atom tables of `vocab`.
    pub fn from_line(line: AtomLine, vocab: &Vocabulary) -> Self {
        let moltype = vocab.molecule_type(&line.resn);
        let subgroup = vocab.subgroup(moltype, &line.name);
        Self {
            serial: line.serial,
            is_hydrogen: line.name.starts_with('H'),
            name: line.name,
            element: line.element,
            resn: line.resn,
            resi: line.resi,
            chain: line.chain,
            moltype,
            subgroup,
            pos: line.pos,
        }
    }

    /// Chain and residue number of the atom.
    pub fn key(&self) -> ResidueKey {
        ResidueKey::new(self.chain, self.resi)
    }

    /// Label used in the atomic details table, e.g. `LYS_42_sidechain`.
    pub fn detail_label(&self) -> String {
        format!("{}_{}_{}", self.resn, self.resi, self.subgroup)
    }
}

/// Parse all atom lines of a frame in order, skipping malformed ones.
pub fn parse_atom_lines(text: &str) -> Vec<AtomLine> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| AtomLine::is_atom_record(line))
        .filter_map(|(i, line)| match AtomLine::parse(line) {
            Ok(atom) => Some(atom),
            Err(reason) => {
                debug!("Skipping {}", CmapError::MalformedRecord { line: i + 1, reason });
                None
            }
        })
        .collect()
}

/// Parse and classify all atom records of a single frame.
pub fn read_atom_records(text: &str, vocab: &Vocabulary) -> Vec<AtomRecord> {
    parse_atom_lines(text)
        .into_iter()
        .map(|line| AtomRecord::from_line(line, vocab))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA_LINE: &str =
        "ATOM      2  CA  LYS A  42      11.104   6.134  -6.504  1.00  0.00           C";

    #[test]
    fn parse_fixed_columns() {
        let atom = AtomLine::parse(CA_LINE).unwrap();
        assert_eq!(atom.serial, Some(2));
        assert_eq!(atom.name, "CA");
        assert_eq!(atom.resn, "LYS");
        assert_eq!(atom.chain, 'A');
        assert_eq!(atom.resi, 42);
        assert_eq!(atom.pos, Vector3::new(11.104, 6.134, -6.504));
        assert_eq!(atom.element, "C");
    }

    #[test]
    fn element_falls_back_to_atom_name() {
        let atom = AtomLine::parse(&CA_LINE[..66]).unwrap();
        assert_eq!(atom.element, "C");
        let line = "HETATM   10 1HB  LIG B 300       1.000   2.000   3.000";
        let atom = AtomLine::parse(line).unwrap();
        assert_eq!(atom.element, "H");
        assert_eq!(atom.chain, 'B');
    }

    #[test]
    fn reject_short_and_garbled_records() {
        assert!(AtomLine::parse("ATOM      2  CA  LYS A  42      11.104").is_err());
        assert!(AtomLine::parse(&CA_LINE.replace("11.104", "xx.xxx")).is_err());
        assert!(AtomLine::parse("REMARK this is not an atom").is_err());
    }

    #[test]
    fn keep_atoms_with_unreadable_serials() {
        let hex = CA_LINE.replace("ATOM      2", "ATOM  186a0");
        assert_eq!(AtomLine::parse(&hex).unwrap().serial, Some(100_000));

        let overflow = CA_LINE.replace("ATOM      2", "ATOM  *****");
        let atom = AtomLine::parse(&overflow).unwrap();
        assert_eq!(atom.serial, None);
        assert_eq!(atom.name, "CA");
        assert_eq!(parse_atom_lines(&format!("{overflow}\n{CA_LINE}\n")).len(), 2);
    }

    #[test]
    fn skip_malformed_lines_in_frame() {
        let text = format!("MODEL        1\n{CA_LINE}\nATOM      3  C   LYS A  42\nTER\n{CA_LINE}\nENDMDL\n");
        let atoms = parse_atom_lines(&text);
        assert_eq!(atoms.len(), 2);
    }

    #[test]
    fn classify_records() {
        let vocab = Vocabulary::default();
        let text = format!(
            "{CA_LINE}\n{}\n",
            "ATOM      3  HZ1 LYS A  42      11.104   6.134  -6.504  1.00  0.00           H"
        );
        let records = read_atom_records(&text, &vocab);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].moltype, MoleculeType::Protein);
        assert_eq!(records[0].subgroup, Subgroup::Mainchain);
        assert!(!records[0].is_hydrogen);
        assert!(records[1].is_hydrogen);
        assert_eq!(records[1].subgroup, Subgroup::Unknown);
        assert_eq!(records[0].key(), ResidueKey::new('A', 42));
        assert_eq!(records[0].detail_label(), "LYS_42_mainchain");
    }
}
