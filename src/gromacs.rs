//! GROMACS index groups and position restraint files.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Atom serials per line of an index group.
pub const SERIALS_PER_LINE: usize = 15;

/// Force constant of generated position restraints in kJ mol^-1 nm^-2.
pub const POSRES_FORCE: u32 = 1000;

/// Content of one `[ group ]` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexGroup {
    /// Atom serials
    Atoms(Vec<usize>),
    /// Dihedral quadruplets, `-1` for unresolved atoms
    Dihedrals(Vec<[i64; 4]>),
}

impl IndexGroup {
    /// Number of serials or quadruplets.
    pub fn len(&self) -> usize {
        match self {
            IndexGroup::Atoms(serials) => serials.len(),
            IndexGroup::Dihedrals(tuples) => tuples.len(),
        }
    }

    /// True if the group holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write a named group, 15 serials per line or one quadruplet per line.
pub fn write_index_group<W: Write>(out: &mut W, name: &str, group: &IndexGroup) -> Result<()> {
    writeln!(out, "[ {} ]", name.trim())?;
    match group {
        IndexGroup::Atoms(serials) => {
            for line in serials.chunks(SERIALS_PER_LINE) {
                let fields: Vec<String> = line.iter().map(|s| format!("{s:>4}")).collect();
                writeln!(out, "{}", fields.join(" "))?;
            }
        }
        IndexGroup::Dihedrals(tuples) => {
            for tuple in tuples {
                let fields: Vec<String> = tuple.iter().map(|s| format!("{s:>5}")).collect();
                writeln!(out, "{}", fields.join(" "))?;
            }
        }
    }
    Ok(())
}

/// Write an index group to `path`, appending to existing groups if requested.
pub fn write_index_file(path: &Path, name: &str, group: &IndexGroup, append: bool) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    let mut out = BufWriter::new(file);
    write_index_group(&mut out, name, group)?;
    out.flush()?;
    Ok(())
}

/// Write harmonic position restraints for the given atoms.
pub fn write_posres<W: Write>(out: &mut W, serials: &[usize]) -> Result<()> {
    writeln!(out, "[ position_restraints ]")?;
    writeln!(out, "; ai  funct  fcx    fcy    fcz")?;
    for serial in serials {
        writeln!(
            out,
            "{serial:>12}  1  {POSRES_FORCE}  {POSRES_FORCE}  {POSRES_FORCE}"
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms_wrap_every_fifteen() {
        let mut out = Vec::new();
        let serials: Vec<usize> = (1..=17).collect();
        write_index_group(&mut out, "A_1_5 ", &IndexGroup::Atoms(serials)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "[ A_1_5 ]");
        assert_eq!(lines[1].split_whitespace().count(), 15);
        assert_eq!(lines[2], "  16   17");
    }

    #[test]
    fn dihedrals_one_per_line() {
        let mut out = Vec::new();
        let group = IndexGroup::Dihedrals(vec![[-1, 1, 2, 3], [3, 7, 8, 9]]);
        write_index_group(&mut out, "phi", &group).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "[ phi ]\n   -1     1     2     3\n    3     7     8     9\n"
        );
    }

    #[test]
    fn append_groups_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.ndx");
        write_index_file(&path, "first", &IndexGroup::Atoms(vec![1, 2]), true).unwrap();
        write_index_file(&path, "second", &IndexGroup::Atoms(vec![3]), true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[ first ]\n   1    2\n[ second ]\n   3\n");

        write_index_file(&path, "only", &IndexGroup::Atoms(vec![4]), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[ only ]\n   4\n");
    }

    #[test]
    fn position_restraints() {
        let mut out = Vec::new();
        write_posres(&mut out, &[5, 120]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[ position_restraints ]");
        assert_eq!(lines[2], "           5  1  1000  1000  1000");
        assert_eq!(lines.len(), 4);
    }
}
