use clap::Parser;
use cmapper::{
    reference_records, write_index_file, write_posres, AtomCriterion, AtomSelector, CmapError,
    FrameSource, IndexGroup, ResidueRanges, Result, Vocabulary,
};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, trace, warn};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// PDB file to select atoms from (the first model is used)
    #[arg(short, long)]
    input: PathBuf,

    /// Index file the group is written to
    #[arg(short, long, default_value = "index.ndx")]
    output: PathBuf,

    /// Chain identifier
    #[arg(short, long, default_value_t = 'A')]
    chain: char,

    /// Residue numbers: one residue, a `start end` range, or an explicit list of three or more
    #[arg(short, long, num_args = 1.., required = true, allow_negative_numbers = true)]
    residues: Vec<isize>,

    /// Atom type: all-atom, mainchain, non-hydrogen, CA, backbone, side-chain,
    /// side-chain-noH, or PHI, PSI, PHI_PSI for dihedral quadruplets
    #[arg(short = 'a', long = "atomtype", default_value = "all")]
    atom_type: String,

    /// Atom names, overriding the atom type
    #[arg(short = 'n', long = "atomname", num_args = 1..)]
    atom_names: Vec<String>,

    /// Name of the index group. Defaults to `<chain>_<first>_<last>`
    #[arg(short, long = "group-name")]
    group_name: Option<String>,

    /// Replace the index file instead of appending the group to it
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Also write position restraints for the selected atoms to this file
    #[arg(long)]
    posres: Option<PathBuf>,
}

fn residue_ranges(residues: &[isize]) -> Result<ResidueRanges> {
    let mut ranges = ResidueRanges::default();
    match residues {
        [] => {
            return Err(CmapError::InvalidArgument(
                "no residue numbers given".to_string(),
            ))
        }
        [single] => ranges.push(*single, *single),
        [start, end] => {
            if start > end {
                return Err(CmapError::InvalidArgument(format!(
                    "residue range {start}-{end} is empty"
                )));
            }
            ranges.push(*start, *end);
        }
        list => list.iter().for_each(|&r| ranges.push(r, r)),
    }
    Ok(ranges)
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");

    let ranges = residue_ranges(&args.residues)?;
    let criterion = if args.atom_names.is_empty() {
        args.atom_type
            .parse::<AtomCriterion>()
            .map_err(CmapError::InvalidArgument)?
    } else {
        AtomCriterion::Names(args.atom_names.clone())
    };

    let source = FrameSource::open(&args.input)?;
    let frames = source.scan()?;
    let reference = reference_records(&source, &frames, &Vocabulary::default())?;
    let selection = AtomSelector::new(&reference).select(&[args.chain], &ranges, &criterion);

    let group = match criterion {
        AtomCriterion::Dihedral(_) => IndexGroup::Dihedrals(selection.dihedrals),
        _ => IndexGroup::Atoms(selection.serials),
    };
    if group.is_empty() {
        return Err(CmapError::EmptySelection { side: "index" });
    }

    let first = args.residues.first().copied().unwrap_or_default();
    let last = args.residues.last().copied().unwrap_or(first);
    let name = args
        .group_name
        .clone()
        .unwrap_or_else(|| format!("{}_{first}_{last}", args.chain));
    write_index_file(&args.output, &name, &group, !args.overwrite)?;
    info!(
        "Wrote {} entries as group [ {name} ] to {}",
        group.len(),
        args.output.display()
    );

    if let Some(path) = &args.posres {
        match &group {
            IndexGroup::Atoms(serials) => {
                let mut out = BufWriter::new(std::fs::File::create(path)?);
                write_posres(&mut out, serials)?;
                out.flush()?;
                info!("Position restraints saved to {}", path.display());
            }
            IndexGroup::Dihedrals(_) => {
                warn!("Position restraints are not written for dihedral groups");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residue_number_forms() {
        let single = residue_ranges(&[7]).unwrap();
        assert_eq!(single.residues().collect::<Vec<_>>(), vec![7]);

        let range = residue_ranges(&[3, 6]).unwrap();
        assert_eq!(range.residues().collect::<Vec<_>>(), vec![3, 4, 5, 6]);

        let list = residue_ranges(&[9, 2, 5]).unwrap();
        assert_eq!(list.residues().collect::<Vec<_>>(), vec![9, 2, 5]);

        assert!(residue_ranges(&[6, 3]).is_err());
        assert!(residue_ranges(&[]).is_err());
    }
}
