use clap::Parser;
use cmapper::{
    append_extension, atomic_contacts, atomic_contacts_to_df, get_contact_map, matrix_to_df,
    rank_path, reference_records, triplets_to_df, write_df_to_file, write_whitespace_table,
    AtomCriterion, AtomSelector, CmapError, ContactMap, ContactSettings, CountPolicy,
    DataFrameFileType, FrameSource, MapSide, Normalization, ResidueQuery, Result, Vocabulary,
};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Multi-model PDB file with one MODEL/ENDMDL block per frame
    #[arg(short, long)]
    input: PathBuf,

    /// Contact matrix output file
    #[arg(short, long, default_value = "ContactMap.dat")]
    output: PathBuf,

    /// Receptor-ligand-probability table. Defaults to the matrix path with the format extension appended
    #[arg(long)]
    triplets: Option<PathBuf>,

    /// Output file type of the triplet table and the atom details
    #[arg(short = 't', long, default_value_t = DataFrameFileType::Xyz)]
    output_format: DataFrameFileType,

    /// Receptor residues as `chain start end` triplets, e.g. A 1 250 B 1 30
    #[arg(long = "rc", num_args = 3.., default_values = ["A", "1", "250"])]
    receptor: Vec<String>,

    /// Ligand residues as `chain start end` triplets
    #[arg(long = "lc", num_args = 3.., default_values = ["A", "1", "250"])]
    ligand: Vec<String>,

    /// Distance cutoff in Å
    #[arg(short, long, default_value_t = 3.5)]
    cutoff: f64,

    /// Atom type of both sides, or of the receptor and the ligand:
    /// CA, mainchain, backbone, all-atom, non-hydrogen, side-chain, side-chain-noH,
    /// or a single atom name
    #[arg(short = 'a', long = "atomtype", num_args = 1..=2, default_values = ["CA"])]
    atom_type: Vec<String>,

    /// Receptor atom names, overriding the atom type
    #[arg(long = "atomname1", num_args = 1..)]
    atom_names_receptor: Vec<String>,

    /// Ligand atom names, overriding the atom type
    #[arg(long = "atomname2", num_args = 1..)]
    atom_names_ligand: Vec<String>,

    /// Weight alpha-carbon pairs with a switch function instead of a hard cutoff
    #[arg(long, default_value_t = false)]
    switch: bool,

    /// Number of workers the frames are split over, 0 for all available cores
    #[arg(short = 'j', long = "num-workers", default_value_t = 0)]
    num_workers: usize,

    /// Only process the first N frames
    #[arg(long = "max-frames")]
    max_frames: Option<usize>,

    /// Write polar atom contacts of the first frame to this file instead of computing the map
    #[arg(long)]
    details: Option<PathBuf>,

    /// Divide accumulated counts by the number of frames or by the number of workers
    #[arg(long = "normalize", default_value_t = Normalization::Frames)]
    normalization: Normalization,

    /// Minimum number of atom pairs within the cutoff for a residue contact.
    /// By default 1, or 2 if the selections hold more atom pairs than there are residue pairs
    #[arg(long = "count-cutoff")]
    count_cutoff: Option<f64>,

    /// Amino acid library file, residue names in the third column
    #[arg(long = "amino-lib")]
    amino_lib: Option<PathBuf>,

    /// Nucleic acid library file mapping atom names (last column) to subgroups (second column)
    #[arg(long = "nucleic-lib")]
    nucleic_lib: Option<PathBuf>,

    /// Also write the matrix and triplets of every worker, prefixed with its rank
    #[arg(long, default_value_t = false)]
    partials: bool,
}

fn parse_criterion(token: &str) -> Result<AtomCriterion> {
    token
        .parse::<AtomCriterion>()
        .map_err(CmapError::InvalidArgument)
}

/// Resolve the receptor and ligand atom criteria.
fn side_criteria(args: &Args) -> Result<(AtomCriterion, AtomCriterion)> {
    let (mut receptor, mut ligand) = match args.atom_type.as_slice() {
        [both] => (parse_criterion(both)?, parse_criterion(both)?),
        [rec, lig] => (parse_criterion(rec)?, parse_criterion(lig)?),
        _ => {
            return Err(CmapError::InvalidArgument(
                "atom type takes one or two values".to_string(),
            ))
        }
    };
    if !args.atom_names_receptor.is_empty() {
        receptor = AtomCriterion::Names(args.atom_names_receptor.clone());
    }
    if !args.atom_names_ligand.is_empty() {
        ligand = AtomCriterion::Names(args.atom_names_ligand.clone());
    }
    Ok((receptor, ligand))
}

fn vocabulary(args: &Args) -> Vocabulary {
    let mut vocab = Vocabulary::default();
    if let Some(path) = &args.amino_lib {
        vocab = vocab.with_protein_library(path);
    }
    if let Some(path) = &args.nucleic_lib {
        vocab = vocab.with_nucleic_library(path);
    }
    vocab
}

fn prepare_output_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");

    let (receptor_criterion, ligand_criterion) = side_criteria(args)?;
    let receptor = MapSide {
        query: ResidueQuery::from_triplets(&args.receptor)?,
        criterion: receptor_criterion,
    };
    let ligand = MapSide {
        query: ResidueQuery::from_triplets(&args.ligand)?,
        criterion: ligand_criterion,
    };
    let vocab = vocabulary(args);

    if let Some(details) = &args.details {
        return write_details(args, &receptor, &ligand, &vocab, details);
    }

    let settings = ContactSettings {
        cutoff: args.cutoff,
        use_switch: args.switch,
        count_policy: args
            .count_cutoff
            .map_or(CountPolicy::Adaptive, CountPolicy::Fixed),
        normalization: args.normalization,
    };
    debug!("{settings:?}");

    let map = get_contact_map(
        &args.input,
        &receptor,
        &ligand,
        &settings,
        &vocab,
        args.num_workers,
        args.max_frames,
    )?;

    prepare_output_dir(&args.output)?;
    let triplets_path = args
        .triplets
        .clone()
        .unwrap_or_else(|| append_extension(&args.output, args.output_format));
    write_map(&map, &args.output, &triplets_path, args.output_format)?;

    if args.partials {
        for partial in &map.partials {
            let counts = partial.counts.to_matrix();
            let mut df = matrix_to_df(&map.receptor_labels, &map.ligand_labels, &counts)?;
            write_whitespace_table(&mut df, &rank_path(&args.output, partial.rank))?;

            let triplets = map.triplets_of(&partial.probabilities());
            let mut df = triplets_to_df(&triplets)?;
            write_df_to_file(
                &mut df,
                &rank_path(&triplets_path, partial.rank),
                args.output_format,
            )?;
        }
        info!("Per-worker results saved next to {}", args.output.display());
    }

    Ok(())
}

fn write_map(
    map: &ContactMap,
    matrix_path: &Path,
    triplets_path: &Path,
    output_format: DataFrameFileType,
) -> Result<()> {
    let mut df_matrix = matrix_to_df(&map.receptor_labels, &map.ligand_labels, &map.probabilities)?;
    write_whitespace_table(&mut df_matrix, matrix_path)?;
    info!("Contact matrix saved to {}", matrix_path.display());

    let mut df_triplets = triplets_to_df(&map.triplets())?;
    let df_contacts = df_triplets
        .clone()
        .lazy()
        .filter(col("Contact_probability").gt(lit(0.0)))
        .sort(
            ["Contact_probability"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .collect()?;
    info!(
        "Found {} residue pairs in contact\n{}",
        df_contacts.height(),
        df_contacts
    );

    write_df_to_file(&mut df_triplets, triplets_path, output_format)?;
    info!("Contact probabilities saved to {}", triplets_path.display());
    Ok(())
}

fn write_details(
    args: &Args,
    receptor: &MapSide,
    ligand: &MapSide,
    vocab: &Vocabulary,
    output: &Path,
) -> Result<()> {
    let source = FrameSource::open(&args.input)?;
    let frames = source.scan()?;
    let reference = reference_records(&source, &frames, vocab)?;

    let selector = AtomSelector::new(&reference);
    let receptor_sel = selector.select_query(&receptor.query, &receptor.criterion);
    if receptor_sel.positions.is_empty() {
        return Err(CmapError::EmptySelection { side: "receptor" });
    }
    let ligand_sel = selector.select_query(&ligand.query, &ligand.criterion);
    if ligand_sel.positions.is_empty() {
        return Err(CmapError::EmptySelection { side: "ligand" });
    }

    let contacts = atomic_contacts(&reference, &receptor_sel, &ligand_sel, args.cutoff);
    let mut df = atomic_contacts_to_df(&contacts)?;
    info!("Found {} polar atom contacts\n{}", df.height(), df);

    prepare_output_dir(output)?;
    write_df_to_file(&mut df, output, args.output_format)?;
    info!("Atom contacts saved to {}", output.display());
    Ok(())
}
