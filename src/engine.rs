//! SPMD contact-map computation.
//!
//! Selections are resolved once on the reference frame. The frame list is then
//! split into one contiguous block per worker, every worker accumulates its own
//! count matrix, and the partial matrices are summed at the end.

use crate::aggregate::{reduce, ContactCounts, ContactMatrix, Normalization, PartialMap};
use crate::distance::{CountPolicy, DistanceEvaluator};
use crate::error::{CmapError, Result};
use crate::frames::{FrameRef, FrameSource};
use crate::partition::{partition, FrameBlock};
use crate::records::{parse_atom_lines, read_atom_records, AtomRecord};
use crate::residues::{ResidueKey, Vocabulary};
use crate::selection::{AtomCriterion, AtomSelection, AtomSelector, ResidueAtoms, ResidueQuery};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

/// Knobs of the contact criterion and the final normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSettings {
    /// Distance cutoff in Å
    pub cutoff: f64,
    /// Score Cα pairs with the switch function instead of a hard cutoff
    pub use_switch: bool,
    /// Atom pairs required for a hard-cutoff contact
    pub count_policy: CountPolicy,
    /// Divisor of the summed contact weights
    pub normalization: Normalization,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            cutoff: 3.5,
            use_switch: false,
            count_policy: CountPolicy::default(),
            normalization: Normalization::default(),
        }
    }
}

/// Residues and atom criterion of one side of the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSide {
    /// Chains and residue numbers
    pub query: ResidueQuery,
    /// Atoms scored within each residue
    pub criterion: AtomCriterion,
}

/// Everything a worker needs to score frames, resolved on the reference frame.
#[derive(Debug, Clone)]
pub struct ContactJob {
    /// Row labels, one per receptor residue
    pub receptor_labels: Vec<ResidueKey>,
    /// Column labels, one per ligand residue
    pub ligand_labels: Vec<ResidueKey>,
    receptor: AtomSelection,
    ligand: AtomSelection,
    evaluator: DistanceEvaluator,
    /// Fewest atoms a frame may have
    min_atoms: usize,
}

impl ContactJob {
    /// Resolve both sides on the reference frame and fix the contact criterion.
    ///
    /// Fails if a side selects no atoms, if a labelled residue has no selected
    /// atoms, or if a side asks for dihedral quadruplets.
    pub fn prepare(
        reference: &[AtomRecord],
        receptor: &MapSide,
        ligand: &MapSide,
        settings: &ContactSettings,
    ) -> Result<Self> {
        let selector = AtomSelector::new(reference);
        let (receptor_sel, receptor_labels) = resolve_side(&selector, receptor, "receptor")?;
        let (ligand_sel, ligand_labels) = resolve_side(&selector, ligand, "ligand")?;

        let use_switch = if settings.use_switch
            && !(receptor.criterion.is_calpha() && ligand.criterion.is_calpha())
        {
            warn!("The switch function requires alpha-carbon selections on both sides, using the hard cutoff instead");
            false
        } else {
            settings.use_switch
        };

        let residue_pairs = receptor_labels.len() * ligand_labels.len();
        let count_cutoff =
            settings
                .count_policy
                .threshold(receptor_sel.len(), ligand_sel.len(), residue_pairs);
        debug!(
            "Selected {} receptor atoms in {} residues and {} ligand atoms in {} residues, count cutoff {count_cutoff}",
            receptor_sel.len(),
            receptor_labels.len(),
            ligand_sel.len(),
            ligand_labels.len()
        );

        let min_atoms = receptor_sel
            .max_position()
            .max(ligand_sel.max_position())
            .map_or(0, |p| p + 1);

        Ok(Self {
            receptor_labels,
            ligand_labels,
            receptor: receptor_sel,
            ligand: ligand_sel,
            evaluator: DistanceEvaluator::new(settings.cutoff, count_cutoff, use_switch),
            min_atoms,
        })
    }

    /// Number of receptor and ligand residues.
    pub fn shape(&self) -> (usize, usize) {
        (self.receptor_labels.len(), self.ligand_labels.len())
    }

    /// Criterion applied to every residue pair.
    pub fn evaluator(&self) -> &DistanceEvaluator {
        &self.evaluator
    }

    /// Receptor atoms, rows in label order.
    pub fn receptor_selection(&self) -> &AtomSelection {
        &self.receptor
    }

    /// Ligand atoms, rows in label order.
    pub fn ligand_selection(&self) -> &AtomSelection {
        &self.ligand
    }

    /// Add the contacts of one frame to `counts`.
    pub fn score_frame(&self, coords: &[Vector3<f64>], counts: &mut ContactCounts) -> Result<()> {
        if coords.len() < self.min_atoms {
            return Err(CmapError::DimensionMismatch {
                context: "atoms in frame",
                expected: self.min_atoms,
                found: coords.len(),
            });
        }
        let gather = |selection: &AtomSelection| -> Vec<Vec<Vector3<f64>>> {
            selection
                .residues
                .iter()
                .map(|r| r.positions.iter().map(|&p| coords[p]).collect())
                .collect()
        };
        let receptor = gather(&self.receptor);
        let ligand = gather(&self.ligand);

        for (i, rec) in receptor.iter().enumerate() {
            for (j, lig) in ligand.iter().enumerate() {
                let value = self.evaluator.contact(rec, lig);
                if value > 0.0 {
                    trace!(
                        "Contact {} - {}: {value:.4}",
                        self.receptor_labels[i],
                        self.ligand_labels[j]
                    );
                    counts.add(i, j, value);
                }
            }
        }
        Ok(())
    }
}

fn resolve_side(
    selector: &AtomSelector,
    side: &MapSide,
    name: &'static str,
) -> Result<(AtomSelection, Vec<ResidueKey>)> {
    if let AtomCriterion::Dihedral(kind) = side.criterion {
        return Err(CmapError::InvalidArgument(format!(
            "dihedral atom type {kind:?} cannot be used for a contact map"
        )));
    }
    let mut selection = selector.select_query(&side.query, &side.criterion);
    if selection.positions.is_empty() {
        return Err(CmapError::EmptySelection { side: name });
    }

    // Rows follow the labels, which may differ from selection order when a
    // residue's atoms are not contiguous in the file
    let labels = selector.residue_keys(&side.query);
    let found = selection.residues.len();
    let mut by_key: HashMap<ResidueKey, ResidueAtoms> = selection
        .residues
        .drain(..)
        .map(|residue| (residue.key, residue))
        .collect();
    selection.residues = labels
        .iter()
        .map(|key| by_key.remove(key))
        .collect::<Option<Vec<ResidueAtoms>>>()
        .ok_or(CmapError::DimensionMismatch {
            context: if name == "receptor" {
                "receptor residues with selected atoms"
            } else {
                "ligand residues with selected atoms"
            },
            expected: labels.len(),
            found,
        })?;
    Ok((selection, labels))
}

/// Read and classify the atoms of the first frame.
pub fn reference_records(
    source: &FrameSource,
    frames: &[FrameRef],
    vocab: &Vocabulary,
) -> Result<Vec<AtomRecord>> {
    let first = frames.first().ok_or_else(|| CmapError::EmptyFrameList {
        path: source.path().to_path_buf(),
    })?;
    let text = source.reader()?.read(first)?;
    Ok(read_atom_records(&text, vocab))
}

/// Accumulate contact counts over one block of frames.
pub fn run_worker(source: &FrameSource, block: &FrameBlock, job: &ContactJob) -> Result<PartialMap> {
    let (rows, cols) = job.shape();
    let mut counts = ContactCounts::zeros(rows, cols);
    if block.frames.is_empty() {
        warn!("Worker {} has no frames to process", block.rank);
        return Ok(PartialMap {
            rank: block.rank,
            frames: 0,
            counts,
        });
    }

    let mut reader = source.reader()?;
    let n = block.frames.len();
    for (k, frame) in block.frames.iter().enumerate() {
        debug!(
            "Worker {}: frame {} of {n} (model {})",
            block.rank,
            k + 1,
            frame.model
        );
        let text = reader.read(frame)?;
        let coords: Vec<Vector3<f64>> = parse_atom_lines(&text).into_iter().map(|a| a.pos).collect();
        job.score_frame(&coords, &mut counts)?;
    }

    Ok(PartialMap {
        rank: block.rank,
        frames: n,
        counts,
    })
}

/// Executes one closure per frame block.
pub trait WorkerPool {
    /// Number of blocks the frame list is split into.
    fn workers(&self) -> usize;

    /// Apply `f` to every block, returning results in rank order.
    fn map_blocks<T, F>(&self, blocks: &[FrameBlock], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&FrameBlock) -> T + Sync + Send;
}

/// Runs the blocks one after another on the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct SerialPool {
    /// Number of blocks, at least one
    pub workers: usize,
}

impl WorkerPool for SerialPool {
    fn workers(&self) -> usize {
        self.workers.max(1)
    }

    fn map_blocks<T, F>(&self, blocks: &[FrameBlock], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&FrameBlock) -> T + Sync + Send,
    {
        blocks.iter().map(f).collect()
    }
}

/// One block per thread of a dedicated rayon pool.
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

impl RayonPool {
    /// Build a pool with `num_threads` threads, 0 for all available cores.
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| CmapError::InvalidArgument(format!("cannot start worker pool: {e}")))?;
        Ok(Self { pool })
    }
}

impl WorkerPool for RayonPool {
    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn map_blocks<T, F>(&self, blocks: &[FrameBlock], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&FrameBlock) -> T + Sync + Send,
    {
        self.pool.install(|| blocks.par_iter().map(f).collect())
    }
}

/// Aggregated contact probabilities with their residue labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMap {
    /// Row labels
    pub receptor_labels: Vec<ResidueKey>,
    /// Column labels
    pub ligand_labels: Vec<ResidueKey>,
    /// Contact weights summed over all frames
    pub counts: ContactCounts,
    /// Normalized contact probabilities
    pub probabilities: ContactMatrix,
    /// Frames processed by all workers
    pub frames: usize,
    /// Per-worker counts in rank order
    pub partials: Vec<PartialMap>,
}

impl ContactMap {
    /// `(receptor, ligand, probability)` in receptor-major order.
    pub fn triplets(&self) -> Vec<(ResidueKey, ResidueKey, f64)> {
        self.triplets_of(&self.probabilities)
    }

    /// Label every entry of a matrix with the same shape as this map.
    pub fn triplets_of(&self, matrix: &ContactMatrix) -> Vec<(ResidueKey, ResidueKey, f64)> {
        self.receptor_labels
            .iter()
            .enumerate()
            .flat_map(|(i, rec)| {
                self.ligand_labels
                    .iter()
                    .enumerate()
                    .map(move |(j, lig)| (*rec, *lig, matrix.get(i, j)))
            })
            .collect()
    }
}

/// Partition `frames` over the pool's workers and reduce their counts.
pub fn compute_contact_map<P: WorkerPool>(
    source: &FrameSource,
    frames: &[FrameRef],
    job: &ContactJob,
    pool: &P,
    normalization: Normalization,
) -> Result<ContactMap> {
    if frames.is_empty() {
        return Err(CmapError::EmptyFrameList {
            path: source.path().to_path_buf(),
        });
    }
    let blocks = partition(frames, pool.workers());
    info!(
        "Processing {} frames with {} workers",
        frames.len(),
        blocks.len()
    );

    let partials = pool
        .map_blocks(&blocks, |block| run_worker(source, block, job))
        .into_iter()
        .collect::<Result<Vec<PartialMap>>>()?;

    let reduced = reduce(&partials, job.shape(), normalization)?;
    let expected = job.receptor_labels.len() * job.ligand_labels.len();
    if reduced.probabilities.len() != expected {
        return Err(CmapError::DimensionMismatch {
            context: "contact map entries",
            expected,
            found: reduced.probabilities.len(),
        });
    }

    Ok(ContactMap {
        receptor_labels: job.receptor_labels.clone(),
        ligand_labels: job.ligand_labels.clone(),
        counts: reduced.counts,
        probabilities: reduced.probabilities,
        frames: reduced.frames,
        partials,
    })
}
