//! Per-worker contact matrices and their reduction into probabilities.

use crate::error::{CmapError, Result};
use nalgebra::DMatrix;

/// Resolution of accumulated contact weights, 2^32 steps per unit weight.
///
/// Weights are summed as integers so the total does not depend on how the
/// frames were grouped into blocks.
const WEIGHT_SCALE: f64 = 4_294_967_296.0;

/// Receptor × ligand table of accumulated contact weights in fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactCounts {
    values: DMatrix<u64>,
}

impl ContactCounts {
    /// An all-zero table with one row per receptor and one column per ligand residue.
    pub fn zeros(receptors: usize, ligands: usize) -> Self {
        Self {
            values: DMatrix::zeros(receptors, ligands),
        }
    }

    /// `(receptors, ligands)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Number of residue pairs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if either side has no residues.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Accumulated weight of a residue pair.
    pub fn get(&self, receptor: usize, ligand: usize) -> f64 {
        self.values[(receptor, ligand)] as f64 / WEIGHT_SCALE
    }

    /// Add a non-negative contact weight, rounded to the nearest 2^-32.
    pub fn add(&mut self, receptor: usize, ligand: usize, weight: f64) {
        // Negative and NaN weights saturate to zero
        self.values[(receptor, ligand)] += (weight * WEIGHT_SCALE).round() as u64;
    }

    /// Element-wise sum with another table of the same shape.
    pub fn accumulate(&mut self, other: &ContactCounts) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(CmapError::DimensionMismatch {
                context: "partial contact matrix size",
                expected: self.len(),
                found: other.len(),
            });
        }
        self.values += &other.values;
        Ok(())
    }

    /// Accumulated weights divided by `divisor`.
    pub fn scaled(&self, divisor: f64) -> ContactMatrix {
        ContactMatrix {
            values: self.values.map(|v| v as f64 / WEIGHT_SCALE / divisor),
        }
    }

    /// Accumulated weights as floating point values.
    pub fn to_matrix(&self) -> ContactMatrix {
        self.scaled(1.0)
    }
}

/// Receptor × ligand table of floating point values, e.g. contact probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMatrix {
    values: DMatrix<f64>,
}

impl ContactMatrix {
    /// An all-zero matrix with one row per receptor and one column per ligand residue.
    pub fn zeros(receptors: usize, ligands: usize) -> Self {
        Self {
            values: DMatrix::zeros(receptors, ligands),
        }
    }

    /// `(receptors, ligands)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Number of residue pairs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if either side has no residues.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a residue pair.
    pub fn get(&self, receptor: usize, ligand: usize) -> f64 {
        self.values[(receptor, ligand)]
    }

    /// Values in row-major order (receptor-major).
    pub fn row_major(&self) -> Vec<f64> {
        self.values.transpose().as_slice().to_vec()
    }
}

/// Divisor used to turn accumulated counts into probabilities.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Total number of frames processed by all workers
    #[default]
    Frames,
    /// Number of workers, reproducing the legacy per-worker convention
    Workers,
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Normalization::Frames => write!(f, "frames"),
            Normalization::Workers => write!(f, "workers"),
        }
    }
}

/// Contact counts accumulated by one worker over its frame block.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialMap {
    /// Rank of the worker that produced the counts
    pub rank: usize,
    /// Frames processed by this worker
    pub frames: usize,
    /// Contact weights summed over those frames
    pub counts: ContactCounts,
}

impl PartialMap {
    /// Probabilities over this worker's own frames.
    pub fn probabilities(&self) -> ContactMatrix {
        self.counts.scaled(self.frames.max(1) as f64)
    }
}

/// Summed counts of all workers and their normalized probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    /// Contact weights summed over all workers
    pub counts: ContactCounts,
    /// `counts` divided by the normalization divisor
    pub probabilities: ContactMatrix,
    /// Frames processed by all workers
    pub frames: usize,
    /// Number of partial maps reduced
    pub workers: usize,
}

/// Sum the partial matrices and normalize the total.
pub fn reduce(
    partials: &[PartialMap],
    shape: (usize, usize),
    normalization: Normalization,
) -> Result<Reduced> {
    let mut counts = ContactCounts::zeros(shape.0, shape.1);
    for partial in partials {
        counts.accumulate(&partial.counts)?;
    }
    let frames: usize = partials.iter().map(|p| p.frames).sum();
    let workers = partials.len();

    let divisor = match normalization {
        Normalization::Frames => frames,
        Normalization::Workers => workers,
    };
    if divisor == 0 {
        return Err(CmapError::InvalidArgument(format!(
            "cannot normalize by {normalization}: nothing was processed"
        )));
    }

    Ok(Reduced {
        probabilities: counts.scaled(divisor as f64),
        counts,
        frames,
        workers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(rank: usize, frames: usize, values: &[f64]) -> PartialMap {
        let mut counts = ContactCounts::zeros(2, 2);
        for (i, v) in values.iter().enumerate() {
            counts.add(i / 2, i % 2, *v);
        }
        PartialMap {
            rank,
            frames,
            counts,
        }
    }

    #[test]
    fn normalize_by_total_frames() {
        let partials = vec![
            partial(0, 2, &[2.0, 0.0, 1.0, 0.0]),
            partial(1, 1, &[0.0, 0.0, 1.0, 1.0]),
        ];
        let reduced = reduce(&partials, (2, 2), Normalization::Frames).unwrap();
        assert_eq!(reduced.frames, 3);
        assert_eq!(reduced.counts.to_matrix().row_major(), vec![2.0, 0.0, 2.0, 1.0]);
        assert_eq!(reduced.probabilities.get(0, 0), 2.0 / 3.0);
        assert_eq!(reduced.probabilities.get(1, 1), 1.0 / 3.0);
    }

    #[test]
    fn frame_normalization_is_independent_of_partitioning() {
        let single = vec![partial(0, 4, &[3.0, 1.0, 0.0, 4.0])];
        let split = vec![
            partial(0, 2, &[2.0, 1.0, 0.0, 2.0]),
            partial(1, 1, &[1.0, 0.0, 0.0, 1.0]),
            partial(2, 1, &[0.0, 0.0, 0.0, 1.0]),
        ];
        let a = reduce(&single, (2, 2), Normalization::Frames).unwrap();
        let b = reduce(&split, (2, 2), Normalization::Frames).unwrap();
        assert_eq!(a.probabilities, b.probabilities);
    }

    #[test]
    fn legacy_worker_normalization() {
        let partials = vec![
            partial(0, 2, &[2.0, 0.0, 1.0, 0.0]),
            partial(1, 2, &[2.0, 0.0, 1.0, 0.0]),
        ];
        let reduced = reduce(&partials, (2, 2), Normalization::Workers).unwrap();
        assert_eq!(reduced.probabilities.get(0, 0), 2.0);
        assert_eq!(reduced.probabilities.get(1, 0), 1.0);
    }

    #[test]
    fn reject_mismatched_partials() {
        let partials = vec![PartialMap {
            rank: 0,
            frames: 1,
            counts: ContactCounts::zeros(3, 1),
        }];
        assert!(matches!(
            reduce(&partials, (2, 2), Normalization::Frames),
            Err(CmapError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn fractional_weights_sum_independently_of_grouping() {
        let weights = [0.971, 0.1 + 0.2, 1.0 / 3.0, 0.7071067811865476, 1e-7, 0.5];
        let mut whole = ContactCounts::zeros(1, 1);
        weights.iter().for_each(|&w| whole.add(0, 0, w));

        for split in 1..weights.len() {
            let mut head = ContactCounts::zeros(1, 1);
            let mut tail = ContactCounts::zeros(1, 1);
            weights[..split].iter().for_each(|&w| head.add(0, 0, w));
            weights[split..].iter().for_each(|&w| tail.add(0, 0, w));
            let mut total = ContactCounts::zeros(1, 1);
            total.accumulate(&tail).unwrap();
            total.accumulate(&head).unwrap();
            assert_eq!(total, whole);
            assert_eq!(total.scaled(6.0), whole.scaled(6.0));
        }
        let sum: f64 = weights.iter().sum();
        assert!((whole.get(0, 0) - sum).abs() < 1e-8);
    }

    #[test]
    fn nothing_to_normalize() {
        assert!(reduce(&[], (1, 1), Normalization::Frames).is_err());
    }
}
