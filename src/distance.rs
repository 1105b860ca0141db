//! Residue-residue contact criteria.

use nalgebra::Vector3;
use tracing::{trace, warn};

const SWITCH_N: i32 = 6;
const SWITCH_M: i32 = 12;

/// Rational switch function `(1 - (x/d0)^n) / (1 - (x/d0)^m)`.
///
/// Returns 0.0 when the denominator vanishes (`x == d0`) or `d0` is zero.
pub fn switch_function(x: f64, d0: f64, n: i32, m: i32) -> f64 {
    if d0 == 0.0 {
        warn!("Switch function cutoff is zero, counting x = {x} as no contact");
        return 0.0;
    }
    let ratio = x / d0;
    let denominator = 1.0 - ratio.powi(m);
    if denominator == 0.0 {
        warn!("Switch function is singular at x = {x}, d0 = {d0}, counting as no contact");
        return 0.0;
    }
    (1.0 - ratio.powi(n)) / denominator
}

/// Minimum number of atom pairs within the cutoff for a residue pair to count.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CountPolicy {
    /// 1 atom pair, raised to 2 when the receptor and ligand selections hold
    /// more atom pairs than there are residue pairs in the map
    #[default]
    Adaptive,
    /// A fixed number of atom pairs
    Fixed(f64),
}

impl CountPolicy {
    /// Atom pairs needed for a contact given the selection sizes.
    pub fn threshold(&self, receptor_atoms: usize, ligand_atoms: usize, residue_pairs: usize) -> f64 {
        match self {
            CountPolicy::Adaptive => {
                if receptor_atoms * ligand_atoms > residue_pairs {
                    2.0
                } else {
                    1.0
                }
            }
            CountPolicy::Fixed(count) => *count,
        }
    }
}

/// Scores one residue pair in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEvaluator {
    cutoff_sq: f64,
    count_cutoff: f64,
    use_switch: bool,
    d0: f64,
}

impl DistanceEvaluator {
    /// Evaluator with a distance cutoff in Å. The switch midpoint `d0` is twice the cutoff.
    pub fn new(cutoff: f64, count_cutoff: f64, use_switch: bool) -> Self {
        let cutoff_sq = cutoff * cutoff;
        Self {
            cutoff_sq,
            count_cutoff,
            use_switch,
            d0: 2.0 * cutoff_sq.sqrt(),
        }
    }

    /// Atom pairs needed for a hard-cutoff contact.
    pub fn count_cutoff(&self) -> f64 {
        self.count_cutoff
    }

    /// Whether pairs are weighted by the switch function.
    pub fn uses_switch(&self) -> bool {
        self.use_switch
    }

    /// Contact weight of two residues given their atom coordinates.
    ///
    /// With the switch enabled only the first atom pair is scored, which is
    /// meant for single-atom (Cα) selections. Otherwise the result is 1.0 if
    /// at least `count_cutoff` atom pairs lie within the cutoff, else 0.0.
    pub fn contact(&self, residue_a: &[Vector3<f64>], residue_b: &[Vector3<f64>]) -> f64 {
        if self.use_switch {
            let (Some(a), Some(b)) = (residue_a.first(), residue_b.first()) else {
                return 0.0;
            };
            let distance = (a - b).norm();
            let weight = switch_function(distance, self.d0, SWITCH_N, SWITCH_M);
            trace!("Switch distance {distance:.3} weight {weight:.4}");
            return weight;
        }

        let count = residue_a
            .iter()
            .flat_map(|a| residue_b.iter().map(move |b| (a - b).norm_squared()))
            .inspect(|d2| trace!("Squared distance {d2:.3}"))
            .filter(|&d2| d2 <= self.cutoff_sq)
            .count();

        if count as f64 >= self.count_cutoff {
            1.0
        } else {
            0.0
        }
    }
}
