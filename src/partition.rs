use crate::frames::FrameRef;

/// Contiguous run of frames assigned to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBlock<T = FrameRef> {
    /// Worker rank, 0-based
    pub rank: usize,
    /// Frames in input order
    pub frames: Vec<T>,
}

/// Split `frames` into `workers` contiguous, order-preserving blocks.
///
/// Every block but the last holds `ceil(len / workers)` frames, and the last one
/// takes the remainder. Blocks past the end of the list are empty. A worker count
/// of zero is treated as one.
pub fn partition<T: Clone>(frames: &[T], workers: usize) -> Vec<FrameBlock<T>> {
    let workers = workers.max(1);
    let block_size = frames.len().div_ceil(workers);

    (0..workers)
        .map(|rank| {
            let start = (rank * block_size).min(frames.len());
            let end = if rank == workers - 1 {
                frames.len()
            } else {
                ((rank + 1) * block_size).min(frames.len())
            };
            FrameBlock {
                rank,
                frames: frames[start..end].to_vec(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_follow_ceiling_size() {
        let frames: Vec<usize> = (0..10).collect();
        let blocks = partition(&frames, 4);
        let sizes: Vec<usize> = blocks.iter().map(|b| b.frames.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert_eq!(blocks[1].frames, vec![3, 4, 5]);
        assert_eq!(blocks[3].rank, 3);
    }

    #[test]
    fn blocks_reconstruct_frame_list() {
        for n in 0..25 {
            let frames: Vec<usize> = (0..n).collect();
            for workers in 1..9 {
                let blocks = partition(&frames, workers);
                assert_eq!(blocks.len(), workers);

                let joined: Vec<usize> = blocks.iter().flat_map(|b| b.frames.clone()).collect();
                assert_eq!(joined, frames, "n = {n}, workers = {workers}");

                let block_size = n.div_ceil(workers);
                for block in &blocks[..workers - 1] {
                    assert!(block.frames.len() <= block_size);
                }
                assert!(blocks[workers - 1].frames.len() <= block_size);
                assert_eq!(partition(&frames, workers), blocks);
            }
        }
    }

    #[test]
    fn more_workers_than_frames() {
        let blocks = partition(&[1, 2, 3, 4, 5], 4);
        let sizes: Vec<usize> = blocks.iter().map(|b| b.frames.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1, 0]);
    }

    #[test]
    fn zero_workers_means_one() {
        let blocks = partition(&[1, 2, 3], 0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frames, vec![1, 2, 3]);
    }
}
