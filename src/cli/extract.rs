use clap::Parser;
use cmapper::{CmapError, FrameRef, FrameSource, Result};
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Multi-model PDB file
    #[arg(short, long)]
    input: PathBuf,

    /// Prefix of the output files, written as `<prefix>_<model>.pdb`
    #[arg(short, long, default_value = "S")]
    output: String,

    /// Only extract the first N frames
    #[arg(short = 'n', long = "first", conflicts_with = "models")]
    first: Option<usize>,

    /// Only extract frames with these MODEL serial numbers
    #[arg(short, long, num_args = 1..)]
    models: Vec<usize>,

    /// List the frames without writing anything
    #[arg(short, long, default_value_t = false)]
    list: bool,
}

fn chosen_frames(args: &Args, frames: &[FrameRef]) -> Vec<FrameRef> {
    if let Some(n) = args.first {
        return frames.iter().take(n).copied().collect();
    }
    if args.models.is_empty() {
        return frames.to_vec();
    }
    args.models
        .iter()
        .filter_map(|&model| {
            let found = frames.iter().find(|f| f.model == model).copied();
            if found.is_none() {
                warn!("MODEL {model} not found");
            }
            found
        })
        .collect()
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");

    let source = FrameSource::open(&args.input)?;
    let frames = source.scan()?;
    if frames.is_empty() {
        return Err(CmapError::EmptyFrameList {
            path: args.input.clone(),
        });
    }
    info!("Found {} frames in {}", frames.len(), args.input.display());

    if args.list {
        for frame in &frames {
            info!(
                "MODEL {} at byte {} ({} bytes)",
                frame.model, frame.offset, frame.len
            );
        }
        return Ok(());
    }

    let chosen = chosen_frames(args, &frames);
    let mut reader = source.reader()?;
    for frame in &chosen {
        let path = PathBuf::from(format!("{}_{}.pdb", args.output, frame.model));
        reader.write_frame(frame, &path)?;
        debug!("Wrote MODEL {} to {}", frame.model, path.display());
    }
    info!("Extracted {} frames", chosen.len());

    Ok(())
}
