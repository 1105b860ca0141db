//! Frame enumeration for multi-model ensemble files.
//!
//! Frames are located once by scanning for `MODEL`/`ENDMDL` records and are then
//! re-read on demand by seeking, so every worker can hold its own file handle.

use crate::error::{CmapError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Location of one model inside the ensemble file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef {
    /// Serial number from the `MODEL` record (ordinal if missing)
    pub model: usize,
    /// Byte offset of the first line of the frame
    pub offset: u64,
    /// Length of the frame in bytes
    pub len: u64,
}

/// A multi-model structure file.
#[derive(Debug, Clone)]
pub struct FrameSource {
    path: PathBuf,
}

impl FrameSource {
    /// Refer to an existing ensemble file.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CmapError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the ensemble file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locate all frames in order of appearance.
    ///
    /// A file with atom records but no `MODEL` lines is treated as a single frame.
    pub fn scan(&self) -> Result<Vec<FrameRef>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut frames = Vec::new();
        let mut buf = Vec::new();
        let mut offset: u64 = 0;
        let mut open: Option<(usize, u64)> = None;
        let mut has_atoms = false;

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)? as u64;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("MODEL") => {
                    if let Some((model, start)) = open.take() {
                        warn!("MODEL {model} has no ENDMDL record");
                        frames.push(FrameRef {
                            model,
                            offset: start,
                            len: offset - start,
                        });
                    }
                    let model = tokens
                        .next()
                        .and_then(|t| t.parse::<usize>().ok())
                        .unwrap_or(frames.len() + 1);
                    open = Some((model, offset));
                }
                Some("ENDMDL") => {
                    if let Some((model, start)) = open.take() {
                        frames.push(FrameRef {
                            model,
                            offset: start,
                            len: offset + n - start,
                        });
                    }
                }
                Some(_) if line.starts_with("ATOM") || line.starts_with("HETATM") => {
                    has_atoms = true;
                }
                _ => {}
            }
            offset += n;
        }

        if let Some((model, start)) = open.take() {
            frames.push(FrameRef {
                model,
                offset: start,
                len: offset - start,
            });
        }
        if frames.is_empty() && has_atoms {
            debug!("No MODEL records found, using the whole file as one frame");
            frames.push(FrameRef {
                model: 1,
                offset: 0,
                len: offset,
            });
        }
        debug!("Found {} frames in {}", frames.len(), self.path.display());

        Ok(frames)
    }

    /// Open an independent handle for reading frame contents.
    pub fn reader(&self) -> Result<FrameReader> {
        Ok(FrameReader {
            file: BufReader::new(File::open(&self.path)?),
        })
    }
}

/// Seeking reader over the frames of one ensemble file.
pub struct FrameReader {
    file: BufReader<File>,
}

impl FrameReader {
    /// Text of one frame, `MODEL` and `ENDMDL` lines included.
    pub fn read(&mut self, frame: &FrameRef) -> Result<String> {
        self.file.seek(SeekFrom::Start(frame.offset))?;
        let mut bytes = vec![0; frame.len as usize];
        self.file.read_exact(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Copy a frame to its own file.
    pub fn write_frame(&mut self, frame: &FrameRef, path: &Path) -> Result<()> {
        let text = self.read(frame)?;
        let mut file = File::create(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensemble() -> FrameSource {
        let root = env!("CARGO_MANIFEST_DIR");
        FrameSource::open(&Path::new(root).join("test-data/ensemble.pdb")).unwrap()
    }

    #[test]
    fn scan_models_in_order() {
        let source = ensemble();
        let frames = source.scan().unwrap();
        assert_eq!(
            frames.iter().map(|f| f.model).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let mut reader = source.reader().unwrap();
        for frame in &frames {
            let text = reader.read(frame).unwrap();
            assert!(text.starts_with("MODEL"));
            assert!(text.trim_end().ends_with("ENDMDL"));
        }
    }

    #[test]
    fn rescanning_is_idempotent() {
        let source = ensemble();
        assert_eq!(source.scan().unwrap(), source.scan().unwrap());
    }

    #[test]
    fn single_frame_without_model_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ATOM      1  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C\nEND"
        )
        .unwrap();
        let source = FrameSource::open(file.path()).unwrap();
        let frames = source.scan().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].offset, 0);
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            FrameSource::open(Path::new("/nonexistent/traj.pdb")),
            Err(CmapError::MissingFile { .. })
        ));
    }

    #[test]
    fn extract_single_frame() {
        let source = ensemble();
        let frames = source.scan().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("S_2.pdb");
        source.reader().unwrap().write_frame(&frames[1], &out).unwrap();
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.starts_with("MODEL        2"));
    }
}
