use crate::error::Result;
use polars::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Decimal places written for floating point columns in text tables.
const FLOAT_PRECISION: usize = 4;

/// Write a DataFrame to `file_path` in the given format.
///
/// Whitespace tables start with a `# ` so the header reads as a comment line.
pub fn write_df_to_file(
    df: &mut DataFrame,
    file_path: &Path,
    file_type: DataFrameFileType,
) -> Result<()> {
    let mut file = std::fs::File::create(file_path)?;
    match file_type {
        DataFrameFileType::Xyz => {
            write!(file, "# ")?;
            CsvWriter::new(&mut file)
                .with_separator(b' ')
                .with_float_precision(Some(FLOAT_PRECISION))
                .finish(df)?;
        }
        DataFrameFileType::Csv => {
            CsvWriter::new(&mut file).finish(df)?;
        }
        DataFrameFileType::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
        DataFrameFileType::Json => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(df)?;
        }
        DataFrameFileType::NDJson => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::JsonLines)
                .finish(df)?;
        }
    }
    Ok(())
}

/// Write a DataFrame as a plain whitespace-delimited table with a header row.
pub fn write_whitespace_table(df: &mut DataFrame, file_path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(file_path)?;
    CsvWriter::new(&mut file)
        .with_separator(b' ')
        .with_float_precision(Some(FLOAT_PRECISION))
        .finish(df)?;
    Ok(())
}

/// Prefix the file name of `path` with a worker rank, e.g. `out/0_ContactMap.dat`.
pub fn rank_path(path: &Path, rank: usize) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{rank}_{name}"))
}

/// Append a format extension to a path, keeping any existing one.
pub fn append_extension(path: &Path, file_type: DataFrameFileType) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{file_type}"));
    PathBuf::from(name)
}

/// File format for writing DataFrames.
#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum DataFrameFileType {
    /// Whitespace-separated columns with a commented header
    Xyz,
    /// Comma-separated values
    Csv,
    /// Parquet columnar storage
    Parquet,
    /// Standard JSON
    Json,
    /// Newline-delimited JSON
    #[value(name = "ndjson")]
    NDJson,
}

impl std::fmt::Display for DataFrameFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataFrameFileType::Xyz => write!(f, "xyz"),
            DataFrameFileType::Csv => write!(f, "csv"),
            DataFrameFileType::Parquet => write!(f, "parquet"),
            DataFrameFileType::Json => write!(f, "json"),
            DataFrameFileType::NDJson => write!(f, "ndjson"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_df() -> DataFrame {
        df!(
            "Receptor" => ["1_A", "2_A"],
            "Ligand" => ["10_A", "10_A"],
            "Contact_probability" => [2.0 / 3.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn commented_whitespace_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.xyz");
        write_df_to_file(&mut small_df(), &path, DataFrameFileType::Xyz).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Receptor Ligand Contact_probability");
        assert_eq!(lines[1], "1_A 10_A 0.6667");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn other_formats_round_trip_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.csv");
        write_df_to_file(&mut small_df(), &path, DataFrameFileType::Csv).unwrap();
        let df = CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(path))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(df.shape(), (2, 3));

        let path = dir.path().join("map.parquet");
        write_df_to_file(&mut small_df(), &path, DataFrameFileType::Parquet).unwrap();
        let df = ParquetReader::new(std::fs::File::open(&path).unwrap())
            .finish()
            .unwrap();
        assert_eq!(df.shape(), (2, 3));
    }

    #[test]
    fn output_paths() {
        assert_eq!(
            rank_path(Path::new("out/ContactMap.dat"), 3),
            PathBuf::from("out/3_ContactMap.dat")
        );
        assert_eq!(
            append_extension(Path::new("ContactMap.dat"), DataFrameFileType::Xyz),
            PathBuf::from("ContactMap.dat.xyz")
        );
    }
}
