use polars::prelude::*;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

use crate::domain::GridError;
use crate::record::{Field, Record};

#[derive(Debug, PartialEq)]
enum FileType {
    JSON,
    CSV,
    PARQUET,
}

/// Location of the dataset, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Url(String),
    File(PathBuf),
}

impl DataSource {
    pub fn parse(input: &str) -> Result<Self, GridError> {
        if input.starts_with("http://") || input.starts_with("https://") {
            return Ok(DataSource::Url(input.to_string()));
        }
        let expanded = shellexpand::full(input)
            .map_err(|e| GridError::LoadingFailed(format!("Cannot expand path {input}: {e}")))?;
        Ok(DataSource::File(PathBuf::from(expanded.as_ref())))
    }
}

#[instrument]
pub fn load_dataset(source: &DataSource) -> Result<Vec<Record>, GridError> {
    let start_time = Instant::now();
    let records = match source {
        DataSource::Url(url) => fetch_url(url)?,
        DataSource::File(path) => load_file(path)?,
    };
    info!(
        "Loaded {} records in {}ms",
        records.len(),
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

fn fetch_url(url: &str) -> Result<Vec<Record>, GridError> {
    debug!("Fetching dataset from {url}");
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("medalgrid/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let records = client
        .get(url)
        .send()?
        .error_for_status()?
        .json::<Vec<Record>>()?;
    Ok(records)
}

fn load_file(path: &Path) -> Result<Vec<Record>, GridError> {
    let file_type = get_file_type(path)?;
    debug!("Loading {:?} as {:?}", path, file_type);
    match file_type {
        FileType::JSON => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        FileType::CSV => {
            let frame = LazyCsvReader::new(PlPath::Local(path.into()))
                .with_has_header(true)
                .finish()?;
            frame_to_records(&frame.collect()?)
        }
        FileType::PARQUET => {
            let frame =
                LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())?;
            frame_to_records(&frame.collect()?)
        }
    }
}

fn get_file_type(path: &Path) -> Result<FileType, GridError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GridError::FileNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => GridError::PermissionDenied(path.to_path_buf()),
        _ => GridError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(GridError::LoadingFailed(format!("{path:?} is not a file!")));
    }

    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("JSON") => Ok(FileType::JSON),
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        _ => Err(GridError::UnknownFileType(path.to_path_buf())),
    }
}

// Each field column is extracted in its own thread, then zipped into records.
fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>, GridError> {
    let columns: Result<Vec<Vec<Option<String>>>, GridError> = Field::ALL
        .par_iter()
        .map(|field| extract_column(df, *field))
        .collect();
    let columns = columns?;

    let records = (0..df.height())
        .map(|ridx| {
            let text = |field: Field| columns[field_position(field)][ridx].clone();
            let number = |field: Field| parse_number(text(field).as_deref());
            Record {
                athlete: text(Field::Athlete).unwrap_or_default(),
                age: number(Field::Age),
                country: text(Field::Country).unwrap_or_default(),
                year: number(Field::Year).unwrap_or_default(),
                date: text(Field::Date),
                sport: text(Field::Sport).unwrap_or_default(),
                gold: number(Field::Gold).unwrap_or_default(),
                silver: number(Field::Silver).unwrap_or_default(),
                bronze: number(Field::Bronze).unwrap_or_default(),
                total: number(Field::Total).unwrap_or_default(),
            }
        })
        .collect();
    Ok(records)
}

fn field_position(field: Field) -> usize {
    Field::ALL.iter().position(|f| *f == field).unwrap_or(0)
}

fn extract_column(df: &DataFrame, field: Field) -> Result<Vec<Option<String>>, GridError> {
    let column = match df.column(field.key()) {
        Ok(column) => column,
        Err(_) if field.is_optional() => {
            trace!("Optional column {} is missing", field.key());
            return Ok(vec![None; df.height()]);
        }
        Err(_) => {
            return Err(GridError::LoadingFailed(format!(
                "Missing column \"{}\"",
                field.key()
            )));
        }
    };
    let column = column.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(|s| s.to_string()))
        .collect())
}

// Numeric columns with nulls may be inferred as floats ("23.0")
fn parse_number(value: Option<&str>) -> Option<u32> {
    let value = value?.trim();
    value
        .parse::<u32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|f| f as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> DataSource {
        DataSource::File(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name))
    }

    #[test]
    fn parse_distinguishes_urls_from_paths() {
        assert_eq!(
            DataSource::parse("https://example.org/data.json").unwrap(),
            DataSource::Url("https://example.org/data.json".into())
        );
        assert_eq!(
            DataSource::parse("data/winners.csv").unwrap(),
            DataSource::File(PathBuf::from("data/winners.csv"))
        );
    }

    #[test]
    fn loads_json_fixture() {
        let records = load_dataset(&fixture("olympic_winners.json")).unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].athlete, "Michael Phelps");
        assert_eq!(records[0].gold, 8);
        assert_eq!(records[11].age, None);
    }

    #[test]
    fn csv_fixture_matches_json_fixture() {
        let json = load_dataset(&fixture("olympic_winners.json")).unwrap();
        let csv = load_dataset(&fixture("olympic_winners.csv")).unwrap();
        assert_eq!(json, csv);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_dataset(&fixture("does_not_exist.json")).unwrap_err();
        assert!(matches!(err, GridError::FileNotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_dataset(&DataSource::File(PathBuf::from(file!()))).unwrap_err();
        assert!(matches!(err, GridError::UnknownFileType(_)));
    }

    #[test]
    fn parse_number_accepts_float_representation() {
        assert_eq!(parse_number(Some("23")), Some(23));
        assert_eq!(parse_number(Some("23.0")), Some(23));
        assert_eq!(parse_number(Some("")), None);
        assert_eq!(parse_number(None), None);
    }
}
