//! Input loading.
//!
//! Reads the project table, tracked-entity rosters, and exclusion pairs
//! from disk and hands the analysis a typed [`Dataset`]. Nothing past this
//! module touches the filesystem for input.

pub mod parse;
pub mod schema;

use crate::analysis::filters::ExclusionRule;
use crate::analysis::normalize::normalize_name;
use crate::error::{IngestError, SchemaError};
use crate::models::Dataset;
use schema::FieldMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// A table as read from CSV, before field resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV table. Rows may be shorter or longer than the header.
    ///
    /// Cells that are not valid UTF-8 (Latin-1 exports, mostly) are decoded
    /// lossily rather than failing the whole table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = decode_record(rdr.byte_headers()?);
        let mut rows = Vec::new();
        let mut lossy_rows = 0usize;
        for result in rdr.byte_records() {
            let record = result?;
            if std::str::from_utf8(record.as_slice()).is_err() {
                lossy_rows += 1;
            }
            rows.push(decode_record(&record));
        }
        if lossy_rows > 0 {
            warn!(
                "{} rows contained invalid UTF-8 - replaced the bad bytes with U+FFFD",
                lossy_rows
            );
        }

        Ok(Self { headers, rows })
    }

    /// Resolve fields once and build the typed snapshot.
    pub fn into_dataset(self) -> Result<Dataset, SchemaError> {
        let map = FieldMap::resolve(&self.headers)?;
        debug!("Resolved fields: {:?}", map);

        let records = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|(index, row)| map.record_from_row(row, index))
            .collect();

        Ok(Dataset::new(map.presence(), records))
    }
}

fn decode_record(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Load a projects CSV into a dataset.
pub fn load_dataset(path: &Path) -> Result<Dataset, IngestError> {
    let file = fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = RawTable::from_reader(file).map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let dataset = table.into_dataset()?;
    info!("Loaded {} records from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Load a tracked-entity roster, one name per line.
///
/// A missing path or file yields an empty roster, which tracks everyone.
pub fn load_roster(path: Option<&Path>, role: &str) -> Result<Vec<String>, IngestError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    if !path.exists() {
        warn!(
            "{} roster {} not found - analyzing every {} in the data",
            role,
            path.display(),
            role
        );
        return Ok(Vec::new());
    }

    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let names: Vec<String> = String::from_utf8_lossy(&bytes)
        .lines()
        .map(normalize_name)
        .filter(|name| !name.is_empty())
        .collect();

    if names.is_empty() {
        info!("{} roster {} is empty - analyzing everyone", role, path.display());
    } else {
        info!("Loaded {} tracked {}s from {}", names.len(), role, path.display());
    }
    Ok(names)
}

/// Load `Consultant,Project` exclusion pairs. A missing file means no exclusions.
pub fn load_exclusions(path: Option<&Path>) -> Result<Vec<ExclusionRule>, IngestError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    if !path.exists() {
        warn!("Exclusion file {} not found - no exclusions applied", path.display());
        return Ok(Vec::new());
    }

    let file = fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = RawTable::from_reader(file).map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let column = |name: &str| {
        table
            .headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let (Some(entity_col), Some(job_col)) = (column("consultant"), column("project")) else {
        return Err(IngestError::ExclusionHeaders(path.to_path_buf()));
    };

    let rules: Vec<ExclusionRule> = table
        .rows
        .iter()
        .filter_map(|row| {
            let entity = row.get(entity_col)?;
            let job = row.get(job_col)?;
            (!entity.trim().is_empty() && !job.trim().is_empty())
                .then(|| ExclusionRule::new(entity, job.trim()))
        })
        .collect();

    info!("Loaded {} exclusions from {}", rules.len(), path.display());
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Job Number,Customer,Project Status,Resources Engaged,Budget Hrs,Total Hrs Posted
J1,Acme,Open,\"Ann Lee, Bob Ray\",100,95
J2,Globex,Closed,Bob Ray,200,260
,,,,,
J3,Initech,Open,Ann Lee,n/a,10
";

    #[test]
    fn test_from_reader_to_dataset() {
        let table = RawTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.rows.len(), 4);

        let dataset = table.into_dataset().unwrap();
        assert_eq!(dataset.len(), 3);
        assert!(dataset.fields.consultants);
        assert!(!dataset.fields.architects);
        assert_eq!(dataset.records[0].consultants_raw, "Ann Lee, Bob Ray");
        assert_eq!(dataset.records[2].budgeted_hours, None);
    }

    #[test]
    fn test_non_utf8_cell_is_decoded_lossily() {
        let mut bytes = b"Job Number,Resources Engaged,Budget Hrs,Total Hrs Posted\nJ1,".to_vec();
        bytes.extend_from_slice(b"Jos\xE9 Diaz,100,90\nJ2,Ann Lee,50,40\n");

        let table = RawTable::from_reader(&bytes[..]).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "Jos\u{FFFD} Diaz");

        let dataset = table.into_dataset().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records[0].consultants_raw, "Jos\u{FFFD} Diaz");
        assert_eq!(dataset.records[1].consultants_raw, "Ann Lee");
    }

    #[test]
    fn test_load_roster_non_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Jos\xE9 Diaz\nBob Ray\n").unwrap();

        let names = load_roster(Some(file.path()), "consultant").unwrap();
        assert_eq!(names, vec!["Jos\u{FFFD} Diaz", "Bob Ray"]);
    }

    #[test]
    fn test_load_dataset_missing_file() {
        let err = load_dataset(Path::new("/nonexistent/projects.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn test_load_roster_normalizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  Ann   Lee ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Bob Ray").unwrap();

        let names = load_roster(Some(file.path()), "consultant").unwrap();
        assert_eq!(names, vec!["Ann Lee", "Bob Ray"]);
    }

    #[test]
    fn test_load_roster_missing_means_everyone() {
        let names = load_roster(Some(Path::new("/nonexistent/roster.txt")), "consultant").unwrap();
        assert!(names.is_empty());
        assert!(load_roster(None, "consultant").unwrap().is_empty());
    }

    #[test]
    fn test_load_exclusions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Consultant,Project\nAnn  Lee,J1\n,J2\nBob Ray,J3\n").unwrap();

        let rules = load_exclusions(Some(file.path())).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], ExclusionRule::new("Ann Lee", "J1"));
    }

    #[test]
    fn test_load_exclusions_bad_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Name,Job\nAnn,J1\n").unwrap();

        let err = load_exclusions(Some(file.path())).unwrap_err();
        assert!(matches!(err, IngestError::ExclusionHeaders(_)));
    }

    #[test]
    fn test_load_sample_fixture() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/projects.csv");
        let dataset = load_dataset(&path).unwrap();

        assert_eq!(dataset.len(), 9);
        assert!(dataset.fields.architects);
        assert!(dataset.fields.completion);
        assert!(dataset.fields.end_date);
        assert_eq!(dataset.records[0].completion_pct, Some(100.0));
        assert_eq!(dataset.records[7].budgeted_hours, None);
        assert_eq!(
            dataset.records[8].end_date,
            chrono::NaiveDate::from_ymd_opt(2025, 7, 15)
        );
    }
}
