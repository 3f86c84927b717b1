//! Desired-state input loading.
//!
//! The input is a CSV table with at least the `User`, `Role` and `Channel`
//! columns (exact, case-sensitive headers). Other columns are ignored.

use std::path::Path;

use crate::error::ValidationError;
use crate::model::DesiredRecord;

/// Columns every input table must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["User", "Role", "Channel"];

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

/// Loads records from a CSV file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<DesiredRecord>, ValidationError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| ValidationError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_records(&data)
}

/// Parses records from raw CSV bytes.
///
/// Fails on the first malformed row; the whole table is rejected before any
/// remote call is made.
pub fn parse_records(data: &[u8]) -> Result<Vec<DesiredRecord>, ValidationError> {
    let data = strip_utf8_bom(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let headers = reader.headers().map_err(|e| ValidationError::Malformed {
        line: 1,
        message: format!("cannot read header: {e}"),
    })?;

    let indices = REQUIRED_COLUMNS.map(|name| headers.iter().position(|h| h == name));
    let [Some(user_idx), Some(role_idx), Some(channel_idx)] = indices else {
        let missing = REQUIRED_COLUMNS
            .iter()
            .zip(indices)
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| (*name).to_string())
            .collect();
        return Err(ValidationError::MissingColumns(missing));
    };

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // header = 1, first data row = 2
        let line = idx as u64 + 2;
        let row = result.map_err(|e| ValidationError::Malformed {
            line,
            message: e.to_string(),
        })?;

        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let field = |i: usize| row.get(i).unwrap_or("").trim();
        let user = field(user_idx);
        let channel = field(channel_idx);
        if user.is_empty() {
            return Err(ValidationError::Malformed {
                line,
                message: "empty User".to_string(),
            });
        }
        if channel.is_empty() {
            return Err(ValidationError::Malformed {
                line,
                message: "empty Channel".to_string(),
            });
        }

        records.push(DesiredRecord::new(user, field(role_idx), channel));
    }

    if records.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_valid_table() {
        let csv = "User,Role,Channel\nAlice@Example.com,Owner,General\nbob@example.com,member,Eng\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], DesiredRecord::new("alice@example.com", "Owner", "General"));
        assert_eq!(records[1].channel, "Eng");
    }

    #[test]
    fn test_extra_columns_and_order_ignored() {
        let csv = "Channel,Department,User,Role\nEng,R&D,alice@example.com,member\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].user, "alice@example.com");
        assert_eq!(records[0].channel, "Eng");
        assert_eq!(records[0].role, "member");
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut data = UTF8_BOM.to_vec();
        data.extend_from_slice(b"User,Role,Channel\nalice,member,Eng\n");
        let records = parse_records(&data).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_columns() {
        let err = parse_records(b"User,Team\nalice,Eng\n").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns(vec!["Role".into(), "Channel".into()])
        );
    }

    #[test]
    fn test_headers_are_case_sensitive() {
        let err = parse_records(b"user,role,channel\nalice,member,Eng\n").unwrap_err();
        assert!(matches!(err, ValidationError::MissingColumns(cols) if cols.len() == 3));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(parse_records(b"").unwrap_err(), ValidationError::Empty);
        assert_eq!(
            parse_records(b"User,Role,Channel\n").unwrap_err(),
            ValidationError::Empty
        );
        assert_eq!(
            parse_records(b"User,Role,Channel\n,,\n").unwrap_err(),
            ValidationError::Empty
        );
    }

    #[test]
    fn test_empty_user_is_malformed() {
        let err = parse_records(b"User,Role,Channel\nalice,member,Eng\n,member,Eng\n").unwrap_err();
        assert_eq!(
            err,
            ValidationError::Malformed {
                line: 3,
                message: "empty User".into()
            }
        );
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "User,Role,Channel").unwrap();
        writeln!(file, "alice@example.com,member,General").unwrap();
        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_records("/nonexistent/teamsync.csv").unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
    }
}
