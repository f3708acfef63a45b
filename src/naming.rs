//! Output Naming - Identifiers, Sanitizing, Collision-free Claims

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::data::DataRow;
use crate::templates::{NamingPolicy, OutputFormat};

/// Characters replaced by `-` in file names.
pub const RESERVED_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Space becomes `_`, path separators and other reserved characters become `-`.
pub fn sanitize(identifier: &str) -> String {
    identifier
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            c if RESERVED_CHARS.contains(&c) || c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// Raw identifier for `row`, or the reason the row cannot be named.
pub fn identifier(row: &DataRow, policy: &NamingPolicy) -> Result<String, String> {
    match policy {
        NamingPolicy::FirstColumn => match row.first() {
            Some((_, value)) if !value.is_missing() => Ok(value.to_string().trim().to_string()),
            Some((column, _)) => Err(format!("identifier column {column} is blank")),
            None => Err("row has no columns".to_string()),
        },
        NamingPolicy::Columns(columns) => {
            if columns.is_empty() {
                return Err("naming policy lists no columns".to_string());
            }
            let mut parts = Vec::with_capacity(columns.len());
            for column in columns {
                match row.get(column) {
                    Some(value) if !value.is_missing() => parts.push(value.to_string().trim().to_string()),
                    _ => return Err(format!("identifier column {column} is blank")),
                }
            }
            Ok(parts.join("_"))
        }
    }
}

/// Hands out unique output paths within one directory.
///
/// A name is taken if it exists on disk or was already claimed by this namer.
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    claimed: HashSet<PathBuf>,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), claimed: HashSet::new() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `name.ext`, then `name_1.ext`, `name_2.ext`, ...
    pub fn claim(&mut self, identifier: &str, format: OutputFormat) -> PathBuf {
        let base = sanitize(identifier);
        let ext = format.extension();
        let mut counter = 0u32;
        loop {
            let file_name = match counter {
                0 => format!("{base}.{ext}"),
                n => format!("{base}_{n}.{ext}"),
            };
            let path = self.dir.join(file_name);
            if !self.claimed.contains(&path) && !path.exists() {
                self.claimed.insert(path.clone());
                return path;
            }
            counter += 1;
        }
    }

    /// Return a claim whose write failed so the name can be reused.
    pub fn release(&mut self, path: &Path) {
        self.claimed.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellValue;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Grace Hopper"), "Grace_Hopper");
        assert_eq!(sanitize("CS/2024:01"), "CS-2024-01");
        assert_eq!(sanitize(r#"a\b*c?d"e<f>g|h"#), "a-b-c-d-e-f-g-h");
    }

    #[test]
    fn test_first_column_identifier() {
        let row = DataRow::new().with("Name", "Ada Lovelace").with("Course", "Math");
        assert_eq!(identifier(&row, &NamingPolicy::FirstColumn).unwrap(), "Ada Lovelace");

        let row = DataRow::new().with("Id", 101.0);
        assert_eq!(identifier(&row, &NamingPolicy::FirstColumn).unwrap(), "101");
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let row = DataRow::new().with("Name", CellValue::Empty).with("Course", "Math");
        let reason = identifier(&row, &NamingPolicy::FirstColumn).unwrap_err();
        assert!(reason.contains("Name"));
        assert!(identifier(&DataRow::new(), &NamingPolicy::FirstColumn).is_err());
    }

    #[test]
    fn test_composite_identifier() {
        let policy = NamingPolicy::Columns(vec!["FullName".into(), "CertNo".into()]);
        let row = DataRow::new().with("CertNo", "IN-042").with("FullName", "Ada Lovelace");
        assert_eq!(identifier(&row, &policy).unwrap(), "Ada Lovelace_IN-042");

        let row = DataRow::new().with("FullName", "Ada Lovelace");
        assert!(identifier(&row, &policy).is_err());
    }

    #[test]
    fn test_claims_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Ada.png"), b"existing").unwrap();

        let mut namer = OutputNamer::new(dir.path());
        assert_eq!(namer.claim("Ada", OutputFormat::Png), dir.path().join("Ada_1.png"));
        assert_eq!(namer.claim("Ada", OutputFormat::Png), dir.path().join("Ada_2.png"));
        assert_eq!(namer.claim("Ada", OutputFormat::Pdf), dir.path().join("Ada.pdf"));

        let released = namer.claim("Grace Hopper", OutputFormat::Png);
        namer.release(&released);
        assert_eq!(namer.claim("Grace Hopper", OutputFormat::Png), released);
    }
}
