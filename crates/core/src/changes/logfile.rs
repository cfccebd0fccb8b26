//! Cube network edit logs.
//!
//! Only lines starting with `N` (node) or `L` (link) are read. `;` and `,`
//! both separate fields. The first line of each kind names the columns after
//! its leading tag; every later line of that kind carries `OBJECT`,
//! `OPERATION`, `GROUP` and then those columns.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::{Map, Value};

use crate::changes::{ChangeRecord, ChangeTable, GROUP_COLUMN, OBJECT_COLUMN, OPERATION_COLUMN};
use crate::error::{LassoError, Result};

pub fn read_logfile(path: &Path) -> Result<ChangeTable> {
    info!("Reading logfile: {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| LassoError::io(path, e))?;
    parse_log(&text).map_err(|e| match e {
        LassoError::InvalidChanges(message) => {
            LassoError::InvalidChanges(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Read several logs as one table, in the order given.
pub fn read_logfiles(paths: &[PathBuf]) -> Result<ChangeTable> {
    let mut table = ChangeTable::default();
    for path in paths {
        table.extend(read_logfile(path)?);
    }
    Ok(table)
}

/// Project name taken from the first log's file stem.
pub fn project_name_from_logfiles(paths: &[PathBuf]) -> Option<String> {
    let name = paths
        .first()?
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())?;
    info!("No project name given, using log file name '{name}'");
    Some(name)
}

pub fn parse_log(text: &str) -> Result<ChangeTable> {
    let mut link_header: Option<Vec<String>> = None;
    let mut node_header: Option<Vec<String>> = None;
    let mut links = Vec::new();
    let mut nodes = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let (header, records) = if line.starts_with('L') {
            (&mut link_header, &mut links)
        } else if line.starts_with('N') {
            (&mut node_header, &mut nodes)
        } else {
            continue;
        };

        let fields: Vec<&str> = line.trim().split([',', ';']).collect();
        let Some(columns) = header.as_ref() else {
            let columns = fields[1..]
                .iter()
                .map(|name| name.split('[').next().unwrap_or(name).trim().to_string())
                .collect();
            *header = Some(columns);
            continue;
        };

        if fields.len() != columns.len() + 3 {
            return Err(LassoError::InvalidChanges(format!(
                "line {} has {} fields, its header has {}",
                index + 1,
                fields.len(),
                columns.len() + 3
            )));
        }
        let mut attributes = Map::new();
        attributes.insert(OBJECT_COLUMN.to_string(), Value::from(fields[0]));
        attributes.insert(OPERATION_COLUMN.to_string(), Value::from(fields[1]));
        attributes.insert(GROUP_COLUMN.to_string(), Value::from(fields[2]));
        for (column, field) in columns.iter().zip(&fields[3..]) {
            attributes.insert(column.clone(), super::infer_value(field));
        }
        records.push(ChangeRecord::from_attributes(attributes)?);
    }

    info!("Processed {} Node lines and {} Link lines", nodes.len(), links.len());
    debug!("Link columns: {link_header:?}, node columns: {node_header:?}");
    links.extend(nodes);
    Ok(ChangeTable::new(links))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ObjectKind, Operation};
    use serde_json::json;

    const LOG: &str = "\
;comment lines are skipped
L;A;B;LANES;NAME[20]
N;N;X;Y
L;C;1;10001;10002;3; Highland Ave
N;A;1;10005;1.5;2.0
L;A;1;10002;10005;1;New St
";

    #[test]
    fn test_parse_log() {
        let table = parse_log(LOG).unwrap();
        assert_eq!(table.len(), 3);

        let links: Vec<_> = table.records_of(ObjectKind::Link).collect();
        assert_eq!(links[0].operation, Operation::Change);
        assert_eq!(links[0].group.as_deref(), Some("1"));
        assert_eq!(links[0].get("LANES"), Some(&json!(3)));
        assert_eq!(links[0].get("NAME"), Some(&json!(" Highland Ave")));
        assert_eq!(links[1].operation, Operation::Add);

        let node = table.records_of(ObjectKind::Node).next().unwrap();
        assert_eq!(node.get("N"), Some(&json!(10005)));
        assert_eq!(node.get("X"), Some(&json!(1.5)));
    }

    #[test]
    fn test_ragged_line_is_an_error() {
        let err = parse_log("L;A;B\nL;C;1;1\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_project_name_from_first_log() {
        let paths = vec![PathBuf::from("logs/st_paul_test.log"), PathBuf::from("b.log")];
        assert_eq!(project_name_from_logfiles(&paths).as_deref(), Some("st_paul_test"));
        assert_eq!(project_name_from_logfiles(&[]), None);
    }

    #[test]
    fn test_read_several_logs_in_order() {
        let dir = std::env::temp_dir().join(format!("lasso-logs-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let first = dir.join("first.log");
        let second = dir.join("second.log");
        fs::write(&first, "L;A;B;LANES\nL;C;1;1;2;3\n").unwrap();
        fs::write(&second, "L;A;B;LANES\nL;D;1;1;2;3\n").unwrap();

        let table = read_logfiles(&[first, second]).unwrap();
        let ops: Vec<_> = table.records.iter().map(|r| r.operation).collect();
        assert_eq!(ops, vec![Operation::Change, Operation::Delete]);
    }
}
