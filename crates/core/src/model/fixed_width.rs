//! Fixed-width link and node tables plus the Cube script that reads them.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::info;
use serde_json::{Map, Value};

use crate::error::{LassoError, Result};
use crate::model::ModelRoadwayNetwork;
use crate::transit::models::types::value_to_string;

/// One column of a fixed-width table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedWidthColumn {
    pub header: String,
    pub width: usize,
    pub is_string: bool,
}

/// Rows rendered as `;`-separated, right-aligned fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedWidthTable {
    pub columns: Vec<FixedWidthColumn>,
    pub rows: Vec<String>,
}

/// Right-align `text` in `width` bytes. Cube reads `BEG`/`LEN` as byte
/// offsets, so longer text is cut at the last char boundary that fits.
fn pad(text: &str, width: usize) -> String {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let text = &text[..end];
    format!("{}{text}", " ".repeat(width - text.len()))
}

impl FixedWidthTable {
    /// Widths come from `widths` when it names the column, otherwise from
    /// the longest rendered value over all `records`. Only `written`
    /// records become rows.
    pub fn build(
        records: &[&Map<String, Value>],
        written: &[&Map<String, Value>],
        columns: &[String],
        widths: Option<&std::collections::BTreeMap<String, usize>>,
        is_string: impl Fn(&str) -> bool,
    ) -> Self {
        let columns: Vec<FixedWidthColumn> = columns
            .iter()
            .map(|header| {
                let width = widths
                    .and_then(|widths| widths.get(header).copied())
                    .unwrap_or_else(|| {
                        records
                            .iter()
                            .map(|record| record.get(header).map_or(0, |v| value_to_string(v).len()))
                            .max()
                            .unwrap_or(0)
                    });
                FixedWidthColumn {
                    header: header.clone(),
                    width,
                    is_string: is_string(header),
                }
            })
            .collect();

        let rows = written
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| {
                        let text = record.get(&column.header).map(value_to_string).unwrap_or_default();
                        pad(&text, column.width)
                    })
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .collect();

        Self { columns, rows }
    }

    pub fn data(&self) -> String {
        let mut data = self.rows.join("\n");
        if !data.is_empty() {
            data.push('\n');
        }
        data
    }

    /// `header,width` lines, as CSV.
    pub fn header_widths(&self) -> String {
        let mut text = String::from("header,width\n");
        for column in &self.columns {
            let _ = writeln!(text, "{},{}", column.header, column.width);
        }
        text
    }

    /// `VAR=` declarations for a Cube `FILEI` statement. Fields are 1-based
    /// and separated by one delimiter character.
    fn var_declarations(&self) -> Vec<String> {
        let mut start = 1;
        self.columns
            .iter()
            .map(|column| {
                let name = if column.is_string {
                    format!("{}(C{})", column.header, column.width)
                } else {
                    column.header.clone()
                };
                let declaration = format!("VAR={name}, BEG={start}, LEN={}", column.width);
                start += column.width + 1;
                declaration
            })
            .collect()
    }
}

/// Cube NETWORK script building a network from the two tables.
pub fn cube_network_script(links: &FixedWidthTable, nodes: &FixedWidthTable) -> String {
    let mut script = String::from("RUN PGM = NETWORK MSG = \"Read in network from fixed width file\"\n");
    for (statement, table) in [
        ("FILEI LINKI[1] = %LINK_DATA_PATH%", links),
        ("FILEI NODEI[1] = %NODE_DATA_PATH%", nodes),
    ] {
        let _ = write!(script, "{statement}");
        for declaration in table.var_declarations() {
            let _ = write!(script, ",\n    {declaration}");
        }
        script.push('\n');
    }
    script.push_str("FILEO NETO = \"%SCENARIO_DIR%/complete_network.net\"\n\n");
    script.push_str("    ZONES = %zones%\n\n");
    script.push_str("ROADWAY = LTRIM(TRIM(ROADWAY))\n");
    script.push_str("NAME = LTRIM(TRIM(NAME))\n");
    script.push_str("\nENDRUN\n");
    script
}

impl ModelRoadwayNetwork {
    /// Column widths cover the whole network; `drive_only` limits the rows
    /// to drive links and nodes.
    pub fn fixed_width_tables(&self, drive_only: bool) -> (FixedWidthTable, FixedWidthTable) {
        let widths = self.params.fixed_width_columns.as_ref();

        let link_records: Vec<&Map<String, Value>> = self.network.links.iter().map(|l| &l.properties).collect();
        let link_rows: Vec<&Map<String, Value>> = if drive_only {
            self.drive_links().map(|l| &l.properties).collect()
        } else {
            link_records.clone()
        };
        let links = FixedWidthTable::build(
            &link_records,
            &link_rows,
            &self.link_output_variables(),
            widths,
            |column| self.is_string_column(column, self.network.links.iter().map(|l| l.get(column))),
        );

        let node_records: Vec<&Map<String, Value>> = self.network.nodes.iter().map(|n| &n.properties).collect();
        let node_rows: Vec<&Map<String, Value>> = if drive_only {
            self.drive_nodes().map(|n| &n.properties).collect()
        } else {
            node_records.clone()
        };
        let nodes = FixedWidthTable::build(
            &node_records,
            &node_rows,
            &self.node_output_variables(),
            widths,
            |column| self.is_string_column(column, self.network.nodes.iter().map(|n| n.get(column))),
        );
        (links, nodes)
    }

    /// Write the link and node data files, their header/width files and
    /// the Cube script into `dir`.
    pub fn write_roadway_as_fixedwidth(&self, dir: &Path, drive_only: bool) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| LassoError::io(dir, e))?;
        let files = &self.params.output_files;
        let (links, nodes) = self.fixed_width_tables(drive_only);

        info!("Writing out link database");
        write(&dir.join(&files.links_fixed_width), &links.data())?;
        write(&dir.join(&files.links_header_width), &links.header_widths())?;
        info!("Writing out node database");
        write(&dir.join(&files.nodes_fixed_width), &nodes.data())?;
        write(&dir.join(&files.nodes_header_width), &nodes.header_widths())?;

        let script = dir.join(&files.cube_script);
        write(&script, &cube_network_script(&links, &nodes))?;
        info!(
            "Wrote {} links and {} nodes as fixed width to {}",
            links.rows.len(),
            nodes.rows.len(),
            dir.display()
        );
        Ok(())
    }
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| LassoError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;
    use crate::roadway::tests::{link, node};
    use crate::roadway::RoadwayNetwork;
    use serde_json::json;

    fn model() -> ModelRoadwayNetwork {
        let network = RoadwayNetwork::new(
            vec![
                link(1, 1, 10001, json!({"name": "Main St", "drive_access": 1})),
                link(22, 10001, 10002, json!({"name": "A", "drive_access": 0})),
            ],
            vec![node(1, 0.0, 0.0), node(10001, 1.0, 0.0)],
        );
        ModelRoadwayNetwork::new(network, Parameters::default())
    }

    #[test]
    fn test_pad_and_truncate() {
        assert_eq!(pad("7", 3), "  7");
        assert_eq!(pad("Highland", 4), "High");
        assert_eq!(pad("Café", 4), " Caf");
        assert_eq!(pad("Café", 5), "Café");
    }

    #[test]
    fn test_widths_are_bytes() {
        let network = RoadwayNetwork::new(
            vec![
                link(1, 1, 10001, json!({"name": "Rue Saint-Étienne"})),
                link(2, 10001, 10002, json!({"name": "Main"})),
            ],
            vec![],
        );
        let (links, _) = ModelRoadwayNetwork::new(network, Parameters::default()).fixed_width_tables(false);
        let name = links.columns.iter().find(|c| c.header == "name").unwrap();
        assert_eq!(name.width, "Rue Saint-Étienne".len());
        assert_eq!(links.rows[0].len(), links.rows[1].len());
    }

    #[test]
    fn test_fixed_width_rows_line_up() {
        let model = model();
        let (links, _) = model.fixed_width_tables(false);
        let headers: Vec<_> = links.columns.iter().map(|c| (c.header.as_str(), c.width)).collect();
        assert_eq!(
            headers,
            vec![("model_link_id", 2), ("A", 5), ("B", 5), ("name", 7), ("drive_access", 1)]
        );
        assert_eq!(links.rows[0], " 1;    1;10001;Main St;1");
        assert_eq!(links.rows[1], "22;10001;10002;      A;0");
        assert_eq!(links.header_widths().lines().nth(4), Some("name,7"));

        let (drive, _) = model.fixed_width_tables(true);
        assert_eq!(drive.rows.len(), 1);
    }

    #[test]
    fn test_drive_only_keeps_network_widths() {
        let mut model = model();
        model.network.nodes[1].properties.insert("drive_node".to_string(), json!(1));
        let (links, nodes) = model.fixed_width_tables(true);
        assert_eq!(links.rows, vec![" 1;    1;10001;Main St;1"]);
        assert_eq!(nodes.rows.len(), 1);
        assert!(nodes.rows[0].contains("10001"));
    }

    #[test]
    fn test_cube_script() {
        let model = model();
        let (links, nodes) = model.fixed_width_tables(false);
        let script = cube_network_script(&links, &nodes);
        assert!(script.starts_with("RUN PGM = NETWORK"));
        assert!(script.contains("FILEI LINKI[1] = %LINK_DATA_PATH%,\n    VAR=model_link_id, BEG=1, LEN=2,"));
        assert!(script.contains("VAR=name(C7), BEG=16, LEN=7"));
        assert!(script.contains("FILEI NODEI[1] = %NODE_DATA_PATH%"));
        assert!(script.trim_end().ends_with("ENDRUN"));
    }

    #[test]
    fn test_write_files() {
        let dir = std::env::temp_dir().join(format!("lasso-fixed-width-{}", std::process::id()));
        model().write_roadway_as_fixedwidth(&dir, false).unwrap();
        let data = fs::read_to_string(dir.join("links.txt")).unwrap();
        assert_eq!(data.lines().count(), 2);
        assert!(dir.join("make_complete_network_from_fixed_width_file.s").is_file());
        assert!(dir.join("nodes_header_width.txt").is_file());
    }
}
