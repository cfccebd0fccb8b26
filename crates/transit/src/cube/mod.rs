//! Cube line files: parsing, writing and the in-memory line set.

pub mod lexer;
pub mod parser;
pub mod pt_system;
pub mod writer;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::identifiers::LineName;
use crate::models::line::Line;
use crate::models::types::{ParseDiagnostic, ProgramType, Result, TransitError};

pub use parser::{parse_line_file, ParsedLineFile};
pub use pt_system::{PtRecordKind, PtSystem};

/// A set of transit lines read from one or more Cube line files.
///
/// Line names are unique across every source added.
#[derive(Clone, Debug, Default)]
pub struct CubeTransit {
    program: ProgramType,
    lines: Vec<Line>,
    index: HashMap<LineName, usize>,
    pt_system: PtSystem,
    diagnostics: Vec<ParseDiagnostic>,
    sources: Vec<String>,
}

impl CubeTransit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: &str) -> Result<Self> {
        let mut transit = Self::new();
        transit.add_source(source)?;
        Ok(transit)
    }

    pub fn from_lines(lines: impl IntoIterator<Item = Line>) -> Result<Self> {
        let mut transit = Self::new();
        for line in lines {
            transit.add_line(line)?;
        }
        Ok(transit)
    }

    /// Add a source: line-file text (anything containing `NAME=`), a line
    /// file, or a directory whose `*.lin` files are read in name order.
    pub fn add_source(&mut self, source: &str) -> Result<()> {
        if source.contains("NAME=") {
            return self.add_text(source, "<text>");
        }

        let path = Path::new(source);
        if path.is_dir() {
            for file in lin_files(path)? {
                self.add_file(&file)?;
            }
            Ok(())
        } else {
            self.add_file(path)
        }
    }

    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        info!("Reading line file: {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| TransitError::io(path, e))?;
        self.add_text(&text, &path.display().to_string())
    }

    pub fn add_text(&mut self, text: &str, origin: &str) -> Result<()> {
        let parsed = parse_line_file(text);
        if parsed.lines.is_empty() && parsed.pt_system.is_empty() && !parsed.diagnostics.is_empty() {
            return Err(TransitError::Parse(format!(
                "{origin}: {}",
                parsed.diagnostics[0]
            )));
        }

        // Nothing from this source is kept unless all of it fits.
        let mut names = HashSet::new();
        for line in &parsed.lines {
            if self.index.contains_key(&line.name) || !names.insert(&line.name) {
                return Err(TransitError::DuplicateLine(line.name.clone()));
            }
        }
        let mut pt_system = self.pt_system.clone();
        pt_system.merge(parsed.pt_system)?;

        if let Some(program) = parsed.program {
            self.program = program;
        }
        self.pt_system = pt_system;
        for line in parsed.lines {
            self.add_line(line)?;
        }
        self.diagnostics.extend(parsed.diagnostics);
        self.sources.push(origin.to_string());
        debug!("{origin}: {} lines total", self.lines.len());
        Ok(())
    }

    pub fn add_line(&mut self, line: Line) -> Result<()> {
        if self.index.contains_key(&line.name) {
            return Err(TransitError::DuplicateLine(line.name));
        }
        self.index.insert(line.name.clone(), self.lines.len());
        self.lines.push(line);
        Ok(())
    }

    pub fn remove_line(&mut self, name: &str) -> Option<Line> {
        let position = self.index.remove(name)?;
        let line = self.lines.remove(position);
        self.reindex();
        Some(line)
    }

    /// Rename a line in place, keeping its position.
    pub fn rename_line(&mut self, name: &str, new_name: LineName) -> Result<()> {
        if self.index.contains_key(&new_name) {
            return Err(TransitError::DuplicateLine(new_name));
        }
        let position = self
            .index
            .remove(name)
            .ok_or_else(|| TransitError::LineNotFound(LineName::new(name)))?;
        self.lines[position].name = new_name.clone();
        self.index.insert(new_name, position);
        Ok(())
    }

    fn reindex(&mut self) {
        self.index = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| (line.name.clone(), i))
            .collect();
    }

    pub fn line(&self, name: &str) -> Option<&Line> {
        self.index.get(name).map(|&i| &self.lines[i])
    }

    pub fn line_mut(&mut self, name: &str) -> Option<&mut Line> {
        self.index.get(name).map(|&i| &mut self.lines[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line_names(&self) -> impl Iterator<Item = &LineName> {
        self.lines.iter().map(|line| &line.name)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn program_type(&self) -> ProgramType {
        self.program
    }

    pub fn set_program_type(&mut self, program: ProgramType) {
        self.program = program;
    }

    pub fn pt_system(&self) -> &PtSystem {
        &self.pt_system
    }

    pub fn pt_system_mut(&mut self) -> &mut PtSystem {
        &mut self.pt_system
    }

    /// Blocks skipped while parsing, across all sources.
    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        &self.diagnostics
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn to_line_file_string(&self) -> String {
        writer::write_line_file(self.program, &self.pt_system, &self.lines)
    }

    pub fn write_as_cube_lin(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_line_file_string()).map_err(|e| TransitError::io(path, e))?;
        info!("Wrote {} lines to {}", self.lines.len(), path.display());
        Ok(())
    }
}

fn lin_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| TransitError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("lin"))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_LINES: &str = r#";;<<PT>><<LINE>>;;
LINE NAME="0_452-111_452_pk1", MODE=5, HEADWAY[1]=10, NODES= 39249, -39240, 54648
LINE NAME="0_134-111_134_pk1", MODE=5, HEADWAY[1]=20, NODES= 39249, 54648
"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lasso-transit-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_from_text_source() {
        let transit = CubeTransit::from_source(TWO_LINES).unwrap();
        assert_eq!(transit.len(), 2);
        assert!(transit.contains("0_134-111_134_pk1"));
        assert_eq!(transit.program_type(), ProgramType::Pt);
    }

    #[test]
    fn test_duplicate_lines_across_sources() {
        let mut transit = CubeTransit::from_source(TWO_LINES).unwrap();
        let err = transit.add_source(TWO_LINES).unwrap_err();
        assert!(matches!(err, TransitError::DuplicateLine(name) if name.as_str() == "0_452-111_452_pk1"));
    }

    #[test]
    fn test_duplicate_line_keeps_earlier_state() {
        let mut transit = CubeTransit::from_source(TWO_LINES).unwrap();
        let before = transit.line_names().map(|n| n.to_string()).collect::<Vec<_>>();
        let source = r#"LINE NAME="0_9-1_9_pk1", HEADWAY[1]=10, NODES=1, 2
LINE NAME="0_134-111_134_pk1", HEADWAY[1]=10, NODES=1, 2
"#;
        assert!(transit.add_source(source).is_err());
        let after = transit.line_names().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(after, before);
        assert!(!transit.contains("0_9-1_9_pk1"));
        assert_eq!(transit.sources().len(), 1);
    }

    #[test]
    fn test_directory_source_reads_lin_files() {
        let dir = temp_dir("dir-source");
        fs::write(
            dir.join("b.LIN"),
            "LINE NAME=\"0_2-1_2_pk1\", HEADWAY[1]=15, NODES=3, 4\n",
        )
        .unwrap();
        fs::write(
            dir.join("a.lin"),
            "LINE NAME=\"0_1-1_1_pk1\", HEADWAY[1]=10, NODES=1, 2\n",
        )
        .unwrap();
        fs::write(dir.join("notes.txt"), "not a line file").unwrap();

        let transit = CubeTransit::from_source(dir.to_str().unwrap()).unwrap();
        let names: Vec<&str> = transit.line_names().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["0_1-1_1_pk1", "0_2-1_2_pk1"]);
    }

    #[test]
    fn test_remove_and_rename_keep_index() {
        let mut transit = CubeTransit::from_source(TWO_LINES).unwrap();
        transit
            .rename_line("0_134-111_134_pk1", LineName::new("0_134-111_134_op1"))
            .unwrap();
        assert!(transit.remove_line("0_452-111_452_pk1").is_some());
        assert_eq!(transit.line("0_134-111_134_op1").unwrap().nodes.len(), 2);
        assert!(transit.line("0_134-111_134_pk1").is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = CubeTransit::from_source("/definitely/not/here.lin").unwrap_err();
        assert!(matches!(err, TransitError::Io { .. }));
    }
}
