//! A project: the changes between a base and a build network, written as
//! a project card.
//!
//! ```no_run
//! use std::path::PathBuf;
//! use lasso_core::project::ProjectBuilder;
//!
//! let project = ProjectBuilder::new()
//!     .base_roadway_dir("networks/base")
//!     .roadway_log_files(vec![PathBuf::from("edits/st_paul.log")])
//!     .build()
//!     .unwrap();
//! project.write_project_card(None).unwrap();
//! ```

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::card::{Change, DEFAULT_PROJECT_NAME, ProjectCard};
use crate::changes::{
    ChangeTable, evaluate_roadway_changes, project_name_from_logfiles, read_csv_changes, read_geojson_changes,
    read_logfiles,
};
use crate::error::{LassoError, Result};
use crate::model::ModelRoadwayNetwork;
use crate::parameters::Parameters;
use crate::roadway::RoadwayNetwork;
use crate::transit::{CubeTransit, DiffOptions, evaluate_differences};

/// Line-file text, a `.lin` file, a directory of them, or parsed lines.
#[derive(Clone, Debug)]
pub enum TransitSource {
    Source(String),
    Network(CubeTransit),
}

#[derive(Clone, Debug)]
pub enum RoadwaySource {
    Dir(PathBuf),
    Network(RoadwayNetwork),
}

#[derive(Clone, Debug)]
pub enum ChangeSource {
    LogFiles(Vec<PathBuf>),
    Csv(PathBuf),
    GeoJson(PathBuf),
    Table(ChangeTable),
}

/// Collects project inputs. Each slot takes at most one source; giving a
/// slot twice is reported by [`ProjectBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct ProjectBuilder {
    base_transit: Option<TransitSource>,
    build_transit: Option<TransitSource>,
    base_roadway: Option<RoadwaySource>,
    roadway_changes: Option<ChangeSource>,
    project_name: Option<String>,
    parameters: Option<Parameters>,
    limit_variables_to_existing_network: bool,
    conflicts: Vec<&'static str>,
}

fn fill<T>(slot: &mut Option<T>, value: T, name: &'static str, conflicts: &mut Vec<&'static str>) {
    if slot.is_some() {
        conflicts.push(name);
    }
    *slot = Some(value);
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_transit_source(mut self, source: impl Into<String>) -> Self {
        fill(&mut self.base_transit, TransitSource::Source(source.into()), "base transit", &mut self.conflicts);
        self
    }

    pub fn base_transit_network(mut self, network: CubeTransit) -> Self {
        fill(&mut self.base_transit, TransitSource::Network(network), "base transit", &mut self.conflicts);
        self
    }

    pub fn build_transit_source(mut self, source: impl Into<String>) -> Self {
        fill(&mut self.build_transit, TransitSource::Source(source.into()), "build transit", &mut self.conflicts);
        self
    }

    pub fn build_transit_network(mut self, network: CubeTransit) -> Self {
        fill(&mut self.build_transit, TransitSource::Network(network), "build transit", &mut self.conflicts);
        self
    }

    pub fn base_roadway_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        fill(&mut self.base_roadway, RoadwaySource::Dir(dir.into()), "base roadway", &mut self.conflicts);
        self
    }

    pub fn base_roadway_network(mut self, network: RoadwayNetwork) -> Self {
        fill(&mut self.base_roadway, RoadwaySource::Network(network), "base roadway", &mut self.conflicts);
        self
    }

    pub fn roadway_log_files(mut self, paths: Vec<PathBuf>) -> Self {
        fill(&mut self.roadway_changes, ChangeSource::LogFiles(paths), "roadway changes", &mut self.conflicts);
        self
    }

    pub fn roadway_csv_file(mut self, path: impl Into<PathBuf>) -> Self {
        fill(&mut self.roadway_changes, ChangeSource::Csv(path.into()), "roadway changes", &mut self.conflicts);
        self
    }

    pub fn roadway_geojson_file(mut self, path: impl Into<PathBuf>) -> Self {
        fill(&mut self.roadway_changes, ChangeSource::GeoJson(path.into()), "roadway changes", &mut self.conflicts);
        self
    }

    pub fn roadway_changes(mut self, table: ChangeTable) -> Self {
        fill(&mut self.roadway_changes, ChangeSource::Table(table), "roadway changes", &mut self.conflicts);
        self
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn limit_variables_to_existing_network(mut self, limit: bool) -> Self {
        self.limit_variables_to_existing_network = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(slot) = self.conflicts.first() {
            return Err(LassoError::InvalidProject(format!("{slot} takes only one source")));
        }
        if self.base_transit.is_some() != self.build_transit.is_some() {
            return Err(LassoError::InvalidProject(
                "base and build transit must be given together".to_string(),
            ));
        }
        if self.roadway_changes.is_some() && self.base_roadway.is_none() {
            return Err(LassoError::InvalidProject(
                "roadway changes need a base roadway network".to_string(),
            ));
        }
        if self.base_roadway.is_some() && self.roadway_changes.is_none() {
            warn!("Base roadway network given without roadway changes");
        }
        Ok(())
    }

    /// Load every input and evaluate the project's changes.
    pub fn build(self) -> Result<Project> {
        self.validate()?;
        let parameters = self.parameters.unwrap_or_default();

        let base_transit = self.base_transit.map(load_transit).transpose()?;
        let build_transit = self.build_transit.map(load_transit).transpose()?;

        let mut project_name = self.project_name;
        let roadway_changes = match self.roadway_changes {
            None => ChangeTable::default(),
            Some(ChangeSource::LogFiles(paths)) => {
                if project_name.is_none() {
                    project_name = project_name_from_logfiles(&paths);
                }
                read_logfiles(&paths)?
            }
            Some(ChangeSource::Csv(path)) => read_csv_changes(&path)?,
            Some(ChangeSource::GeoJson(path)) => read_geojson_changes(&path)?,
            Some(ChangeSource::Table(table)) => table,
        };

        let base_roadway = match self.base_roadway {
            None => None,
            Some(source) => {
                let network = match source {
                    RoadwaySource::Dir(dir) => RoadwayNetwork::read_dir(&dir)?,
                    RoadwaySource::Network(network) => network,
                };
                let mut model = ModelRoadwayNetwork::new(network, parameters.clone());
                model.split_properties_by_time_period_and_category();
                Some(model)
            }
        };

        let mut project = Project {
            project_name: project_name.unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            parameters,
            base_roadway,
            roadway_changes,
            base_transit,
            build_transit,
            limit_variables_to_existing_network: self.limit_variables_to_existing_network,
            card: ProjectCard::default(),
        };
        project.evaluate_changes()?;
        Ok(project)
    }
}

fn load_transit(source: TransitSource) -> Result<CubeTransit> {
    let transit = match source {
        TransitSource::Source(source) => CubeTransit::from_source(&source)?,
        TransitSource::Network(network) => network,
    };
    debug!("Transit network has {} lines", transit.len());
    Ok(transit)
}

#[derive(Clone, Debug)]
pub struct Project {
    pub project_name: String,
    pub parameters: Parameters,
    /// Base roadway with split model columns
    pub base_roadway: Option<ModelRoadwayNetwork>,
    pub roadway_changes: ChangeTable,
    pub base_transit: Option<CubeTransit>,
    pub build_transit: Option<CubeTransit>,
    pub limit_variables_to_existing_network: bool,
    card: ProjectCard,
}

impl Project {
    pub fn builder() -> ProjectBuilder {
        ProjectBuilder::new()
    }

    /// Rebuild the card's changes: transit changes first, then roadway
    /// deletions, additions and property changes.
    pub fn evaluate_changes(&mut self) -> Result<()> {
        info!("Evaluating project changes");
        let mut changes: Vec<Change> = Vec::new();

        if let (Some(base), Some(build)) = (&self.base_transit, &self.build_transit) {
            let transit = evaluate_differences(base, build, &self.parameters.transit, DiffOptions::default())?;
            info!("{} transit changes", transit.len());
            changes.extend(transit.into_iter().map(Change::from));
        }

        if !self.roadway_changes.is_empty() {
            let base = self.base_roadway.as_ref().ok_or_else(|| {
                LassoError::InvalidProject("roadway changes need a base roadway network".to_string())
            })?;
            changes.extend(evaluate_roadway_changes(
                &base.network,
                &self.roadway_changes,
                &self.parameters,
                self.limit_variables_to_existing_network,
            )?);
        }

        let mut card = ProjectCard::new(self.project_name.clone());
        card.changes = changes;
        self.card = card;
        Ok(())
    }

    pub fn card(&self) -> &ProjectCard {
        &self.card
    }

    /// Default file name for the card: the project name with spaces
    /// replaced by underscores.
    pub fn default_card_file_name(&self) -> String {
        format!("{}.yml", self.project_name.replace(' ', "_"))
    }

    /// Write the card as YAML to `path`, or to the default file name in the
    /// current directory. Returns where it was written.
    pub fn write_project_card(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(self.default_card_file_name()),
        };
        self.card.write(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadway::tests::sample_network;

    #[test]
    fn test_one_source_per_slot() {
        let err = ProjectBuilder::new()
            .base_roadway_network(sample_network())
            .base_roadway_dir("elsewhere")
            .roadway_changes(ChangeTable::default())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("base roadway takes only one source"));
    }

    #[test]
    fn test_transit_needs_base_and_build() {
        let err = ProjectBuilder::new()
            .base_transit_network(CubeTransit::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, LassoError::InvalidProject(_)));
    }

    #[test]
    fn test_changes_need_base_roadway() {
        let err = ProjectBuilder::new()
            .roadway_changes(ChangeTable::default())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("base roadway"));
    }

    #[test]
    fn test_default_name_and_file_name() {
        let project = ProjectBuilder::new().build().unwrap();
        assert_eq!(project.card().project, DEFAULT_PROJECT_NAME);
        assert!(project.card().changes.is_empty());
        assert_eq!(project.default_card_file_name(), "USER_TO_define.yml");
    }
}
