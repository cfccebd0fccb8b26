//! Applying queued project cards to base networks.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, error, info, warn};

use crate::card::{Change, ProjectCard};
use crate::error::{LassoError, Result};
use crate::parameters::Parameters;
use crate::roadway::RoadwayNetwork;
use crate::transit::CubeTransit;

#[derive(Clone, Debug)]
pub struct BaseNetworks {
    pub roadway: RoadwayNetwork,
    pub transit: Option<CubeTransit>,
}

/// A property set by two applied projects. The later project's value is
/// the one the network keeps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlap {
    pub entity: String,
    pub property: String,
    pub earlier: String,
    pub later: String,
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: set by '{}', overridden by '{}'",
            self.entity, self.property, self.earlier, self.later
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub base_links: usize,
    pub base_nodes: usize,
    pub base_transit_lines: Option<usize>,
    pub links: usize,
    pub nodes: usize,
    pub transit_lines: Option<usize>,
    pub applied_projects: Vec<String>,
    pub change_counts: Vec<(&'static str, usize)>,
    pub overlaps: Vec<Overlap>,
}

impl fmt::Display for ScenarioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario summary")?;
        writeln!(f, "  Base network: {} links, {} nodes", self.base_links, self.base_nodes)?;
        writeln!(f, "  Scenario network: {} links, {} nodes", self.links, self.nodes)?;
        if let (Some(base), Some(now)) = (self.base_transit_lines, self.transit_lines) {
            writeln!(f, "  Transit lines: {base} -> {now}")?;
        }
        writeln!(f, "  Applied projects ({}):", self.applied_projects.len())?;
        for (i, project) in self.applied_projects.iter().enumerate() {
            writeln!(f, "    {}. {project}", i + 1)?;
        }
        if !self.change_counts.is_empty() {
            writeln!(f, "  Changes applied:")?;
            for (category, count) in &self.change_counts {
                writeln!(f, "    {category}: {count}")?;
            }
        }
        if !self.overlaps.is_empty() {
            writeln!(f, "  Overlapping changes ({}):", self.overlaps.len())?;
            for overlap in &self.overlaps {
                writeln!(f, "    {overlap}")?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Scenario {
    pub roadway: RoadwayNetwork,
    pub transit: Option<CubeTransit>,
    params: Parameters,
    base_size: (usize, usize, Option<usize>),
    project_cards: Vec<ProjectCard>,
    applied_projects: Vec<String>,
    change_counts: Vec<(&'static str, usize)>,
    overlaps: Vec<Overlap>,
    /// Project that last set each `(entity, property)`
    set_by: HashMap<(String, String), String>,
}

impl Scenario {
    pub fn new(base: BaseNetworks, params: Parameters) -> Self {
        let base_size = (
            base.roadway.links.len(),
            base.roadway.nodes.len(),
            base.transit.as_ref().map(CubeTransit::len),
        );
        Self {
            roadway: base.roadway,
            transit: base.transit,
            params,
            base_size,
            project_cards: Vec::new(),
            applied_projects: Vec::new(),
            change_counts: Vec::new(),
            overlaps: Vec::new(),
            set_by: HashMap::new(),
        }
    }

    pub fn project_cards(&self) -> &[ProjectCard] {
        &self.project_cards
    }

    pub fn applied_projects(&self) -> &[String] {
        &self.applied_projects
    }

    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    fn has_project(&self, name: &str) -> bool {
        self.applied_projects.iter().any(|p| p == name) || self.project_cards.iter().any(|c| c.project == name)
    }

    /// Queue a card. Project names must be unique within the scenario.
    pub fn add_project_card(&mut self, card: ProjectCard) -> Result<()> {
        if self.has_project(&card.project) {
            return Err(LassoError::Scenario(format!(
                "project '{}' is already in the scenario",
                card.project
            )));
        }
        debug!("Queued project '{}'", card.project);
        self.project_cards.push(card);
        Ok(())
    }

    /// Queue every `.yml`/`.yaml` card in `dir`, in file name order.
    pub fn add_project_cards_from_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(|e| LassoError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "yml" || ext == "yaml")
            })
            .collect();
        paths.sort();

        for path in &paths {
            self.add_project_card(ProjectCard::read(path)?)?;
        }
        info!("Queued {} project cards from {}", paths.len(), dir.display());
        Ok(paths.len())
    }

    /// Every prerequisite and corequisite must be queued or applied, and no
    /// conflict may be.
    pub fn check_scenario_requisites(&self) -> Result<()> {
        let mut problems = Vec::new();
        for card in &self.project_cards {
            let deps = &card.dependencies;
            for name in deps.prerequisites.iter().filter(|n| !self.has_project(n)) {
                problems.push(format!("'{}' requires '{name}' first", card.project));
            }
            for name in deps.corequisites.iter().filter(|n| !self.has_project(n)) {
                problems.push(format!("'{}' requires '{name}' alongside it", card.project));
            }
            for name in deps.conflicts.iter().filter(|n| self.has_project(n)) {
                problems.push(format!("'{}' conflicts with '{name}'", card.project));
            }
        }
        if problems.is_empty() {
            return Ok(());
        }
        let message = problems.join("; ");
        error!("Scenario requisites not met: {message}");
        Err(LassoError::Scenario(message))
    }

    /// Order queued cards so prerequisites come first, otherwise keeping
    /// the order they were added in.
    pub fn order_project_cards(&mut self) -> Result<()> {
        let queued: HashSet<&str> = self.project_cards.iter().map(|c| c.project.as_str()).collect();
        let mut placed: HashSet<String> = HashSet::new();
        let mut remaining: Vec<usize> = (0..self.project_cards.len()).collect();
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let ready = remaining.iter().position(|&i| {
                self.project_cards[i]
                    .dependencies
                    .prerequisites
                    .iter()
                    .all(|p| !queued.contains(p.as_str()) || placed.contains(p))
            });
            let Some(position) = ready else {
                let cycle: Vec<&str> = remaining
                    .iter()
                    .map(|&i| self.project_cards[i].project.as_str())
                    .collect();
                let message = format!("prerequisite cycle among {}", cycle.join(", "));
                error!("{message}");
                return Err(LassoError::Scenario(message));
            };
            let index = remaining.remove(position);
            placed.insert(self.project_cards[index].project.clone());
            order.push(index);
        }

        let mut cards: Vec<Option<ProjectCard>> = std::mem::take(&mut self.project_cards)
            .into_iter()
            .map(Some)
            .collect();
        self.project_cards = order.into_iter().filter_map(|i| cards[i].take()).collect();
        Ok(())
    }

    /// Check, order and apply every queued card. Networks are changed in
    /// place.
    pub fn apply_all_projects(&mut self) -> Result<()> {
        self.check_scenario_requisites()?;
        self.order_project_cards()?;
        for card in std::mem::take(&mut self.project_cards) {
            self.apply_project_card(&card)?;
        }
        Ok(())
    }

    fn apply_project_card(&mut self, card: &ProjectCard) -> Result<()> {
        info!("Applying project '{}'", card.project);
        let mut touched: Vec<(String, String)> = Vec::new();

        for change in &card.changes {
            if let Some(transit_change) = change.to_transit() {
                let transit = self.transit.as_mut().ok_or_else(|| {
                    LassoError::Scenario(format!(
                        "project '{}' changes transit but the scenario has no transit network",
                        card.project
                    ))
                })?;
                let lines = transit.apply_change(&transit_change, &self.params.transit)?;
                for line in lines {
                    let properties = transit_change.properties();
                    if properties.is_empty() {
                        touched.push((format!("line {line}"), transit_change.category().to_string()));
                    }
                    for property in properties {
                        touched.push((format!("line {line}"), property.property.clone()));
                    }
                }
            } else {
                touched.extend(self.roadway.apply_change(change)?);
            }
            self.count(change);
        }

        let mut seen = HashSet::new();
        for key in touched {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(earlier) = self.set_by.get(&key).filter(|p| **p != card.project) {
                let overlap = Overlap {
                    entity: key.0.clone(),
                    property: key.1.clone(),
                    earlier: earlier.clone(),
                    later: card.project.clone(),
                };
                warn!("Overlapping change: {overlap}");
                self.overlaps.push(overlap);
            }
            self.set_by.insert(key, card.project.clone());
        }

        self.applied_projects.push(card.project.clone());
        Ok(())
    }

    fn count(&mut self, change: &Change) {
        let category = change.category();
        match self.change_counts.iter_mut().find(|(c, _)| *c == category) {
            Some((_, n)) => *n += 1,
            None => self.change_counts.push((category, 1)),
        }
    }

    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            base_links: self.base_size.0,
            base_nodes: self.base_size.1,
            base_transit_lines: self.base_size.2,
            links: self.roadway.links.len(),
            nodes: self.roadway.nodes.len(),
            transit_lines: self.transit.as_ref().map(CubeTransit::len),
            applied_projects: self.applied_projects.clone(),
            change_counts: self.change_counts.clone(),
            overlaps: self.overlaps.clone(),
        }
    }
}
