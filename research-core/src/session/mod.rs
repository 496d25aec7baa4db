//! The [`Session`] owns every piece of planner state: the project arena, the name
//! and technology indexes, the goals and path lists, the initial research list,
//! listener registrations and the batch queue.
//!
//! Operations are split by concern:
//!
//! - `graph`: project lifecycle, dependency edges, technologies, completion
//! - `bus`: listener registration, delivery and batch mode
//! - `goals`: the ordered goals list and goal editing commands
//! - `path`: the research path and the planner
//! - `views`: filtered project listings

mod bus;
mod goals;
mod graph;
mod path;
mod views;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{PlannerError, Result};
use crate::models::{Project, ProjectId, Scope};

pub use bus::{ListenerId, ResearchListener, SharedListener};
pub use views::ViewMode;

#[derive(Default)]
pub struct Session {
    projects: Vec<Option<Project>>,
    names: HashMap<String, ProjectId>,
    /// Declaration stack per technology; the last entry is the resolution.
    technologies: HashMap<String, Vec<ProjectId>>,
    goals: Vec<ProjectId>,
    path: Vec<ProjectId>,
    initial: Vec<ProjectId>,
    bus: bus::Bus,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(id.0).and_then(Option::as_ref)
    }

    pub fn lookup(&self, name: &str) -> Option<ProjectId> {
        self.names.get(name).copied()
    }

    /// Like [`lookup`](Self::lookup), failing with `NotFound`.
    pub fn require(&self, name: &str) -> Result<ProjectId> {
        self.lookup(name)
            .ok_or_else(|| PlannerError::NotFound(name.to_string()))
    }

    pub fn project_for_technology(&self, technology: &str) -> Option<ProjectId> {
        self.technologies
            .get(technology)
            .and_then(|declarers| declarers.last().copied())
    }

    /// Live projects in creation order.
    pub fn projects(&self) -> impl Iterator<Item = (ProjectId, &Project)> + '_ {
        self.projects
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|project| (ProjectId(index), project)))
    }

    pub fn ids_by_name(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.names.values().copied().collect();
        ids.sort_by(|a, b| self.name_of(*a).cmp(self.name_of(*b)));
        ids
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn goals(&self) -> &[ProjectId] {
        &self.goals
    }

    pub fn path(&self) -> &[ProjectId] {
        &self.path
    }

    pub fn initial_research(&self) -> &[ProjectId] {
        &self.initial
    }

    /// Name of a live project, or `""` for a stale handle.
    pub fn name_of(&self, id: ProjectId) -> &str {
        self.project(id).map(Project::name).unwrap_or_default()
    }

    /// Drops every listener, project, goal and path entry without delivering
    /// anything.
    pub fn reset(&mut self) {
        self.enter_batch();
        self.clear_listeners(Scope::Any);
        if let Err(err) = self.clear_projects() {
            warn!(%err, "clearing projects failed during reset");
        }
        self.goals.clear();
        self.path.clear();
        self.initial.clear();
        self.reset_batch();
        debug!("session reset");
    }

    pub(crate) fn node(&self, id: ProjectId) -> Result<&Project> {
        self.project(id).ok_or(PlannerError::UnknownProject(id))
    }

    pub(crate) fn node_mut(&mut self, id: ProjectId) -> Result<&mut Project> {
        self.projects
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(PlannerError::UnknownProject(id))
    }

    /// Checks the structural invariants that hold outside of a batch.
    pub fn verify(&self) -> Result<()> {
        let broken = |what: String| Err(PlannerError::Invariant(what));

        for (id, project) in self.projects() {
            if self.names.get(&project.name) != Some(&id) {
                return broken(format!("{} is not registered under its name", project.name));
            }
            for dependent in project.dependents() {
                match self.project(dependent) {
                    Some(other) if other.has_depender(id) => {}
                    _ => {
                        return broken(format!(
                            "{} -> {} has no matching depender edge",
                            project.name,
                            self.name_of(dependent)
                        ))
                    }
                }
            }
            for depender in project.dependers() {
                match self.project(depender) {
                    Some(other) if other.has_dependent(id) => {}
                    _ => {
                        return broken(format!(
                            "{} <- {} has no matching dependent edge",
                            project.name,
                            self.name_of(depender)
                        ))
                    }
                }
            }
            for technology in project.technologies() {
                if self.project_for_technology(technology).is_none() {
                    return broken(format!("technology {technology} does not resolve"));
                }
            }
        }

        for (position, &id) in self.goals.iter().enumerate() {
            if self.node(id)?.goal_index != position + 1 {
                return broken(format!("goal {} is stamped out of order", self.name_of(id)));
            }
        }

        for (position, &id) in self.path.iter().enumerate() {
            let project = self.node(id)?;
            if project.path_index != position + 1 {
                return broken(format!("path entry {} is stamped out of order", project.name));
            }
            for dependent in project.dependents() {
                let index = self.node(dependent)?.path_index;
                if index == 0 || index >= project.path_index {
                    return broken(format!(
                        "{} is planned before its prerequisite {}",
                        project.name,
                        self.name_of(dependent)
                    ));
                }
            }
        }

        if !self.path.is_empty() {
            if let Some(&goal) = self.goals.iter().find(|&&goal| !self.node_is_in_path(goal)) {
                return broken(format!("goal {} is missing from the path", self.name_of(goal)));
            }
        }

        let listed = self.projects().filter(|(_, p)| p.is_goal()).count();
        if listed != self.goals.len() {
            return broken("goal flags disagree with the goals list".to_string());
        }
        let planned = self.projects().filter(|(_, p)| p.is_in_path()).count();
        if planned != self.path.len() {
            return broken("path flags disagree with the path list".to_string());
        }

        Ok(())
    }

    /// Every technology with its declaration stack, by technology name.
    pub(crate) fn technology_declarers(&self) -> Vec<(&str, &[ProjectId])> {
        let mut declarers: Vec<(&str, &[ProjectId])> = self
            .technologies
            .iter()
            .map(|(technology, stack)| (technology.as_str(), stack.as_slice()))
            .collect();
        declarers.sort_unstable_by_key(|&(technology, _)| technology);
        declarers
    }

    pub(crate) fn set_initial_research(&mut self, list: Vec<ProjectId>) {
        self.initial = list;
    }

    /// Live and still registered under its name. A project being removed stops
    /// being registered before its teardown events fire.
    pub(crate) fn is_registered(&self, id: ProjectId) -> bool {
        self.project(id)
            .is_some_and(|project| self.names.get(&project.name) == Some(&id))
    }

    fn node_is_in_path(&self, id: ProjectId) -> bool {
        self.project(id).is_some_and(Project::is_in_path)
    }
}
