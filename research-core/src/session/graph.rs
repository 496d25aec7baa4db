use std::collections::BTreeSet;

use tracing::debug;

use super::Session;
use crate::error::{Deferred, PlannerError, Result};
use crate::models::{Project, ProjectId, ResearchEvent, Scope};

impl Session {
    /// Registers a new project.
    ///
    /// If a listener rejects the `ProjectAdded` event the project stays registered
    /// and the listener's error is returned; look it up by name to continue.
    pub fn create_project(&mut self, name: impl Into<String>) -> Result<ProjectId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(PlannerError::Duplicate(format!(
                "research project {name:?} already exists"
            )));
        }
        let id = ProjectId(self.projects.len());
        self.projects.push(Some(Project::new(name.clone())));
        self.names.insert(name, id);
        self.fire(ResearchEvent::ProjectAdded(id))?;
        Ok(id)
    }

    pub fn project_or_create(&mut self, name: &str) -> Result<ProjectId> {
        match self.lookup(name) {
            Some(id) => Ok(id),
            None => self.create_project(name),
        }
    }

    /// Removes a project.
    ///
    /// `ProjectRemoved` fires first, while the project is still intact. The project
    /// then leaves the path and goals, loses its listeners, and has every incident
    /// edge severed. The path is not re-planned.
    pub fn remove_project(&mut self, id: ProjectId) -> Result<()> {
        let name = self.node(id)?.name.clone();
        self.names.remove(&name);

        let mut deferred = Deferred::default();
        deferred.keep(self.fire(ResearchEvent::ProjectRemoved {
            project: id,
            name: name.clone(),
        }));
        deferred.keep(self.remove_from_path(id));
        deferred.keep(self.remove_from_goals(id));
        self.clear_listeners(Scope::Project(id));

        let project = self.node(id)?;
        let dependents: Vec<ProjectId> = project.dependents().collect();
        let dependers: Vec<ProjectId> = project.dependers().collect();
        let technologies: Vec<String> = project.technologies.iter().cloned().collect();
        for dependent in dependents {
            deferred.keep(self.remove_dependent(id, dependent));
        }
        for depender in dependers {
            deferred.keep(self.remove_depender(id, depender));
        }
        for technology in &technologies {
            self.withdraw_technology(id, technology);
        }
        self.initial.retain(|&member| member != id);
        self.projects[id.0] = None;

        debug!(project = %name, "research project removed");
        deferred.finish()
    }

    pub fn clear_projects(&mut self) -> Result<()> {
        let mut deferred = Deferred::default();
        for id in self.ids_by_name() {
            deferred.keep(self.remove_project(id));
        }
        deferred.finish()
    }

    /// Makes `dependent` a prerequisite of `project`. Returns `false` for an edge
    /// that already exists, in which case nothing fires.
    ///
    /// Edges that close a cycle are accepted here; planning rejects them later.
    pub fn add_dependent(&mut self, project: ProjectId, dependent: ProjectId) -> Result<bool> {
        self.node(dependent)?;
        if !self.node_mut(project)?.dependents.insert(dependent) {
            return Ok(false);
        }
        self.node_mut(dependent)?.dependers.insert(project);

        let mut deferred = Deferred::default();
        deferred.keep(self.fire(ResearchEvent::DependentAdded { project, dependent }));
        deferred.keep(self.fire(ResearchEvent::DependerAdded {
            project: dependent,
            depender: project,
        }));
        deferred.finish().map(|()| true)
    }

    pub fn remove_dependent(&mut self, project: ProjectId, dependent: ProjectId) -> Result<bool> {
        self.node(dependent)?;
        if !self.node_mut(project)?.dependents.remove(&dependent) {
            return Ok(false);
        }
        self.node_mut(dependent)?.dependers.remove(&project);

        let mut deferred = Deferred::default();
        deferred.keep(self.fire(ResearchEvent::DependentRemoved { project, dependent }));
        deferred.keep(self.fire(ResearchEvent::DependerRemoved {
            project: dependent,
            depender: project,
        }));
        deferred.finish().map(|()| true)
    }

    /// Makes `project` a prerequisite of `depender`.
    pub fn add_depender(&mut self, project: ProjectId, depender: ProjectId) -> Result<bool> {
        self.node(depender)?;
        if !self.node_mut(project)?.dependers.insert(depender) {
            return Ok(false);
        }
        self.node_mut(depender)?.dependents.insert(project);

        let mut deferred = Deferred::default();
        deferred.keep(self.fire(ResearchEvent::DependerAdded { project, depender }));
        deferred.keep(self.fire(ResearchEvent::DependentAdded {
            project: depender,
            dependent: project,
        }));
        deferred.finish().map(|()| true)
    }

    pub fn remove_depender(&mut self, project: ProjectId, depender: ProjectId) -> Result<bool> {
        self.node(depender)?;
        if !self.node_mut(project)?.dependers.remove(&depender) {
            return Ok(false);
        }
        self.node_mut(depender)?.dependents.remove(&project);

        let mut deferred = Deferred::default();
        deferred.keep(self.fire(ResearchEvent::DependerRemoved { project, depender }));
        deferred.keep(self.fire(ResearchEvent::DependentRemoved {
            project: depender,
            dependent: project,
        }));
        deferred.finish().map(|()| true)
    }

    /// Declares that `project` produces `technology`.
    ///
    /// The most recent declarer owns the technology lookup. Re-declaring a technology
    /// the project already has only moves the lookup back to it and fires nothing.
    pub fn add_technology(&mut self, project: ProjectId, technology: impl Into<String>) -> Result<bool> {
        let technology = technology.into();
        let declared = self.node_mut(project)?.technologies.insert(technology.clone());

        let declarers = self.technologies.entry(technology.clone()).or_default();
        let previous = declarers.last().copied();
        declarers.retain(|&declarer| declarer != project);
        declarers.push(project);
        if let Some(previous) = previous.filter(|&previous| previous != project) {
            debug!(
                technology = %technology,
                from = %self.name_of(previous),
                to = %self.name_of(project),
                "technology reassigned"
            );
        }

        if !declared {
            return Ok(false);
        }
        self.fire(ResearchEvent::TechnologyAdded {
            project,
            technology,
        })?;
        Ok(true)
    }

    pub fn remove_technology(&mut self, project: ProjectId, technology: &str) -> Result<bool> {
        if !self.node_mut(project)?.technologies.remove(technology) {
            return Ok(false);
        }
        self.withdraw_technology(project, technology);
        self.fire(ResearchEvent::TechnologyRemoved {
            project,
            technology: technology.to_string(),
        })?;
        Ok(true)
    }

    fn withdraw_technology(&mut self, project: ProjectId, technology: &str) {
        if let Some(declarers) = self.technologies.get_mut(technology) {
            declarers.retain(|&declarer| declarer != project);
            if declarers.is_empty() {
                self.technologies.remove(technology);
            }
        }
    }

    /// Returns `false` without firing when the flag is unchanged.
    pub fn set_completed(&mut self, project: ProjectId, completed: bool) -> Result<bool> {
        let node = self.node_mut(project)?;
        if node.completed == completed {
            return Ok(false);
        }
        node.completed = completed;
        self.fire(ResearchEvent::CompletedChanged { project, completed })?;
        Ok(true)
    }

    /// Marks `project` and every transitive prerequisite complete in one batch.
    /// Returns how many projects changed.
    pub fn complete_with_dependents(&mut self, project: ProjectId) -> Result<usize> {
        let closure = self.prerequisite_closure(project)?;
        self.batch(|session| {
            let mut changed = 0;
            for id in closure {
                if session.set_completed(id, true)? {
                    changed += 1;
                }
            }
            Ok(changed)
        })
    }

    /// `project` and everything it transitively depends on. Tolerates cycles.
    pub fn prerequisite_closure(&self, project: ProjectId) -> Result<BTreeSet<ProjectId>> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![project];
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.node(id)?.dependents());
            }
        }
        Ok(seen)
    }
}
