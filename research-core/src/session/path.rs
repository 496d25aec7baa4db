use std::collections::HashMap;

use tracing::{debug, info};

use super::Session;
use crate::error::{Deferred, PlannerError, Result};
use crate::models::{ListChange, ProjectId, ResearchEvent};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl Session {
    /// Inserts `project` into the path at the 1-based `index` without re-planning.
    pub fn add_to_path(&mut self, project: ProjectId, index: usize) -> Result<()> {
        let node = self.node(project)?;
        let len = self.path.len();
        if index == 0 || index > len + 1 {
            return Err(PlannerError::OutOfRange { index, len });
        }
        if node.is_in_path() {
            return Err(PlannerError::Duplicate(format!(
                "{} is already step {} of the path",
                node.name,
                node.path_index
            )));
        }
        self.path.insert(index - 1, project);
        self.stamp_path(index - 1);
        self.fire(ResearchEvent::PathChanged(ListChange::added(project)))
    }

    pub fn push_path(&mut self, project: ProjectId) -> Result<()> {
        self.add_to_path(project, self.path.len() + 1)
    }

    pub fn remove_from_path(&mut self, project: ProjectId) -> Result<bool> {
        let position = match self.node(project)?.path_index {
            0 => return Ok(false),
            index => index - 1,
        };
        self.path.remove(position);
        self.node_mut(project)?.path_index = 0;
        self.stamp_path(position);
        self.fire(ResearchEvent::PathChanged(ListChange::removed(project)))?;
        Ok(true)
    }

    pub fn clear_path(&mut self) -> Result<()> {
        let mut deferred = Deferred::default();
        while let Some(&last) = self.path.last() {
            deferred.keep(self.remove_from_path(last));
        }
        deferred.finish()
    }

    /// Re-plans the path from the goals.
    ///
    /// Each goal is appended after its transitive prerequisites, prerequisites
    /// being visited in name order. Completed projects are planned like any other.
    /// The goals are then reordered so they appear in path order.
    ///
    /// A cycle reachable from the goals fails with `CycleDetected` and leaves the
    /// path empty.
    pub fn recompute_path(&mut self) -> Result<()> {
        let mut deferred = Deferred::default();
        deferred.keep(self.clear_path());

        let order = self.plan_order()?;
        for project in order {
            deferred.keep(self.push_path(project));
        }
        let swaps = deferred.keep(self.reorder_goals()).unwrap_or_default();

        info!(
            goals = self.goals.len(),
            steps = self.path.len(),
            swaps,
            "research path recomputed"
        );
        deferred.finish()
    }

    fn plan_order(&self) -> Result<Vec<ProjectId>> {
        let mut marks = HashMap::new();
        let mut order = Vec::new();
        for &goal in &self.goals {
            self.visit(goal, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    /// Depth-first walk from `root` that appends each project after its
    /// prerequisites. Uses an explicit stack so chain length is not bounded by
    /// the thread's stack.
    fn visit(
        &self,
        root: ProjectId,
        marks: &mut HashMap<ProjectId, Mark>,
        order: &mut Vec<ProjectId>,
    ) -> Result<()> {
        let mut stack: Vec<(ProjectId, std::vec::IntoIter<ProjectId>)> = Vec::new();
        self.open(root, marks, &mut stack)?;

        while let Some((project, remaining)) = stack.last_mut() {
            if let Some(dependent) = remaining.next() {
                self.open(dependent, marks, &mut stack)?;
            } else {
                let project = *project;
                stack.pop();
                marks.insert(project, Mark::Done);
                order.push(project);
            }
        }
        Ok(())
    }

    /// Marks `project` as visiting and pushes its prerequisites in name order.
    fn open(
        &self,
        project: ProjectId,
        marks: &mut HashMap<ProjectId, Mark>,
        stack: &mut Vec<(ProjectId, std::vec::IntoIter<ProjectId>)>,
    ) -> Result<()> {
        match marks.get(&project) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(PlannerError::CycleDetected(self.name_of(project).to_string()))
            }
            None => {}
        }
        marks.insert(project, Mark::Visiting);

        let mut dependents: Vec<ProjectId> = self.node(project)?.dependents().collect();
        dependents.sort_by(|a, b| self.name_of(*a).cmp(self.name_of(*b)));
        stack.push((project, dependents.into_iter()));
        Ok(())
    }

    /// Walks the goals swapping any goal planned earlier than its predecessor,
    /// stepping back after each swap. Every swap removes one inversion, so the walk
    /// ends with the goals sorted by path index. Returns the number of swaps.
    fn reorder_goals(&mut self) -> Result<usize> {
        let mut deferred = Deferred::default();
        let mut swaps = 0;
        let mut position = 1;
        while position < self.goals.len() {
            let previous = self.node(self.goals[position - 1])?.path_index;
            let current_id = self.goals[position];
            if previous > self.node(current_id)?.path_index {
                deferred.keep(self.remove_from_goals(current_id));
                deferred.keep(self.add_to_goals(current_id, position));
                swaps += 1;
                debug!(goal = %self.name_of(current_id), to = position, "goal moved up");
                position = if position > 1 { position - 1 } else { position + 1 };
            } else {
                position += 1;
            }
        }
        deferred.finish().map(|()| swaps)
    }

    fn stamp_path(&mut self, from: usize) {
        for position in from..self.path.len() {
            let id = self.path[position];
            if let Some(Some(project)) = self.projects.get_mut(id.0) {
                project.path_index = position + 1;
            }
        }
    }
}
