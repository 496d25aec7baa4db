use super::Session;
use crate::error::{Deferred, PlannerError, Result};
use crate::models::{ListChange, ProjectId, ResearchEvent};

impl Session {
    /// Inserts `project` into the goals at the 1-based `index`.
    pub fn add_to_goals(&mut self, project: ProjectId, index: usize) -> Result<()> {
        let node = self.node(project)?;
        let len = self.goals.len();
        if index == 0 || index > len + 1 {
            return Err(PlannerError::OutOfRange { index, len });
        }
        if node.is_goal() {
            return Err(PlannerError::Duplicate(format!(
                "{} is already goal {}",
                node.name,
                node.goal_index
            )));
        }
        self.goals.insert(index - 1, project);
        self.stamp_goals(index - 1);
        self.fire(ResearchEvent::GoalsChanged(ListChange::added(project)))
    }

    pub fn push_goal(&mut self, project: ProjectId) -> Result<()> {
        self.add_to_goals(project, self.goals.len() + 1)
    }

    /// Returns `false` if `project` was not a goal.
    pub fn remove_from_goals(&mut self, project: ProjectId) -> Result<bool> {
        let position = match self.node(project)?.goal_index {
            0 => return Ok(false),
            index => index - 1,
        };
        self.goals.remove(position);
        self.node_mut(project)?.goal_index = 0;
        self.stamp_goals(position);
        self.fire(ResearchEvent::GoalsChanged(ListChange::removed(project)))?;
        Ok(true)
    }

    pub fn clear_goals(&mut self) -> Result<()> {
        let mut deferred = Deferred::default();
        while let Some(&last) = self.goals.last() {
            deferred.keep(self.remove_from_goals(last));
        }
        deferred.finish()
    }

    /// Moves a goal to the 1-based `new_index` as one batched remove and add.
    /// Returns `false` if `project` is not a goal. The path is not re-planned.
    pub fn move_goal(&mut self, project: ProjectId, new_index: usize) -> Result<bool> {
        let current = self.node(project)?.goal_index;
        if current == 0 {
            return Ok(false);
        }
        let len = self.goals.len();
        if new_index == 0 || new_index > len {
            return Err(PlannerError::OutOfRange {
                index: new_index,
                len: len - 1,
            });
        }
        if new_index == current {
            return Ok(true);
        }
        self.batch(|session| {
            session.remove_from_goals(project)?;
            session.add_to_goals(project, new_index)?;
            Ok(true)
        })
    }

    /// Swaps a goal with the one before it and re-plans. No-op for the first goal.
    pub fn move_goal_up(&mut self, project: ProjectId) -> Result<bool> {
        let index = self.node(project)?.goal_index;
        if index <= 1 {
            return Ok(false);
        }
        self.batch(|session| {
            session.move_goal(project, index - 1)?;
            session.recompute_path()?;
            Ok(true)
        })
    }

    /// Swaps a goal with the one after it and re-plans. No-op for the last goal.
    pub fn move_goal_down(&mut self, project: ProjectId) -> Result<bool> {
        let index = self.node(project)?.goal_index;
        if index == 0 || index == self.goals.len() {
            return Ok(false);
        }
        self.batch(|session| {
            session.move_goal(project, index + 1)?;
            session.recompute_path()?;
            Ok(true)
        })
    }

    /// Appends every project that is not yet a goal, then re-plans, in one batch.
    /// Returns how many goals were added.
    pub fn add_goals(&mut self, projects: &[ProjectId]) -> Result<usize> {
        self.batch(|session| {
            let mut added = 0;
            for &project in projects {
                if !session.node(project)?.is_goal() {
                    session.push_goal(project)?;
                    added += 1;
                }
            }
            session.recompute_path()?;
            Ok(added)
        })
    }

    pub fn remove_goals(&mut self, projects: &[ProjectId]) -> Result<usize> {
        self.batch(|session| {
            let mut removed = 0;
            for &project in projects {
                if session.remove_from_goals(project)? {
                    removed += 1;
                }
            }
            session.recompute_path()?;
            Ok(removed)
        })
    }

    fn stamp_goals(&mut self, from: usize) {
        for position in from..self.goals.len() {
            let id = self.goals[position];
            if let Some(Some(project)) = self.projects.get_mut(id.0) {
                project.goal_index = position + 1;
            }
        }
    }
}
