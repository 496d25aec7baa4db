use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Arena handle for a project. Handles are never reused within a session, so a
/// handle to a removed project stays invalid instead of aliasing a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub(crate) usize);

impl ProjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A research project.
///
/// `goal_index` and `path_index` are 1-based positions in the session's goals and
/// path lists, or 0 when the project is not a member. They are maintained by the
/// session; there is no way to write them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub(crate) name: String,
    pub(crate) technologies: BTreeSet<String>,
    pub(crate) dependents: BTreeSet<ProjectId>,
    pub(crate) dependers: BTreeSet<ProjectId>,
    pub(crate) completed: bool,
    pub(crate) goal_index: usize,
    pub(crate) path_index: usize,
}

impl Project {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            technologies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            dependers: BTreeSet::new(),
            completed: false,
            goal_index: 0,
            path_index: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn technologies(&self) -> impl Iterator<Item = &str> + '_ {
        self.technologies.iter().map(String::as_str)
    }

    pub fn has_technology(&self, technology: &str) -> bool {
        self.technologies.contains(technology)
    }

    /// Prerequisites that must be researched before this project.
    pub fn dependents(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.dependents.iter().copied()
    }

    pub fn has_dependent(&self, dependent: ProjectId) -> bool {
        self.dependents.contains(&dependent)
    }

    /// Projects that list this one as a prerequisite.
    pub fn dependers(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.dependers.iter().copied()
    }

    pub fn has_depender(&self, depender: ProjectId) -> bool {
        self.dependers.contains(&depender)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_goal(&self) -> bool {
        self.goal_index != 0
    }

    pub fn goal_index(&self) -> usize {
        self.goal_index
    }

    pub fn is_in_path(&self) -> bool {
        self.path_index != 0
    }

    pub fn path_index(&self) -> usize {
        self.path_index
    }
}
