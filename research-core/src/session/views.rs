use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Session;
use crate::error::PlannerError;
use crate::models::ProjectId;

/// Filters for listing projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    All,
    /// Not yet completed.
    Available,
    Completed,
    /// On the path, in path order.
    Researching,
    /// Initial research that is not completed yet, in file order.
    Initial,
}

impl ViewMode {
    pub const ALL: [ViewMode; 5] = [
        ViewMode::All,
        ViewMode::Available,
        ViewMode::Completed,
        ViewMode::Researching,
        ViewMode::Initial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::All => "all",
            ViewMode::Available => "available",
            ViewMode::Completed => "completed",
            ViewMode::Researching => "researching",
            ViewMode::Initial => "initial",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PlannerError::NotFound(format!("view mode {s}")))
    }
}

impl Session {
    pub fn view(&self, mode: ViewMode) -> Vec<ProjectId> {
        let by_name = self.ids_by_name().into_iter();
        match mode {
            ViewMode::All => by_name.collect(),
            ViewMode::Available => by_name.filter(|&id| !self.is_completed(id)).collect(),
            ViewMode::Completed => by_name.filter(|&id| self.is_completed(id)).collect(),
            ViewMode::Researching => self.path.clone(),
            ViewMode::Initial => self
                .initial
                .iter()
                .copied()
                .filter(|&id| self.project(id).is_some_and(|p| !p.is_completed()))
                .collect(),
        }
    }

    fn is_completed(&self, id: ProjectId) -> bool {
        self.project(id).is_some_and(|p| p.is_completed())
    }
}
