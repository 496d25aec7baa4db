//! Research planner operations over a persistent database.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use research_core::{PlannerError, ProjectId, Session, ViewMode};

use crate::db::Database;

/// A [`Session`] restored from, and saved back to, a [`Database`].
///
/// Every mutating method saves a full snapshot before returning, even when the
/// operation itself failed part way.
pub struct Planner {
    session: Session,
    db: Database,
}

impl Planner {
    pub fn open(db: Database) -> Result<Self> {
        db.migrate()?;
        let mut session = Session::new();
        session
            .load(&db)
            .context("Failed to restore research state from the database")?;
        tracing::debug!(projects = session.len(), "planner opened");
        Ok(Self { session, db })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn close(self) -> Result<()> {
        self.db.close()
    }

    pub fn load_tree(&mut self, tree: &Path) -> Result<()> {
        let file = File::open(tree)
            .with_context(|| format!("Failed to open research tree {}", tree.display()))?;
        let loaded = self.session.load_tree_reader(BufReader::new(file));
        self.save()?;
        loaded.with_context(|| format!("Failed to load research tree {}", tree.display()))
    }

    /// Not persisted; callers reload it each run.
    pub fn load_initial_research(&mut self, path: &Path) -> Result<usize> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open initial research {}", path.display()))?;
        self.session
            .load_initial_research_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load initial research {}", path.display()))
    }

    pub fn view(&self, mode: ViewMode) -> Vec<ProjectId> {
        self.session.view(mode)
    }

    pub fn require(&self, name: &str) -> Result<ProjectId> {
        Ok(self.session.require(name)?)
    }

    /// Returns how many projects changed.
    pub fn complete(&mut self, name: &str, recursive: bool) -> Result<usize> {
        let id = self.require(name)?;
        let changed = if recursive {
            self.session.complete_with_dependents(id)
        } else {
            self.session.set_completed(id, true).map(usize::from)
        };
        self.saved(changed)
    }

    pub fn uncomplete(&mut self, name: &str) -> Result<bool> {
        let id = self.require(name)?;
        let changed = self.session.set_completed(id, false);
        self.saved(changed)
    }

    pub fn add_goal(&mut self, name: &str) -> Result<bool> {
        let id = self.require(name)?;
        let added = self.session.add_goals(&[id]).map(|count| count > 0);
        self.saved(added)
    }

    pub fn remove_goal(&mut self, name: &str) -> Result<bool> {
        let id = self.require(name)?;
        let removed = self.session.remove_goals(&[id]).map(|count| count > 0);
        self.saved(removed)
    }

    pub fn move_goal_up(&mut self, name: &str) -> Result<bool> {
        let id = self.require(name)?;
        let moved = self.session.move_goal_up(id);
        self.saved(moved)
    }

    pub fn move_goal_down(&mut self, name: &str) -> Result<bool> {
        let id = self.require(name)?;
        let moved = self.session.move_goal_down(id);
        self.saved(moved)
    }

    pub fn plan(&mut self) -> Result<()> {
        let planned = self.session.recompute_path();
        self.saved(planned)
    }

    pub fn export_xml(&self) -> Result<String> {
        Ok(research_core::xml::write_tree(&self.session)?)
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.session.snapshot()).context("Failed to serialize snapshot")
    }

    fn save(&mut self) -> Result<()> {
        self.session
            .save(&mut self.db)
            .context("Failed to save research state")
    }

    fn saved<T>(&mut self, result: research_core::Result<T>) -> Result<T> {
        self.save()?;
        result.map_err(|err| match err {
            PlannerError::CycleDetected(_) => {
                anyhow::Error::new(err).context("Research tree has a cycle; the path was cleared")
            }
            other => other.into(),
        })
    }
}
