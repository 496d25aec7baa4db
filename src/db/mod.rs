mod schema;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OptionalExtension};

use research_core::persist::{DependencyRecord, ProjectRecord, TechnologyRecord};
use research_core::{PlannerError, ResearchStore, Snapshot};

/// SQLite-backed [`ResearchStore`].
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open research database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::debug!(path = %path.display(), "research database opened");
        Ok(Self { conn })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "research-planner")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("research.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        schema::run_migrations(&self.conn)
    }

    /// Closes the connection, reporting any failure. Dropping also closes it.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .context("Failed to close research database")
    }

    pub fn path(&self) -> Option<&Path> {
        self.conn.path().map(Path::new).filter(|path| !path.as_os_str().is_empty())
    }

    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM research", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    pub fn get_project(&self, name: &str) -> Result<Option<ProjectRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT project, is_complete, path_index, goal_index FROM research WHERE project = ?",
                [name],
                project_row,
            )
            .optional()?;
        Ok(record)
    }

    fn read(&self) -> Result<Snapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT project, is_complete, path_index, goal_index FROM research
             ORDER BY path_index IS NULL, path_index, project",
        )?;
        let projects = stmt
            .query_map([], project_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT depender, dependent FROM research_dependencies ORDER BY rowid")?;
        let dependencies = stmt
            .query_map([], |row| {
                Ok(DependencyRecord {
                    depender: row.get(0)?,
                    dependent: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT project, technology FROM research_technologies ORDER BY rowid")?;
        let technologies = stmt
            .query_map([], |row| {
                Ok(TechnologyRecord {
                    project: row.get(0)?,
                    technology: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot {
            projects,
            dependencies,
            technologies,
        })
    }

    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM research_technologies;
             DELETE FROM research_dependencies;
             DELETE FROM research;",
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO research (project, is_complete, path_index, goal_index) VALUES (?, ?, ?, ?)",
            )?;
            for record in &snapshot.projects {
                insert.execute((
                    &record.name,
                    record.completed,
                    to_sql_index(record.path_index)?,
                    to_sql_index(record.goal_index)?,
                ))?;
            }

            let mut insert =
                tx.prepare("INSERT INTO research_dependencies (depender, dependent) VALUES (?, ?)")?;
            for row in &snapshot.dependencies {
                insert.execute((&row.depender, &row.dependent))?;
            }

            let mut insert =
                tx.prepare("INSERT INTO research_technologies (project, technology) VALUES (?, ?)")?;
            for row in &snapshot.technologies {
                insert.execute((&row.project, &row.technology))?;
            }
        }
        tx.commit().context("Failed to commit research snapshot")?;
        tracing::debug!(projects = snapshot.projects.len(), "research snapshot written");
        Ok(())
    }

    fn update(&self, record: &ProjectRecord) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE research SET is_complete = ?, path_index = ?, goal_index = ? WHERE project = ?",
            (
                record.completed,
                to_sql_index(record.path_index)?,
                to_sql_index(record.goal_index)?,
                &record.name,
            ),
        )?;
        if changed == 0 {
            bail!("No stored research project named {:?}", record.name);
        }
        Ok(())
    }
}

impl ResearchStore for Database {
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> research_core::Result<()> {
        self.write(snapshot).map_err(persist_error)
    }

    fn read_snapshot(&self) -> research_core::Result<Snapshot> {
        self.read().map_err(persist_error)
    }

    fn update_project(&mut self, record: &ProjectRecord) -> research_core::Result<()> {
        self.update(record).map_err(persist_error)
    }
}

fn persist_error(err: anyhow::Error) -> PlannerError {
    PlannerError::Persist(format!("{err:#}"))
}

fn project_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        name: row.get(0)?,
        completed: row.get(1)?,
        path_index: from_sql_index(row.get(2)?),
        goal_index: from_sql_index(row.get(3)?),
    })
}

fn to_sql_index(index: Option<usize>) -> Result<Option<i64>> {
    index
        .map(|value| i64::try_from(value).context("List index does not fit in SQLite"))
        .transpose()
}

/// Non-positive indexes are treated as "not a member".
fn from_sql_index(value: Option<i64>) -> Option<usize> {
    value
        .and_then(|value| usize::try_from(value).ok())
        .filter(|&value| value > 0)
}
