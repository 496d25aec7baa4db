//! Snapshot persistence.
//!
//! A [`Snapshot`] is the row-shaped form of a session: one [`ProjectRecord`] per
//! project plus dependency and technology rows keyed by project name. Stores
//! implement [`ResearchStore`]; [`AutoSave`] keeps one in sync with a session.

use std::cell::RefCell;
use std::rc::Rc;

use enumset::EnumSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlannerError, Result};
use crate::models::{ProjectId, ResearchEvent, Scope};
use crate::session::{ListenerId, ResearchListener, Session};

/// Mutable state of one project. Indexes are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub completed: bool,
    pub path_index: Option<usize>,
    pub goal_index: Option<usize>,
}

/// `depender` requires `dependent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub depender: String,
    pub dependent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TechnologyRecord {
    pub project: String,
    pub technology: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub projects: Vec<ProjectRecord>,
    pub dependencies: Vec<DependencyRecord>,
    pub technologies: Vec<TechnologyRecord>,
}

pub trait ResearchStore {
    /// Replaces everything stored with `snapshot`, atomically.
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;

    fn read_snapshot(&self) -> Result<Snapshot>;

    /// Overwrites the stored state of one existing project.
    fn update_project(&mut self, record: &ProjectRecord) -> Result<()>;
}

impl Session {
    pub fn record(&self, id: ProjectId) -> Option<ProjectRecord> {
        let project = self.project(id)?;
        let index = |value: usize| (value != 0).then_some(value);
        Some(ProjectRecord {
            name: project.name().to_string(),
            completed: project.is_completed(),
            path_index: index(project.path_index()),
            goal_index: index(project.goal_index()),
        })
    }

    /// Rows for every registered project, sorted by name. Technology rows are
    /// grouped by technology in declaration order.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for id in self.ids_by_name() {
            let (Some(record), Some(project)) = (self.record(id), self.project(id)) else {
                continue;
            };
            for dependent in project.dependents() {
                if self.is_registered(dependent) {
                    snapshot.dependencies.push(DependencyRecord {
                        depender: record.name.clone(),
                        dependent: self.name_of(dependent).to_string(),
                    });
                }
            }
            snapshot.projects.push(record);
        }
        snapshot.dependencies.sort();

        // Oldest declarer first, so replaying the rows rebuilds each stack.
        for (technology, declarers) in self.technology_declarers() {
            for &id in declarers.iter().filter(|&&id| self.is_registered(id)) {
                snapshot.technologies.push(TechnologyRecord {
                    project: self.name_of(id).to_string(),
                    technology: technology.to_string(),
                });
            }
        }
        snapshot
    }

    /// Replaces the registry with a snapshot, in one batch.
    ///
    /// Projects are created in path order (unplanned last) so the path can be
    /// rebuilt by appending. Completion, goals and path go through the normal
    /// operations. On failure the registry is left empty.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        self.replace_projects(|session| session.ingest_snapshot(snapshot))?;
        debug!(projects = self.len(), steps = self.path().len(), "snapshot restored");
        Ok(())
    }

    fn ingest_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        let Snapshot {
            mut projects,
            dependencies,
            technologies,
        } = snapshot;
        projects.sort_by_key(|record| (record.path_index.is_none(), record.path_index));

        let mut goals = Vec::new();
        for record in projects {
            let id = self.create_project(record.name)?;
            self.set_completed(id, record.completed)?;
            if record.path_index.is_some() {
                self.push_path(id)?;
            }
            if let Some(index) = record.goal_index {
                goals.push((index, id));
            }
        }
        goals.sort_unstable();
        for (_, id) in goals {
            self.push_goal(id)?;
        }

        for row in dependencies {
            let depender = self.stored(&row.depender)?;
            let dependent = self.stored(&row.dependent)?;
            self.add_dependent(depender, dependent)?;
        }
        for row in technologies {
            let project = self.stored(&row.project)?;
            self.add_technology(project, row.technology)?;
        }
        Ok(())
    }

    fn stored(&self, name: &str) -> Result<ProjectId> {
        self.lookup(name)
            .ok_or_else(|| PlannerError::Persist(format!("row refers to unknown project {name:?}")))
    }

    pub fn save<S: ResearchStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        store.write_snapshot(&self.snapshot())
    }

    pub fn load<S: ResearchStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        let snapshot = store.read_snapshot()?;
        self.restore(snapshot)
    }
}

/// A [`ResearchStore`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Snapshot,
    writes: usize,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later operation fail with `Persist`.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Number of successful writes of either kind.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(PlannerError::Persist("memory store is failing".into()));
        }
        Ok(())
    }
}

impl ResearchStore for MemoryStore {
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.check()?;
        self.snapshot = snapshot.clone();
        self.writes += 1;
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Snapshot> {
        self.check()?;
        Ok(self.snapshot.clone())
    }

    fn update_project(&mut self, record: &ProjectRecord) -> Result<()> {
        self.check()?;
        let row = self
            .snapshot
            .projects
            .iter_mut()
            .find(|row| row.name == record.name)
            .ok_or_else(|| PlannerError::Persist(format!("no stored row for {:?}", record.name)))?;
        *row = record.clone();
        self.writes += 1;
        Ok(())
    }
}

/// Listener that writes every change through to a store.
///
/// Completion updates one row, goal and path changes rewrite every project row,
/// and structural changes write a full snapshot.
pub struct AutoSave<S> {
    store: S,
}

impl<S: ResearchStore + 'static> AutoSave<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers on every event of `session`, returning the handle to remove it
    /// and shared access to the store.
    pub fn attach(self, session: &mut Session) -> (ListenerId, Rc<RefCell<Self>>) {
        let shared = Rc::new(RefCell::new(self));
        let id = session.add_listener(Scope::Any, EnumSet::all(), shared.clone());
        (id, shared)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ResearchStore> ResearchListener for AutoSave<S> {
    fn on_event(&mut self, session: &mut Session, event: &ResearchEvent) -> Result<()> {
        write_through(&mut self.store, session, event)
            .map_err(|err| PlannerError::Listener(format!("auto-save failed: {err}")))
    }
}

fn write_through<S: ResearchStore>(store: &mut S, session: &Session, event: &ResearchEvent) -> Result<()> {
    match event {
        ResearchEvent::CompletedChanged { project, .. } => match session.record(*project) {
            Some(record) => store.update_project(&record),
            None => Ok(()),
        },
        ResearchEvent::GoalsChanged(_) | ResearchEvent::PathChanged(_) => {
            for id in session.ids_by_name() {
                if let Some(record) = session.record(id) {
                    store.update_project(&record)?;
                }
            }
            Ok(())
        }
        _ => store.write_snapshot(&session.snapshot()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned() -> Session {
        let mut session = Session::new();
        let a = session.create_project("A").unwrap();
        let b = session.create_project("B").unwrap();
        let c = session.create_project("C").unwrap();
        session.create_project("Unplanned").unwrap();
        session.add_dependent(b, a).unwrap();
        session.add_dependent(c, b).unwrap();
        session.add_technology(b, "Lasers").unwrap();
        session.set_completed(a, true).unwrap();
        session.push_goal(c).unwrap();
        session.push_goal(b).unwrap();
        session.recompute_path().unwrap();
        session
    }

    #[test]
    fn test_snapshot_rows() {
        let snapshot = planned().snapshot();
        let names: Vec<&str> = snapshot.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "Unplanned"]);
        assert_eq!(
            snapshot.projects[1],
            ProjectRecord {
                name: "B".into(),
                completed: false,
                path_index: Some(2),
                goal_index: Some(1),
            }
        );
        assert_eq!(snapshot.projects[3].path_index, None);
        assert_eq!(
            snapshot.dependencies,
            vec![
                DependencyRecord { depender: "B".into(), dependent: "A".into() },
                DependencyRecord { depender: "C".into(), dependent: "B".into() },
            ]
        );
        assert_eq!(snapshot.technologies.len(), 1);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let session = planned();
        let mut store = MemoryStore::new();
        session.save(&mut store).unwrap();

        let mut restored = Session::new();
        restored.load(&store).unwrap();
        assert_eq!(restored.snapshot(), session.snapshot());
        restored.verify().unwrap();
        assert!(!restored.is_batching());
    }

    #[test]
    fn test_round_trip_keeps_the_latest_declarer() {
        let mut session = Session::new();
        let b = session.create_project("B").unwrap();
        let a = session.create_project("A").unwrap();
        session.add_technology(b, "Lasers").unwrap();
        session.add_technology(a, "Lasers").unwrap();
        let mut store = MemoryStore::new();
        session.save(&mut store).unwrap();

        let mut restored = Session::new();
        restored.load(&store).unwrap();
        let owner = restored.project_for_technology("Lasers").unwrap();
        assert_eq!(restored.name_of(owner), "A");

        restored.remove_project(owner).unwrap();
        let fallback = restored.project_for_technology("Lasers").unwrap();
        assert_eq!(restored.name_of(fallback), "B");
    }

    #[test]
    fn test_restore_rejects_dangling_rows() {
        let mut snapshot = planned().snapshot();
        snapshot.dependencies.push(DependencyRecord {
            depender: "A".into(),
            dependent: "Ghost".into(),
        });
        let mut session = Session::new();
        assert!(matches!(session.restore(snapshot), Err(PlannerError::Persist(_))));
        assert!(session.is_empty());
    }

    #[test]
    fn test_rejected_snapshot_leaves_callers_batch_open() {
        let mut snapshot = planned().snapshot();
        snapshot.technologies.push(TechnologyRecord {
            project: "Ghost".into(),
            technology: "Cloaking".into(),
        });
        let mut session = Session::new();
        session.enter_batch();
        assert!(session.restore(snapshot).is_err());
        assert!(session.is_batching());
        session.leave_batch();
        assert!(session.is_empty());
    }

    #[test]
    fn test_failing_store_keeps_session() {
        let session = planned();
        let mut store = MemoryStore::new();
        store.set_failing(true);
        assert!(session.save(&mut store).is_err());
        assert_eq!(session.len(), 4);
    }

    #[test]
    fn test_update_project_requires_existing_row() {
        let mut store = MemoryStore::new();
        let record = ProjectRecord {
            name: "A".into(),
            completed: true,
            path_index: None,
            goal_index: None,
        };
        assert!(matches!(store.update_project(&record), Err(PlannerError::Persist(_))));
    }

    #[test]
    fn test_auto_save_writes_through() {
        let mut session = Session::new();
        let (_, saver) = AutoSave::new(MemoryStore::new()).attach(&mut session);

        let a = session.create_project("A").unwrap();
        let b = session.create_project("B").unwrap();
        session.add_dependent(b, a).unwrap();
        assert_eq!(saver.borrow().store().snapshot(), &session.snapshot());

        let writes = saver.borrow().store().writes();
        session.set_completed(a, true).unwrap();
        assert_eq!(saver.borrow().store().writes(), writes + 1);
        assert!(saver.borrow().store().snapshot().projects[0].completed);

        session.add_goals(&[b]).unwrap();
        assert_eq!(saver.borrow().store().snapshot(), &session.snapshot());
    }

    #[test]
    fn test_auto_save_failure_surfaces_as_listener_error() {
        let mut session = Session::new();
        let (_, saver) = AutoSave::new(MemoryStore::new()).attach(&mut session);
        saver.borrow_mut().store_mut().set_failing(true);
        assert!(matches!(
            session.create_project("A"),
            Err(PlannerError::Listener(_))
        ));
        assert!(session.lookup("A").is_some());
    }
}
