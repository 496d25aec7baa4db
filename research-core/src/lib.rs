//! Core of the research planner: the project graph, change events, goals, the
//! path planner, XML ingest and snapshot persistence.
//!
//! Everything hangs off a [`Session`]:
//!
//! ```
//! use research_core::Session;
//!
//! let mut session = Session::new();
//! session
//!     .load_tree_str(
//!         r#"<ResearchTree>
//!              <ResearchProject name="Lasers"/>
//!              <ResearchProject name="Shields">
//!                <Requirements><Requires name="Lasers"/></Requirements>
//!              </ResearchProject>
//!            </ResearchTree>"#,
//!     )
//!     .unwrap();
//!
//! let shields = session.require("Shields").unwrap();
//! session.add_goals(&[shields]).unwrap();
//! let path: Vec<&str> = session.path().iter().map(|&id| session.name_of(id)).collect();
//! assert_eq!(path, ["Lasers", "Shields"]);
//! ```

pub mod error;
pub mod models;
pub mod persist;
mod session;
pub mod xml;

pub use error::{PlannerError, Result};
pub use models::{EventKind, ListChange, Project, ProjectId, ResearchEvent, Scope};
pub use persist::{AutoSave, MemoryStore, ResearchStore, Snapshot};
pub use session::{ListenerId, ResearchListener, Session, SharedListener, ViewMode};
