//! Domain models for the research planner.
//!
//! # Core Concepts
//!
//! - [`Project`]: A research node identified by its unique name. It produces a set of
//!   technologies and lists its prerequisites (*dependents*) and the projects that
//!   require it (*dependers*).
//! - [`ProjectId`]: Stable handle for a project inside one [`Session`](crate::Session).
//! - [`ResearchEvent`]: A single observable change. Listeners subscribe by [`Scope`]
//!   and a set of [`EventKind`]s.

mod event;
mod project;

pub use event::*;
pub use project::*;
