use enumset::EnumSetType;

use super::ProjectId;

/// Discriminant of a [`ResearchEvent`], used to filter subscriptions.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum EventKind {
    ProjectAdded,
    ProjectRemoved,
    PathChanged,
    GoalsChanged,
    CompletedChanged,
    DependentAdded,
    DependentRemoved,
    DependerAdded,
    DependerRemoved,
    TechnologyAdded,
    TechnologyRemoved,
}

/// Where a listener is registered, and where an event is addressed.
///
/// Events are always addressed to `Registry` or to a single `Project`. `Any` is only
/// meaningful for registrations and receives everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Registry,
    Project(ProjectId),
    Any,
}

impl Scope {
    pub fn receives(self, destination: Scope) -> bool {
        self == Scope::Any || self == destination
    }
}

/// Payload of the goals and path list events.
///
/// `list` is the full list at delivery time. Inside a batch the per-item fields are
/// dropped so that any number of edits to one list collapse into a single delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChange {
    pub list: Vec<ProjectId>,
    pub added: Option<ProjectId>,
    pub removed: Option<ProjectId>,
}

impl ListChange {
    pub fn added(project: ProjectId) -> Self {
        Self {
            added: Some(project),
            ..Self::default()
        }
    }

    pub fn removed(project: ProjectId) -> Self {
        Self {
            removed: Some(project),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchEvent {
    ProjectAdded(ProjectId),
    /// Fired before the project is torn down, so listeners running synchronously can
    /// still look it up by id.
    ProjectRemoved { project: ProjectId, name: String },
    PathChanged(ListChange),
    GoalsChanged(ListChange),
    CompletedChanged { project: ProjectId, completed: bool },
    DependentAdded { project: ProjectId, dependent: ProjectId },
    DependentRemoved { project: ProjectId, dependent: ProjectId },
    DependerAdded { project: ProjectId, depender: ProjectId },
    DependerRemoved { project: ProjectId, depender: ProjectId },
    TechnologyAdded { project: ProjectId, technology: String },
    TechnologyRemoved { project: ProjectId, technology: String },
}

impl ResearchEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ResearchEvent::ProjectAdded(_) => EventKind::ProjectAdded,
            ResearchEvent::ProjectRemoved { .. } => EventKind::ProjectRemoved,
            ResearchEvent::PathChanged(_) => EventKind::PathChanged,
            ResearchEvent::GoalsChanged(_) => EventKind::GoalsChanged,
            ResearchEvent::CompletedChanged { .. } => EventKind::CompletedChanged,
            ResearchEvent::DependentAdded { .. } => EventKind::DependentAdded,
            ResearchEvent::DependentRemoved { .. } => EventKind::DependentRemoved,
            ResearchEvent::DependerAdded { .. } => EventKind::DependerAdded,
            ResearchEvent::DependerRemoved { .. } => EventKind::DependerRemoved,
            ResearchEvent::TechnologyAdded { .. } => EventKind::TechnologyAdded,
            ResearchEvent::TechnologyRemoved { .. } => EventKind::TechnologyRemoved,
        }
    }

    pub fn destination(&self) -> Scope {
        match self {
            ResearchEvent::ProjectAdded(_)
            | ResearchEvent::ProjectRemoved { .. }
            | ResearchEvent::PathChanged(_)
            | ResearchEvent::GoalsChanged(_) => Scope::Registry,
            ResearchEvent::CompletedChanged { project, .. }
            | ResearchEvent::DependentAdded { project, .. }
            | ResearchEvent::DependentRemoved { project, .. }
            | ResearchEvent::DependerAdded { project, .. }
            | ResearchEvent::DependerRemoved { project, .. }
            | ResearchEvent::TechnologyAdded { project, .. }
            | ResearchEvent::TechnologyRemoved { project, .. } => Scope::Project(*project),
        }
    }

    /// The form recorded in a batch queue.
    pub(crate) fn coalesced(self) -> Self {
        match self {
            ResearchEvent::PathChanged(_) => ResearchEvent::PathChanged(ListChange::default()),
            ResearchEvent::GoalsChanged(_) => ResearchEvent::GoalsChanged(ListChange::default()),
            other => other,
        }
    }
}
