//! Plain-text rendering of research state for the CLI.

use std::collections::BTreeSet;

use research_core::{Project, ProjectId, Session};

const COMPLETED: char = '●';
const PLANNED: char = '○';
const AVAILABLE: char = '◇';

fn status_symbol(project: &Project) -> char {
    if project.is_completed() {
        COMPLETED
    } else if project.is_in_path() {
        PLANNED
    } else {
        AVAILABLE
    }
}

/// Render the prerequisites of a project as an ASCII tree.
///
/// Example output:
/// ```text
/// Shields
/// ├── ● Lasers
/// └── ○ Power
///     └── ◇ Fusion
/// ```
/// A prerequisite that leads back to one of its ancestors is marked
/// `(cycle)`, and one already expanded elsewhere in the tree is marked
/// `(see above)`. Neither is expanded again.
pub fn render_requirements(session: &Session, root: ProjectId) -> String {
    let mut output = String::new();
    let Some(project) = session.project(root) else {
        return output;
    };
    output.push_str(project.name());
    output.push('\n');

    let mut ancestors = BTreeSet::from([root]);
    let mut expanded = BTreeSet::from([root]);
    render_children(&mut output, session, project, "", &mut ancestors, &mut expanded);
    output
}

fn render_children(
    output: &mut String,
    session: &Session,
    project: &Project,
    prefix: &str,
    ancestors: &mut BTreeSet<ProjectId>,
    expanded: &mut BTreeSet<ProjectId>,
) {
    let mut children: Vec<(ProjectId, &Project)> = project
        .dependents()
        .filter_map(|id| session.project(id).map(|child| (id, child)))
        .collect();
    children.sort_by(|a, b| a.1.name().cmp(b.1.name()));

    for (i, (id, child)) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(status_symbol(child));
        output.push(' ');
        output.push_str(child.name());

        if ancestors.contains(id) {
            output.push_str(" (cycle)\n");
            continue;
        }
        if !expanded.insert(*id) {
            let note = if child.dependents().next().is_some() { " (see above)" } else { "" };
            output.push_str(note);
            output.push('\n');
            continue;
        }
        ancestors.insert(*id);
        output.push('\n');

        let continuation = if is_last { "    " } else { "│   " };
        let child_prefix = format!("{}{}", prefix, continuation);
        render_children(output, session, child, &child_prefix, ancestors, expanded);
        ancestors.remove(id);
    }
}

/// Numbered research path, one step per line.
pub fn render_path(session: &Session) -> String {
    if session.path().is_empty() {
        return "No research path. Add goals and run `rplan plan`.\n".to_string();
    }
    let mut output = String::new();
    for (step, &id) in session.path().iter().enumerate() {
        let Some(project) = session.project(id) else {
            continue;
        };
        let goal = if project.is_goal() { "  (goal)" } else { "" };
        output.push_str(&format!(
            "{:>3}. {} {}{}\n",
            step + 1,
            status_symbol(project),
            project.name(),
            goal
        ));
    }
    output
}

pub fn render_goals(session: &Session) -> String {
    if session.goals().is_empty() {
        return "No goals.\n".to_string();
    }
    let mut output = String::new();
    for &id in session.goals() {
        let Some(project) = session.project(id) else {
            continue;
        };
        let step = match project.path_index() {
            0 => "not planned".to_string(),
            index => format!("step {index}"),
        };
        output.push_str(&format!(
            "{:>3}. {} {} ({})\n",
            project.goal_index(),
            status_symbol(project),
            project.name(),
            step
        ));
    }
    output
}

/// One line per project with its technologies.
pub fn render_projects(session: &Session, ids: &[ProjectId]) -> String {
    let mut output = String::new();
    for &id in ids {
        let Some(project) = session.project(id) else {
            continue;
        };
        output.push(status_symbol(project));
        output.push(' ');
        output.push_str(project.name());
        let technologies: Vec<&str> = project.technologies().collect();
        if !technologies.is_empty() {
            output.push_str(&format!("  [{}]", technologies.join(", ")));
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Session, [ProjectId; 4]) {
        let mut session = Session::new();
        let shields = session.create_project("Shields").unwrap();
        let lasers = session.create_project("Lasers").unwrap();
        let power = session.create_project("Power").unwrap();
        let fusion = session.create_project("Fusion").unwrap();
        session.add_dependent(shields, lasers).unwrap();
        session.add_dependent(shields, power).unwrap();
        session.add_dependent(power, fusion).unwrap();
        (session, [shields, lasers, power, fusion])
    }

    #[test]
    fn test_single_root() {
        let (session, [_, lasers, _, _]) = session();
        assert_eq!(render_requirements(&session, lasers), "Lasers\n");
    }

    #[test]
    fn test_nested_requirements() {
        let (mut session, [shields, lasers, power, _]) = session();
        session.set_completed(lasers, true).unwrap();
        session.push_path(power).unwrap();

        let expected = "Shields\n├── ● Lasers\n└── ○ Power\n    └── ◇ Fusion\n";
        assert_eq!(render_requirements(&session, shields), expected);
    }

    #[test]
    fn test_cycle_is_marked() {
        let (mut session, [shields, _, _, fusion]) = session();
        session.add_dependent(fusion, shields).unwrap();
        let output = render_requirements(&session, shields);
        assert!(output.ends_with("        └── ◇ Shields (cycle)\n"));
    }

    #[test]
    fn test_shared_prerequisite_is_expanded_once() {
        let (mut session, [shields, lasers, _, fusion]) = session();
        session.add_dependent(lasers, fusion).unwrap();
        assert_eq!(
            render_requirements(&session, shields),
            "Shields\n├── ◇ Lasers\n│   └── ◇ Fusion\n└── ◇ Power\n    └── ◇ Fusion\n"
        );

        let reactor = session.create_project("Reactor").unwrap();
        session.add_dependent(fusion, reactor).unwrap();
        assert_eq!(
            render_requirements(&session, shields),
            "Shields\n├── ◇ Lasers\n│   └── ◇ Fusion\n│       └── ◇ Reactor\n└── ◇ Power\n    └── ◇ Fusion (see above)\n"
        );
    }

    #[test]
    fn test_stacked_diamonds_stay_linear() {
        let mut session = Session::new();
        let mut top = session.create_project("Base").unwrap();
        for level in 0..30 {
            let left = session.create_project(format!("L{level}")).unwrap();
            let right = session.create_project(format!("R{level}")).unwrap();
            let join = session.create_project(format!("J{level}")).unwrap();
            session.add_dependent(left, top).unwrap();
            session.add_dependent(right, top).unwrap();
            session.add_dependent(join, left).unwrap();
            session.add_dependent(join, right).unwrap();
            top = join;
        }
        let output = render_requirements(&session, top);
        assert_eq!(output.lines().count(), 2 + 30 * 3);
    }

    #[test]
    fn test_path_and_goals() {
        let (mut session, [shields, ..]) = session();
        assert!(render_path(&session).starts_with("No research path"));

        session.add_goals(&[shields]).unwrap();
        assert_eq!(
            render_path(&session),
            "  1. ○ Lasers\n  2. ○ Fusion\n  3. ○ Power\n  4. ○ Shields  (goal)\n"
        );
        assert_eq!(render_goals(&session), "  1. ○ Shields (step 4)\n");
    }

    #[test]
    fn test_project_lines() {
        let (mut session, [shields, lasers, ..]) = session();
        session.add_technology(shields, "Shield").unwrap();
        assert_eq!(
            render_projects(&session, &[lasers, shields]),
            "◇ Lasers\n◇ Shields  [Shield]\n"
        );
    }
}
