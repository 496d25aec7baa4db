use std::cell::RefCell;
use std::rc::Rc;

use enumset::EnumSet;
use research_core::{EventKind, PlannerError, ProjectId, ResearchEvent, Scope, Session};
use speculate2::speculate;

fn names(session: &Session, ids: &[ProjectId]) -> Vec<String> {
    ids.iter().map(|&id| session.name_of(id).to_string()).collect()
}

fn create(session: &mut Session, names: &[&str]) -> Vec<ProjectId> {
    names
        .iter()
        .map(|name| session.create_project(*name).expect("Failed to create project"))
        .collect()
}

/// B and C require A; D requires B and C.
fn diamond(session: &mut Session) -> Vec<ProjectId> {
    let ids = create(session, &["A", "B", "C", "D"]);
    session.add_dependent(ids[1], ids[0]).unwrap();
    session.add_dependent(ids[2], ids[0]).unwrap();
    session.add_dependent(ids[3], ids[1]).unwrap();
    session.add_dependent(ids[3], ids[2]).unwrap();
    ids
}

speculate! {
    before {
        let mut session = Session::new();
    }

    describe "recompute_path" {
        it "plans a linear chain prerequisite first" {
            let ids = create(&mut session, &["A", "B", "C"]);
            session.add_dependent(ids[1], ids[0]).unwrap();
            session.add_dependent(ids[2], ids[1]).unwrap();
            session.add_to_goals(ids[2], 1).unwrap();
            session.recompute_path().unwrap();

            assert_eq!(names(&session, session.path()), vec!["A", "B", "C"]);
            for (step, &id) in ids.iter().enumerate() {
                assert_eq!(session.project(id).unwrap().path_index(), step + 1);
            }
        }

        it "plans a diamond with the shared prerequisite first" {
            let ids = diamond(&mut session);
            session.add_to_goals(ids[3], 1).unwrap();
            session.recompute_path().unwrap();

            assert_eq!(session.path()[0], ids[0]);
            assert_eq!(session.path()[3], ids[3]);
            assert_eq!(session.project(ids[3]).unwrap().path_index(), 4);
            session.verify().unwrap();
        }

        it "orders independent goals as they were given" {
            let ids = diamond(&mut session);
            session.push_goal(ids[1]).unwrap();
            session.push_goal(ids[2]).unwrap();
            session.recompute_path().unwrap();

            assert_eq!(names(&session, session.path()), vec!["A", "B", "C"]);
            assert_eq!(names(&session, session.goals()), vec!["B", "C"]);
        }

        it "moves goals up to match path order" {
            let ids = diamond(&mut session);
            session.push_goal(ids[3]).unwrap();
            session.push_goal(ids[1]).unwrap();
            session.recompute_path().unwrap();

            assert_eq!(names(&session, session.goals()), vec!["B", "D"]);
            let indexes: Vec<usize> = session
                .goals()
                .iter()
                .map(|&id| session.project(id).unwrap().path_index())
                .collect();
            assert!(indexes.windows(2).all(|pair| pair[0] <= pair[1]));
        }

        it "rejects a cycle and leaves the path empty" {
            let ids = create(&mut session, &["A", "B"]);
            session.add_dependent(ids[0], ids[1]).unwrap();
            session.add_dependent(ids[1], ids[0]).unwrap();
            session.add_to_goals(ids[0], 1).unwrap();

            let result = session.recompute_path();
            assert!(matches!(result, Err(PlannerError::CycleDetected(_))));
            assert!(session.path().is_empty());
        }

        it "produces the same path when run twice" {
            let ids = diamond(&mut session);
            session.push_goal(ids[3]).unwrap();
            session.recompute_path().unwrap();
            let first = session.path().to_vec();
            session.recompute_path().unwrap();
            assert_eq!(session.path(), first.as_slice());
        }

        it "keeps completed projects in the path" {
            let ids = diamond(&mut session);
            session.set_completed(ids[0], true).unwrap();
            session.push_goal(ids[1]).unwrap();
            session.recompute_path().unwrap();
            assert_eq!(names(&session, session.path()), vec!["A", "B"]);
        }
    }

    describe "batch mode" {
        it "delivers one goals change and one path change per batch" {
            let ids = create(&mut session, &["A", "B", "C", "D", "E"]);
            let seen: Rc<RefCell<Vec<EventKind>>> = Rc::default();
            let sink = Rc::clone(&seen);
            session.subscribe(Scope::Registry, EnumSet::all(), move |_: &mut Session, event: &ResearchEvent| {
                sink.borrow_mut().push(event.kind());
                Ok(())
            });

            session.enter_batch();
            for &id in &ids {
                session.push_goal(id).unwrap();
            }
            session.recompute_path().unwrap();
            assert!(seen.borrow().is_empty());
            session.leave_batch();

            assert_eq!(*seen.borrow(), vec![EventKind::GoalsChanged, EventKind::PathChanged]);
        }

        it "delivers the lists as they are after the batch" {
            let ids = create(&mut session, &["A", "B"]);
            let lists: Rc<RefCell<Vec<Vec<ProjectId>>>> = Rc::default();
            let sink = Rc::clone(&lists);
            session.subscribe(Scope::Registry, EventKind::GoalsChanged.into(), move |_: &mut Session, event: &ResearchEvent| {
                if let ResearchEvent::GoalsChanged(change) = event {
                    assert!(change.added.is_none());
                    sink.borrow_mut().push(change.list.clone());
                }
                Ok(())
            });

            session.add_goals(&ids).unwrap();
            assert_eq!(*lists.borrow(), vec![ids.clone()]);
        }
    }

    describe "goal editing" {
        it "re-plans after moving a goal down" {
            let ids = create(&mut session, &["A", "B", "C"]);
            session.add_goals(&ids).unwrap();
            assert!(session.move_goal_down(ids[0]).unwrap());

            assert_eq!(names(&session, session.goals()), vec!["B", "A", "C"]);
            assert_eq!(names(&session, session.path()), vec!["B", "A", "C"]);
            session.verify().unwrap();
        }

        it "cannot move a goal above its own prerequisite" {
            let ids = create(&mut session, &["A", "B"]);
            session.add_dependent(ids[1], ids[0]).unwrap();
            session.add_goals(&ids).unwrap();

            assert!(session.move_goal_up(ids[1]).unwrap());
            assert_eq!(names(&session, session.goals()), vec!["A", "B"]);
        }

        it "does not re-plan when a planned project is removed" {
            let ids = diamond(&mut session);
            session.push_goal(ids[3]).unwrap();
            session.recompute_path().unwrap();
            session.remove_project(ids[3]).unwrap();

            assert!(session.goals().is_empty());
            assert_eq!(session.path().len(), 3);
            session.verify().unwrap();
        }
    }
}
