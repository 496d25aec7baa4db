use std::collections::VecDeque;

use research_core::xml::{write_tree, ParseItem, Token, TreeParser};
use enumset::EnumSet;
use research_core::{PlannerError, ResearchEvent, Scope, Session, ViewMode};
use speculate2::speculate;

const TREE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- excerpt of a research tree -->
<ResearchTree>
  <ResearchProject name="Xenobiology">
    <Technologies>
      <Technology name="Hydroponics"/>
    </Technologies>
  </ResearchProject>
  <ResearchProject name="Gravity Control">
    <Requirements>
      <Requires name="Xenobiology"/>
      <Requires name="Superconductivity"/>
    </Requirements>
    <Technologies>
      <Technology name="Gravity Drive"/>
      <Technology name="Orbital Dock"/>
    </Technologies>
  </ResearchProject>
  <ResearchProject name="Superconductivity"/>
</ResearchTree>
"#;

fn start(name: &str, name_attr: Option<&str>) -> Token {
    Token::StartTag {
        name: name.into(),
        name_attr: name_attr.map(String::from),
        is_empty: false,
    }
}

fn end(name: &str) -> Token {
    Token::EndTag { name: name.into() }
}

speculate! {
    before {
        let mut session = Session::new();
    }

    describe "load_tree" {
        it "builds the graph from the document" {
            session.load_tree_str(TREE).expect("Failed to load tree");

            assert_eq!(session.len(), 3);
            let gravity = session.require("Gravity Control").unwrap();
            let project = session.project(gravity).unwrap();
            assert_eq!(project.dependents().count(), 2);
            assert!(project.has_technology("Orbital Dock"));
            assert_eq!(session.project_for_technology("Gravity Drive"), Some(gravity));
            session.verify().unwrap();
        }

        it "accepts element names in any case" {
            let xml = r#"<researchtree><RESEARCHPROJECT name="A"/></researchtree>"#;
            session.load_tree_str(xml).unwrap();
            assert!(session.lookup("A").is_some());
        }

        it "clears the registry when a section is left open" {
            session.load_tree_str(TREE).unwrap();
            let broken = r#"<ResearchTree>
                              <ResearchProject name="A">
                                <Requirements>
                                  <Requires name="B"/>
                              </ResearchProject>
                            </ResearchTree>"#;

            let result = session.load_tree_str(broken);
            assert!(matches!(result, Err(PlannerError::Parse(_))));
            assert!(session.is_empty());
        }

        it "leaves an enclosing batch open when the tree is rejected" {
            session.load_tree_str(TREE).unwrap();
            let removed: std::rc::Rc<std::cell::RefCell<Vec<String>>> = Default::default();
            let sink = std::rc::Rc::clone(&removed);
            session.subscribe(Scope::Registry, EnumSet::all(), move |_: &mut Session, event: &ResearchEvent| {
                match event {
                    ResearchEvent::ProjectRemoved { name, .. } => sink.borrow_mut().push(name.clone()),
                    ResearchEvent::ProjectAdded(_) => sink.borrow_mut().push("added".into()),
                    _ => {}
                }
                Ok(())
            });

            session.enter_batch();
            let rejected = r#"<ResearchTree><ResearchProject name="Fresh"/><Bogus/></ResearchTree>"#;
            assert!(matches!(session.load_tree_str(rejected), Err(PlannerError::Parse(_))));
            assert!(session.is_batching());
            assert!(removed.borrow().is_empty());
            session.leave_batch();

            let mut names = removed.borrow().clone();
            names.sort();
            assert_eq!(names, vec!["Gravity Control", "Superconductivity", "Xenobiology"]);
            assert!(session.is_empty());
        }

        it "rejects unknown elements" {
            let xml = r#"<ResearchTree><ResearchProject name="A"><Cost value="3"/></ResearchProject></ResearchTree>"#;
            assert!(matches!(session.load_tree_str(xml), Err(PlannerError::Parse(_))));
        }

        it "rejects malformed XML" {
            assert!(matches!(
                session.load_tree_str("<ResearchTree><ResearchProject name=\"A></ResearchTree>"),
                Err(PlannerError::Parse(_))
            ));
        }

        it "reads from any token source" {
            let tokens = VecDeque::from(vec![
                Token::StartDocument,
                start("ResearchTree", None),
                Token::Text("ignored".into()),
                start("ResearchProject", Some("A")),
                end("ResearchProject"),
                end("ResearchTree"),
                Token::EndDocument,
            ]);
            session.load_tree(tokens).unwrap();
            assert_eq!(session.len(), 1);
        }
    }

    describe "TreeParser" {
        it "reports the triggering name attribute" {
            let tokens = VecDeque::from(vec![
                Token::StartDocument,
                start("ResearchTree", None),
                start("ResearchProject", Some("A")),
                start("Requirements", None),
                start("Requires", Some("B")),
                end("Requires"),
                end("Requirements"),
                end("ResearchProject"),
                end("ResearchTree"),
            ]);
            let mut parser = ::research_core::xml::TreeParser::new(tokens);
            assert_eq!(parser.next().unwrap(), ParseItem::Project);
            assert_eq!(parser.name(), "A");
            assert_eq!(parser.next().unwrap(), ParseItem::Dependency);
            assert_eq!(parser.name(), "B");
            assert_eq!(parser.next().unwrap(), ParseItem::Done);
        }
    }

    describe "initial research" {
        before {
            session.load_tree_str(TREE).unwrap();
        }

        it "resolves projects and technologies in file order" {
            let xml = r#"<InitialResearch>
                           <Technology name="Gravity Drive"/>
                           <ResearchProject name="Xenobiology"/>
                           <Technology name="Warp Drive"/>
                         </InitialResearch>"#;
            assert_eq!(session.load_initial_research_str(xml).unwrap(), 2);
            let names: Vec<&str> = session
                .view(ViewMode::Initial)
                .into_iter()
                .map(|id| session.name_of(id))
                .collect();
            assert_eq!(names, vec!["Gravity Control", "Xenobiology"]);
        }

        it "leaves the registry alone" {
            session
                .load_initial_research_str("<InitialResearch/>")
                .unwrap();
            assert_eq!(session.len(), 3);
            assert!(session.initial_research().is_empty());
        }
    }

    describe "write_tree" {
        it "round-trips through the parser" {
            session.load_tree_str(TREE).unwrap();
            let exported = write_tree(&session).unwrap();

            let mut reparsed = Session::new();
            reparsed.load_tree_str(&exported).unwrap();
            assert_eq!(reparsed.snapshot(), session.snapshot());
        }
    }
}
