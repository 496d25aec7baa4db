use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::token::Element;
use crate::error::{PlannerError, Result};
use crate::session::Session;

type XmlWriter = Writer<Vec<u8>>;

/// Serialises the session's graph in the research tree grammar.
///
/// Projects are written by name, with their requirements and technologies sorted.
/// Empty `Requirements` and `Technologies` sections are omitted.
pub fn write_tree(session: &Session) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(&mut writer, Event::Start(BytesStart::new(Element::ResearchTree.tag())))?;

    for id in session.ids_by_name() {
        let Some(project) = session.project(id) else {
            continue;
        };
        let mut requirements: Vec<&str> = project
            .dependents()
            .map(|dependent| session.name_of(dependent))
            .collect();
        requirements.sort_unstable();
        let technologies: Vec<&str> = project.technologies().collect();

        let start = BytesStart::new(Element::ResearchProject.tag())
            .with_attributes([("name", project.name())]);
        if requirements.is_empty() && technologies.is_empty() {
            emit(&mut writer, Event::Empty(start))?;
            continue;
        }
        emit(&mut writer, Event::Start(start))?;
        write_section(&mut writer, Element::Requirements, Element::Requires, &requirements)?;
        write_section(&mut writer, Element::Technologies, Element::Technology, &technologies)?;
        emit(&mut writer, Event::End(BytesEnd::new(Element::ResearchProject.tag())))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new(Element::ResearchTree.tag())))?;
    String::from_utf8(writer.into_inner()).map_err(write_error)
}

fn write_section(writer: &mut XmlWriter, section: Element, entry: Element, names: &[&str]) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    emit(writer, Event::Start(BytesStart::new(section.tag())))?;
    for name in names {
        let item = BytesStart::new(entry.tag()).with_attributes([("name", *name)]);
        emit(writer, Event::Empty(item))?;
    }
    emit(writer, Event::End(BytesEnd::new(section.tag())))
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(write_error)
}

fn write_error(err: impl Display) -> PlannerError {
    PlannerError::Parse(format!("writing research tree: {err}"))
}
