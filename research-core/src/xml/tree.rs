use super::token::{next_step, required_name, unexpected, Element, ParseItem, Step, TokenSource};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Document,
    Tree,
    Project,
    Requirements,
    Requires,
    Technologies,
    Technology,
    End,
    Done,
    Failed,
}

/// Pull parser for the research tree grammar.
///
/// Each call to [`next`](Self::next) reports one project, requirement or
/// technology; [`name`](Self::name) then holds its `name` attribute. A project's
/// requirements and technologies follow it. Once an error is returned every later
/// call fails too.
pub struct TreeParser<S> {
    source: S,
    state: State,
    name: String,
}

impl<S: TokenSource> TreeParser<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: State::Start,
            name: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next(&mut self) -> Result<ParseItem> {
        loop {
            match self.state {
                State::Done => return Ok(ParseItem::Done),
                State::Failed => return Err(unexpected("read after a parse error", self.state)),
                _ => {}
            }
            let step = match next_step(&mut self.source) {
                Ok(step) => step,
                Err(err) => {
                    self.state = State::Failed;
                    return Err(err);
                }
            };
            match self.advance(step) {
                Ok(Some(item)) => return Ok(item),
                Ok(None) => {}
                Err(err) => {
                    self.state = State::Failed;
                    return Err(err);
                }
            }
        }
    }

    fn advance(&mut self, step: Step) -> Result<Option<ParseItem>> {
        let (next, item) = match (self.state, step) {
            (State::Start, Step::Begin) => (State::Document, None),
            (State::Document, Step::Open(Element::ResearchTree, _)) => (State::Tree, None),
            (State::Tree, Step::Open(Element::ResearchProject, name)) => {
                self.name = required_name(Element::ResearchProject, name)?;
                (State::Project, Some(ParseItem::Project))
            }
            (State::Tree, Step::Close(Element::ResearchTree)) => (State::End, None),
            (State::Project, Step::Open(Element::Requirements, _)) => (State::Requirements, None),
            (State::Project, Step::Open(Element::Technologies, _)) => (State::Technologies, None),
            (State::Project, Step::Close(Element::ResearchProject)) => (State::Tree, None),
            (State::Requirements, Step::Open(Element::Requires, name)) => {
                self.name = required_name(Element::Requires, name)?;
                (State::Requires, Some(ParseItem::Dependency))
            }
            (State::Requirements, Step::Close(Element::Requirements)) => (State::Project, None),
            (State::Requires, Step::Close(Element::Requires)) => (State::Requirements, None),
            (State::Technologies, Step::Open(Element::Technology, name)) => {
                self.name = required_name(Element::Technology, name)?;
                (State::Technology, Some(ParseItem::Technology))
            }
            (State::Technologies, Step::Close(Element::Technologies)) => (State::Project, None),
            (State::Technology, Step::Close(Element::Technology)) => (State::Technologies, None),
            (State::End, Step::Finish) => (State::Done, Some(ParseItem::Done)),
            (state, step) => return Err(unexpected(step, state)),
        };
        self.state = next;
        Ok(item)
    }
}
