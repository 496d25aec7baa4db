use super::token::{next_step, required_name, unexpected, Element, ParseItem, Step, TokenSource};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Document,
    List,
    Project,
    Technology,
    End,
    Done,
    Failed,
}

/// Pull parser for the initial research grammar: a flat list of project and
/// technology references. Never reports [`ParseItem::Dependency`].
pub struct InitialParser<S> {
    source: S,
    state: State,
    name: String,
}

impl<S: TokenSource> InitialParser<S> {
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
            let outcome = next_step(&mut self.source).and_then(|step| self.advance(step));
            match outcome {
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
            (State::Document, Step::Open(Element::InitialResearch, _)) => (State::List, None),
            (State::List, Step::Open(Element::ResearchProject, name)) => {
                self.name = required_name(Element::ResearchProject, name)?;
                (State::Project, Some(ParseItem::Project))
            }
            (State::List, Step::Open(Element::Technology, name)) => {
                self.name = required_name(Element::Technology, name)?;
                (State::Technology, Some(ParseItem::Technology))
            }
            (State::List, Step::Close(Element::InitialResearch)) => (State::End, None),
            (State::Project, Step::Close(Element::ResearchProject)) => (State::List, None),
            (State::Technology, Step::Close(Element::Technology)) => (State::List, None),
            (State::End, Step::Finish) => (State::Done, Some(ParseItem::Done)),
            (state, step) => return Err(unexpected(step, state)),
        };
        self.state = next;
        Ok(item)
    }
}
