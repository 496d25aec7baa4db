//! Research tree and initial research XML.
//!
//! Both documents are read through a [`TokenSource`]; [`XmlTokens`] adapts any
//! `BufRead`. Element names are matched case-insensitively and unknown elements
//! are rejected.

mod initial;
mod token;
mod tree;
mod writer;

use std::io::BufRead;

use tracing::{debug, info};

use crate::error::{PlannerError, Result};
use crate::models::ProjectId;
use crate::session::Session;

pub use initial::InitialParser;
pub use token::{ParseItem, Token, TokenSource, XmlTokens};
pub use tree::TreeParser;
pub use writer::write_tree;

impl Session {
    /// Replaces the registry with the projects of a research tree.
    ///
    /// Runs in one batch. On failure the registry is left empty, the events of
    /// the rejected tree are dropped and the parse error returned.
    pub fn load_tree<S: TokenSource>(&mut self, source: S) -> Result<()> {
        self.replace_projects(|session| session.ingest_tree(TreeParser::new(source)))?;
        info!(projects = self.len(), "research tree loaded");
        Ok(())
    }

    pub fn load_tree_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        self.load_tree(XmlTokens::new(reader))
    }

    pub fn load_tree_str(&mut self, xml: &str) -> Result<()> {
        self.load_tree_reader(xml.as_bytes())
    }

    fn ingest_tree<S: TokenSource>(&mut self, mut parser: TreeParser<S>) -> Result<()> {
        let mut current: Option<ProjectId> = None;
        loop {
            let item = parser.next()?;
            if item == ParseItem::Done {
                return Ok(());
            }
            if item == ParseItem::Project {
                current = Some(self.project_or_create(parser.name())?);
                continue;
            }
            let project = current.ok_or_else(|| {
                PlannerError::Parse(format!("{:?} {} outside of a project", item, parser.name()))
            })?;
            match item {
                ParseItem::Dependency => {
                    let dependent = self.project_or_create(parser.name())?;
                    self.add_dependent(project, dependent)?;
                }
                ParseItem::Technology => {
                    self.add_technology(project, parser.name())?;
                }
                ParseItem::Done | ParseItem::Project => {}
            }
        }
    }

    /// Rebuilds the initial research list, resolving each entry by project name
    /// or technology. Unresolved and repeated entries are skipped. On a parse
    /// error the previous list is kept.
    ///
    /// Returns the length of the new list.
    pub fn load_initial_research<S: TokenSource>(&mut self, source: S) -> Result<usize> {
        let mut parser = InitialParser::new(source);
        let mut list = Vec::new();
        loop {
            let resolved = match parser.next()? {
                ParseItem::Done => break,
                ParseItem::Project => self.lookup(parser.name()),
                ParseItem::Technology => self.project_for_technology(parser.name()),
                ParseItem::Dependency => None,
            };
            match resolved {
                Some(id) if !list.contains(&id) => list.push(id),
                Some(_) => {}
                None => debug!(name = parser.name(), "initial research entry does not resolve"),
            }
        }
        let count = list.len();
        self.set_initial_research(list);
        info!(entries = count, "initial research loaded");
        Ok(count)
    }

    pub fn load_initial_research_reader<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        self.load_initial_research(XmlTokens::new(reader))
    }

    pub fn load_initial_research_str(&mut self, xml: &str) -> Result<usize> {
        self.load_initial_research_reader(xml.as_bytes())
    }
}
