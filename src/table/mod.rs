//! Header-addressed access to irregular HTML tables.
//!
//! A [`TableLocator`] scans a `<table>` once and indexes every data cell by a
//! `(top, left)` pair of [`HeaderKey`]s. [`TableExtractor`] then reads cells by
//! logical header name so that reordered or extra columns do not break callers.

mod cell;
mod locator;

pub use cell::{
    CellExtractor, ChildTextExtractor, ClassTextExtractor, FirstTextExtractor,
    JoinAllTextExtractor, SplitTextExtractor,
};
pub use locator::{
    LabelTableLocator, LeftHeaderTableLocator, SubTitle, SubTitlePolicy, TopHeaderTableLocator,
    TopLeftHeaderTableLocator, TwoLevelTopHeaderTableLocator,
};

use crate::error::{CrawlerError, HeaderMismatchError};
use scraper::ElementRef;
use std::{collections::HashMap, fmt};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderKey {
    Text(String),
    Index(usize),
}

impl From<&str> for HeaderKey {
    fn from(text: &str) -> Self {
        HeaderKey::Text(text.to_string())
    }
}

impl From<String> for HeaderKey {
    fn from(text: String) -> Self {
        HeaderKey::Text(text)
    }
}

impl From<usize> for HeaderKey {
    fn from(index: usize) -> Self {
        HeaderKey::Index(index)
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderKey::Text(text) => write!(f, "{}", text),
            HeaderKey::Index(index) => write!(f, "{}", index),
        }
    }
}

/// `(top, left) -> cell` matrix, headers kept in document order.
#[derive(Debug, Default)]
pub struct CellIndex<'a> {
    cells: HashMap<(HeaderKey, HeaderKey), ElementRef<'a>>,
    tops: Vec<HeaderKey>,
    lefts: Vec<HeaderKey>,
}

impl<'a> CellIndex<'a> {
    pub fn new() -> Self {
        CellIndex {
            cells: HashMap::new(),
            tops: vec![],
            lefts: vec![],
        }
    }

    pub fn add_top(&mut self, top: HeaderKey) {
        if !self.tops.contains(&top) {
            self.tops.push(top);
        }
    }

    pub fn add_left(&mut self, left: HeaderKey) {
        if !self.lefts.contains(&left) {
            self.lefts.push(left);
        }
    }

    /// The first cell indexed under a pair wins.
    pub fn insert(&mut self, top: HeaderKey, left: HeaderKey, cell: ElementRef<'a>) {
        self.add_top(top.clone());
        self.add_left(left.clone());
        self.cells.entry((top, left)).or_insert(cell);
    }

    pub fn get(&self, top: &HeaderKey, left: &HeaderKey) -> Result<ElementRef<'a>, HeaderMismatchError> {
        self.cells
            .get(&(top.clone(), left.clone()))
            .copied()
            .ok_or_else(|| HeaderMismatchError {
                top: top.clone(),
                left: left.clone(),
            })
    }

    pub fn has_header(&self, top: Option<&HeaderKey>, left: Option<&HeaderKey>) -> bool {
        match (top, left) {
            (Some(top), Some(left)) => self.cells.contains_key(&(top.clone(), left.clone())),
            (Some(top), None) => self.tops.contains(top) && !self.lefts.is_empty(),
            (None, Some(left)) => self.lefts.contains(left),
            (None, None) => false,
        }
    }

    pub fn tops(&self) -> &[HeaderKey] {
        &self.tops
    }

    pub fn lefts(&self) -> &[HeaderKey] {
        &self.lefts
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

pub trait TableLocator<'a> {
    fn parse(&mut self, table: ElementRef<'a>) -> Result<(), CrawlerError>;

    fn index(&self) -> &CellIndex<'a>;
}

pub struct TableExtractor<L> {
    locator: L,
}

impl<'a, L: TableLocator<'a>> TableExtractor<L> {
    /// Runs `locator` over `table` and wraps the resulting index.
    pub fn parse(mut locator: L, table: ElementRef<'a>) -> Result<Self, CrawlerError> {
        locator.parse(table)?;
        Ok(Self::new(locator))
    }

    /// Wraps a locator that already parsed its table.
    pub fn new(locator: L) -> Self {
        TableExtractor { locator }
    }

    pub fn extract_cell(
        &self,
        top: impl Into<HeaderKey>,
        left: impl Into<HeaderKey>,
    ) -> Result<String, HeaderMismatchError> {
        self.extract_cell_with(top, left, &FirstTextExtractor::new())
    }

    pub fn extract_cell_with<E: CellExtractor>(
        &self,
        top: impl Into<HeaderKey>,
        left: impl Into<HeaderKey>,
        extractor: &E,
    ) -> Result<E::Output, HeaderMismatchError> {
        let cell = self.locator.index().get(&top.into(), &left.into())?;
        Ok(extractor.extract(cell))
    }

    pub fn has_header(&self, top: Option<HeaderKey>, left: Option<HeaderKey>) -> bool {
        self.locator.index().has_header(top.as_ref(), left.as_ref())
    }

    pub fn has_top_header(&self, top: impl Into<HeaderKey>) -> bool {
        self.has_header(Some(top.into()), None)
    }

    pub fn has_left_header(&self, left: impl Into<HeaderKey>) -> bool {
        self.has_header(None, Some(left.into()))
    }

    pub fn iter_left_headers<'s>(&'s self) -> std::slice::Iter<'s, HeaderKey>
    where
        'a: 's,
    {
        self.locator.index().lefts().iter()
    }

    pub fn iter_top_headers<'s>(&'s self) -> std::slice::Iter<'s, HeaderKey>
    where
        'a: 's,
    {
        self.locator.index().tops().iter()
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }
}
