// Paged, newest-first cursor over changeset history.
//
// Each page ends strictly before the oldest changeset of the previous one,
// so consecutive pages never overlap.

use tracing::debug;

use tfvc_common::types::{Changeset, HistoryQuery, VersionSpec};
use tfvc_common::VcError;

use crate::dispatch::Dispatcher;

/// Changesets requested per server call.
pub const PAGE_SIZE: i32 = 256;

/// Anything that answers one history page.
pub trait HistorySource {
    fn query_history(&self, query: &HistoryQuery) -> Result<Vec<Changeset>, VcError>;
}

impl HistorySource for Dispatcher {
    fn query_history(&self, query: &HistoryQuery) -> Result<Vec<Changeset>, VcError> {
        Dispatcher::query_history(self, query)
    }
}

#[derive(Debug, Clone, Copy)]
struct LastPage {
    requested: i32,
    returned: usize,
    oldest: Option<i32>,
}

impl LastPage {
    fn ends_history(&self) -> bool {
        match self.oldest {
            None => true,
            Some(id) => id <= 1 || (self.returned as i32) < self.requested,
        }
    }
}

pub struct HistoryIterator<'a, S: HistorySource + ?Sized> {
    source: &'a S,
    query: HistoryQuery,
    remaining: i32,
    page: std::vec::IntoIter<Changeset>,
    last_page: Option<LastPage>,
    fetches: usize,
    exhausted: bool,
}

impl<'a, S: HistorySource + ?Sized> HistoryIterator<'a, S> {
    /// `query.max_count` is the total number of changesets to yield.
    pub fn new(source: &'a S, query: HistoryQuery) -> Result<Self, VcError> {
        if query.max_count <= 0 {
            return Err(VcError::usage("history max count must be greater than zero"));
        }
        let remaining = query.max_count;
        Ok(Self {
            source,
            query,
            remaining,
            page: Vec::new().into_iter(),
            last_page: None,
            fetches: 0,
            exhausted: false,
        })
    }

    /// Pages fetched so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    fn should_fetch(&self) -> bool {
        if self.remaining <= 0 {
            return false;
        }
        !self.last_page.is_some_and(|page| page.ends_history())
    }

    fn fetch(&mut self) -> Result<(), VcError> {
        let requested = self.remaining.min(PAGE_SIZE);
        let mut query = self.query.clone();
        query.max_count = requested;
        if let Some(oldest) = self.last_page.and_then(|page| page.oldest) {
            query.version_to = Some(VersionSpec::Changeset { id: oldest - 1 });
        }

        let mut changesets = self.source.query_history(&query)?;
        self.fetches += 1;
        if self.query.include_files {
            for changeset in &mut changesets {
                changeset.sort_changes();
            }
        }
        debug!(
            requested,
            returned = changesets.len(),
            fetches = self.fetches,
            "history page fetched"
        );

        self.remaining -= changesets.len() as i32;
        self.last_page = Some(LastPage {
            requested,
            returned: changesets.len(),
            oldest: changesets.last().map(|c| c.id),
        });
        self.page = changesets.into_iter();
        Ok(())
    }
}

impl<S: HistorySource + ?Sized> Iterator for HistoryIterator<'_, S> {
    type Item = Result<Changeset, VcError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return None;
            }
            if let Some(changeset) = self.page.next() {
                return Some(Ok(changeset));
            }
            if !self.should_fetch() {
                self.exhausted = true;
                return None;
            }
            if let Err(error) = self.fetch() {
                self.exhausted = true;
                return Some(Err(error));
            }
        }
    }
}
