//! Offset-paginated list with id-based deduplication.

use std::collections::HashSet;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::models::Identified;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Start over from offset 0 and replace everything held.
    Reset,
    /// Fetch the next page and append records not already held.
    Append,
}

/// Ordered records merged from successive pages.
///
/// `cursor` counts server records consumed, not records held: a page whose
/// records are all duplicates still advances it, so the next request never
/// asks for the same window twice.
#[derive(Debug, Clone)]
pub struct PageBuffer<T> {
    items: Vec<T>,
    cursor: usize,
    has_more: bool,
}

impl<T: Identified> PageBuffer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            has_more: true,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Offset to request for a load in `mode`.
    #[must_use]
    pub fn next_offset(&self, mode: LoadMode) -> usize {
        match mode {
            LoadMode::Reset => 0,
            LoadMode::Append => self.cursor,
        }
    }

    /// Merge a fetched page. Returns how many records were added.
    ///
    /// `has_more` is recomputed from the page length alone: a page shorter
    /// than `page_size` means the server has nothing further.
    pub fn apply_page(&mut self, mode: LoadMode, page: Vec<T>, page_size: usize) -> usize {
        let fetched = page.len();
        let mut seen: HashSet<String> = match mode {
            LoadMode::Reset => HashSet::new(),
            LoadMode::Append => self.items.iter().map(|i| i.id().to_string()).collect(),
        };
        let fresh: Vec<T> = page
            .into_iter()
            .filter(|item| seen.insert(item.id().to_string()))
            .collect();
        let added = fresh.len();

        match mode {
            LoadMode::Reset => {
                self.items = fresh;
                self.cursor = fetched;
            }
            LoadMode::Append => {
                self.items.extend(fresh);
                self.cursor += fetched;
            }
        }
        self.has_more = fetched == page_size;
        added
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id() == id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|i| i.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|i| i.id() == id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// Insert a record created locally at the head of the server order.
    ///
    /// Returns false (and changes nothing) if the id is already held.
    pub fn prepend(&mut self, item: T) -> bool {
        if self.contains(item.id()) {
            return false;
        }
        self.items.insert(0, item);
        self.cursor += 1;
        true
    }

    /// Remove a record that was deleted on the server.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.items.iter().position(|i| i.id() == id)?;
        self.cursor = self.cursor.saturating_sub(1);
        Some(self.items.remove(index))
    }
}

impl<T: Identified> Default for PageBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Guards against overlapping fetches for one list.
///
/// A single-permit semaphore; holding the permit means a load is running.
#[derive(Debug)]
pub struct LoadGate {
    permit: Semaphore,
}

impl Default for LoadGate {
    fn default() -> Self {
        Self {
            permit: Semaphore::new(1),
        }
    }
}

impl LoadGate {
    /// Claim the gate. Returns `None` if a load is already running.
    pub fn try_begin(&self) -> Option<LoadTicket<'_>> {
        self.permit
            .try_acquire()
            .ok()
            .map(|permit| LoadTicket { _permit: permit })
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

/// Releases the gate when dropped, whether the load succeeded, failed, or
/// was cancelled mid-await.
#[derive(Debug)]
pub struct LoadTicket<'a> {
    _permit: SemaphorePermit<'a>,
}
