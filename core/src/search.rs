//! Search results and the 404-as-empty allowlist.
//!
//! The backend answers a search with no hits by returning 404. Only the three
//! endpoints named by `SearchKind` get that treatment; every other call keeps
//! 404 as an error.

/// Endpoints whose 404 means "no results".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Accounts,
    Hashtags,
    Tweets,
}

impl SearchKind {
    pub fn path(self) -> &'static str {
        match self {
            SearchKind::Accounts => "/accounts/search",
            SearchKind::Hashtags => "/hashtags/search",
            SearchKind::Tweets => "/tweets/search",
        }
    }
}

/// Outcome of a search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<T> {
    Found(Vec<T>),
    Empty,
}

impl<T> SearchOutcome<T> {
    /// `Found` with an empty list collapses to `Empty`.
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            SearchOutcome::Empty
        } else {
            SearchOutcome::Found(items)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::Found(items) => items.len(),
            SearchOutcome::Empty => 0,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            SearchOutcome::Found(items) => items,
            SearchOutcome::Empty => Vec::new(),
        }
    }
}

impl<T> Default for SearchOutcome<T> {
    fn default() -> Self {
        SearchOutcome::Empty
    }
}
