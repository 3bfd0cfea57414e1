use std::collections::HashSet;

use tracing::debug;

use crate::Error;

/// The largest page the listing endpoints will return.
pub const MAX_LIST_LIMIT: usize = 100;

/// The page size used when none is given.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// A listing could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    /// The server advertised more items than it delivered.
    #[error("Failed to fetch definition list: expected {expected} items, got {received}")]
    Incomplete {
        /// The total count advertised by the server.
        expected: u64,
        /// How many items had been received when an empty page came back.
        received: usize,
    },
    /// A page repeated an item, or did not sort byte-wise after the cursor.
    #[error("Failed to fetch definition list: listing did not advance past '{cursor}'")]
    Stalled {
        /// The cursor the offending page was requested with.
        cursor: String,
    },
}

/// An item that a listing can be cursored on.
pub(crate) trait Named {
    fn name(&self) -> &str;
}

/// One page of a listing, along with the total number of items the server
/// says exist.
#[derive(Debug)]
pub(crate) struct CountedPage<T> {
    pub(crate) count: u64,
    pub(crate) items: Vec<T>,
}

/// Fetch every item of a name-cursored listing by repeatedly calling
/// `fetch_page(limit, after_name)`, until the accumulated items reach the
/// count reported by the first page.
///
/// Each cursor is the name of the last item accumulated so far. Pages must
/// make progress: an empty page before the count is reached, a repeated name,
/// or a name that does not sort after the cursor all fail the listing.
///
/// "Sort after" is byte-wise `str` ordering, which is how the server orders
/// dataset names. A server collating differently (case-insensitively, say)
/// would have its listings rejected as [`PaginationError::Stalled`].
pub(crate) fn paginate_by_name<T, F>(page_size: usize, mut fetch_page: F) -> Result<Vec<T>, Error>
where
    T: Named,
    F: FnMut(usize, Option<&str>) -> Result<CountedPage<T>, Error>,
{
    let CountedPage {
        count,
        items: first,
    } = fetch_page(page_size, None)?;

    if first.is_empty() {
        if count == 0 {
            return Ok(first);
        }

        return Err(PaginationError::Incomplete {
            expected: count,
            received: 0,
        }
        .into());
    }

    if count <= first.len() as u64 {
        return Ok(first);
    }

    let mut seen: HashSet<String> = first.iter().map(|v| v.name().to_owned()).collect();
    let mut all = first;

    while (all.len() as u64) < count {
        let Some(cursor) = all.last().map(|v| v.name().to_owned()) else {
            break;
        };

        let CountedPage { items: page, .. } = fetch_page(page_size, Some(&cursor))?;
        debug!(
            cursor = %cursor,
            page = page.len(),
            received = all.len(),
            expected = count,
            "fetched listing page"
        );

        if page.is_empty() {
            return Err(PaginationError::Incomplete {
                expected: count,
                received: all.len(),
            }
            .into());
        }

        for v in &page {
            if v.name() <= cursor.as_str() || !seen.insert(v.name().to_owned()) {
                return Err(PaginationError::Stalled { cursor }.into());
            }
        }

        all.extend(page);
    }

    Ok(all)
}
