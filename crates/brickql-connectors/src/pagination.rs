//! Paginated list protocol.
//!
//! A scan fetches pages strictly in sequence and hands every item to a
//! [`RowSink`]. After each item the sink is asked how many rows it still
//! wants; at zero the scan stops without issuing another request.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use brickql_core::ConnectorError;

/// Position of the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Start,
    Token(String),
    Offset(u64),
}

/// State of one list request, advanced page by page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    /// Items to ask for per page.
    pub page_size: u64,
    pub cursor: Cursor,
    /// Extra query parameters sent on every page (filters, parent keys).
    pub params: Vec<(String, String)>,
}

impl ListRequest {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            cursor: Cursor::Start,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Where to continue, or `None` when the listing is exhausted.
    pub next: Option<Cursor>,
}

/// Something that can fetch one page for a request.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch(&self, request: &ListRequest) -> Result<Page<Self::Item>, ConnectorError>;
}

/// The consumer side of a scan.
#[async_trait]
pub trait RowSink<T: Send>: Send {
    type Error: From<ConnectorError> + Send;

    async fn emit(&mut self, item: T) -> Result<(), Self::Error>;

    /// Rows the consumer still wants. Zero stops the scan.
    fn rows_remaining(&self) -> u64;

    /// Called once after each page's items have been emitted.
    async fn page_complete(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// How a scan ended. Both outcomes are successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The API reported no further pages.
    Exhausted,
    /// The consumer stopped asking for rows.
    Cancelled,
}

/// Drive `source` page by page into `sink`.
pub async fn stream_list<S, K>(
    source: &S,
    mut request: ListRequest,
    sink: &mut K,
) -> Result<ScanOutcome, K::Error>
where
    S: PageSource + ?Sized,
    K: RowSink<S::Item> + ?Sized,
{
    let mut pages = 0usize;
    loop {
        if sink.rows_remaining() == 0 {
            return Ok(ScanOutcome::Cancelled);
        }

        let page = source.fetch(&request).await?;
        pages += 1;
        debug!(page = pages, items = page.items.len(), "fetched page");

        for item in page.items {
            sink.emit(item).await?;
            if sink.rows_remaining() == 0 {
                sink.page_complete().await?;
                return Ok(ScanOutcome::Cancelled);
            }
        }
        sink.page_complete().await?;

        match page.next {
            Some(next) if next == request.cursor => {
                warn!(?next, "API returned the same cursor twice, stopping");
                return Ok(ScanOutcome::Exhausted);
            }
            Some(next) => request.cursor = next,
            None => return Ok(ScanOutcome::Exhausted),
        }
    }
}

/// How an endpoint pages its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Everything comes back in one response.
    None,
    /// Continuation token in the response, echoed back as a query parameter.
    Token {
        size_param: Option<&'static str>,
        token_param: &'static str,
        token_field: &'static str,
        /// Boolean field that must be true for another page to exist.
        has_more_field: Option<&'static str>,
    },
    /// Offset/count paging (SCIM). A short page ends the listing.
    Offset {
        start_param: &'static str,
        count_param: &'static str,
        first_index: u64,
    },
}

impl Pagination {
    /// Token paging with the usual `page_token` / `next_page_token` names.
    pub const fn token(size_param: &'static str) -> Self {
        Pagination::Token {
            size_param: Some(size_param),
            token_param: "page_token",
            token_field: "next_page_token",
            has_more_field: None,
        }
    }

    pub const fn scim() -> Self {
        Pagination::Offset {
            start_param: "startIndex",
            count_param: "count",
            first_index: 1,
        }
    }

    /// Query parameters that position `request` on its page.
    pub fn query_params(&self, request: &ListRequest) -> Vec<(String, String)> {
        let mut params = Vec::new();
        match self {
            Pagination::None => {}
            Pagination::Token {
                size_param,
                token_param,
                ..
            } => {
                if let Some(size_param) = size_param {
                    params.push((size_param.to_string(), request.page_size.to_string()));
                }
                if let Cursor::Token(token) = &request.cursor {
                    params.push((token_param.to_string(), token.clone()));
                }
            }
            Pagination::Offset {
                start_param,
                count_param,
                first_index,
            } => {
                let start = match request.cursor {
                    Cursor::Offset(offset) => offset,
                    _ => *first_index,
                };
                params.push((start_param.to_string(), start.to_string()));
                params.push((count_param.to_string(), request.page_size.to_string()));
            }
        }
        params
    }

    /// Work out where the next page starts from a response holding
    /// `item_count` items.
    pub fn next_cursor(
        &self,
        response: &Value,
        request: &ListRequest,
        item_count: usize,
    ) -> Option<Cursor> {
        match self {
            Pagination::None => None,
            Pagination::Token {
                token_field,
                has_more_field,
                ..
            } => {
                if let Some(field) = has_more_field {
                    if !response.get(*field).and_then(Value::as_bool).unwrap_or(false) {
                        return None;
                    }
                }
                response
                    .get(*token_field)
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(|t| Cursor::Token(t.to_string()))
            }
            Pagination::Offset { first_index, .. } => {
                if item_count == 0 || (item_count as u64) < request.page_size {
                    return None;
                }
                let start = match request.cursor {
                    Cursor::Offset(offset) => offset,
                    _ => *first_index,
                };
                Some(Cursor::Offset(start + item_count as u64))
            }
        }
    }
}
