//! Bookmark pagination
//!
//! Page 1 is fetched without a bookmark. Every following page passes the
//! bookmark returned with the previous page back unmodified. Paging ends when
//! the executor returns no rows or no bookmark.

use crate::errors::{StatementError, StatementResult};
use crate::observability::{Logger, QueryEvent};

use super::executor::{ExecutionContext, ExecutionRequest, QueryExecutor};
use super::hydrate::{hydrate_all, records_of, Hydrator};

/// One fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    /// 1-based page number
    pub number: u64,
    pub records: Vec<R>,
    /// Token for the next page, absent on the last one
    pub bookmark: Option<String>,
}

/// Iterates the pages of a `pageBy` call or selector query
#[derive(Debug)]
pub struct Paginator {
    entity: String,
    request: ExecutionRequest,
    logger: Logger,
    bookmark: Option<String>,
    fetched: u64,
    exhausted: bool,
}

impl Paginator {
    pub(crate) fn new(entity: &str, request: ExecutionRequest, logger: Logger) -> Self {
        Self {
            entity: entity.to_string(),
            request,
            logger,
            bookmark: None,
            fetched: 0,
            exhausted: false,
        }
    }

    pub fn request(&self) -> &ExecutionRequest {
        &self.request
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, or `None` once paging has ended
    pub async fn next_page<E, H>(
        &mut self,
        executor: &E,
        hydrator: &H,
    ) -> StatementResult<Option<Page<H::Record>>>
    where
        E: QueryExecutor + ?Sized,
        H: Hydrator + ?Sized,
    {
        if self.exhausted {
            return Ok(None);
        }

        let mut request = self.request.clone();
        if let ExecutionRequest::Selector(document) = &mut request {
            document.bookmark = self.bookmark.clone();
        }
        let ctx = ExecutionContext::new(self.entity.as_str()).with_bookmark(self.bookmark.clone());

        let raw = match executor.execute(&request, &ctx).await {
            Ok(raw) => raw,
            Err(err) => {
                // A failed page ends paging
                self.exhausted = true;
                let err = StatementError::execution(err);
                self.logger.event(
                    QueryEvent::ExecutionFailed,
                    &[
                        ("entity", self.entity.as_str()),
                        ("page", &(self.fetched + 1).to_string()),
                        ("error", &err.to_string()),
                    ],
                );
                return Err(err);
            }
        };

        let records = hydrate_all(hydrator, records_of(raw.rows)?)?;
        if records.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.fetched += 1;
        self.bookmark = raw.bookmark;
        if self.bookmark.is_none() {
            self.exhausted = true;
        }

        self.logger.event(
            QueryEvent::PageFetched,
            &[
                ("entity", self.entity.as_str()),
                ("page", &self.fetched.to_string()),
                ("records", &records.len().to_string()),
            ],
        );

        Ok(Some(Page {
            number: self.fetched,
            records,
            bookmark: self.bookmark.clone(),
        }))
    }

    /// Fetches every remaining page
    pub async fn collect_all<E, H>(
        mut self,
        executor: &E,
        hydrator: &H,
    ) -> StatementResult<Vec<H::Record>>
    where
        E: QueryExecutor + ?Sized,
        H: Hydrator + ?Sized,
    {
        let mut all = Vec::new();
        while let Some(page) = self.next_page(executor, hydrator).await? {
            all.extend(page.records);
        }
        Ok(all)
    }
}
