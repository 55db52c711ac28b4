//! Incremental fetching of rows changed after a point in time.
//!
//! Every ODA entity set carries `opdateringsdato`. [`UpdatedSince`] pages
//! through the rows whose timestamp is later than a given instant, oldest
//! first, so a caller can keep a local copy current by remembering the last
//! timestamp it stored.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::catalog;
use crate::model::{Collection, Entity};
use crate::oda_client::{BlockingOdaClient, OdaClient};
use crate::query::QueryOptions;
use crate::transform::format_date;
use crate::ClientError;

/// Page size used when none is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

const UPDATED_FIELD: &str = "opdateringsdato";

/// Pager over the rows of one entity set updated after `since`.
///
/// Pages are requested with `$skip` advancing by the number of rows already
/// received. Iteration ends at the first empty page.
///
/// ```no_run
/// # async fn run() -> Result<(), oda_client::ClientError> {
/// use chrono::{TimeZone, Utc};
/// use oda_client::{OdaClient, model::Sag, sync::UpdatedSince};
///
/// let client = OdaClient::from_default_server()?;
/// let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let mut pager = UpdatedSince::<Sag>::for_entity(since).batch_size(50);
/// while let Some(rows) = pager.next_page(&client).await? {
///     println!("{} changed cases", rows.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UpdatedSince<T> {
    entity_set: &'static str,
    since: DateTime<Utc>,
    batch_size: u32,
    skip: u32,
    exhausted: bool,
    rows: PhantomData<fn() -> T>,
}

impl<T: Entity> UpdatedSince<T> {
    /// Pages through the entity set of `T`.
    pub fn for_entity(since: DateTime<Utc>) -> Self {
        Self::with_set(T::ENTITY_SET, since)
    }
}

impl<T: DeserializeOwned> UpdatedSince<T> {
    /// Pages through the named entity set, e.g. with `T = serde_json::Value`.
    pub fn new(entity_set: &str, since: DateTime<Utc>) -> Result<Self, ClientError> {
        let definition = catalog::entity_set(entity_set)?;
        Ok(Self::with_set(definition.name, since))
    }

    fn with_set(entity_set: &'static str, since: DateTime<Utc>) -> Self {
        Self {
            entity_set,
            since,
            batch_size: DEFAULT_BATCH_SIZE,
            skip: 0,
            exhausted: false,
            rows: PhantomData,
        }
    }

    /// Sets the `$top` of each page. Zero falls back to the default.
    #[must_use]
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    pub fn entity_set(&self) -> &'static str {
        self.entity_set
    }

    /// Number of rows received so far.
    pub fn received(&self) -> u32 {
        self.skip
    }

    /// Query for the next page.
    pub fn query(&self) -> QueryOptions {
        QueryOptions::new()
            .filter(format!("{UPDATED_FIELD} gt {}", format_date(&self.since)))
            .order_by(UPDATED_FIELD)
            .top(self.batch_size)
            .skip(self.skip)
    }

    /// Fetches the next page, or `None` once the set is exhausted.
    pub async fn next_page(&mut self, client: &OdaClient) -> Result<Option<Vec<T>>, ClientError> {
        if self.exhausted {
            return Ok(None);
        }
        let page = client.list_in::<T>(self.entity_set, &self.query()).await?;
        Ok(self.advance(page))
    }

    /// Blocking variant of [`Self::next_page`].
    pub fn next_page_blocking(
        &mut self,
        client: &BlockingOdaClient,
    ) -> Result<Option<Vec<T>>, ClientError> {
        if self.exhausted {
            return Ok(None);
        }
        let page = client.list_in::<T>(self.entity_set, &self.query())?;
        Ok(self.advance(page))
    }

    fn advance(&mut self, page: Collection<T>) -> Option<Vec<T>> {
        if page.value.is_empty() {
            tracing::info!(
                entity_set = self.entity_set,
                received = self.skip,
                "no more updated rows"
            );
            self.exhausted = true;
            return None;
        }

        let rows = u32::try_from(page.value.len()).unwrap_or(u32::MAX);
        self.skip = self.skip.saturating_add(rows);
        tracing::info!(
            entity_set = self.entity_set,
            rows,
            received = self.skip,
            "fetched updated rows"
        );
        Some(page.value)
    }
}
