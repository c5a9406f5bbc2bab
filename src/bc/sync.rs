//! Catalog synchronization: batched idempotent upsert of BC mirrors.
//!
//! Upserts never delete mirror rows, never touch locally-curated fields,
//! and overwrite remote-owned fields only when the incoming record is newer
//! than the stored one. A failing record never blocks the rest of its batch;
//! the outcome reports how many records were applied plus a structured error
//! list instead of an opaque log string per failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::entities::{bc_customer, bc_item, bc_item_price, bc_location};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

use super::client::{
    BcClient, BcCustomerDto, BcItemDto, BcLocationDto, BcSalesPriceDto,
};

/// One record that could not be applied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncError {
    /// Identifier of the failed record (customer number, item number, ...)
    pub item: String,
    pub reason: String,
}

/// Outcome of one sync call: partial success, never all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncReport {
    pub success: bool,
    /// Records applied (inserted, updated, or already up to date)
    pub count: u64,
    pub errors: Vec<SyncError>,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self {
            success: true,
            count: 0,
            errors: Vec::new(),
        }
    }
}

impl SyncReport {
    fn failed(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            errors: vec![SyncError {
                item: item.into(),
                reason: reason.into(),
            }],
        }
    }

    fn merge(&mut self, other: SyncReport) {
        self.success = self.success && other.success;
        self.count += other.count;
        self.errors.extend(other.errors);
    }
}

/// Reports for one full pull-sync run, one per resource.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FullSyncReport {
    pub customers: SyncReport,
    pub items: SyncReport,
    pub locations: SyncReport,
    pub item_prices: SyncReport,
}

/// Cooperative cancellation flag checked between batches. Batches already
/// applied when cancellation is requested stay applied; a sync run is
/// resumable, not transactional across its whole duration.
#[derive(Debug, Clone, Default)]
pub struct SyncCancellation(Arc<AtomicBool>);

impl SyncCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------
// Upsert payloads (accepted by the push endpoints, produced from BC DTOs
// by the pull sync)
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpsert {
    pub bc_id: String,
    pub no: String,
    pub display_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub price_group: Option<String>,
    #[serde(default)]
    pub blocked: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<BcCustomerDto> for CustomerUpsert {
    fn from(dto: BcCustomerDto) -> Self {
        Self {
            bc_id: dto.id,
            no: dto.number,
            display_name: dto.display_name,
            phone_number: dto.phone_number,
            email: dto.email,
            city: dto.city,
            country: dto.country,
            price_group: dto.customer_price_group,
            blocked: dto.blocked,
            etag: dto.etag,
            last_modified: dto.last_modified_date_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpsert {
    pub bc_id: String,
    pub no: String,
    pub display_name: String,
    #[serde(default)]
    pub item_category_code: Option<String>,
    #[serde(default)]
    pub base_unit_of_measure: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub inventory: Option<Decimal>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<BcItemDto> for ItemUpsert {
    fn from(dto: BcItemDto) -> Self {
        Self {
            bc_id: dto.id,
            no: dto.number,
            display_name: dto.display_name,
            item_category_code: dto.item_category_code,
            base_unit_of_measure: dto.base_unit_of_measure_code,
            unit_price: dto.unit_price,
            inventory: dto.inventory,
            etag: dto.etag,
            last_modified: dto.last_modified_date_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpsert {
    pub bc_id: String,
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<BcLocationDto> for LocationUpsert {
    fn from(dto: BcLocationDto) -> Self {
        Self {
            bc_id: dto.id,
            code: dto.code,
            display_name: dto.display_name,
            city: dto.city,
            etag: dto.etag,
            last_modified: dto.last_modified_date_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemPriceUpsert {
    pub item_no: String,
    pub sales_type: String,
    #[serde(default)]
    pub sales_code: String,
    pub minimum_quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub starting_date: Option<NaiveDate>,
    #[serde(default)]
    pub ending_date: Option<NaiveDate>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<BcSalesPriceDto> for ItemPriceUpsert {
    fn from(dto: BcSalesPriceDto) -> Self {
        Self {
            item_no: dto.item_number,
            sales_type: dto.sales_type,
            sales_code: dto.sales_code,
            minimum_quantity: dto.minimum_quantity,
            unit_price: dto.unit_price,
            currency_code: dto.currency_code,
            starting_date: dto.starting_date,
            ending_date: dto.ending_date,
            etag: dto.etag,
            last_modified: dto.last_modified_date_time,
        }
    }
}

// ----------------------------------------------------------------------
// Freshness comparison
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Newer,
    Same,
    Older,
}

fn freshness(
    incoming_modified: Option<DateTime<Utc>>,
    incoming_etag: Option<&str>,
    stored_modified: Option<DateTime<Utc>>,
    stored_etag: Option<&str>,
) -> Freshness {
    match (incoming_modified, stored_modified) {
        (Some(incoming), Some(stored)) => {
            if incoming > stored {
                Freshness::Newer
            } else if incoming < stored {
                Freshness::Older
            } else {
                Freshness::Same
            }
        }
        (Some(_), None) => Freshness::Newer,
        // Without timestamps an etag change is the only version signal
        (None, _) => {
            if incoming_etag == stored_etag {
                Freshness::Same
            } else {
                Freshness::Newer
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
    SkippedStale,
}

// ----------------------------------------------------------------------
// Sync service
// ----------------------------------------------------------------------

#[derive(Clone)]
pub struct CatalogSyncService {
    db: Arc<DatabaseConnection>,
    client: Arc<BcClient>,
    batch_size: usize,
    price_fetch_concurrency: usize,
    price_fetch_pause: Duration,
    event_sender: Option<EventSender>,
}

impl CatalogSyncService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        client: Arc<BcClient>,
        batch_size: usize,
        price_fetch_concurrency: usize,
        price_fetch_pause: Duration,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            client,
            batch_size: batch_size.max(1),
            price_fetch_concurrency: price_fetch_concurrency.max(1),
            price_fetch_pause,
            event_sender,
        }
    }

    async fn emit_completed(&self, resource: &str, report: &SyncReport) {
        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::CatalogSyncCompleted {
                    resource: resource.to_string(),
                    count: report.count,
                    error_count: report.errors.len(),
                })
                .await;
        }
    }

    // ------------------------------------------------------------------
    // Batched upserts (also the body of the push endpoints)
    // ------------------------------------------------------------------

    #[instrument(skip(self, records), fields(total = records.len()))]
    pub async fn upsert_customers(&self, records: Vec<CustomerUpsert>) -> SyncReport {
        let mut report = SyncReport::default();
        for batch in records.chunks(self.batch_size) {
            for record in batch {
                let label = record_label(&record.no, &record.bc_id);
                match self.upsert_customer(record).await {
                    Ok(outcome) => apply_outcome(&mut report, label, outcome),
                    Err(e) => report.errors.push(SyncError {
                        item: label,
                        reason: e.to_string(),
                    }),
                }
            }
            debug!("customer batch of {} processed", batch.len());
        }
        report
    }

    async fn upsert_customer(
        &self,
        record: &CustomerUpsert,
    ) -> Result<UpsertOutcome, ServiceError> {
        if record.bc_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "customer record has no bc id".to_string(),
            ));
        }
        if record.no.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "customer {} has no number",
                record.bc_id
            )));
        }

        let existing = bc_customer::Entity::find()
            .filter(bc_customer::Column::BcId.eq(record.bc_id.as_str()))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            None => {
                bc_customer::ActiveModel {
                    bc_id: Set(record.bc_id.clone()),
                    no: Set(record.no.clone()),
                    display_name: Set(record.display_name.clone()),
                    phone_number: Set(record.phone_number.clone()),
                    email: Set(record.email.clone()),
                    city: Set(record.city.clone()),
                    country: Set(record.country.clone()),
                    price_group: Set(record.price_group.clone()),
                    blocked: Set(record.blocked.clone()),
                    sales_channel_id: Set(None),
                    etag: Set(record.etag.clone()),
                    last_modified: Set(record.last_modified),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored) => {
                match freshness(
                    record.last_modified,
                    record.etag.as_deref(),
                    stored.last_modified,
                    stored.etag.as_deref(),
                ) {
                    Freshness::Older => Ok(UpsertOutcome::SkippedStale),
                    Freshness::Same => Ok(UpsertOutcome::Unchanged),
                    Freshness::Newer => {
                        // sales_channel_id is locally curated and deliberately untouched
                        let mut active: bc_customer::ActiveModel = stored.into();
                        active.no = Set(record.no.clone());
                        active.display_name = Set(record.display_name.clone());
                        active.phone_number = Set(record.phone_number.clone());
                        active.email = Set(record.email.clone());
                        active.city = Set(record.city.clone());
                        active.country = Set(record.country.clone());
                        active.price_group = Set(record.price_group.clone());
                        active.blocked = Set(record.blocked.clone());
                        active.etag = Set(record.etag.clone());
                        active.last_modified = Set(record.last_modified);
                        active.updated_at = Set(now);
                        active.update(&*self.db).await?;
                        Ok(UpsertOutcome::Updated)
                    }
                }
            }
        }
    }

    #[instrument(skip(self, records), fields(total = records.len()))]
    pub async fn upsert_items(&self, records: Vec<ItemUpsert>) -> SyncReport {
        let mut report = SyncReport::default();
        for batch in records.chunks(self.batch_size) {
            for record in batch {
                let label = record_label(&record.no, &record.bc_id);
                match self.upsert_item(record).await {
                    Ok(outcome) => apply_outcome(&mut report, label, outcome),
                    Err(e) => report.errors.push(SyncError {
                        item: label,
                        reason: e.to_string(),
                    }),
                }
            }
            debug!("item batch of {} processed", batch.len());
        }
        report
    }

    async fn upsert_item(&self, record: &ItemUpsert) -> Result<UpsertOutcome, ServiceError> {
        if record.bc_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "item record has no bc id".to_string(),
            ));
        }
        if record.no.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "item {} has no number",
                record.bc_id
            )));
        }

        let existing = bc_item::Entity::find()
            .filter(bc_item::Column::BcId.eq(record.bc_id.as_str()))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            None => {
                bc_item::ActiveModel {
                    bc_id: Set(record.bc_id.clone()),
                    no: Set(record.no.clone()),
                    display_name: Set(record.display_name.clone()),
                    item_category_code: Set(record.item_category_code.clone()),
                    base_unit_of_measure: Set(record.base_unit_of_measure.clone()),
                    unit_price: Set(record.unit_price),
                    inventory: Set(record.inventory),
                    etag: Set(record.etag.clone()),
                    last_modified: Set(record.last_modified),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored) => {
                match freshness(
                    record.last_modified,
                    record.etag.as_deref(),
                    stored.last_modified,
                    stored.etag.as_deref(),
                ) {
                    Freshness::Older => Ok(UpsertOutcome::SkippedStale),
                    Freshness::Same => Ok(UpsertOutcome::Unchanged),
                    Freshness::Newer => {
                        let mut active: bc_item::ActiveModel = stored.into();
                        active.no = Set(record.no.clone());
                        active.display_name = Set(record.display_name.clone());
                        active.item_category_code = Set(record.item_category_code.clone());
                        active.base_unit_of_measure = Set(record.base_unit_of_measure.clone());
                        active.unit_price = Set(record.unit_price);
                        active.inventory = Set(record.inventory);
                        active.etag = Set(record.etag.clone());
                        active.last_modified = Set(record.last_modified);
                        active.updated_at = Set(now);
                        active.update(&*self.db).await?;
                        Ok(UpsertOutcome::Updated)
                    }
                }
            }
        }
    }

    #[instrument(skip(self, records), fields(total = records.len()))]
    pub async fn upsert_locations(&self, records: Vec<LocationUpsert>) -> SyncReport {
        let mut report = SyncReport::default();
        for batch in records.chunks(self.batch_size) {
            for record in batch {
                let label = record_label(&record.code, &record.bc_id);
                match self.upsert_location(record).await {
                    Ok(outcome) => apply_outcome(&mut report, label, outcome),
                    Err(e) => report.errors.push(SyncError {
                        item: label,
                        reason: e.to_string(),
                    }),
                }
            }
            debug!("location batch of {} processed", batch.len());
        }
        report
    }

    async fn upsert_location(
        &self,
        record: &LocationUpsert,
    ) -> Result<UpsertOutcome, ServiceError> {
        if record.bc_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "location record has no bc id".to_string(),
            ));
        }
        if record.code.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "location {} has no code",
                record.bc_id
            )));
        }

        let existing = bc_location::Entity::find()
            .filter(bc_location::Column::BcId.eq(record.bc_id.as_str()))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            None => {
                bc_location::ActiveModel {
                    bc_id: Set(record.bc_id.clone()),
                    code: Set(record.code.clone()),
                    display_name: Set(record.display_name.clone()),
                    city: Set(record.city.clone()),
                    etag: Set(record.etag.clone()),
                    last_modified: Set(record.last_modified),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored) => {
                match freshness(
                    record.last_modified,
                    record.etag.as_deref(),
                    stored.last_modified,
                    stored.etag.as_deref(),
                ) {
                    Freshness::Older => Ok(UpsertOutcome::SkippedStale),
                    Freshness::Same => Ok(UpsertOutcome::Unchanged),
                    Freshness::Newer => {
                        let mut active: bc_location::ActiveModel = stored.into();
                        active.code = Set(record.code.clone());
                        active.display_name = Set(record.display_name.clone());
                        active.city = Set(record.city.clone());
                        active.etag = Set(record.etag.clone());
                        active.last_modified = Set(record.last_modified);
                        active.updated_at = Set(now);
                        active.update(&*self.db).await?;
                        Ok(UpsertOutcome::Updated)
                    }
                }
            }
        }
    }

    #[instrument(skip(self, records), fields(total = records.len()))]
    pub async fn upsert_item_prices(&self, records: Vec<ItemPriceUpsert>) -> SyncReport {
        let mut report = SyncReport::default();
        for batch in records.chunks(self.batch_size) {
            for record in batch {
                let label = format!(
                    "{}/{}/{}",
                    record.item_no, record.sales_type, record.sales_code
                );
                match self.upsert_item_price(record).await {
                    Ok(outcome) => apply_outcome(&mut report, label, outcome),
                    Err(e) => report.errors.push(SyncError {
                        item: label,
                        reason: e.to_string(),
                    }),
                }
            }
            debug!("price batch of {} processed", batch.len());
        }
        report
    }

    async fn upsert_item_price(
        &self,
        record: &ItemPriceUpsert,
    ) -> Result<UpsertOutcome, ServiceError> {
        if record.item_no.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "price record has no item number".to_string(),
            ));
        }
        if record.minimum_quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "price for {} has negative minimum quantity",
                record.item_no
            )));
        }

        let mut query = bc_item_price::Entity::find()
            .filter(bc_item_price::Column::ItemNo.eq(record.item_no.as_str()))
            .filter(bc_item_price::Column::SalesType.eq(record.sales_type.as_str()))
            .filter(bc_item_price::Column::SalesCode.eq(record.sales_code.as_str()))
            .filter(bc_item_price::Column::MinimumQuantity.eq(record.minimum_quantity));
        query = match record.starting_date {
            Some(date) => query.filter(bc_item_price::Column::StartingDate.eq(date)),
            None => query.filter(bc_item_price::Column::StartingDate.is_null()),
        };
        let existing = query.one(&*self.db).await?;

        let now = Utc::now();
        match existing {
            None => {
                bc_item_price::ActiveModel {
                    item_no: Set(record.item_no.clone()),
                    sales_type: Set(record.sales_type.clone()),
                    sales_code: Set(record.sales_code.clone()),
                    minimum_quantity: Set(record.minimum_quantity),
                    unit_price: Set(record.unit_price),
                    currency_code: Set(record.currency_code.clone()),
                    starting_date: Set(record.starting_date),
                    ending_date: Set(record.ending_date),
                    etag: Set(record.etag.clone()),
                    last_modified: Set(record.last_modified),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored) => {
                match freshness(
                    record.last_modified,
                    record.etag.as_deref(),
                    stored.last_modified,
                    stored.etag.as_deref(),
                ) {
                    Freshness::Older => Ok(UpsertOutcome::SkippedStale),
                    Freshness::Same => Ok(UpsertOutcome::Unchanged),
                    Freshness::Newer => {
                        let mut active: bc_item_price::ActiveModel = stored.into();
                        active.unit_price = Set(record.unit_price);
                        active.currency_code = Set(record.currency_code.clone());
                        active.ending_date = Set(record.ending_date);
                        active.etag = Set(record.etag.clone());
                        active.last_modified = Set(record.last_modified);
                        active.updated_at = Set(now);
                        active.update(&*self.db).await?;
                        Ok(UpsertOutcome::Updated)
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Pull sync from BC
    // ------------------------------------------------------------------

    /// Page-by-page customer pull. Remote pages are fetched sequentially
    /// (the continuation reference cannot be parallelized); each page is
    /// upserted before the next fetch so cancellation loses nothing applied.
    #[instrument(skip(self, cancel))]
    pub async fn pull_customers(
        &self,
        cancel: &SyncCancellation,
    ) -> Result<SyncReport, ServiceError> {
        let root = self.client.company_customers_url().await?;
        let mut pager = self.client.paginate::<BcCustomerDto>(root);

        let mut report = SyncReport::default();
        while let Some(page) = pager.next_page().await? {
            let batch: Vec<CustomerUpsert> = page.into_iter().map(Into::into).collect();
            report.merge(self.upsert_customers(batch).await);
            if cancel.is_cancelled() {
                info!("customer sync cancelled; applied batches are kept");
                break;
            }
        }

        self.emit_completed("customers", &report).await;
        Ok(report)
    }

    #[instrument(skip(self, cancel))]
    pub async fn pull_items(&self, cancel: &SyncCancellation) -> Result<SyncReport, ServiceError> {
        let root = self.client.company_items_url().await?;
        let mut pager = self.client.paginate::<BcItemDto>(root);

        let mut report = SyncReport::default();
        while let Some(page) = pager.next_page().await? {
            let batch: Vec<ItemUpsert> = page.into_iter().map(Into::into).collect();
            report.merge(self.upsert_items(batch).await);
            if cancel.is_cancelled() {
                info!("item sync cancelled; applied batches are kept");
                break;
            }
        }

        self.emit_completed("items", &report).await;
        Ok(report)
    }

    #[instrument(skip(self, cancel))]
    pub async fn pull_locations(
        &self,
        cancel: &SyncCancellation,
    ) -> Result<SyncReport, ServiceError> {
        let root = self.client.company_locations_url().await?;
        let mut pager = self.client.paginate::<BcLocationDto>(root);

        let mut report = SyncReport::default();
        while let Some(page) = pager.next_page().await? {
            let batch: Vec<LocationUpsert> = page.into_iter().map(Into::into).collect();
            report.merge(self.upsert_locations(batch).await);
            if cancel.is_cancelled() {
                info!("location sync cancelled; applied batches are kept");
                break;
            }
        }

        self.emit_completed("locations", &report).await;
        Ok(report)
    }

    /// Prices are fetched per item (bulk listing drops sales-type tiers),
    /// with bounded concurrency per chunk and a pause between chunks so the
    /// remote rate limiter is never tripped.
    #[instrument(skip(self, cancel))]
    pub async fn pull_item_prices(
        &self,
        cancel: &SyncCancellation,
    ) -> Result<SyncReport, ServiceError> {
        let items = bc_item::Entity::find().all(&*self.db).await?;
        info!("fetching prices for {} mirrored items", items.len());

        let mut report = SyncReport::default();
        for chunk in items.chunks(self.price_fetch_concurrency) {
            if cancel.is_cancelled() {
                info!("price sync cancelled; applied chunks are kept");
                break;
            }

            let fetches = chunk
                .iter()
                .map(|item| self.client.sales_prices_for_item(&item.no));
            let results = join_all(fetches).await;

            for (item, result) in chunk.iter().zip(results) {
                match result {
                    Ok(prices) => {
                        let batch: Vec<ItemPriceUpsert> =
                            prices.into_iter().map(Into::into).collect();
                        report.merge(self.upsert_item_prices(batch).await);
                    }
                    Err(e) => {
                        warn!("price fetch for item {} failed: {}", item.no, e);
                        report.errors.push(SyncError {
                            item: item.no.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if !self.price_fetch_pause.is_zero() {
                tokio::time::sleep(self.price_fetch_pause).await;
            }
        }

        self.emit_completed("item_prices", &report).await;
        Ok(report)
    }

    /// One full catalog refresh. A resource whose listing fails entirely is
    /// marked failed; the other resources still run.
    pub async fn run_full_sync(&self, cancel: &SyncCancellation) -> FullSyncReport {
        let customers = self
            .pull_customers(cancel)
            .await
            .unwrap_or_else(|e| SyncReport::failed("customers listing", e.to_string()));
        let items = self
            .pull_items(cancel)
            .await
            .unwrap_or_else(|e| SyncReport::failed("items listing", e.to_string()));
        let locations = self
            .pull_locations(cancel)
            .await
            .unwrap_or_else(|e| SyncReport::failed("locations listing", e.to_string()));
        let item_prices = self
            .pull_item_prices(cancel)
            .await
            .unwrap_or_else(|e| SyncReport::failed("prices listing", e.to_string()));

        FullSyncReport {
            customers,
            items,
            locations,
            item_prices,
        }
    }
}

fn record_label(number: &str, bc_id: &str) -> String {
    if number.trim().is_empty() {
        bc_id.to_string()
    } else {
        number.to_string()
    }
}

fn apply_outcome(report: &mut SyncReport, label: String, outcome: UpsertOutcome) {
    match outcome {
        UpsertOutcome::Inserted | UpsertOutcome::Updated | UpsertOutcome::Unchanged => {
            report.count += 1;
        }
        UpsertOutcome::SkippedStale => report.errors.push(SyncError {
            item: label,
            reason: "conflict: local copy is newer than the incoming record".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn freshness_prefers_timestamps() {
        assert_eq!(
            freshness(Some(ts(200)), None, Some(ts(100)), None),
            Freshness::Newer
        );
        assert_eq!(
            freshness(Some(ts(100)), None, Some(ts(200)), None),
            Freshness::Older
        );
        assert_eq!(
            freshness(Some(ts(100)), Some("a"), Some(ts(100)), Some("b")),
            Freshness::Same
        );
    }

    #[test]
    fn freshness_falls_back_to_etags() {
        assert_eq!(
            freshness(None, Some("v2"), None, Some("v1")),
            Freshness::Newer
        );
        assert_eq!(
            freshness(None, Some("v1"), None, Some("v1")),
            Freshness::Same
        );
        assert_eq!(freshness(Some(ts(1)), None, None, None), Freshness::Newer);
    }

    #[test]
    fn stale_records_are_reported_as_conflicts() {
        let mut report = SyncReport::default();
        apply_outcome(&mut report, "C-1".into(), UpsertOutcome::SkippedStale);
        apply_outcome(&mut report, "C-2".into(), UpsertOutcome::Inserted);
        apply_outcome(&mut report, "C-3".into(), UpsertOutcome::Unchanged);

        assert!(report.success);
        assert_eq!(report.count, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].reason.starts_with("conflict"));
    }

    #[test]
    fn merged_reports_accumulate_counts_and_errors() {
        let mut report = SyncReport::default();
        report.merge(SyncReport {
            success: true,
            count: 3,
            errors: vec![],
        });
        report.merge(SyncReport::failed("items listing", "boom"));

        assert!(!report.success);
        assert_eq!(report.count, 3);
        assert_eq!(report.errors.len(), 1);
    }
}
