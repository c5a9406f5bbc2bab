//! HTTP client for the Business Central API.
//!
//! Every call carries a hard timeout. GET calls are idempotent-safe and are
//! retried with exponential backoff on 429/5xx and transport failures; any
//! other 4xx fails immediately. POST calls against BC are never retried.
//! Pagination follows the server-supplied opaque next link through a
//! [`Cursor`]; a paginator is lazy, finite, and cannot be restarted
//! mid-stream — a fresh one always begins at page one.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::BcConfig;
use crate::errors::ServiceError;

use super::token::TokenProvider;

/// Environments probed after the configured one when resolving the company.
const FALLBACK_ENVIRONMENTS: &[&str] = &["Production", "production", "Sandbox"];

/// One page of an OData listing.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDto {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcCustomerDto {
    pub id: String,
    pub number: String,
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
    pub customer_price_group: Option<String>,
    #[serde(default)]
    pub blocked: Option<String>,
    #[serde(rename = "@odata.etag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcItemDto {
    pub id: String,
    pub number: String,
    pub display_name: String,
    #[serde(default)]
    pub item_category_code: Option<String>,
    #[serde(default)]
    pub base_unit_of_measure_code: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub inventory: Option<Decimal>,
    #[serde(rename = "@odata.etag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcLocationDto {
    pub id: String,
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "@odata.etag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcSalesPriceDto {
    pub item_number: String,
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
    #[serde(rename = "@odata.etag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

/// Purchase order payload submitted to BC.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BcPurchaseOrderSubmission {
    pub vendor_number: String,
    pub external_document_number: String,
    pub lines: Vec<BcPurchaseOrderLineSubmission>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BcPurchaseOrderLineSubmission {
    pub item_number: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BcPurchaseOrderDto {
    pub id: String,
    pub number: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Environment and company the client settled on.
#[derive(Debug, Clone)]
pub struct ResolvedCompany {
    pub environment: String,
    pub company_id: String,
}

/// Opaque continuation state of a paginated listing.
#[derive(Debug, Default)]
pub struct Cursor {
    pub next_link: Option<String>,
    pub done: bool,
}

pub struct BcClient {
    http: Client,
    cfg: BcConfig,
    tokens: Arc<TokenProvider>,
    company: OnceCell<ResolvedCompany>,
}

impl BcClient {
    pub fn new(cfg: BcConfig, tokens: Arc<TokenProvider>) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build BC HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            cfg,
            tokens,
            company: OnceCell::new(),
        })
    }

    fn api_root(&self, environment: &str) -> String {
        format!("{}/{}/api/v2.0", self.cfg.resolved_base_url(), environment)
    }

    async fn company_root(&self) -> Result<String, ServiceError> {
        let company = self.company().await?;
        Ok(format!(
            "{}/companies({})",
            self.api_root(&company.environment),
            company.company_id
        ))
    }

    /// One GET bounded by the client timeout, retried with exponential
    /// backoff (`base_delay * 2^attempt`) on 429/5xx and transport errors up
    /// to the configured ceiling. Non-retryable 4xx fails immediately.
    #[instrument(skip(self))]
    pub async fn get_with_retry(&self, url: &str) -> Result<serde_json::Value, ServiceError> {
        let mut attempt: u32 = 0;
        loop {
            let token = self.tokens.access_token().await?;
            match self.http.get(url).bearer_auth(token).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            ServiceError::ExternalServiceError(format!(
                                "invalid response from {}: {}",
                                url, e
                            ))
                        });
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable {
                        return Err(ServiceError::ExternalServiceError(format!(
                            "GET {} failed with {}",
                            url, status
                        )));
                    }
                    if attempt >= self.cfg.max_retries {
                        return Err(ServiceError::ExternalServiceError(format!(
                            "GET {} failed with {} after {} retries",
                            url, status, attempt
                        )));
                    }
                    warn!(
                        "GET {} returned {}; retrying (attempt {}/{})",
                        url, status, attempt + 1, self.cfg.max_retries
                    );
                }
                Err(e) => {
                    // Timeouts and connection errors are retryable for GETs
                    if attempt >= self.cfg.max_retries {
                        return Err(ServiceError::ExternalServiceError(format!(
                            "GET {} failed after {} retries: {}",
                            url, attempt, e
                        )));
                    }
                    warn!(
                        "GET {} transport error: {}; retrying (attempt {}/{})",
                        url, e, attempt + 1, self.cfg.max_retries
                    );
                }
            }

            tokio::time::sleep(self.backoff_delay(attempt)).await;
            attempt += 1;
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.cfg.retry_base_delay_ms.saturating_mul(factor))
    }

    /// One POST, bounded by the client timeout, never retried.
    #[instrument(skip(self, body))]
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("POST {} failed: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "POST {} failed with {}",
                url, status
            )));
        }

        response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid response from {}: {}", url, e))
        })
    }

    /// The environment/company pair, resolved once per process: the
    /// configured environment is probed first, then the fallback list, and
    /// the first one answering a valid companies listing wins.
    pub async fn company(&self) -> Result<&ResolvedCompany, ServiceError> {
        self.company
            .get_or_try_init(|| self.resolve_company())
            .await
    }

    async fn resolve_company(&self) -> Result<ResolvedCompany, ServiceError> {
        let mut candidates: Vec<String> = vec![self.cfg.environment.clone()];
        for fallback in FALLBACK_ENVIRONMENTS {
            if !candidates.iter().any(|c| c == fallback) {
                candidates.push((*fallback).to_string());
            }
        }

        for environment in candidates {
            let url = format!("{}/companies", self.api_root(&environment));
            match self.get_with_retry(&url).await {
                Ok(value) => {
                    let page: Page<CompanyDto> = match serde_json::from_value(value) {
                        Ok(page) => page,
                        Err(e) => {
                            warn!(
                                "environment {} returned an invalid companies listing: {}",
                                environment, e
                            );
                            continue;
                        }
                    };

                    let company = match &self.cfg.company_name {
                        Some(name) => page.value.into_iter().find(|c| &c.name == name),
                        None => page.value.into_iter().next(),
                    };

                    if let Some(company) = company {
                        debug!(
                            "resolved BC company {} ({}) in environment {}",
                            company.name, company.id, environment
                        );
                        return Ok(ResolvedCompany {
                            environment,
                            company_id: company.id,
                        });
                    }
                    warn!("environment {} has no matching company", environment);
                }
                Err(e) => {
                    warn!("environment {} did not answer: {}", environment, e);
                }
            }
        }

        Err(ServiceError::ExternalServiceError(
            "no BC environment answered a valid companies listing".to_string(),
        ))
    }

    /// Lazy page sequence over a listing URL. Not restartable: once drained
    /// it stays done, and a fresh paginator starts from page one again.
    pub fn paginate<T: DeserializeOwned>(&self, first_url: String) -> Paginator<'_, T> {
        Paginator {
            client: self,
            first_url: Some(first_url),
            cursor: Cursor::default(),
            _marker: PhantomData,
        }
    }

    fn listing_url(&self, root: &str, resource: &str) -> String {
        format!("{}/{}?$top={}", root, resource, self.cfg.page_size)
    }

    /// First-page URL of the company's customers listing.
    pub async fn company_customers_url(&self) -> Result<String, ServiceError> {
        Ok(self.listing_url(&self.company_root().await?, "customers"))
    }

    /// First-page URL of the company's items listing.
    pub async fn company_items_url(&self) -> Result<String, ServiceError> {
        Ok(self.listing_url(&self.company_root().await?, "items"))
    }

    /// First-page URL of the company's locations listing.
    pub async fn company_locations_url(&self) -> Result<String, ServiceError> {
        Ok(self.listing_url(&self.company_root().await?, "locations"))
    }

    /// Per-item price lookup. Prices are fetched one item at a time so every
    /// sales-type tier the ERP holds for the item is captured.
    pub async fn sales_prices_for_item(
        &self,
        item_number: &str,
    ) -> Result<Vec<BcSalesPriceDto>, ServiceError> {
        let root = self.company_root().await?;
        let url = Url::parse_with_params(
            &format!("{}/salesPrices", root),
            &[(
                "$filter",
                format!("itemNumber eq '{}'", item_number.replace('\'', "''")),
            )],
        )
        .map_err(|e| ServiceError::InternalError(format!("invalid salesPrices URL: {}", e)))?;

        self.paginate(url.into()).collect_all().await
    }

    /// Submits a purchase order to BC. POST, not retried: the caller decides
    /// how to surface a failure, and a timeout must not create duplicates.
    pub async fn submit_purchase_order(
        &self,
        submission: &BcPurchaseOrderSubmission,
    ) -> Result<BcPurchaseOrderDto, ServiceError> {
        let root = self.company_root().await?;
        let url = format!("{}/purchaseOrders", root);
        let body = serde_json::to_value(submission)
            .map_err(|e| ServiceError::InternalError(format!("invalid submission: {}", e)))?;

        let value = self.post_json(&url, &body).await?;
        serde_json::from_value(value).map_err(|e| {
            ServiceError::ExternalServiceError(format!(
                "invalid purchase order response from BC: {}",
                e
            ))
        })
    }
}

pub struct Paginator<'a, T> {
    client: &'a BcClient,
    first_url: Option<String>,
    cursor: Cursor,
    _marker: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> Paginator<'a, T> {
    /// Fetches the next page, or `None` once the sequence is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, ServiceError> {
        if self.cursor.done {
            return Ok(None);
        }

        let url = match self.first_url.take().or_else(|| self.cursor.next_link.take()) {
            Some(url) => url,
            None => {
                self.cursor.done = true;
                return Ok(None);
            }
        };

        let value = self.client.get_with_retry(&url).await?;
        let page: Page<T> = serde_json::from_value(value).map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid page from {}: {}", url, e))
        })?;

        self.cursor.next_link = page.next_link;
        if self.cursor.next_link.is_none() {
            self.cursor.done = true;
        }

        Ok(Some(page.value))
    }

    /// Drains the remaining pages into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<T>, ServiceError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> BcConfig {
        let mut cfg = BcConfig::default();
        cfg.tenant_id = "tenant".into();
        cfg.client_id = "client".into();
        cfg.client_secret = "secret".into();
        cfg.token_url = format!("{}/token", server.uri());
        cfg.base_url = format!("{}/v2.0/{{tenant_id}}", server.uri());
        cfg.environment = "Probe".into();
        cfg.retry_base_delay_ms = 1;
        cfg.max_retries = 3;
        cfg
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> BcClient {
        let cfg = config_for(server);
        let tokens = Arc::new(TokenProvider::new(Client::new(), &cfg));
        BcClient::new(cfg, tokens).unwrap()
    }

    #[tokio::test]
    async fn get_retries_through_429_and_5xx() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .with_priority(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let value = client
            .get_with_retry(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn get_gives_up_after_the_retry_ceiling() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/always-busy"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4) // initial call + 3 retries
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .get_with_retry(&format!("{}/always-busy", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn non_retryable_4xx_fails_immediately() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .get_with_retry(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn paginator_follows_the_next_link_and_finishes() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "a", "name": "A"}],
                "@odata.nextLink": format!("{}/list-page2", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list-page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "b", "name": "B"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut pager: Paginator<'_, CompanyDto> =
            client.paginate(format!("{}/list", server.uri()));

        let first = pager.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "a");

        let second = pager.next_page().await.unwrap().unwrap();
        assert_eq!(second[0].id, "b");

        assert!(pager.next_page().await.unwrap().is_none());
        // Exhausted paginators stay exhausted
        assert!(pager.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn company_resolution_falls_back_to_the_next_environment() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        // The configured environment answers 404; the first fallback works
        Mock::given(method("GET"))
            .and(path("/v2.0/tenant/Probe/api/v2.0/companies"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2.0/tenant/Production/api/v2.0/companies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "cmp-1", "name": "CRONUS"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let company = client.company().await.unwrap();
        assert_eq!(company.environment, "Production");
        assert_eq!(company.company_id, "cmp-1");

        // Memoized: the second call must not hit the server again
        let company = client.company().await.unwrap();
        assert_eq!(company.company_id, "cmp-1");
    }

    #[tokio::test]
    async fn sales_price_lookup_filters_by_item() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/v2.0/tenant/Probe/api/v2.0/companies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "cmp-1", "name": "CRONUS"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2.0/tenant/Probe/api/v2.0/companies(cmp-1)/salesPrices"))
            .and(query_param("$filter", "itemNumber eq 'ITEM-1'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{
                    "itemNumber": "ITEM-1",
                    "salesType": "All Customers",
                    "salesCode": "",
                    "minimumQuantity": 1,
                    "unitPrice": 10.5
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let prices = client.sales_prices_for_item("ITEM-1").await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].sales_type, "All Customers");
    }
}
