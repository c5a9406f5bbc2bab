/*!
 * # Business Central Integration
 *
 * Everything that talks to the external ERP lives here:
 *
 * - [`token`]: OAuth2 client-credentials token acquisition with a
 *   process-wide cache and stampede-free refresh
 * - [`client`]: the HTTP client (hard per-call timeout, retry with
 *   exponential backoff on 429/5xx, cursor-based pagination, company
 *   resolution with environment fallback)
 * - [`sync`]: idempotent batched upsert of catalog mirrors, per-item price
 *   fetching with bounded concurrency, and the pull-sync orchestration
 *
 * BC remains the system of record for customers, items, locations and
 * prices; local mirrors are never deleted by sync and locally-curated
 * fields are never overwritten by it.
 */

pub mod client;
pub mod sync;
pub mod token;

pub use client::{BcClient, Cursor, Page, Paginator, ResolvedCompany};
pub use sync::{CatalogSyncService, SyncCancellation, SyncError, SyncReport};
pub use token::TokenProvider;
