use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vansale API",
        version = "1.0.0",
        description = r#"
# Vansale Distribution API

Backend for a van-sales distribution business: salespersons carry depot
stock, fulfill purchase orders, deliver to clients, and process returns.
Business Central is the system of record for customers, items, locations and
prices; this API mirrors that catalog and owns the order-to-stock settlement
engine.

## Settlement

Document transitions (`validate`, `send-to-bc`, `mark-as-expedie`, `cancel`)
advance a state machine and mutate the stock ledger exactly once, even under
retries or concurrent requests. Replaying an applied transition returns the
stored result; an incompatible transition returns 409 and mutates nothing.

## Catalog sync

The `/bc-*/sync` endpoints upsert catalog mirrors in batches and are
partial-failure tolerant: the response always carries the applied count plus
a structured error list.
        "#,
        contact(name = "Vansale Platform Team", email = "platform@vansale.io"),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::validate_purchase_order,
        crate::handlers::purchase_orders::send_purchase_order_to_bc,
        crate::handlers::purchase_orders::mark_as_expedie,
        crate::handlers::purchase_orders::cancel_purchase_order,
        crate::handlers::delivery_notes::create_delivery_note,
        crate::handlers::delivery_notes::get_delivery_note,
        crate::handlers::delivery_notes::list_delivery_notes,
        crate::handlers::delivery_notes::validate_delivery_note,
        crate::handlers::delivery_notes::cancel_delivery_note,
        crate::handlers::sales::create_sale,
        crate::handlers::sales::get_sale,
        crate::handlers::sales::list_sales,
        crate::handlers::sales::validate_sale,
        crate::handlers::sales::cancel_sale,
        crate::handlers::return_invoices::create_return_invoice,
        crate::handlers::return_invoices::get_return_invoice,
        crate::handlers::return_invoices::validate_return_invoice,
        crate::handlers::stock::stock_consultation,
        crate::handlers::stock::stock_by_location,
        crate::handlers::stock::stock_transactions,
        crate::handlers::stock::stock_price,
        crate::handlers::bc_sync::sync_customers,
        crate::handlers::bc_sync::sync_items,
        crate::handlers::bc_sync::sync_locations,
        crate::handlers::bc_sync::sync_item_prices,
        crate::handlers::bc_sync::run_full_sync,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::bc::SyncReport,
        crate::bc::SyncError,
        crate::bc::sync::FullSyncReport,
        crate::bc::sync::CustomerUpsert,
        crate::bc::sync::ItemUpsert,
        crate::bc::sync::LocationUpsert,
        crate::bc::sync::ItemPriceUpsert,
        crate::services::stock_view::ResolvedPrice,
        crate::services::stock_view::PriceTier,
        crate::services::stock_view::StockConsultationRow,
        crate::services::stock_view::StockByLocationRow,
    )),
    tags(
        (name = "purchase-orders", description = "Purchase order lifecycle"),
        (name = "delivery-notes", description = "Delivery note lifecycle"),
        (name = "sales", description = "Sale lifecycle"),
        (name = "return-invoices", description = "Return invoice lifecycle"),
        (name = "stock", description = "Read-only stock queries"),
        (name = "bc-sync", description = "Business Central catalog synchronization"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
