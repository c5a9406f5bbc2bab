pub mod bc_sync;
pub mod common;
pub mod delivery_notes;
pub mod purchase_orders;
pub mod return_invoices;
pub mod sales;
pub mod stock;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
