// Business Central mirrors (owned by catalog sync)
pub mod bc_customer;
pub mod bc_item;
pub mod bc_item_price;
pub mod bc_location;

// Local catalog
pub mod product;

// Documents
pub mod delivery_note;
pub mod delivery_note_line;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod return_invoice;
pub mod return_invoice_line;
pub mod sale;
pub mod sale_line;

// Stock ledger
pub mod stock_transaction;
