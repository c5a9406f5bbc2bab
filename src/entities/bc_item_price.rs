use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local mirror of a Business Central sales price row.
///
/// A price row belongs to one tier (`sales_type` + `sales_code`), applies at
/// or above `minimum_quantity`, and is active inside the optional
/// `[starting_date, ending_date]` window.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bc_item_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub item_no: String,
    /// "Customer", "Customer Price Group", "Campaign" or "All Customers"
    pub sales_type: String,
    /// Customer number, price group code or campaign number; empty for "All Customers"
    pub sales_code: String,
    pub minimum_quantity: Decimal,
    pub unit_price: Decimal,
    pub currency_code: Option<String>,
    pub starting_date: Option<Date>,
    pub ending_date: Option<Date>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
