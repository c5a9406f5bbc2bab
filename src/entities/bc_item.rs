use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local mirror of a Business Central item.
///
/// `inventory` is the ERP-side snapshot and is advisory only; the stock
/// ledger remains authoritative for local quantities.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bc_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub bc_id: String,
    pub no: String,
    pub display_name: String,
    pub item_category_code: Option<String>,
    pub base_unit_of_measure: Option<String>,
    pub unit_price: Option<Decimal>,
    pub inventory: Option<Decimal>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
