use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local mirror of a Business Central customer.
///
/// Remote-owned fields are refreshed by catalog sync; `sales_channel_id` is
/// curated locally and must never be overwritten by a sync run.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bc_customers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub bc_id: String,
    pub no: String,
    pub display_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Customer price group code used by tiered price resolution
    pub price_group: Option<String>,
    pub blocked: Option<String>,
    /// Locally assigned sales channel; preserved across syncs
    pub sales_channel_id: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_note::Entity")]
    DeliveryNotes,
    #[sea_orm(has_many = "super::sale::Entity")]
    Sales,
}

impl Related<super::delivery_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryNotes.def()
    }
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
