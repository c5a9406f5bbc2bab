use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery note: goods leaving a salesperson's depot for a client.
///
/// Lifecycle: cree -> valide (books one sortie per line) or cree -> annule.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_notes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub reference: String,
    pub salesperson_id: i64,
    pub customer_id: Option<i64>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_note_line::Entity")]
    Lines,
    #[sea_orm(
        belongs_to = "super::bc_customer::Entity",
        from = "Column::CustomerId",
        to = "super::bc_customer::Column::Id"
    )]
    Customer,
}

impl Related<super::delivery_note_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::bc_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
