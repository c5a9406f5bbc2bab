use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Purchase order: restocking a salesperson's depot from the warehouse.
///
/// Status lifecycle: non_valide -> valide -> envoye_bc -> expedie, with
/// annule reachable until expedie. The expedie transition books one entree
/// ledger row per line using qte_recue.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub reference: String,
    pub salesperson_id: i64,
    pub depot_location_code: Option<String>,
    pub status: String,
    /// BC document number confirmed by the ERP submission call
    pub bc_number: Option<String>,
    pub bc_status: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::return_invoice::Entity")]
    ReturnInvoices,
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::return_invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnInvoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
