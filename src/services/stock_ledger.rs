//! Append-only stock ledger keyed by (product, salesperson).
//!
//! Every write goes through [`StockLedger::record_movements`], which applies
//! the idempotency-key check before inserting: at most one transaction set
//! exists per (source_document_type, source_document_id, movement type),
//! regardless of retries or duplicate delivery. Current stock is always
//! derived from the rows, never stored.

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};

use crate::entities::stock_transaction::{self, Entity as StockTransactionEntity};
use crate::errors::ServiceError;
use crate::services::state_machine::DocumentType;

/// Direction of a stock movement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Entree,
    Sortie,
}

/// Behavior when a sortie would drive a (product, salesperson) stock negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeStockPolicy {
    /// Refuse the movement with `InsufficientStock`
    Reject,
    /// Record the movement and log a warning
    AllowWithWarning,
}

impl NegativeStockPolicy {
    pub fn from_config(value: &str) -> Self {
        match value {
            "allow" => NegativeStockPolicy::AllowWithWarning,
            _ => NegativeStockPolicy::Reject,
        }
    }
}

/// One requested movement line.
#[derive(Debug, Clone, Copy)]
pub struct MovementLine {
    pub product_id: i64,
    pub qte: i32,
}

#[derive(Clone)]
pub struct StockLedger {
    db: Arc<DatabaseConnection>,
    policy: NegativeStockPolicy,
}

impl StockLedger {
    pub fn new(db: Arc<DatabaseConnection>, policy: NegativeStockPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> NegativeStockPolicy {
        self.policy
    }

    /// Records the movement set for one document transition, on the caller's
    /// connection (normally the settlement transaction).
    ///
    /// If rows already exist for the idempotency key they are returned
    /// unchanged and nothing is written. Lines with `qte <= 0` contribute no
    /// row; lines for the same product are merged so the set matches the
    /// per-product uniqueness backstop in the schema.
    #[instrument(skip_all, fields(source = %source_type, source_id, movement = %movement))]
    pub async fn record_movements<C: ConnectionTrait>(
        &self,
        conn: &C,
        source_type: DocumentType,
        source_id: i64,
        movement: MovementType,
        salesperson_id: i64,
        lines: &[MovementLine],
    ) -> Result<Vec<stock_transaction::Model>, ServiceError> {
        let existing = StockTransactionEntity::find()
            .filter(stock_transaction::Column::SourceDocumentType.eq(source_type.to_string()))
            .filter(stock_transaction::Column::SourceDocumentId.eq(source_id))
            .filter(stock_transaction::Column::Type.eq(movement.to_string()))
            .all(conn)
            .await?;

        if !existing.is_empty() {
            info!(
                "Ledger rows already exist for {} {} ({}); idempotent no-op",
                source_type, source_id, movement
            );
            return Ok(existing);
        }

        let mut created = Vec::new();
        for (product_id, qte) in aggregate_lines(lines) {
            if movement == MovementType::Sortie {
                let current = self
                    .current_stock_on(conn, product_id, salesperson_id)
                    .await?;
                if current < i64::from(qte) {
                    match self.policy {
                        NegativeStockPolicy::Reject => {
                            return Err(ServiceError::InsufficientStock(format!(
                                "product {} for salesperson {}: available {}, requested {}",
                                product_id, salesperson_id, current, qte
                            )));
                        }
                        NegativeStockPolicy::AllowWithWarning => {
                            warn!(
                                "Sortie drives stock negative: product={}, salesperson={}, available={}, requested={}",
                                product_id, salesperson_id, current, qte
                            );
                        }
                    }
                }
            }

            let row = stock_transaction::ActiveModel {
                product_id: Set(product_id),
                salesperson_id: Set(salesperson_id),
                r#type: Set(movement.to_string()),
                qte: Set(qte),
                source_document_type: Set(source_type.to_string()),
                source_document_id: Set(source_id),
                ..Default::default()
            };
            created.push(row.insert(conn).await?);
        }

        Ok(created)
    }

    /// Signed sum of all ledger rows for the pair, read from the pool.
    pub async fn current_stock(
        &self,
        product_id: i64,
        salesperson_id: i64,
    ) -> Result<i64, ServiceError> {
        self.current_stock_on(&*self.db, product_id, salesperson_id)
            .await
    }

    /// Signed sum computed on an explicit connection, used inside settlement
    /// transactions so policy checks see uncommitted rows of the same txn.
    pub async fn current_stock_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: i64,
        salesperson_id: i64,
    ) -> Result<i64, ServiceError> {
        let rows = StockTransactionEntity::find()
            .filter(stock_transaction::Column::ProductId.eq(product_id))
            .filter(stock_transaction::Column::SalespersonId.eq(salesperson_id))
            .all(conn)
            .await?;

        Ok(rows.iter().fold(0i64, |acc, row| {
            if row.r#type == MovementType::Entree.to_string() {
                acc + i64::from(row.qte)
            } else {
                acc - i64::from(row.qte)
            }
        }))
    }

    /// All ledger rows for a salesperson, newest first, optionally filtered
    /// by product.
    pub async fn transactions(
        &self,
        salesperson_id: Option<i64>,
        product_id: Option<i64>,
    ) -> Result<Vec<stock_transaction::Model>, ServiceError> {
        let mut query = StockTransactionEntity::find();
        if let Some(sp) = salesperson_id {
            query = query.filter(stock_transaction::Column::SalespersonId.eq(sp));
        }
        if let Some(p) = product_id {
            query = query.filter(stock_transaction::Column::ProductId.eq(p));
        }

        let rows = query
            .order_by_desc(stock_transaction::Column::CreatedAt)
            .order_by_desc(stock_transaction::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }
}

/// Merge duplicate products and drop non-positive quantities.
fn aggregate_lines(lines: &[MovementLine]) -> BTreeMap<i64, i32> {
    let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
    for line in lines {
        if line.qte > 0 {
            *merged.entry(line.product_id).or_insert(0) += line.qte;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_strings_round_trip() {
        assert_eq!(MovementType::Entree.to_string(), "entree");
        assert_eq!(MovementType::Sortie.to_string(), "sortie");
        assert_eq!("sortie".parse::<MovementType>().unwrap(), MovementType::Sortie);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!(
            NegativeStockPolicy::from_config("reject"),
            NegativeStockPolicy::Reject
        );
        assert_eq!(
            NegativeStockPolicy::from_config("allow"),
            NegativeStockPolicy::AllowWithWarning
        );
        // Anything unrecognized falls back to the safe default
        assert_eq!(
            NegativeStockPolicy::from_config("whatever"),
            NegativeStockPolicy::Reject
        );
    }

    #[test]
    fn aggregate_merges_duplicate_products_and_drops_empty_lines() {
        let lines = [
            MovementLine {
                product_id: 10,
                qte: 3,
            },
            MovementLine {
                product_id: 10,
                qte: 2,
            },
            MovementLine {
                product_id: 11,
                qte: 0,
            },
            MovementLine {
                product_id: 12,
                qte: -4,
            },
        ];

        let merged = aggregate_lines(&lines);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(&10), Some(&5));
    }
}
