//! Settlement coordinator: the single entry point for document transitions.
//!
//! A settlement is the coupled act of advancing a document's status and
//! applying its stock consequence. Both happen inside one database
//! transaction, after the per-document lock has been acquired and the state
//! machine has authorized the edge. Requesting a transition that has already
//! been applied returns the stored document unchanged; requesting an
//! incompatible transition fails with `InvalidStateTransition` and mutates
//! nothing.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::entities::{
    delivery_note, delivery_note_line, purchase_order, purchase_order_line, return_invoice,
    return_invoice_line, sale, sale_line, stock_transaction,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::state_machine::{
    self, DeliveryNoteStatus, DocumentType, PurchaseOrderStatus, ReturnInvoiceStatus, SaleStatus,
};
use crate::services::stock_ledger::{MovementLine, MovementType, StockLedger};

/// Received quantity reported for one purchase order line.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedLine {
    pub line_id: i64,
    pub qte_recue: i32,
}

/// Outcome of a settlement, returned to handlers.
#[derive(Debug, Clone)]
pub struct Settlement<M> {
    pub document: M,
    pub movements: Vec<stock_transaction::Model>,
    /// True when the requested transition had already been applied and the
    /// stored result was returned as-is.
    pub already_applied: bool,
}

#[derive(Clone)]
pub struct SettlementCoordinator {
    db: Arc<DatabaseConnection>,
    ledger: StockLedger,
    locks: Arc<DashMap<(DocumentType, i64), Arc<Mutex<()>>>>,
    event_sender: Option<EventSender>,
}

impl SettlementCoordinator {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: StockLedger,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            ledger,
            locks: Arc::new(DashMap::new()),
            event_sender,
        }
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// Per-document lock; concurrent settlements on the same document
    /// serialize here so exactly one caller performs the transition.
    fn lock_for(&self, doc: DocumentType, id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry((doc, id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            // Event delivery is best-effort; settlement already committed
            let _ = sender.send(event).await;
        }
    }

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    /// non_valide -> valide. No ledger effect.
    #[instrument(skip(self))]
    pub async fn validate_purchase_order(
        &self,
        id: i64,
    ) -> Result<Settlement<purchase_order::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::PurchaseOrder, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (po, lines) = load_purchase_order(&txn, id).await?;

        if po.status == PurchaseOrderStatus::Valide.to_string() {
            return Ok(Settlement {
                document: po,
                movements: Vec::new(),
                already_applied: true,
            });
        }

        state_machine::authorize_purchase_order(
            &po,
            &lines,
            PurchaseOrderStatus::Valide,
            po.bc_number.as_deref(),
        )?;

        let updated = set_purchase_order_status(&txn, po, PurchaseOrderStatus::Valide).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "purchase_order", "target" => "valide");
        self.emit(Event::PurchaseOrderValidated(id)).await;
        info!("Purchase order {} validated", id);

        Ok(Settlement {
            document: updated,
            movements: Vec::new(),
            already_applied: false,
        })
    }

    /// valide -> envoye_bc, recording the document number confirmed by the
    /// prior ERP submission call. No ledger effect.
    #[instrument(skip(self))]
    pub async fn record_bc_submission(
        &self,
        id: i64,
        bc_number: &str,
        bc_status: Option<&str>,
    ) -> Result<Settlement<purchase_order::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::PurchaseOrder, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (po, lines) = load_purchase_order(&txn, id).await?;

        if po.status == PurchaseOrderStatus::EnvoyeBc.to_string() {
            return Ok(Settlement {
                document: po,
                movements: Vec::new(),
                already_applied: true,
            });
        }

        state_machine::authorize_purchase_order(
            &po,
            &lines,
            PurchaseOrderStatus::EnvoyeBc,
            Some(bc_number),
        )?;

        let mut active: purchase_order::ActiveModel = po.into();
        active.status = Set(PurchaseOrderStatus::EnvoyeBc.to_string());
        active.bc_number = Set(Some(bc_number.to_string()));
        active.bc_status = Set(bc_status.map(str::to_string));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "purchase_order", "target" => "envoye_bc");
        self.emit(Event::PurchaseOrderSentToBc {
            id,
            bc_number: bc_number.to_string(),
        })
        .await;
        info!("Purchase order {} recorded as sent to BC ({})", id, bc_number);

        Ok(Settlement {
            document: updated,
            movements: Vec::new(),
            already_applied: false,
        })
    }

    /// envoye_bc -> expedie. Books one entree per line using qte_recue.
    ///
    /// `received` optionally updates line received quantities in the same
    /// transaction before the guard runs.
    #[instrument(skip(self, received))]
    pub async fn mark_purchase_order_expedie(
        &self,
        id: i64,
        received: &[ReceivedLine],
    ) -> Result<Settlement<purchase_order::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::PurchaseOrder, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (po, mut lines) = load_purchase_order(&txn, id).await?;

        if po.status == PurchaseOrderStatus::Expedie.to_string() {
            let movements = existing_movements(
                &txn,
                DocumentType::PurchaseOrder,
                id,
                MovementType::Entree,
            )
            .await?;
            return Ok(Settlement {
                document: po,
                movements,
                already_applied: true,
            });
        }

        if !received.is_empty() {
            lines = apply_received_quantities(&txn, lines, received).await?;
        }

        state_machine::authorize_purchase_order(
            &po,
            &lines,
            PurchaseOrderStatus::Expedie,
            po.bc_number.as_deref(),
        )?;

        let salesperson_id = po.salesperson_id;
        let movement_lines: Vec<MovementLine> = lines
            .iter()
            .map(|l| MovementLine {
                product_id: l.product_id,
                qte: l.qte_recue.unwrap_or(0),
            })
            .collect();

        let movements = self
            .ledger
            .record_movements(
                &txn,
                DocumentType::PurchaseOrder,
                id,
                MovementType::Entree,
                salesperson_id,
                &movement_lines,
            )
            .await?;

        let updated = set_purchase_order_status(&txn, po, PurchaseOrderStatus::Expedie).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "purchase_order", "target" => "expedie");
        self.emit_movements(&movements).await;
        self.emit(Event::PurchaseOrderExpedie(id)).await;
        info!(
            "Purchase order {} expedited with {} entree rows",
            id,
            movements.len()
        );

        Ok(Settlement {
            document: updated,
            movements,
            already_applied: false,
        })
    }

    /// Cancellation, legal from every state before expedie. No ledger effect
    /// because no entree has been booked yet.
    #[instrument(skip(self))]
    pub async fn cancel_purchase_order(
        &self,
        id: i64,
    ) -> Result<Settlement<purchase_order::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::PurchaseOrder, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (po, lines) = load_purchase_order(&txn, id).await?;

        if po.status == PurchaseOrderStatus::Annule.to_string() {
            return Ok(Settlement {
                document: po,
                movements: Vec::new(),
                already_applied: true,
            });
        }

        state_machine::authorize_purchase_order(
            &po,
            &lines,
            PurchaseOrderStatus::Annule,
            po.bc_number.as_deref(),
        )?;

        let updated = set_purchase_order_status(&txn, po, PurchaseOrderStatus::Annule).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "purchase_order", "target" => "annule");
        self.emit(Event::PurchaseOrderCancelled(id)).await;

        Ok(Settlement {
            document: updated,
            movements: Vec::new(),
            already_applied: false,
        })
    }

    // ------------------------------------------------------------------
    // Delivery notes
    // ------------------------------------------------------------------

    /// cree -> valide. Books one sortie per line.
    #[instrument(skip(self))]
    pub async fn validate_delivery_note(
        &self,
        id: i64,
    ) -> Result<Settlement<delivery_note::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::DeliveryNote, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (dn, lines) = load_delivery_note(&txn, id).await?;

        if dn.status == DeliveryNoteStatus::Valide.to_string() {
            let movements =
                existing_movements(&txn, DocumentType::DeliveryNote, id, MovementType::Sortie)
                    .await?;
            return Ok(Settlement {
                document: dn,
                movements,
                already_applied: true,
            });
        }

        state_machine::authorize_delivery_note(&dn, &lines, DeliveryNoteStatus::Valide)?;

        let movement_lines: Vec<MovementLine> = lines
            .iter()
            .map(|l| MovementLine {
                product_id: l.product_id,
                qte: l.qte,
            })
            .collect();

        let movements = self
            .ledger
            .record_movements(
                &txn,
                DocumentType::DeliveryNote,
                id,
                MovementType::Sortie,
                dn.salesperson_id,
                &movement_lines,
            )
            .await?;

        let mut active: delivery_note::ActiveModel = dn.into();
        active.status = Set(DeliveryNoteStatus::Valide.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "delivery_note", "target" => "valide");
        self.emit_movements(&movements).await;
        self.emit(Event::DeliveryNoteValidated(id)).await;
        info!(
            "Delivery note {} validated with {} sortie rows",
            id,
            movements.len()
        );

        Ok(Settlement {
            document: updated,
            movements,
            already_applied: false,
        })
    }

    #[instrument(skip(self))]
    pub async fn cancel_delivery_note(
        &self,
        id: i64,
    ) -> Result<Settlement<delivery_note::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::DeliveryNote, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (dn, lines) = load_delivery_note(&txn, id).await?;

        if dn.status == DeliveryNoteStatus::Annule.to_string() {
            return Ok(Settlement {
                document: dn,
                movements: Vec::new(),
                already_applied: true,
            });
        }

        state_machine::authorize_delivery_note(&dn, &lines, DeliveryNoteStatus::Annule)?;

        let mut active: delivery_note::ActiveModel = dn.into();
        active.status = Set(DeliveryNoteStatus::Annule.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.emit(Event::DeliveryNoteCancelled(id)).await;

        Ok(Settlement {
            document: updated,
            movements: Vec::new(),
            already_applied: false,
        })
    }

    // ------------------------------------------------------------------
    // Sales
    // ------------------------------------------------------------------

    /// cree -> valide. Books one sortie per line.
    #[instrument(skip(self))]
    pub async fn validate_sale(&self, id: i64) -> Result<Settlement<sale::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::Sale, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (s, lines) = load_sale(&txn, id).await?;

        if s.status == SaleStatus::Valide.to_string() {
            let movements =
                existing_movements(&txn, DocumentType::Sale, id, MovementType::Sortie).await?;
            return Ok(Settlement {
                document: s,
                movements,
                already_applied: true,
            });
        }

        state_machine::authorize_sale(&s, &lines, SaleStatus::Valide)?;

        let movement_lines: Vec<MovementLine> = lines
            .iter()
            .map(|l| MovementLine {
                product_id: l.product_id,
                qte: l.qte,
            })
            .collect();

        let movements = self
            .ledger
            .record_movements(
                &txn,
                DocumentType::Sale,
                id,
                MovementType::Sortie,
                s.salesperson_id,
                &movement_lines,
            )
            .await?;

        let mut active: sale::ActiveModel = s.into();
        active.status = Set(SaleStatus::Valide.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "sale", "target" => "valide");
        self.emit_movements(&movements).await;
        self.emit(Event::SaleValidated(id)).await;

        Ok(Settlement {
            document: updated,
            movements,
            already_applied: false,
        })
    }

    #[instrument(skip(self))]
    pub async fn cancel_sale(&self, id: i64) -> Result<Settlement<sale::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::Sale, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (s, lines) = load_sale(&txn, id).await?;

        if s.status == SaleStatus::Annule.to_string() {
            return Ok(Settlement {
                document: s,
                movements: Vec::new(),
                already_applied: true,
            });
        }

        state_machine::authorize_sale(&s, &lines, SaleStatus::Annule)?;

        let mut active: sale::ActiveModel = s.into();
        active.status = Set(SaleStatus::Annule.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.emit(Event::SaleCancelled(id)).await;

        Ok(Settlement {
            document: updated,
            movements: Vec::new(),
            already_applied: false,
        })
    }

    // ------------------------------------------------------------------
    // Return invoices
    // ------------------------------------------------------------------

    /// cree -> valide. Books offsetting sortie rows against the expedited
    /// purchase order's entree.
    #[instrument(skip(self))]
    pub async fn validate_return_invoice(
        &self,
        id: i64,
    ) -> Result<Settlement<return_invoice::Model>, ServiceError> {
        let lock = self.lock_for(DocumentType::ReturnInvoice, id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;
        let (ri, lines) = load_return_invoice(&txn, id).await?;

        if ri.status == ReturnInvoiceStatus::Valide.to_string() {
            let movements =
                existing_movements(&txn, DocumentType::ReturnInvoice, id, MovementType::Sortie)
                    .await?;
            return Ok(Settlement {
                document: ri,
                movements,
                already_applied: true,
            });
        }

        let po = purchase_order::Entity::find_by_id(ri.purchase_order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Purchase order {} referenced by return invoice {} not found",
                    ri.purchase_order_id, id
                ))
            })?;

        state_machine::authorize_return_invoice(
            &ri,
            &lines,
            &po.status,
            ReturnInvoiceStatus::Valide,
        )?;

        let movement_lines: Vec<MovementLine> = lines
            .iter()
            .map(|l| MovementLine {
                product_id: l.product_id,
                qte: l.qte,
            })
            .collect();

        let movements = self
            .ledger
            .record_movements(
                &txn,
                DocumentType::ReturnInvoice,
                id,
                MovementType::Sortie,
                ri.salesperson_id,
                &movement_lines,
            )
            .await?;

        let mut active: return_invoice::ActiveModel = ri.into();
        active.status = Set(ReturnInvoiceStatus::Valide.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        counter!("vansale_settlement.transitions", 1, "document" => "return_invoice", "target" => "valide");
        self.emit_movements(&movements).await;
        self.emit(Event::ReturnInvoiceValidated(id)).await;

        Ok(Settlement {
            document: updated,
            movements,
            already_applied: false,
        })
    }

    async fn emit_movements(&self, movements: &[stock_transaction::Model]) {
        for m in movements {
            self.emit(Event::StockMovementRecorded {
                product_id: m.product_id,
                salesperson_id: m.salesperson_id,
                movement: m.r#type.clone(),
                qte: m.qte,
                source_document_type: m.source_document_type.clone(),
                source_document_id: m.source_document_id,
            })
            .await;
        }
    }
}

// ----------------------------------------------------------------------
// Loaders and shared helpers
// ----------------------------------------------------------------------

async fn load_purchase_order<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<(purchase_order::Model, Vec<purchase_order_line::Model>), ServiceError> {
    let po = purchase_order::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", id)))?;
    let lines = purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::PurchaseOrderId.eq(id))
        .all(conn)
        .await?;
    Ok((po, lines))
}

async fn load_delivery_note<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<(delivery_note::Model, Vec<delivery_note_line::Model>), ServiceError> {
    let dn = delivery_note::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Delivery note {} not found", id)))?;
    let lines = delivery_note_line::Entity::find()
        .filter(delivery_note_line::Column::DeliveryNoteId.eq(id))
        .all(conn)
        .await?;
    Ok((dn, lines))
}

async fn load_sale<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<(sale::Model, Vec<sale_line::Model>), ServiceError> {
    let s = sale::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", id)))?;
    let lines = sale_line::Entity::find()
        .filter(sale_line::Column::SaleId.eq(id))
        .all(conn)
        .await?;
    Ok((s, lines))
}

async fn load_return_invoice<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> Result<(return_invoice::Model, Vec<return_invoice_line::Model>), ServiceError> {
    let ri = return_invoice::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Return invoice {} not found", id)))?;
    let lines = return_invoice_line::Entity::find()
        .filter(return_invoice_line::Column::ReturnInvoiceId.eq(id))
        .all(conn)
        .await?;
    Ok((ri, lines))
}

async fn set_purchase_order_status<C: ConnectionTrait>(
    conn: &C,
    po: purchase_order::Model,
    status: PurchaseOrderStatus,
) -> Result<purchase_order::Model, ServiceError> {
    let mut active: purchase_order::ActiveModel = po.into();
    active.status = Set(status.to_string());
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

async fn apply_received_quantities<C: ConnectionTrait>(
    conn: &C,
    lines: Vec<purchase_order_line::Model>,
    received: &[ReceivedLine],
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    let mut updated = Vec::with_capacity(lines.len());
    for line in lines {
        match received.iter().find(|r| r.line_id == line.id) {
            Some(r) => {
                if r.qte_recue < 0 {
                    return Err(ServiceError::ValidationError(format!(
                        "qte_recue for line {} must not be negative",
                        line.id
                    )));
                }
                let mut active: purchase_order_line::ActiveModel = line.into();
                active.qte_recue = Set(Some(r.qte_recue));
                updated.push(active.update(conn).await?);
            }
            None => updated.push(line),
        }
    }
    Ok(updated)
}

async fn existing_movements<C: ConnectionTrait>(
    conn: &C,
    source_type: DocumentType,
    source_id: i64,
    movement: MovementType,
) -> Result<Vec<stock_transaction::Model>, ServiceError> {
    let rows = stock_transaction::Entity::find()
        .filter(stock_transaction::Column::SourceDocumentType.eq(source_type.to_string()))
        .filter(stock_transaction::Column::SourceDocumentId.eq(source_id))
        .filter(stock_transaction::Column::Type.eq(movement.to_string()))
        .all(conn)
        .await?;
    Ok(rows)
}
