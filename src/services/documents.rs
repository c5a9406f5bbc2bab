//! Creation and read access for settlement documents.
//!
//! Transitions never happen here; they are the settlement coordinator's job.
//! Creation writes the header and its lines in one transaction so a document
//! is never observable half-built.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::db::with_transaction;
use crate::entities::{
    delivery_note, delivery_note_line, purchase_order, purchase_order_line, return_invoice,
    return_invoice_line, sale, sale_line,
};
use crate::errors::ServiceError;
use crate::services::state_machine::{
    DeliveryNoteStatus, PurchaseOrderStatus, ReturnInvoiceStatus, SaleStatus,
};

/// One line of a document being created.
#[derive(Debug, Clone)]
pub struct NewDocumentLine {
    pub product_id: i64,
    pub qte: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub reference: Option<String>,
    pub salesperson_id: i64,
    pub depot_location_code: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<NewDocumentLine>,
}

#[derive(Debug, Clone)]
pub struct NewDeliveryNote {
    pub reference: Option<String>,
    pub salesperson_id: i64,
    pub customer_id: Option<i64>,
    pub notes: Option<String>,
    pub lines: Vec<NewDocumentLine>,
}

#[derive(Debug, Clone)]
pub struct NewSale {
    pub reference: Option<String>,
    pub salesperson_id: i64,
    pub customer_id: Option<i64>,
    pub lines: Vec<NewDocumentLine>,
}

#[derive(Debug, Clone)]
pub struct NewReturnInvoice {
    pub reference: Option<String>,
    pub purchase_order_id: i64,
    pub reason: Option<String>,
    pub lines: Vec<NewDocumentLine>,
}

fn generate_reference(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, id[..8].to_uppercase())
}

fn check_lines(lines: &[NewDocumentLine]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "document requires at least one line".to_string(),
        ));
    }
    if let Some(line) = lines.iter().find(|l| l.qte <= 0) {
        return Err(ServiceError::ValidationError(format!(
            "line for product {} has non-positive qte {}",
            line.product_id, line.qte
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DocumentService {
    db: Arc<DatabaseConnection>,
}

impl DocumentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    pub async fn create_purchase_order(
        &self,
        input: NewPurchaseOrder,
    ) -> Result<(purchase_order::Model, Vec<purchase_order_line::Model>), ServiceError> {
        check_lines(&input.lines)?;
        let now = chrono::Utc::now();
        let reference = input
            .reference
            .unwrap_or_else(|| generate_reference("PO"));

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let header = purchase_order::ActiveModel {
                    reference: Set(reference),
                    salesperson_id: Set(input.salesperson_id),
                    depot_location_code: Set(input.depot_location_code),
                    status: Set(PurchaseOrderStatus::NonValide.to_string()),
                    bc_number: Set(None),
                    bc_status: Set(None),
                    notes: Set(input.notes),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let mut lines = Vec::with_capacity(input.lines.len());
                for line in &input.lines {
                    lines.push(
                        purchase_order_line::ActiveModel {
                            purchase_order_id: Set(header.id),
                            product_id: Set(line.product_id),
                            qte: Set(line.qte),
                            qte_recue: Set(None),
                            created_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?,
                    );
                }

                Ok::<_, ServiceError>((header, lines))
            })
        })
        .await
    }

    pub async fn get_purchase_order(
        &self,
        id: i64,
    ) -> Result<Option<(purchase_order::Model, Vec<purchase_order_line::Model>)>, ServiceError>
    {
        let Some(po) = purchase_order::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        let lines = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(id))
            .all(&*self.db)
            .await?;
        Ok(Some((po, lines)))
    }

    pub async fn list_purchase_orders(
        &self,
        status: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let mut query = purchase_order::Entity::find();
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(purchase_order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    // ------------------------------------------------------------------
    // Delivery notes
    // ------------------------------------------------------------------

    pub async fn create_delivery_note(
        &self,
        input: NewDeliveryNote,
    ) -> Result<(delivery_note::Model, Vec<delivery_note_line::Model>), ServiceError> {
        check_lines(&input.lines)?;
        let now = chrono::Utc::now();
        let reference = input
            .reference
            .unwrap_or_else(|| generate_reference("BL"));

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let header = delivery_note::ActiveModel {
                    reference: Set(reference),
                    salesperson_id: Set(input.salesperson_id),
                    customer_id: Set(input.customer_id),
                    status: Set(DeliveryNoteStatus::Cree.to_string()),
                    notes: Set(input.notes),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let mut lines = Vec::with_capacity(input.lines.len());
                for line in &input.lines {
                    lines.push(
                        delivery_note_line::ActiveModel {
                            delivery_note_id: Set(header.id),
                            product_id: Set(line.product_id),
                            qte: Set(line.qte),
                            unit_price: Set(line.unit_price),
                            created_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?,
                    );
                }

                Ok::<_, ServiceError>((header, lines))
            })
        })
        .await
    }

    pub async fn get_delivery_note(
        &self,
        id: i64,
    ) -> Result<Option<(delivery_note::Model, Vec<delivery_note_line::Model>)>, ServiceError> {
        let Some(dn) = delivery_note::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        let lines = delivery_note_line::Entity::find()
            .filter(delivery_note_line::Column::DeliveryNoteId.eq(id))
            .all(&*self.db)
            .await?;
        Ok(Some((dn, lines)))
    }

    pub async fn list_delivery_notes(
        &self,
        status: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<delivery_note::Model>, u64), ServiceError> {
        let mut query = delivery_note::Entity::find();
        if let Some(status) = status {
            query = query.filter(delivery_note::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(delivery_note::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    // ------------------------------------------------------------------
    // Sales
    // ------------------------------------------------------------------

    pub async fn create_sale(
        &self,
        input: NewSale,
    ) -> Result<(sale::Model, Vec<sale_line::Model>), ServiceError> {
        check_lines(&input.lines)?;
        if let Some(line) = input.lines.iter().find(|l| l.unit_price.is_none()) {
            return Err(ServiceError::ValidationError(format!(
                "sale line for product {} requires a unit price",
                line.product_id
            )));
        }
        let now = chrono::Utc::now();
        let reference = input.reference.unwrap_or_else(|| generate_reference("VT"));
        let total: Decimal = input
            .lines
            .iter()
            .map(|l| l.unit_price.unwrap_or_default() * Decimal::from(l.qte))
            .sum();

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let header = sale::ActiveModel {
                    reference: Set(reference),
                    salesperson_id: Set(input.salesperson_id),
                    customer_id: Set(input.customer_id),
                    status: Set(SaleStatus::Cree.to_string()),
                    total: Set(Some(total)),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let mut lines = Vec::with_capacity(input.lines.len());
                for line in &input.lines {
                    lines.push(
                        sale_line::ActiveModel {
                            sale_id: Set(header.id),
                            product_id: Set(line.product_id),
                            qte: Set(line.qte),
                            unit_price: Set(line.unit_price.unwrap_or_default()),
                            created_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?,
                    );
                }

                Ok::<_, ServiceError>((header, lines))
            })
        })
        .await
    }

    pub async fn get_sale(
        &self,
        id: i64,
    ) -> Result<Option<(sale::Model, Vec<sale_line::Model>)>, ServiceError> {
        let Some(s) = sale::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        let lines = sale_line::Entity::find()
            .filter(sale_line::Column::SaleId.eq(id))
            .all(&*self.db)
            .await?;
        Ok(Some((s, lines)))
    }

    pub async fn list_sales(
        &self,
        status: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
        let mut query = sale::Entity::find();
        if let Some(status) = status {
            query = query.filter(sale::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(sale::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    // ------------------------------------------------------------------
    // Return invoices
    // ------------------------------------------------------------------

    /// Create a return invoice against a purchase order. The salesperson is
    /// inherited from the referenced order.
    pub async fn create_return_invoice(
        &self,
        input: NewReturnInvoice,
    ) -> Result<(return_invoice::Model, Vec<return_invoice_line::Model>), ServiceError> {
        check_lines(&input.lines)?;

        let po = purchase_order::Entity::find_by_id(input.purchase_order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Purchase order {} not found",
                    input.purchase_order_id
                ))
            })?;

        let now = chrono::Utc::now();
        let reference = input
            .reference
            .unwrap_or_else(|| generate_reference("RET"));
        let salesperson_id = po.salesperson_id;

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let header = return_invoice::ActiveModel {
                    reference: Set(reference),
                    purchase_order_id: Set(input.purchase_order_id),
                    salesperson_id: Set(salesperson_id),
                    status: Set(ReturnInvoiceStatus::Cree.to_string()),
                    reason: Set(input.reason),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let mut lines = Vec::with_capacity(input.lines.len());
                for line in &input.lines {
                    lines.push(
                        return_invoice_line::ActiveModel {
                            return_invoice_id: Set(header.id),
                            product_id: Set(line.product_id),
                            qte: Set(line.qte),
                            created_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?,
                    );
                }

                Ok::<_, ServiceError>((header, lines))
            })
        })
        .await
    }

    pub async fn get_return_invoice(
        &self,
        id: i64,
    ) -> Result<Option<(return_invoice::Model, Vec<return_invoice_line::Model>)>, ServiceError>
    {
        let Some(ri) = return_invoice::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        let lines = return_invoice_line::Entity::find()
            .filter(return_invoice_line::Column::ReturnInvoiceId.eq(id))
            .all(&*self.db)
            .await?;
        Ok(Some((ri, lines)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lines_are_rejected() {
        assert!(matches!(
            check_lines(&[]),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let lines = [NewDocumentLine {
            product_id: 1,
            qte: 0,
            unit_price: None,
        }];
        assert!(matches!(
            check_lines(&lines),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn generated_references_carry_the_prefix() {
        let reference = generate_reference("PO");
        assert!(reference.starts_with("PO-"));
        assert_eq!(reference.len(), 11);
    }
}
