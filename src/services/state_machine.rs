//! Transition tables and structural guards for the four document kinds.
//!
//! The state machine only authorizes transitions. It never touches the stock
//! ledger; ledger effects are applied exclusively by the settlement
//! coordinator after a transition has been authorized here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::entities::{
    delivery_note, delivery_note_line, purchase_order, purchase_order_line, return_invoice,
    return_invoice_line, sale, sale_line,
};
use crate::errors::ServiceError;

/// Document kinds that settle against the stock ledger.
///
/// The snake_case rendering is persisted in `stock_transactions.source_document_type`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    PurchaseOrder,
    DeliveryNote,
    Sale,
    ReturnInvoice,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    NonValide,
    Valide,
    EnvoyeBc,
    Expedie,
    Annule,
}

impl PurchaseOrderStatus {
    /// Forward edges plus cancellation; annule is unreachable once expedie.
    pub fn can_transition_to(self, target: Self) -> bool {
        use PurchaseOrderStatus::*;
        match (self, target) {
            (NonValide, Valide) => true,
            (Valide, EnvoyeBc) => true,
            (EnvoyeBc, Expedie) => true,
            (NonValide, Annule) => true,
            (Valide, Annule) => true,
            (EnvoyeBc, Annule) => true,
            _ => false,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryNoteStatus {
    Cree,
    Valide,
    Annule,
}

impl DeliveryNoteStatus {
    pub fn can_transition_to(self, target: Self) -> bool {
        use DeliveryNoteStatus::*;
        match (self, target) {
            (Cree, Valide) => true,
            (Cree, Annule) => true,
            _ => false,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Cree,
    Valide,
    Annule,
}

impl SaleStatus {
    pub fn can_transition_to(self, target: Self) -> bool {
        use SaleStatus::*;
        match (self, target) {
            (Cree, Valide) => true,
            (Cree, Annule) => true,
            _ => false,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReturnInvoiceStatus {
    Cree,
    Valide,
}

impl ReturnInvoiceStatus {
    pub fn can_transition_to(self, target: Self) -> bool {
        use ReturnInvoiceStatus::*;
        matches!((self, target), (Cree, Valide))
    }
}

/// Parse a persisted status column into its typed form.
///
/// A row with an unknown status is corrupt data, not a caller mistake.
pub fn parse_status<S: FromStr>(doc: DocumentType, raw: &str) -> Result<S, ServiceError> {
    S::from_str(raw).map_err(|_| {
        ServiceError::InternalError(format!("{} has unknown status '{}'", doc, raw))
    })
}

fn invalid_transition(
    doc: DocumentType,
    id: i64,
    from: impl std::fmt::Display,
    to: impl std::fmt::Display,
) -> ServiceError {
    ServiceError::InvalidStateTransition(format!(
        "{} {} cannot go from {} to {}",
        doc, id, from, to
    ))
}

/// Authorize a purchase order transition.
///
/// `effective_bc_number` is the BC document number that will be in effect
/// after the transition commits (either already stored or being recorded as
/// part of the same settlement).
pub fn authorize_purchase_order(
    po: &purchase_order::Model,
    lines: &[purchase_order_line::Model],
    target: PurchaseOrderStatus,
    effective_bc_number: Option<&str>,
) -> Result<PurchaseOrderStatus, ServiceError> {
    let current: PurchaseOrderStatus = parse_status(DocumentType::PurchaseOrder, &po.status)?;

    if !current.can_transition_to(target) {
        return Err(invalid_transition(
            DocumentType::PurchaseOrder,
            po.id,
            current,
            target,
        ));
    }

    match target {
        PurchaseOrderStatus::Valide => {
            if !lines.iter().any(|l| l.qte > 0) {
                return Err(ServiceError::ValidationError(format!(
                    "purchase_order {} has no line with qte > 0",
                    po.id
                )));
            }
        }
        PurchaseOrderStatus::EnvoyeBc => {
            if effective_bc_number.map_or(true, |n| n.trim().is_empty()) {
                return Err(ServiceError::ValidationError(format!(
                    "purchase_order {} has no confirmed BC document number",
                    po.id
                )));
            }
        }
        PurchaseOrderStatus::Expedie => {
            if let Some(line) = lines.iter().find(|l| l.qte_recue.is_none()) {
                return Err(ServiceError::ValidationError(format!(
                    "purchase_order {} line {} has no qte_recue",
                    po.id, line.id
                )));
            }
        }
        PurchaseOrderStatus::Annule | PurchaseOrderStatus::NonValide => {}
    }

    Ok(current)
}

pub fn authorize_delivery_note(
    dn: &delivery_note::Model,
    lines: &[delivery_note_line::Model],
    target: DeliveryNoteStatus,
) -> Result<DeliveryNoteStatus, ServiceError> {
    let current: DeliveryNoteStatus = parse_status(DocumentType::DeliveryNote, &dn.status)?;

    if !current.can_transition_to(target) {
        return Err(invalid_transition(
            DocumentType::DeliveryNote,
            dn.id,
            current,
            target,
        ));
    }

    if target == DeliveryNoteStatus::Valide && !lines.iter().any(|l| l.qte > 0) {
        return Err(ServiceError::ValidationError(format!(
            "delivery_note {} has no line with qte > 0",
            dn.id
        )));
    }

    Ok(current)
}

pub fn authorize_sale(
    sale: &sale::Model,
    lines: &[sale_line::Model],
    target: SaleStatus,
) -> Result<SaleStatus, ServiceError> {
    let current: SaleStatus = parse_status(DocumentType::Sale, &sale.status)?;

    if !current.can_transition_to(target) {
        return Err(invalid_transition(DocumentType::Sale, sale.id, current, target));
    }

    if target == SaleStatus::Valide && !lines.iter().any(|l| l.qte > 0) {
        return Err(ServiceError::ValidationError(format!(
            "sale {} has no line with qte > 0",
            sale.id
        )));
    }

    Ok(current)
}

/// Authorize a return invoice transition. The referenced purchase order must
/// have been expedited before anything can be returned against it.
pub fn authorize_return_invoice(
    ri: &return_invoice::Model,
    lines: &[return_invoice_line::Model],
    purchase_order_status: &str,
    target: ReturnInvoiceStatus,
) -> Result<ReturnInvoiceStatus, ServiceError> {
    let current: ReturnInvoiceStatus = parse_status(DocumentType::ReturnInvoice, &ri.status)?;

    if !current.can_transition_to(target) {
        return Err(invalid_transition(
            DocumentType::ReturnInvoice,
            ri.id,
            current,
            target,
        ));
    }

    if target == ReturnInvoiceStatus::Valide {
        let po_status: PurchaseOrderStatus =
            parse_status(DocumentType::PurchaseOrder, purchase_order_status)?;
        if po_status != PurchaseOrderStatus::Expedie {
            return Err(ServiceError::ValidationError(format!(
                "return_invoice {} references purchase_order {} which is not expedie",
                ri.id, ri.purchase_order_id
            )));
        }
        if !lines.iter().any(|l| l.qte > 0) {
            return Err(ServiceError::ValidationError(format!(
                "return_invoice {} has no line with qte > 0",
                ri.id
            )));
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn po(status: &str) -> purchase_order::Model {
        purchase_order::Model {
            id: 1,
            reference: "PO-TEST-1".into(),
            salesperson_id: 1,
            depot_location_code: None,
            status: status.into(),
            bc_number: None,
            bc_status: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn po_line(qte: i32, qte_recue: Option<i32>) -> purchase_order_line::Model {
        purchase_order_line::Model {
            id: 1,
            purchase_order_id: 1,
            product_id: 10,
            qte,
            qte_recue,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(PurchaseOrderStatus::NonValide, PurchaseOrderStatus::Valide, true)]
    #[case(PurchaseOrderStatus::Valide, PurchaseOrderStatus::EnvoyeBc, true)]
    #[case(PurchaseOrderStatus::EnvoyeBc, PurchaseOrderStatus::Expedie, true)]
    #[case(PurchaseOrderStatus::NonValide, PurchaseOrderStatus::Annule, true)]
    #[case(PurchaseOrderStatus::Valide, PurchaseOrderStatus::Annule, true)]
    #[case(PurchaseOrderStatus::EnvoyeBc, PurchaseOrderStatus::Annule, true)]
    #[case(PurchaseOrderStatus::Expedie, PurchaseOrderStatus::Annule, false)]
    #[case(PurchaseOrderStatus::NonValide, PurchaseOrderStatus::EnvoyeBc, false)]
    #[case(PurchaseOrderStatus::NonValide, PurchaseOrderStatus::Expedie, false)]
    #[case(PurchaseOrderStatus::Annule, PurchaseOrderStatus::Valide, false)]
    #[case(PurchaseOrderStatus::Expedie, PurchaseOrderStatus::Valide, false)]
    fn purchase_order_edges(
        #[case] from: PurchaseOrderStatus,
        #[case] to: PurchaseOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    #[case(DeliveryNoteStatus::Cree, DeliveryNoteStatus::Valide, true)]
    #[case(DeliveryNoteStatus::Cree, DeliveryNoteStatus::Annule, true)]
    #[case(DeliveryNoteStatus::Valide, DeliveryNoteStatus::Annule, false)]
    #[case(DeliveryNoteStatus::Annule, DeliveryNoteStatus::Valide, false)]
    #[case(DeliveryNoteStatus::Valide, DeliveryNoteStatus::Cree, false)]
    fn delivery_note_edges(
        #[case] from: DeliveryNoteStatus,
        #[case] to: DeliveryNoteStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(PurchaseOrderStatus::NonValide.to_string(), "non_valide");
        assert_eq!(PurchaseOrderStatus::EnvoyeBc.to_string(), "envoye_bc");
        assert_eq!(
            "expedie".parse::<PurchaseOrderStatus>().unwrap(),
            PurchaseOrderStatus::Expedie
        );
        assert_eq!(DocumentType::PurchaseOrder.to_string(), "purchase_order");
        assert_eq!(DocumentType::DeliveryNote.to_string(), "delivery_note");
    }

    #[test]
    fn validate_requires_a_positive_line() {
        let order = po("non_valide");
        let err = authorize_purchase_order(&order, &[], PurchaseOrderStatus::Valide, None)
            .expect_err("empty order must not validate");
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = authorize_purchase_order(
            &order,
            &[po_line(0, None)],
            PurchaseOrderStatus::Valide,
            None,
        )
        .expect_err("zero-quantity order must not validate");
        assert!(matches!(err, ServiceError::ValidationError(_)));

        authorize_purchase_order(
            &order,
            &[po_line(5, None)],
            PurchaseOrderStatus::Valide,
            None,
        )
        .expect("positive line should validate");
    }

    #[test]
    fn envoye_bc_requires_a_document_number() {
        let order = po("valide");
        let lines = [po_line(5, None)];

        let err =
            authorize_purchase_order(&order, &lines, PurchaseOrderStatus::EnvoyeBc, None)
                .expect_err("missing bc number must fail");
        assert!(matches!(err, ServiceError::ValidationError(_)));

        authorize_purchase_order(&order, &lines, PurchaseOrderStatus::EnvoyeBc, Some("PO-001"))
            .expect("confirmed number should authorize");
    }

    #[test]
    fn expedie_requires_received_quantities() {
        let order = po("envoye_bc");

        let err = authorize_purchase_order(
            &order,
            &[po_line(5, Some(5)), po_line(3, None)],
            PurchaseOrderStatus::Expedie,
            Some("PO-001"),
        )
        .expect_err("missing qte_recue must fail");
        assert!(matches!(err, ServiceError::ValidationError(_)));

        authorize_purchase_order(
            &order,
            &[po_line(5, Some(5)), po_line(3, Some(2))],
            PurchaseOrderStatus::Expedie,
            Some("PO-001"),
        )
        .expect("fully received order should authorize");
    }

    #[test]
    fn illegal_edge_is_reported_with_both_states() {
        let order = po("expedie");
        let err = authorize_purchase_order(
            &order,
            &[po_line(5, Some(5))],
            PurchaseOrderStatus::Annule,
            None,
        )
        .expect_err("cancel after expedie must fail");
        match err {
            ServiceError::InvalidStateTransition(msg) => {
                assert!(msg.contains("expedie"));
                assert!(msg.contains("annule"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn return_invoice_requires_expedited_purchase_order() {
        let ri = return_invoice::Model {
            id: 7,
            reference: "RET-7".into(),
            purchase_order_id: 1,
            salesperson_id: 1,
            status: "cree".into(),
            reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let lines = [return_invoice_line::Model {
            id: 1,
            return_invoice_id: 7,
            product_id: 10,
            qte: 2,
            created_at: Utc::now(),
        }];

        let err = authorize_return_invoice(&ri, &lines, "valide", ReturnInvoiceStatus::Valide)
            .expect_err("non-expedited order must fail");
        assert!(matches!(err, ServiceError::ValidationError(_)));

        authorize_return_invoice(&ri, &lines, "expedie", ReturnInvoiceStatus::Valide)
            .expect("expedited order should authorize");
    }

    #[test]
    fn unknown_persisted_status_is_an_internal_error() {
        let order = po("garbage");
        let err = authorize_purchase_order(
            &order,
            &[po_line(5, None)],
            PurchaseOrderStatus::Valide,
            None,
        )
        .expect_err("unknown status must fail");
        assert!(matches!(err, ServiceError::InternalError(_)));
    }
}
