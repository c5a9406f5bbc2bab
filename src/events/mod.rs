use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted by settlement and catalog sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Purchase order events
    PurchaseOrderValidated(i64),
    PurchaseOrderSentToBc { id: i64, bc_number: String },
    PurchaseOrderExpedie(i64),
    PurchaseOrderCancelled(i64),

    // Delivery note events
    DeliveryNoteValidated(i64),
    DeliveryNoteCancelled(i64),

    // Sale events
    SaleValidated(i64),
    SaleCancelled(i64),

    // Return invoice events
    ReturnInvoiceValidated(i64),

    // Stock ledger events
    StockMovementRecorded {
        product_id: i64,
        salesperson_id: i64,
        movement: String,
        qte: i32,
        source_document_type: String,
        source_document_id: i64,
    },

    // Catalog sync events
    CatalogSyncCompleted {
        resource: String,
        count: u64,
        error_count: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes domain events and logs them. Settlement never waits on this
/// loop; event delivery is best-effort by design.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processing loop started");

    while let Some(event) = receiver.recv().await {
        match &event {
            Event::PurchaseOrderValidated(id) => {
                info!("Purchase order validated: {}", id);
            }
            Event::PurchaseOrderSentToBc { id, bc_number } => {
                info!("Purchase order {} sent to BC as {}", id, bc_number);
            }
            Event::PurchaseOrderExpedie(id) => {
                info!("Purchase order expedited: {}", id);
            }
            Event::PurchaseOrderCancelled(id) => {
                info!("Purchase order cancelled: {}", id);
            }
            Event::DeliveryNoteValidated(id) => {
                info!("Delivery note validated: {}", id);
            }
            Event::DeliveryNoteCancelled(id) => {
                info!("Delivery note cancelled: {}", id);
            }
            Event::SaleValidated(id) => {
                info!("Sale validated: {}", id);
            }
            Event::SaleCancelled(id) => {
                info!("Sale cancelled: {}", id);
            }
            Event::ReturnInvoiceValidated(id) => {
                info!("Return invoice validated: {}", id);
            }
            Event::StockMovementRecorded {
                product_id,
                salesperson_id,
                movement,
                qte,
                source_document_type,
                source_document_id,
            } => {
                info!(
                    product_id,
                    salesperson_id,
                    movement = %movement,
                    qte,
                    source_document_type = %source_document_type,
                    source_document_id,
                    "Stock movement recorded"
                );
            }
            Event::CatalogSyncCompleted {
                resource,
                count,
                error_count,
            } => {
                if *error_count > 0 {
                    warn!(
                        "Catalog sync for {} completed with {} upserts and {} errors",
                        resource, count, error_count
                    );
                } else {
                    info!(
                        "Catalog sync for {} completed with {} upserts",
                        resource, count
                    );
                }
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::PurchaseOrderValidated(42))
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::PurchaseOrderValidated(id)) => assert_eq!(id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::SaleValidated(1)).await;
        assert!(result.is_err());
    }
}
