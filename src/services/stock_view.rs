//! Stock consultation read models.
//!
//! Joins three sources: the BC inventory snapshot mirrored on items
//! (advisory), the ledger-derived local stock (authoritative) and the active
//! price rows. Never mutates the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{
    bc_customer, bc_item, bc_item_price, bc_location, product,
    stock_transaction::{self, Entity as StockTransactionEntity},
};
use crate::errors::ServiceError;
use crate::services::stock_ledger::MovementType;

/// Price list tiers, most specific first. Ordering is the tie-breaker used
/// by resolution: a qualifying row in an earlier tier always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
pub enum PriceTier {
    Customer,
    CustomerPriceGroup,
    Campaign,
    AllCustomers,
}

impl PriceTier {
    pub fn from_sales_type(value: &str) -> Option<Self> {
        match value {
            "Customer" => Some(PriceTier::Customer),
            "Customer Price Group" => Some(PriceTier::CustomerPriceGroup),
            "Campaign" => Some(PriceTier::Campaign),
            "All Customers" => Some(PriceTier::AllCustomers),
            _ => None,
        }
    }
}

/// Winning price row for an (item, customer, quantity, date) query.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub tier: PriceTier,
    pub minimum_quantity: Decimal,
    pub currency_code: Option<String>,
}

/// Select the applicable price row.
///
/// Rows qualify when their date window contains `today`, their
/// `minimum_quantity` does not exceed the requested quantity, and their tier
/// matches the customer (customer number for `Customer`, price group for
/// `Customer Price Group`; `Campaign` and `All Customers` rows apply to
/// everyone while active). Among qualifiers the most specific tier wins,
/// then the highest qualifying `minimum_quantity` (best quantity break).
pub fn resolve_price(
    rows: &[bc_item_price::Model],
    customer_no: Option<&str>,
    customer_price_group: Option<&str>,
    quantity: Decimal,
    today: NaiveDate,
) -> Option<ResolvedPrice> {
    let mut best: Option<(PriceTier, &bc_item_price::Model)> = None;

    for row in rows {
        let Some(tier) = PriceTier::from_sales_type(&row.sales_type) else {
            continue;
        };

        if row.starting_date.map_or(false, |start| today < start) {
            continue;
        }
        if row.ending_date.map_or(false, |end| today > end) {
            continue;
        }
        if row.minimum_quantity > quantity {
            continue;
        }

        let applies = match tier {
            PriceTier::Customer => customer_no == Some(row.sales_code.as_str()),
            PriceTier::CustomerPriceGroup => {
                customer_price_group == Some(row.sales_code.as_str())
            }
            PriceTier::Campaign | PriceTier::AllCustomers => true,
        };
        if !applies {
            continue;
        }

        best = match best {
            None => Some((tier, row)),
            Some((best_tier, best_row)) => {
                let better = tier < best_tier
                    || (tier == best_tier && row.minimum_quantity > best_row.minimum_quantity);
                if better {
                    Some((tier, row))
                } else {
                    Some((best_tier, best_row))
                }
            }
        };
    }

    best.map(|(tier, row)| ResolvedPrice {
        unit_price: row.unit_price,
        tier,
        minimum_quantity: row.minimum_quantity,
        currency_code: row.currency_code.clone(),
    })
}

/// One row of the salesperson stock consultation.
#[derive(Debug, Serialize, ToSchema)]
pub struct StockConsultationRow {
    pub product_id: i64,
    pub code: String,
    pub designation: String,
    pub bc_item_no: Option<String>,
    /// ERP-side snapshot; advisory only
    pub bc_inventory: Option<Decimal>,
    /// Ledger-derived stock; authoritative
    pub local_stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<ResolvedPrice>,
}

/// One row of the by-location snapshot view.
#[derive(Debug, Serialize, ToSchema)]
pub struct StockByLocationRow {
    pub location_code: String,
    pub location_name: String,
    pub item_no: String,
    pub item_name: String,
    pub inventory: Option<Decimal>,
}

#[derive(Clone)]
pub struct StockQueryService {
    db: Arc<DatabaseConnection>,
}

impl StockQueryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Stock consultation for one salesperson. When a customer and quantity
    /// are given, each row also carries the resolved tier price.
    pub async fn consultation(
        &self,
        salesperson_id: i64,
        product_id: Option<i64>,
        customer_id: Option<i64>,
        quantity: Option<Decimal>,
    ) -> Result<Vec<StockConsultationRow>, ServiceError> {
        let mut product_query =
            product::Entity::find().filter(product::Column::Active.eq(true));
        if let Some(pid) = product_id {
            product_query = product_query.filter(product::Column::Id.eq(pid));
        }
        let products = product_query.all(&*self.db).await?;

        // Fold the salesperson's full ledger once instead of per product
        let ledger_rows = StockTransactionEntity::find()
            .filter(stock_transaction::Column::SalespersonId.eq(salesperson_id))
            .all(&*self.db)
            .await?;
        let mut net_by_product: HashMap<i64, i64> = HashMap::new();
        for row in &ledger_rows {
            let signed = if row.r#type == MovementType::Entree.to_string() {
                i64::from(row.qte)
            } else {
                -i64::from(row.qte)
            };
            *net_by_product.entry(row.product_id).or_insert(0) += signed;
        }

        let item_nos: Vec<String> = products
            .iter()
            .filter_map(|p| p.bc_item_no.clone())
            .collect();
        let items = if item_nos.is_empty() {
            Vec::new()
        } else {
            bc_item::Entity::find()
                .filter(bc_item::Column::No.is_in(item_nos))
                .all(&*self.db)
                .await?
        };
        let items_by_no: HashMap<&str, &bc_item::Model> =
            items.iter().map(|i| (i.no.as_str(), i)).collect();

        let customer = match customer_id {
            Some(id) => bc_customer::Entity::find_by_id(id).one(&*self.db).await?,
            None => None,
        };

        let mut rows = Vec::with_capacity(products.len());
        for p in products {
            let item = p
                .bc_item_no
                .as_deref()
                .and_then(|no| items_by_no.get(no).copied());

            let price = match (&p.bc_item_no, &customer, quantity) {
                (Some(item_no), Some(c), Some(qte)) => {
                    self.price_for(item_no, Some(c), qte).await?
                }
                _ => None,
            };

            rows.push(StockConsultationRow {
                local_stock: net_by_product.get(&p.id).copied().unwrap_or(0),
                bc_inventory: item.and_then(|i| i.inventory),
                bc_item_no: p.bc_item_no.clone(),
                product_id: p.id,
                code: p.code,
                designation: p.designation,
                price,
            });
        }

        Ok(rows)
    }

    /// ERP snapshot by location: every mirrored location crossed with the
    /// mirrored item inventory. Advisory data only.
    pub async fn by_location(
        &self,
        location_code: Option<&str>,
    ) -> Result<Vec<StockByLocationRow>, ServiceError> {
        let mut location_query = bc_location::Entity::find();
        if let Some(code) = location_code {
            location_query = location_query.filter(bc_location::Column::Code.eq(code));
        }
        let locations = location_query.all(&*self.db).await?;
        let items = bc_item::Entity::find().all(&*self.db).await?;

        let mut rows = Vec::with_capacity(locations.len() * items.len());
        for location in &locations {
            for item in &items {
                rows.push(StockByLocationRow {
                    location_code: location.code.clone(),
                    location_name: location.display_name.clone(),
                    item_no: item.no.clone(),
                    item_name: item.display_name.clone(),
                    inventory: item.inventory,
                });
            }
        }

        Ok(rows)
    }

    /// Resolve the price of one item for a customer at a quantity, as of
    /// today. `None` when no price row qualifies.
    pub async fn price_for(
        &self,
        item_no: &str,
        customer: Option<&bc_customer::Model>,
        quantity: Decimal,
    ) -> Result<Option<ResolvedPrice>, ServiceError> {
        let rows = bc_item_price::Entity::find()
            .filter(bc_item_price::Column::ItemNo.eq(item_no))
            .all(&*self.db)
            .await?;

        Ok(resolve_price(
            &rows,
            customer.map(|c| c.no.as_str()),
            customer.and_then(|c| c.price_group.as_deref()),
            quantity,
            Utc::now().date_naive(),
        ))
    }

    /// Like [`Self::price_for`], but errors with `NoPriceFound` when nothing
    /// qualifies. Used by the price lookup endpoint.
    pub async fn require_price(
        &self,
        item_no: &str,
        customer_id: Option<i64>,
        quantity: Decimal,
    ) -> Result<ResolvedPrice, ServiceError> {
        let customer = match customer_id {
            Some(id) => bc_customer::Entity::find_by_id(id).one(&*self.db).await?,
            None => None,
        };

        self.price_for(item_no, customer.as_ref(), quantity)
            .await?
            .ok_or_else(|| {
                ServiceError::NoPriceFound(format!(
                    "item {} at quantity {} has no applicable price row",
                    item_no, quantity
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn price_row(
        sales_type: &str,
        sales_code: &str,
        min_qty: Decimal,
        unit_price: Decimal,
    ) -> bc_item_price::Model {
        bc_item_price::Model {
            id: 0,
            item_no: "ITEM-X".into(),
            sales_type: sales_type.into(),
            sales_code: sales_code.into(),
            minimum_quantity: min_qty,
            unit_price,
            currency_code: None,
            starting_date: None,
            ending_date: None,
            etag: None,
            last_modified: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn customer_tier_beats_all_customers() {
        let rows = vec![
            price_row("All Customers", "", dec!(1), dec!(10)),
            price_row("Customer", "C1", dec!(5), dec!(8)),
        ];

        let resolved = resolve_price(&rows, Some("C1"), None, dec!(6), today()).unwrap();
        assert_eq!(resolved.unit_price, dec!(8));
        assert_eq!(resolved.tier, PriceTier::Customer);
    }

    #[test]
    fn customer_tier_ignored_for_other_customers() {
        let rows = vec![
            price_row("All Customers", "", dec!(1), dec!(10)),
            price_row("Customer", "C1", dec!(5), dec!(8)),
        ];

        let resolved = resolve_price(&rows, Some("C2"), None, dec!(6), today()).unwrap();
        assert_eq!(resolved.unit_price, dec!(10));
        assert_eq!(resolved.tier, PriceTier::AllCustomers);
    }

    #[test]
    fn highest_qualifying_quantity_break_wins_within_a_tier() {
        let rows = vec![
            price_row("All Customers", "", dec!(1), dec!(10)),
            price_row("All Customers", "", dec!(12), dec!(7)),
            price_row("All Customers", "", dec!(48), dec!(5)),
        ];

        let resolved = resolve_price(&rows, None, None, dec!(20), today()).unwrap();
        assert_eq!(resolved.minimum_quantity, dec!(12));
        assert_eq!(resolved.unit_price, dec!(7));
    }

    #[test]
    fn price_group_beats_campaign_but_loses_to_customer() {
        let rows = vec![
            price_row("Campaign", "CAMP-1", dec!(1), dec!(9)),
            price_row("Customer Price Group", "WHOLESALE", dec!(1), dec!(8)),
            price_row("Customer", "C1", dec!(1), dec!(7)),
        ];

        let resolved =
            resolve_price(&rows, Some("C1"), Some("WHOLESALE"), dec!(1), today()).unwrap();
        assert_eq!(resolved.tier, PriceTier::Customer);

        let resolved =
            resolve_price(&rows, Some("C9"), Some("WHOLESALE"), dec!(1), today()).unwrap();
        assert_eq!(resolved.tier, PriceTier::CustomerPriceGroup);

        let resolved = resolve_price(&rows, Some("C9"), None, dec!(1), today()).unwrap();
        assert_eq!(resolved.tier, PriceTier::Campaign);
    }

    #[test]
    fn expired_and_future_windows_are_ignored() {
        let mut active = price_row("All Customers", "", dec!(1), dec!(10));
        active.starting_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        active.ending_date = NaiveDate::from_ymd_opt(2025, 6, 30);

        let mut expired = price_row("All Customers", "", dec!(1), dec!(4));
        expired.ending_date = NaiveDate::from_ymd_opt(2025, 1, 31);

        let mut future = price_row("All Customers", "", dec!(1), dec!(3));
        future.starting_date = NaiveDate::from_ymd_opt(2025, 12, 1);

        let rows = vec![expired, future, active];
        let resolved = resolve_price(&rows, None, None, dec!(1), today()).unwrap();
        assert_eq!(resolved.unit_price, dec!(10));
    }

    #[test]
    fn no_qualifying_row_returns_none() {
        let rows = vec![price_row("All Customers", "", dec!(10), dec!(10))];
        assert!(resolve_price(&rows, None, None, dec!(2), today()).is_none());

        let rows = vec![price_row("Customer", "C1", dec!(1), dec!(10))];
        assert!(resolve_price(&rows, Some("C2"), None, dec!(5), today()).is_none());
    }

    #[test]
    fn unknown_sales_type_rows_are_skipped() {
        let rows = vec![
            price_row("Weird Tier", "", dec!(1), dec!(1)),
            price_row("All Customers", "", dec!(1), dec!(10)),
        ];
        let resolved = resolve_price(&rows, None, None, dec!(5), today()).unwrap();
        assert_eq!(resolved.unit_price, dec!(10));
    }

    proptest! {
        /// Whatever wins, it must actually qualify for the request.
        #[test]
        fn resolved_price_always_comes_from_a_qualifying_row(
            min_qtys in proptest::collection::vec(0u32..100, 1..12),
            qty in 0u32..100,
        ) {
            let rows: Vec<_> = min_qtys
                .iter()
                .map(|m| price_row("All Customers", "", Decimal::from(*m), Decimal::from(*m * 2)))
                .collect();

            let quantity = Decimal::from(qty);
            match resolve_price(&rows, None, None, quantity, today()) {
                Some(resolved) => {
                    prop_assert!(resolved.minimum_quantity <= quantity);
                    // Best quantity break: no qualifying row has a higher minimum
                    let best_min = rows
                        .iter()
                        .filter(|r| r.minimum_quantity <= quantity)
                        .map(|r| r.minimum_quantity)
                        .max()
                        .unwrap();
                    prop_assert_eq!(resolved.minimum_quantity, best_min);
                }
                None => {
                    prop_assert!(rows.iter().all(|r| r.minimum_quantity > quantity));
                }
            }
        }
    }
}
