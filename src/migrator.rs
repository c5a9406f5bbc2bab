use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_bc_mirror_tables::Migration),
            Box::new(m20250101_000002_create_products_table::Migration),
            Box::new(m20250101_000003_create_purchase_order_tables::Migration),
            Box::new(m20250101_000004_create_delivery_note_tables::Migration),
            Box::new(m20250101_000005_create_sales_tables::Migration),
            Box::new(m20250101_000006_create_return_invoice_tables::Migration),
            Box::new(m20250101_000007_create_stock_transactions_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_bc_mirror_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_bc_mirror_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BcCustomers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BcCustomers::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BcCustomers::BcId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BcCustomers::No).string().not_null())
                        .col(ColumnDef::new(BcCustomers::DisplayName).string().not_null())
                        .col(ColumnDef::new(BcCustomers::PhoneNumber).string().null())
                        .col(ColumnDef::new(BcCustomers::Email).string().null())
                        .col(ColumnDef::new(BcCustomers::City).string().null())
                        .col(ColumnDef::new(BcCustomers::Country).string().null())
                        .col(ColumnDef::new(BcCustomers::PriceGroup).string().null())
                        .col(ColumnDef::new(BcCustomers::Blocked).string().null())
                        .col(
                            ColumnDef::new(BcCustomers::SalesChannelId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(BcCustomers::Etag).string().null())
                        .col(ColumnDef::new(BcCustomers::LastModified).timestamp().null())
                        .col(ColumnDef::new(BcCustomers::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BcCustomers::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BcItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BcItems::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BcItems::BcId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BcItems::No).string().not_null())
                        .col(ColumnDef::new(BcItems::DisplayName).string().not_null())
                        .col(ColumnDef::new(BcItems::ItemCategoryCode).string().null())
                        .col(ColumnDef::new(BcItems::BaseUnitOfMeasure).string().null())
                        .col(ColumnDef::new(BcItems::UnitPrice).decimal().null())
                        .col(ColumnDef::new(BcItems::Inventory).decimal().null())
                        .col(ColumnDef::new(BcItems::Etag).string().null())
                        .col(ColumnDef::new(BcItems::LastModified).timestamp().null())
                        .col(ColumnDef::new(BcItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BcItems::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_bc_items_no")
                        .table(BcItems::Table)
                        .col(BcItems::No)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BcLocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BcLocations::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BcLocations::BcId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BcLocations::Code).string().not_null())
                        .col(ColumnDef::new(BcLocations::DisplayName).string().not_null())
                        .col(ColumnDef::new(BcLocations::City).string().null())
                        .col(ColumnDef::new(BcLocations::Etag).string().null())
                        .col(ColumnDef::new(BcLocations::LastModified).timestamp().null())
                        .col(ColumnDef::new(BcLocations::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BcLocations::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BcItemPrices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BcItemPrices::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BcItemPrices::ItemNo).string().not_null())
                        .col(ColumnDef::new(BcItemPrices::SalesType).string().not_null())
                        .col(ColumnDef::new(BcItemPrices::SalesCode).string().not_null())
                        .col(
                            ColumnDef::new(BcItemPrices::MinimumQuantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BcItemPrices::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(BcItemPrices::CurrencyCode).string().null())
                        .col(ColumnDef::new(BcItemPrices::StartingDate).date().null())
                        .col(ColumnDef::new(BcItemPrices::EndingDate).date().null())
                        .col(ColumnDef::new(BcItemPrices::Etag).string().null())
                        .col(
                            ColumnDef::new(BcItemPrices::LastModified)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(BcItemPrices::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BcItemPrices::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One row per (item, tier, code, quantity break, window start)
            manager
                .create_index(
                    Index::create()
                        .name("uq_bc_item_prices_key")
                        .table(BcItemPrices::Table)
                        .col(BcItemPrices::ItemNo)
                        .col(BcItemPrices::SalesType)
                        .col(BcItemPrices::SalesCode)
                        .col(BcItemPrices::MinimumQuantity)
                        .col(BcItemPrices::StartingDate)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BcItemPrices::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BcLocations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BcItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BcCustomers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BcCustomers {
        Table,
        Id,
        BcId,
        No,
        DisplayName,
        PhoneNumber,
        Email,
        City,
        Country,
        PriceGroup,
        Blocked,
        SalesChannelId,
        Etag,
        LastModified,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BcItems {
        Table,
        Id,
        BcId,
        No,
        DisplayName,
        ItemCategoryCode,
        BaseUnitOfMeasure,
        UnitPrice,
        Inventory,
        Etag,
        LastModified,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BcLocations {
        Table,
        Id,
        BcId,
        Code,
        DisplayName,
        City,
        Etag,
        LastModified,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BcItemPrices {
        Table,
        Id,
        ItemNo,
        SalesType,
        SalesCode,
        MinimumQuantity,
        UnitPrice,
        CurrencyCode,
        StartingDate,
        EndingDate,
        Etag,
        LastModified,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Designation).string().not_null())
                        .col(ColumnDef::new(Products::Unit).string().null())
                        .col(ColumnDef::new(Products::BcItemNo).string().null())
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Code,
        Designation,
        Unit,
        BcItemNo,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_purchase_order_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Reference)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::SalespersonId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::DepotLocationCode)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(ColumnDef::new(PurchaseOrders::BcNumber).string().null())
                        .col(ColumnDef::new(PurchaseOrders::BcStatus).string().null())
                        .col(ColumnDef::new(PurchaseOrders::Notes).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchase_orders_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::PurchaseOrderId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::Qte).integer().not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::QteRecue).integer().null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_order")
                                .from(
                                    PurchaseOrderLines::Table,
                                    PurchaseOrderLines::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrders {
        Table,
        Id,
        Reference,
        SalespersonId,
        DepotLocationCode,
        Status,
        BcNumber,
        BcStatus,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderLines {
        Table,
        Id,
        PurchaseOrderId,
        ProductId,
        Qte,
        QteRecue,
        CreatedAt,
    }
}

mod m20250101_000004_create_delivery_note_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_delivery_note_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryNotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryNotes::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::Reference)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::SalespersonId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryNotes::CustomerId).big_integer().null())
                        .col(ColumnDef::new(DeliveryNotes::Status).string().not_null())
                        .col(ColumnDef::new(DeliveryNotes::Notes).string().null())
                        .col(
                            ColumnDef::new(DeliveryNotes::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryNoteLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryNoteLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNoteLines::DeliveryNoteId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNoteLines::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryNoteLines::Qte).integer().not_null())
                        .col(ColumnDef::new(DeliveryNoteLines::UnitPrice).decimal().null())
                        .col(
                            ColumnDef::new(DeliveryNoteLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_note_lines_note")
                                .from(DeliveryNoteLines::Table, DeliveryNoteLines::DeliveryNoteId)
                                .to(DeliveryNotes::Table, DeliveryNotes::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryNoteLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryNotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DeliveryNotes {
        Table,
        Id,
        Reference,
        SalespersonId,
        CustomerId,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryNoteLines {
        Table,
        Id,
        DeliveryNoteId,
        ProductId,
        Qte,
        UnitPrice,
        CreatedAt,
    }
}

mod m20250101_000005_create_sales_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sales::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sales::Reference)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Sales::SalespersonId).big_integer().not_null())
                        .col(ColumnDef::new(Sales::CustomerId).big_integer().null())
                        .col(ColumnDef::new(Sales::Status).string().not_null())
                        .col(ColumnDef::new(Sales::Total).decimal().null())
                        .col(ColumnDef::new(Sales::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Sales::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleLines::SaleId).big_integer().not_null())
                        .col(ColumnDef::new(SaleLines::ProductId).big_integer().not_null())
                        .col(ColumnDef::new(SaleLines::Qte).integer().not_null())
                        .col(ColumnDef::new(SaleLines::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(SaleLines::CreatedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_lines_sale")
                                .from(SaleLines::Table, SaleLines::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        Reference,
        SalespersonId,
        CustomerId,
        Status,
        Total,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SaleLines {
        Table,
        Id,
        SaleId,
        ProductId,
        Qte,
        UnitPrice,
        CreatedAt,
    }
}

mod m20250101_000006_create_return_invoice_tables {

    use sea_orm_migration::prelude::*;

    use super::m20250101_000003_create_purchase_order_tables::PurchaseOrders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_return_invoice_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnInvoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnInvoices::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnInvoices::Reference)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ReturnInvoices::PurchaseOrderId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnInvoices::SalespersonId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnInvoices::Status).string().not_null())
                        .col(ColumnDef::new(ReturnInvoices::Reason).string().null())
                        .col(
                            ColumnDef::new(ReturnInvoices::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnInvoices::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_invoices_purchase_order")
                                .from(ReturnInvoices::Table, ReturnInvoices::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnInvoiceLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnInvoiceLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnInvoiceLines::ReturnInvoiceId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnInvoiceLines::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnInvoiceLines::Qte).integer().not_null())
                        .col(
                            ColumnDef::new(ReturnInvoiceLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_invoice_lines_invoice")
                                .from(
                                    ReturnInvoiceLines::Table,
                                    ReturnInvoiceLines::ReturnInvoiceId,
                                )
                                .to(ReturnInvoices::Table, ReturnInvoices::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnInvoiceLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ReturnInvoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReturnInvoices {
        Table,
        Id,
        Reference,
        PurchaseOrderId,
        SalespersonId,
        Status,
        Reason,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ReturnInvoiceLines {
        Table,
        Id,
        ReturnInvoiceId,
        ProductId,
        Qte,
        CreatedAt,
    }
}

mod m20250101_000007_create_stock_transactions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000007_create_stock_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransactions::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::SalespersonId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransactions::Type).string().not_null())
                        .col(ColumnDef::new(StockTransactions::Qte).integer().not_null())
                        .col(
                            ColumnDef::new(StockTransactions::SourceDocumentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::SourceDocumentId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_transactions_product_salesperson")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::ProductId)
                        .col(StockTransactions::SalespersonId)
                        .to_owned(),
                )
                .await?;

            // Database-level backstop for the idempotency key: at most one row
            // per (source document, movement type, product)
            manager
                .create_index(
                    Index::create()
                        .name("uq_stock_transactions_source")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::SourceDocumentType)
                        .col(StockTransactions::SourceDocumentId)
                        .col(StockTransactions::Type)
                        .col(StockTransactions::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockTransactions {
        Table,
        Id,
        ProductId,
        SalespersonId,
        Type,
        Qte,
        SourceDocumentType,
        SourceDocumentId,
        CreatedAt,
    }
}
