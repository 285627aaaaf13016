use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_user_tables::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_cart_tables::Migration),
            Box::new(m20240101_000004_create_order_tables::Migration),
            Box::new(m20240101_000005_create_payments_table::Migration),
            Box::new(m20240101_000006_create_shipping_and_currency_tables::Migration),
        ]
    }
}

/// Builds a (possibly unique) index statement.
fn index<T, C>(name: &str, table: T, cols: &[C], unique: bool) -> IndexCreateStatement
where
    T: IntoIden + 'static,
    C: IntoIden + Clone,
{
    let mut stmt = Index::create();
    stmt.if_not_exists().name(name).table(table);
    for col in cols {
        stmt.col(col.clone());
    }
    if unique {
        stmt.unique();
    }
    stmt.to_owned()
}

/// Money column. SQLite rejects a declared precision above 16.
fn money<C: IntoIden>(manager: &SchemaManager, col: C, scale: u32) -> ColumnDef {
    let precision = match manager.get_database_backend() {
        sea_orm::DbBackend::Sqlite => 16,
        _ => 19,
    };
    ColumnDef::new(col).decimal_len(precision, scale).to_owned()
}

mod m20240101_000001_create_user_tables {
    use super::index;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_user_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Users::Email).string_len(255).not_null())
                        .col(ColumnDef::new(Users::Phone).string_len(20).null())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("user"),
                        )
                        .col(
                            ColumnDef::new(Users::IsVerified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Users::VerificationTokenHash).string_len(64).null())
                        .col(
                            ColumnDef::new(Users::VerificationExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Users::ResetTokenHash).string_len(64).null())
                        .col(
                            ColumnDef::new(Users::ResetExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::LastLoginAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index("idx_users_email", Users::Table, &[Users::Email], true))
                .await?;
            manager
                .create_index(index("idx_users_phone", Users::Table, &[Users::Phone], true))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Otps::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Otps::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Otps::UserId).uuid().not_null())
                        .col(ColumnDef::new(Otps::Code).string_len(6).not_null())
                        .col(
                            ColumnDef::new(Otps::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Otps::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index("idx_otps_user_id", Otps::Table, &[Otps::UserId], false))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RefreshTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RefreshTokens::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RefreshTokens::UserId).uuid().not_null())
                        .col(ColumnDef::new(RefreshTokens::TokenId).string_len(64).not_null())
                        .col(
                            ColumnDef::new(RefreshTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::RevokedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_refresh_tokens_token_id",
                    RefreshTokens::Table,
                    &[RefreshTokens::TokenId],
                    true,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_refresh_tokens_user_id",
                    RefreshTokens::Table,
                    &[RefreshTokens::UserId],
                    false,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Otps::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        Phone,
        PasswordHash,
        Role,
        IsVerified,
        VerificationTokenHash,
        VerificationExpiresAt,
        ResetTokenHash,
        ResetExpiresAt,
        LastLoginAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum Otps {
        Table,
        Id,
        UserId,
        Code,
        ExpiresAt,
        CreatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum RefreshTokens {
        Table,
        Id,
        UserId,
        TokenId,
        CreatedAt,
        ExpiresAt,
        RevokedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use super::{index, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
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
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string_len(200).not_null())
                        .col(ColumnDef::new(Products::Description).text().not_null())
                        .col(ColumnDef::new(Products::Details).text().null())
                        .col(ColumnDef::new(Products::Category).string_len(16).not_null())
                        .col(ColumnDef::new(Products::Images).json().not_null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_products_category",
                    Products::Table,
                    &[Products::Category],
                    false,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_products_created_at",
                    Products::Table,
                    &[Products::CreatedAt],
                    false,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::Size).string_len(32).not_null())
                        .col(ColumnDef::new(ProductVariants::Color).string_len(32).not_null())
                        .col(
                            money(manager, ProductVariants::Price, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_product_variants_product_id",
                    ProductVariants::Table,
                    &[ProductVariants::ProductId],
                    false,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Reviews::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Reviews::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Reviews::UserId).uuid().not_null())
                        .col(ColumnDef::new(Reviews::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Reviews::Rating).integer().not_null())
                        .col(ColumnDef::new(Reviews::Title).string_len(100).null())
                        .col(ColumnDef::new(Reviews::Comment).text().null())
                        .col(
                            ColumnDef::new(Reviews::Status)
                                .string_len(16)
                                .not_null()
                                .default("approved"),
                        )
                        .col(
                            ColumnDef::new(Reviews::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reviews::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_reviews_user_product",
                    Reviews::Table,
                    &[Reviews::UserId, Reviews::ProductId],
                    true,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_reviews_product_id",
                    Reviews::Table,
                    &[Reviews::ProductId],
                    false,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reviews::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum Products {
        Table,
        Id,
        Name,
        Description,
        Details,
        Category,
        Images,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum ProductVariants {
        Table,
        Id,
        ProductId,
        Size,
        Color,
        Price,
        Quantity,
    }

    #[derive(DeriveIden, Clone)]
    enum Reviews {
        Table,
        Id,
        UserId,
        ProductId,
        Rating,
        Title,
        Comment,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_cart_tables {
    use super::{index, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::UserId).uuid().null())
                        .col(ColumnDef::new(Carts::GuestToken).string_len(64).null())
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index("idx_carts_user_id", Carts::Table, &[Carts::UserId], true))
                .await?;
            manager
                .create_index(index(
                    "idx_carts_guest_token",
                    Carts::Table,
                    &[Carts::GuestToken],
                    true,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::VariantId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(money(manager, CartItems::Price, 4).not_null())
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_cart_items_cart_variant",
                    CartItems::Table,
                    &[CartItems::CartId, CartItems::VariantId],
                    true,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Wishlists::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Wishlists::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Wishlists::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Wishlists::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_wishlists_user_id",
                    Wishlists::Table,
                    &[Wishlists::UserId],
                    true,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WishlistItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WishlistItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WishlistItems::WishlistId).uuid().not_null())
                        .col(ColumnDef::new(WishlistItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(WishlistItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_wishlist_items_wishlist_product",
                    WishlistItems::Table,
                    &[WishlistItems::WishlistId, WishlistItems::ProductId],
                    true,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WishlistItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Wishlists::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum Carts {
        Table,
        Id,
        UserId,
        GuestToken,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum CartItems {
        Table,
        Id,
        CartId,
        ProductId,
        VariantId,
        Quantity,
        Price,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum Wishlists {
        Table,
        Id,
        UserId,
        CreatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum WishlistItems {
        Table,
        Id,
        WishlistId,
        ProductId,
        CreatedAt,
    }
}

mod m20240101_000004_create_order_tables {
    use super::{index, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Addresses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Addresses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Addresses::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Addresses::Label)
                                .string_len(8)
                                .not_null()
                                .default("Home"),
                        )
                        .col(ColumnDef::new(Addresses::FullName).string_len(100).not_null())
                        .col(ColumnDef::new(Addresses::MobileNumber).string_len(10).not_null())
                        .col(ColumnDef::new(Addresses::AlternatePhone).string_len(10).null())
                        .col(ColumnDef::new(Addresses::AddressLine1).string().not_null())
                        .col(ColumnDef::new(Addresses::AddressLine2).string().null())
                        .col(ColumnDef::new(Addresses::Landmark).string().null())
                        .col(ColumnDef::new(Addresses::City).string_len(100).not_null())
                        .col(ColumnDef::new(Addresses::District).string_len(100).not_null())
                        .col(ColumnDef::new(Addresses::State).string_len(100).not_null())
                        .col(ColumnDef::new(Addresses::Pincode).string_len(6).not_null())
                        .col(
                            ColumnDef::new(Addresses::Country)
                                .string_len(64)
                                .not_null()
                                .default("India"),
                        )
                        .col(
                            ColumnDef::new(Addresses::IsDefault)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Addresses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Addresses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_addresses_user_id",
                    Addresses::Table,
                    &[Addresses::UserId],
                    false,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                        .col(ColumnDef::new(Orders::AddressId).uuid().not_null())
                        .col(
                            money(manager, Orders::TotalAmount, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentMethod)
                                .string_len(16)
                                .not_null()
                                .default("COD"),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentStatus)
                                .string_len(16)
                                .not_null()
                                .default("Pending"),
                        )
                        .col(
                            ColumnDef::new(Orders::OrderStatus)
                                .string_len(16)
                                .not_null()
                                .default("Processing"),
                        )
                        .col(
                            ColumnDef::new(Orders::EstimatedDelivery)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::PaymentDetails).json().null())
                        .col(ColumnDef::new(Orders::CancellationReason).string().null())
                        .col(
                            ColumnDef::new(Orders::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::ReturnReason).string().null())
                        .col(ColumnDef::new(Orders::ReturnDescription).text().null())
                        .col(
                            ColumnDef::new(Orders::ReturnRequestedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::ReturnStatus).string_len(16).null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_orders_order_number",
                    Orders::Table,
                    &[Orders::OrderNumber],
                    true,
                ))
                .await?;
            manager
                .create_index(index("idx_orders_user_id", Orders::Table, &[Orders::UserId], false))
                .await?;
            manager
                .create_index(index(
                    "idx_orders_created_at",
                    Orders::Table,
                    &[Orders::CreatedAt],
                    false,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::VariantId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string_len(200).not_null())
                        .col(ColumnDef::new(OrderItems::Size).string_len(32).not_null())
                        .col(ColumnDef::new(OrderItems::Color).string_len(32).not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(money(manager, OrderItems::Price, 4).not_null())
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_order_items_order_id",
                    OrderItems::Table,
                    &[OrderItems::OrderId],
                    false,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Addresses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum Addresses {
        Table,
        Id,
        UserId,
        Label,
        FullName,
        MobileNumber,
        AlternatePhone,
        AddressLine1,
        AddressLine2,
        Landmark,
        City,
        District,
        State,
        Pincode,
        Country,
        IsDefault,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        UserId,
        AddressId,
        TotalAmount,
        PaymentMethod,
        PaymentStatus,
        OrderStatus,
        EstimatedDelivery,
        PaymentDetails,
        CancellationReason,
        CancelledAt,
        ReturnReason,
        ReturnDescription,
        ReturnRequestedAt,
        ReturnStatus,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        VariantId,
        ProductName,
        Size,
        Color,
        Quantity,
        Price,
    }
}

mod m20240101_000005_create_payments_table {
    use super::{index, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().null())
                        .col(ColumnDef::new(Payments::UserId).uuid().not_null())
                        .col(money(manager, Payments::Amount, 4).not_null())
                        .col(
                            ColumnDef::new(Payments::Currency)
                                .string_len(3)
                                .not_null()
                                .default("INR"),
                        )
                        .col(
                            ColumnDef::new(Payments::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Payments::Receipt).string_len(64).not_null())
                        .col(ColumnDef::new(Payments::GatewayOrderId).string_len(64).not_null())
                        .col(ColumnDef::new(Payments::GatewayPaymentId).string_len(64).null())
                        .col(ColumnDef::new(Payments::Signature).string_len(128).null())
                        .col(ColumnDef::new(Payments::FailureReason).string().null())
                        .col(ColumnDef::new(Payments::RefundId).string_len(64).null())
                        .col(money(manager, Payments::RefundAmount, 4).null())
                        .col(
                            ColumnDef::new(Payments::RefundedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_payments_gateway_order_id",
                    Payments::Table,
                    &[Payments::GatewayOrderId],
                    true,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_payments_gateway_payment_id",
                    Payments::Table,
                    &[Payments::GatewayPaymentId],
                    true,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_payments_order_id",
                    Payments::Table,
                    &[Payments::OrderId],
                    false,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum Payments {
        Table,
        Id,
        OrderId,
        UserId,
        Amount,
        Currency,
        Status,
        Receipt,
        GatewayOrderId,
        GatewayPaymentId,
        Signature,
        FailureReason,
        RefundId,
        RefundAmount,
        RefundedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_shipping_and_currency_tables {
    use super::{index, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_shipping_and_currency_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShippingZones::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingZones::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShippingZones::Name).string_len(100).not_null())
                        .col(ColumnDef::new(ShippingZones::Countries).json().not_null())
                        .col(ColumnDef::new(ShippingZones::States).json().not_null())
                        .col(ColumnDef::new(ShippingZones::PostalCodes).json().not_null())
                        .col(ColumnDef::new(ShippingZones::Rates).json().not_null())
                        .col(
                            money(manager, ShippingZones::TaxRate, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShippingZones::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ShippingZones::Priority)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShippingZones::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingZones::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Currencies::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Currencies::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Currencies::Code).string_len(3).not_null())
                        .col(ColumnDef::new(Currencies::Name).string_len(64).not_null())
                        .col(ColumnDef::new(Currencies::Symbol).string_len(8).not_null())
                        .col(
                            money(manager, Currencies::ExchangeRate, 6)
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Currencies::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Currencies::IsBaseCurrency)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Currencies::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Currencies::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(index(
                    "idx_currencies_code",
                    Currencies::Table,
                    &[Currencies::Code],
                    true,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Currencies::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShippingZones::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum ShippingZones {
        Table,
        Id,
        Name,
        Countries,
        States,
        PostalCodes,
        Rates,
        TaxRate,
        IsActive,
        Priority,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden, Clone)]
    enum Currencies {
        Table,
        Id,
        Code,
        Name,
        Symbol,
        ExchangeRate,
        IsActive,
        IsBaseCurrency,
        CreatedAt,
        UpdatedAt,
    }
}
