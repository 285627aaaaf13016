use crate::{entities::currency, errors::ServiceError};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_positive_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("exchange_rate");
        err.message = Some("Exchange rate must be greater than zero".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCurrencyRequest {
    #[validate(length(equal = 3, message = "Currency code must be 3 letters"))]
    pub code: String,
    #[validate(length(min = 1, message = "Currency name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Currency symbol is required"))]
    pub symbol: String,
    #[serde(default = "default_rate", alias = "exchange_rate")]
    #[validate(custom = "validate_positive_rate")]
    pub exchange_rate: Decimal,
    #[serde(default = "default_active", alias = "is_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn default_rate() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCurrencyRequest {
    #[validate(length(min = 1, message = "Currency name is required"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Currency symbol is required"))]
    pub symbol: Option<String>,
    #[serde(alias = "exchange_rate")]
    #[validate(custom = "validate_positive_rate")]
    pub exchange_rate: Option<Decimal>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    #[serde(alias = "fromCurrency")]
    pub from: String,
    #[serde(alias = "toCurrency")]
    pub to: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub converted_amount: Decimal,
}

/// Converts through the base currency, rounding each leg to 2 places.
pub fn convert_amount(amount: Decimal, from_rate: Decimal, to_rate: Decimal) -> Decimal {
    let in_base = (amount / from_rate).round_dp(2);
    (in_base * to_rate).round_dp(2)
}

#[derive(Clone)]
pub struct CurrencyService {
    db: Arc<DatabaseConnection>,
}

impl CurrencyService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_active(&self) -> Result<Vec<currency::Model>, ServiceError> {
        Ok(currency::Entity::find()
            .filter(currency::Column::IsActive.eq(true))
            .order_by_asc(currency::Column::Code)
            .all(&*self.db)
            .await?)
    }

    pub async fn base(&self) -> Result<currency::Model, ServiceError> {
        currency::Entity::find()
            .filter(currency::Column::IsBaseCurrency.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No base currency set".to_string()))
    }

    async fn find(&self, id: Uuid) -> Result<currency::Model, ServiceError> {
        currency::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No currency found with that ID".to_string()))
    }

    async fn by_code(&self, code: &str) -> Result<Option<currency::Model>, ServiceError> {
        Ok(currency::Entity::find()
            .filter(currency::Column::Code.eq(code.trim().to_uppercase()))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn convert(&self, request: ConvertRequest) -> Result<Conversion, ServiceError> {
        let invalid = || ServiceError::BadRequest("Invalid currency code".to_string());
        let source = self.by_code(&request.from).await?.ok_or_else(invalid)?;
        let target = self.by_code(&request.to).await?.ok_or_else(invalid)?;
        if source.exchange_rate.is_zero() {
            return Err(invalid());
        }

        Ok(Conversion {
            converted_amount: convert_amount(
                request.amount,
                source.exchange_rate,
                target.exchange_rate,
            ),
            from: request.from,
            to: request.to,
            amount: request.amount,
        })
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        request: CreateCurrencyRequest,
    ) -> Result<currency::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let created = currency::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(request.code.trim().to_uppercase()),
            name: Set(request.name),
            symbol: Set(request.symbol),
            exchange_rate: Set(request.exchange_rate),
            is_active: Set(request.is_active),
            is_base_currency: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;
        info!(code = %created.code, "currency created");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCurrencyRequest,
    ) -> Result<currency::Model, ServiceError> {
        request.validate()?;
        let mut active: currency::ActiveModel = self.find(id).await?.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(symbol) = request.symbol {
            active.symbol = Set(symbol);
        }
        if let Some(rate) = request.exchange_rate {
            active.exchange_rate = Set(rate);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = currency::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(
                "No currency found with that ID".to_string(),
            ));
        }
        Ok(())
    }

    /// Makes `id` the only base currency.
    #[instrument(skip(self))]
    pub async fn set_base(&self, id: Uuid) -> Result<currency::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let target = currency::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No currency found with that ID".to_string()))?;

        currency::Entity::update_many()
            .col_expr(currency::Column::IsBaseCurrency, Expr::value(false))
            .filter(currency::Column::IsBaseCurrency.eq(true))
            .exec(&txn)
            .await?;

        let mut active: currency::ActiveModel = target.into();
        active.is_base_currency = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(code = %updated.code, "base currency changed");
        Ok(updated)
    }
}
