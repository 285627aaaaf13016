use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Geographic zone with its shipping rate table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_zones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// JSON array of country names or codes
    #[sea_orm(column_type = "Json")]
    pub countries: Json,
    /// JSON array of [`ZoneState`]
    #[sea_orm(column_type = "Json")]
    pub states: Json,
    /// JSON array of postal codes
    #[sea_orm(column_type = "Json")]
    pub postal_codes: Json,
    /// JSON array of [`ShippingRate`]
    #[sea_orm(column_type = "Json")]
    pub rates: Json,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_rate: Decimal,
    pub is_active: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    pub country: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    Flat,
    WeightBased,
    PriceBased,
    Free,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedDays {
    pub min: u32,
    pub max: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub name: String,
    #[serde(rename = "type")]
    pub rate_type: RateType,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(default)]
    pub max_order_amount: Option<Decimal>,
    #[serde(default)]
    pub min_weight: Option<Decimal>,
    #[serde(default)]
    pub max_weight: Option<Decimal>,
    #[serde(default)]
    pub per_kg_rate: Option<Decimal>,
    #[serde(default)]
    pub estimated_days: Option<EstimatedDays>,
}

impl Model {
    pub fn country_list(&self) -> Vec<String> {
        serde_json::from_value(self.countries.clone()).unwrap_or_default()
    }

    pub fn state_list(&self) -> Vec<ZoneState> {
        serde_json::from_value(self.states.clone()).unwrap_or_default()
    }

    pub fn postal_code_list(&self) -> Vec<String> {
        serde_json::from_value(self.postal_codes.clone()).unwrap_or_default()
    }

    pub fn rate_list(&self) -> Vec<ShippingRate> {
        serde_json::from_value(self.rates.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
