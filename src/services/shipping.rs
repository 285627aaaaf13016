use crate::{
    entities::shipping_zone::{self, EstimatedDays, RateType, ShippingRate, ZoneState},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "postal_code", alias = "pincode")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderDetails {
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub weight: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculateShippingRequest {
    pub address: ShippingAddress,
    #[serde(default, alias = "orderDetails")]
    pub order: OrderDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingMethodsRequest {
    pub address: ShippingAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub zone: String,
    pub name: String,
    pub cost: Decimal,
    pub estimated_days: Option<EstimatedDays>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShippingMethods {
    pub zone: String,
    pub rates: Vec<ShippingRate>,
}

fn validate_rates(rates: &[ShippingRate]) -> Result<(), ValidationError> {
    for rate in rates {
        let negative = rate.cost.is_sign_negative()
            || rate.per_kg_rate.map_or(false, |r| r.is_sign_negative());
        if negative {
            let mut err = ValidationError::new("rates");
            err.message = Some(format!("Rate {} cannot have a negative cost", rate.name).into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_countries(countries: &[String]) -> Result<(), ValidationError> {
    if countries.iter().any(|c| !c.trim().is_empty()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("countries");
        err.message = Some("At least one country is required".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateZoneRequest {
    #[validate(length(min = 1, message = "Zone name is required"))]
    pub name: String,
    #[validate(custom = "validate_countries")]
    pub countries: Vec<String>,
    #[serde(default)]
    pub states: Vec<ZoneState>,
    #[serde(default, alias = "postal_codes")]
    pub postal_codes: Vec<String>,
    #[serde(default)]
    #[validate(custom = "validate_rates")]
    pub rates: Vec<ShippingRate>,
    #[serde(default, alias = "tax_rate")]
    pub tax_rate: Decimal,
    #[serde(default = "default_active", alias = "is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateZoneRequest {
    #[validate(length(min = 1, message = "Zone name is required"))]
    pub name: Option<String>,
    #[validate(custom = "validate_countries")]
    pub countries: Option<Vec<String>>,
    pub states: Option<Vec<ZoneState>>,
    #[serde(alias = "postal_codes")]
    pub postal_codes: Option<Vec<String>>,
    #[validate(custom = "validate_rates")]
    pub rates: Option<Vec<ShippingRate>>,
    #[serde(alias = "tax_rate")]
    pub tax_rate: Option<Decimal>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
    pub priority: Option<i32>,
}

/// Whether the address falls inside the zone.
pub fn zone_contains(zone: &shipping_zone::Model, address: &ShippingAddress) -> bool {
    if !zone.country_list().iter().any(|c| c == &address.country) {
        return false;
    }

    let states = zone.state_list();
    if !states.is_empty() {
        let matched = states.iter().any(|s| {
            s.country == address.country && Some(s.state.as_str()) == address.state.as_deref()
        });
        if !matched {
            return false;
        }
    }

    let postal_codes = zone.postal_code_list();
    if !postal_codes.is_empty() {
        return address
            .postal_code
            .as_ref()
            .map_or(false, |code| postal_codes.iter().any(|p| p == code.trim()));
    }
    true
}

/// Cost of `rate` for the order, or `None` when the rate does not apply.
pub fn rate_cost(rate: &ShippingRate, order: &OrderDetails) -> Option<Decimal> {
    match rate.rate_type {
        RateType::Flat => Some(rate.cost),
        RateType::Free => {
            let min = rate.min_order_amount?;
            (order.subtotal >= min).then_some(rate.cost)
        }
        RateType::PriceBased => {
            let min = rate.min_order_amount?;
            let max = rate.max_order_amount?;
            (order.subtotal >= min && order.subtotal <= max).then_some(rate.cost)
        }
        RateType::WeightBased => {
            let weight = order.weight?;
            let min = rate.min_weight?;
            let max = rate.max_weight?;
            if weight < min || weight > max {
                return None;
            }
            Some(rate.cost + weight * rate.per_kg_rate.unwrap_or_default())
        }
    }
}

/// Cheapest applicable rate; the first one listed wins a tie.
pub fn cheapest_rate(rates: &[ShippingRate], order: &OrderDetails) -> Option<(ShippingRate, Decimal)> {
    let mut best: Option<(ShippingRate, Decimal)> = None;
    for rate in rates {
        if let Some(cost) = rate_cost(rate, order) {
            if best.as_ref().map_or(true, |(_, current)| cost < *current) {
                best = Some((rate.clone(), cost));
            }
        }
    }
    best
}

#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
}

impl ShippingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active zones, lowest priority value first.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<shipping_zone::Model>, ServiceError> {
        Ok(shipping_zone::Entity::find()
            .filter(shipping_zone::Column::IsActive.eq(true))
            .order_by_asc(shipping_zone::Column::Priority)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<shipping_zone::Model, ServiceError> {
        shipping_zone::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No shipping zone found with that ID".to_string()))
    }

    async fn zone_for(&self, address: &ShippingAddress) -> Result<shipping_zone::Model, ServiceError> {
        self.list_active()
            .await?
            .into_iter()
            .find(|zone| zone_contains(zone, address))
            .ok_or_else(|| {
                ServiceError::NotFound("No shipping zone available for this address".to_string())
            })
    }

    #[instrument(skip(self, request), fields(country = %request.address.country))]
    pub async fn calculate(
        &self,
        request: CalculateShippingRequest,
    ) -> Result<ShippingQuote, ServiceError> {
        let zone = self.zone_for(&request.address).await?;
        let (rate, cost) = cheapest_rate(&zone.rate_list(), &request.order).ok_or_else(|| {
            ServiceError::NotFound("No applicable shipping rate found".to_string())
        })?;

        Ok(ShippingQuote {
            zone: zone.name,
            name: rate.name,
            cost: cost.round_dp(2),
            estimated_days: rate.estimated_days,
        })
    }

    pub async fn methods(
        &self,
        request: ShippingMethodsRequest,
    ) -> Result<ShippingMethods, ServiceError> {
        let zone = self.zone_for(&request.address).await?;
        let rates = zone.rate_list();
        Ok(ShippingMethods {
            zone: zone.name,
            rates,
        })
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateZoneRequest,
    ) -> Result<shipping_zone::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let created = shipping_zone::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            countries: Set(serde_json::to_value(request.countries)?),
            states: Set(serde_json::to_value(request.states)?),
            postal_codes: Set(serde_json::to_value(request.postal_codes)?),
            rates: Set(serde_json::to_value(request.rates)?),
            tax_rate: Set(request.tax_rate),
            is_active: Set(request.is_active),
            priority: Set(request.priority),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(zone_id = %created.id, "shipping zone created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateZoneRequest,
    ) -> Result<shipping_zone::Model, ServiceError> {
        request.validate()?;
        let mut active: shipping_zone::ActiveModel = self.get(id).await?.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(countries) = request.countries {
            active.countries = Set(serde_json::to_value(countries)?);
        }
        if let Some(states) = request.states {
            active.states = Set(serde_json::to_value(states)?);
        }
        if let Some(codes) = request.postal_codes {
            active.postal_codes = Set(serde_json::to_value(codes)?);
        }
        if let Some(rates) = request.rates {
            active.rates = Set(serde_json::to_value(rates)?);
        }
        if let Some(tax_rate) = request.tax_rate {
            active.tax_rate = Set(tax_rate);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(priority) = request.priority {
            active.priority = Set(priority);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = shipping_zone::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(
                "No shipping zone found with that ID".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn rate(name: &str, rate_type: RateType, cost: Decimal) -> ShippingRate {
        ShippingRate {
            name: name.into(),
            rate_type,
            cost,
            min_order_amount: None,
            max_order_amount: None,
            min_weight: None,
            max_weight: None,
            per_kg_rate: None,
            estimated_days: None,
        }
    }

    fn zone(states: serde_json::Value, postal_codes: serde_json::Value) -> shipping_zone::Model {
        shipping_zone::Model {
            id: Uuid::new_v4(),
            name: "South".into(),
            countries: json!(["India"]),
            states,
            postal_codes,
            rates: json!([]),
            tax_rate: Decimal::ZERO,
            is_active: true,
            priority: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn address(state: &str, postal_code: &str) -> ShippingAddress {
        ShippingAddress {
            country: "India".into(),
            state: Some(state.into()),
            postal_code: Some(postal_code.into()),
        }
    }

    #[test]
    fn free_rate_needs_its_minimum() {
        let mut free = rate("Free", RateType::Free, Decimal::ZERO);
        free.min_order_amount = Some(dec!(500));
        let below = OrderDetails { subtotal: dec!(499), weight: None };
        let above = OrderDetails { subtotal: dec!(500), weight: None };
        assert_eq!(rate_cost(&free, &below), None);
        assert_eq!(rate_cost(&free, &above), Some(Decimal::ZERO));
    }

    #[test]
    fn weight_based_adds_per_kg_charge() {
        let mut heavy = rate("Heavy", RateType::WeightBased, dec!(40));
        heavy.min_weight = Some(dec!(1));
        heavy.max_weight = Some(dec!(10));
        heavy.per_kg_rate = Some(dec!(12.5));
        let order = OrderDetails { subtotal: dec!(100), weight: Some(dec!(2)) };
        assert_eq!(rate_cost(&heavy, &order), Some(dec!(65)));

        let no_weight = OrderDetails { subtotal: dec!(100), weight: None };
        assert_eq!(rate_cost(&heavy, &no_weight), None);
    }

    #[test]
    fn cheapest_applicable_rate_wins() {
        let mut band = rate("Band", RateType::PriceBased, dec!(30));
        band.min_order_amount = Some(dec!(0));
        band.max_order_amount = Some(dec!(200));
        let rates = vec![rate("Standard", RateType::Flat, dec!(50)), band];

        let (best, cost) = cheapest_rate(&rates, &OrderDetails { subtotal: dec!(150), weight: None }).unwrap();
        assert_eq!(best.name, "Band");
        assert_eq!(cost, dec!(30));

        let (best, _) = cheapest_rate(&rates, &OrderDetails { subtotal: dec!(250), weight: None }).unwrap();
        assert_eq!(best.name, "Standard");
    }

    #[test]
    fn no_rates_means_no_quote() {
        assert!(cheapest_rate(&[], &OrderDetails::default()).is_none());
    }

    #[test]
    fn zone_membership_checks_country_state_and_postal_code() {
        let open = zone(json!([]), json!([]));
        assert!(zone_contains(&open, &address("Kerala", "682001")));
        let abroad = ShippingAddress { country: "Nepal".into(), state: None, postal_code: None };
        assert!(!zone_contains(&open, &abroad));

        let by_state = zone(json!([{"country": "India", "state": "Kerala"}]), json!([]));
        assert!(zone_contains(&by_state, &address("Kerala", "682001")));
        assert!(!zone_contains(&by_state, &address("Goa", "403001")));

        let by_code = zone(json!([]), json!(["682001"]));
        assert!(zone_contains(&by_code, &address("Kerala", "682001")));
        assert!(!zone_contains(&by_code, &address("Kerala", "682002")));
    }

    #[test]
    fn negative_rate_costs_are_rejected() {
        let request = CreateZoneRequest {
            name: "North".into(),
            countries: vec!["India".into()],
            states: vec![],
            postal_codes: vec![],
            rates: vec![rate("Bad", RateType::Flat, dec!(-1))],
            tax_rate: Decimal::ZERO,
            is_active: true,
            priority: 1,
        };
        assert!(request.validate().is_err());
    }
}
