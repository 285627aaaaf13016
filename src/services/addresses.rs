use crate::{
    entities::address::{self, AddressLabel},
    errors::ServiceError,
};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    pub static ref MOBILE_RE: Regex = Regex::new(r"^[6-9]\d{9}$").unwrap();
    pub static ref PINCODE_RE: Regex = Regex::new(r"^[1-9][0-9]{5}$").unwrap();
}

pub const INDIAN_STATES: &[&str] = &[
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Andaman and Nicobar Islands",
    "Chandigarh",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Lakshadweep",
    "Puducherry",
];

fn validate_state(state: &str) -> Result<(), ValidationError> {
    if INDIAN_STATES.contains(&state) {
        Ok(())
    } else {
        let mut err = ValidationError::new("state");
        err.message = Some(format!("{} is not a valid state", state).into());
        Err(err)
    }
}

/// Blank means "no alternate phone" and clears it on update.
fn validate_alternate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() || MOBILE_RE.is_match(phone) {
        return Ok(());
    }
    let mut err = ValidationError::new("alternate_phone");
    err.message = Some("Invalid alternate phone".into());
    Err(err)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressRequest {
    #[serde(default)]
    pub label: Option<AddressLabel>,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(regex(path = "MOBILE_RE", message = "Invalid mobile number"))]
    pub mobile_number: String,
    #[validate(custom = "validate_alternate_phone")]
    pub alternate_phone: Option<String>,
    #[validate(length(min = 1, message = "Address line 1 is required"))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "District is required"))]
    pub district: String,
    #[validate(custom = "validate_state")]
    pub state: String,
    #[validate(regex(path = "PINCODE_RE", message = "Invalid pincode"))]
    pub pincode: String,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAddressRequest {
    pub label: Option<AddressLabel>,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: Option<String>,
    #[validate(regex(path = "MOBILE_RE", message = "Invalid mobile number"))]
    pub mobile_number: Option<String>,
    #[validate(custom = "validate_alternate_phone")]
    pub alternate_phone: Option<String>,
    #[validate(length(min = 1, message = "Address line 1 is required"))]
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    #[validate(custom = "validate_state")]
    pub state: Option<String>,
    #[validate(regex(path = "PINCODE_RE", message = "Invalid pincode"))]
    pub pincode: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

/// Clears `is_default` on every address of `user_id` except `keep`.
async fn unset_other_defaults<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    keep: Uuid,
) -> Result<(), ServiceError> {
    address::Entity::update_many()
        .col_expr(address::Column::IsDefault, Expr::value(false))
        .filter(address::Column::UserId.eq(user_id))
        .filter(address::Column::Id.ne(keep))
        .exec(conn)
        .await?;
    Ok(())
}

/// Deletes every address of the user.
pub async fn delete_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), ServiceError> {
    address::Entity::delete_many()
        .filter(address::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Default address first, then newest.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Looks up an address owned by `user_id`; other users' addresses are not found.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<address::Model, ServiceError> {
        find_owned(&*self.db, user_id, id).await
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let existing = address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .count(&txn)
            .await?;
        let is_default = request.is_default || existing == 0;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let created = address::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            label: Set(request.label.unwrap_or(AddressLabel::Home)),
            full_name: Set(request.full_name),
            mobile_number: Set(request.mobile_number),
            alternate_phone: Set(request.alternate_phone.filter(|p| !p.trim().is_empty())),
            address_line1: Set(request.address_line1),
            address_line2: Set(request.address_line2),
            landmark: Set(request.landmark),
            city: Set(request.city),
            district: Set(request.district),
            state: Set(request.state),
            pincode: Set(request.pincode),
            country: Set(request.country.unwrap_or_else(|| "India".to_string())),
            is_default: Set(is_default),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        if is_default {
            unset_other_defaults(&txn, user_id, id).await?;
        }
        txn.commit().await?;

        info!(%user_id, address_id = %id, is_default, "address created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        request: UpdateAddressRequest,
    ) -> Result<address::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let current = find_owned(&txn, user_id, id).await?;
        let mut active: address::ActiveModel = current.into();

        if let Some(label) = request.label {
            active.label = Set(label);
        }
        if let Some(v) = request.full_name {
            active.full_name = Set(v);
        }
        if let Some(v) = request.mobile_number {
            active.mobile_number = Set(v);
        }
        if let Some(v) = request.alternate_phone {
            active.alternate_phone = Set(Some(v).filter(|p| !p.trim().is_empty()));
        }
        if let Some(v) = request.address_line1 {
            active.address_line1 = Set(v);
        }
        if let Some(v) = request.address_line2 {
            active.address_line2 = Set(Some(v));
        }
        if let Some(v) = request.landmark {
            active.landmark = Set(Some(v));
        }
        if let Some(v) = request.city {
            active.city = Set(v);
        }
        if let Some(v) = request.district {
            active.district = Set(v);
        }
        if let Some(v) = request.state {
            active.state = Set(v);
        }
        if let Some(v) = request.pincode {
            active.pincode = Set(v);
        }
        if let Some(v) = request.country {
            active.country = Set(v);
        }
        if let Some(is_default) = request.is_default {
            active.is_default = Set(is_default);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&txn).await?;
        if updated.is_default {
            unset_other_defaults(&txn, user_id, id).await?;
        }
        txn.commit().await?;

        Ok(updated)
    }

    /// Deletes the address; when it was the default, the newest remaining one is promoted.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let current = find_owned(&txn, user_id, id).await?;
        address::Entity::delete_by_id(current.id).exec(&txn).await?;

        if current.is_default {
            if let Some(next) = address::Entity::find()
                .filter(address::Column::UserId.eq(user_id))
                .order_by_desc(address::Column::CreatedAt)
                .one(&txn)
                .await?
            {
                let mut active: address::ActiveModel = next.into();
                active.is_default = Set(true);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
            }
        }
        txn.commit().await?;

        info!(%user_id, address_id = %id, "address deleted");
        Ok(())
    }
}

async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    id: Uuid,
) -> Result<address::Model, ServiceError> {
    address::Entity::find_by_id(id)
        .filter(address::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Address"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateAddressRequest {
        CreateAddressRequest {
            label: None,
            full_name: "Asha Rao".into(),
            mobile_number: "9876543210".into(),
            alternate_phone: None,
            address_line1: "12 MG Road".into(),
            address_line2: None,
            landmark: None,
            city: "Bengaluru".into(),
            district: "Bengaluru Urban".into(),
            state: "Karnataka".into(),
            pincode: "560001".into(),
            country: None,
            is_default: false,
        }
    }

    #[test]
    fn accepts_a_well_formed_address() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_bad_mobile_pincode_and_state() {
        let mut req = valid();
        req.mobile_number = "1234567890".into();
        assert!(req.validate().is_err());

        let mut req = valid();
        req.pincode = "012345".into();
        assert!(req.validate().is_err());

        let mut req = valid();
        req.state = "Atlantis".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn alternate_phone_is_checked_only_when_present() {
        let mut req = valid();
        req.alternate_phone = Some("5555555555".into());
        assert!(req.validate().is_err());
        req.alternate_phone = Some("7012345678".into());
        assert!(req.validate().is_ok());
        req.alternate_phone = Some(String::new());
        assert!(req.validate().is_ok());

        let update = UpdateAddressRequest {
            alternate_phone: Some("".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }
}
