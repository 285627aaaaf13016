use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Issued refresh token, keyed by the JWT `jti`. Rotation and logout set
/// `revoked_at`; rows are removed with the user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub token_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::auth::user::Entity",
        from = "Column::UserId",
        to = "crate::auth::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<crate::auth::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn revoked_or_expired_tokens_are_unusable() {
        let now = Utc::now();
        let mut token = Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_id: "jti".into(),
            created_at: now,
            expires_at: now + Duration::hours(1),
            revoked_at: None,
        };
        assert!(token.is_usable(now));

        token.revoked_at = Some(now);
        assert!(!token.is_usable(now));

        token.revoked_at = None;
        assert!(!token.is_usable(now + Duration::hours(2)));
    }
}
