use crate::{
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        payment::{self, PaymentRecordStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{
        amount_to_paise, paise_to_amount, CreateGatewayOrder, GatewayOrder, GatewayPayment,
        PaymentGateway,
    },
    services::orders::{attach_items, restore_stock, OrderWithItems},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentOrderRequest {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub receipt: Option<String>,
    /// Internal order the payment is for
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "razorpay_order_id is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "razorpay_payment_id is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "razorpay_signature is required"))]
    pub razorpay_signature: String,
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFailureRequest {
    pub order_id: Uuid,
    pub error_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundRequest {
    /// Rupees; a full refund when omitted
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedPaymentOrder {
    pub order: GatewayOrder,
    pub key_id: String,
}

/// Gateway payment fields that are safe to show to the customer.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub created_at: i64,
    pub method: Option<String>,
}

impl From<GatewayPayment> for PaymentStatusView {
    fn from(p: GatewayPayment) -> Self {
        Self {
            id: p.id,
            status: p.status,
            amount: p.amount,
            currency: p.currency,
            created_at: p.created_at,
            method: p.method,
        }
    }
}

pub fn default_receipt(user_id: Uuid, now_ms: i64) -> String {
    format!("order_{}_{}", now_ms, user_id)
}

/// Checkout payments through the configured gateway.
///
/// Without gateway credentials every operation answers 503.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    default_currency: String,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            default_currency,
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>, ServiceError> {
        self.gateway.as_ref().ok_or_else(|| {
            ServiceError::ServiceUnavailable("Payment gateway is not configured".to_string())
        })
    }

    /// Loads an order and checks it belongs to `user_id`.
    async fn owned_order<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order"))?;
        if found.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Access denied: Order does not belong to user".to_string(),
            ));
        }
        Ok(found)
    }

    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreatePaymentOrderRequest,
    ) -> Result<CreatedPaymentOrder, ServiceError> {
        let gateway = self.gateway()?;
        let paise = amount_to_paise(request.amount)?;

        if let Some(order_id) = request.order_id {
            Self::owned_order(&*self.db, user_id, order_id).await?;
        }

        let now = Utc::now();
        let currency = request
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.default_currency.clone())
            .to_uppercase();
        let receipt = request
            .receipt
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| default_receipt(user_id, now.timestamp_millis()));

        let gateway_order = gateway
            .create_order(CreateGatewayOrder {
                amount: paise,
                currency: currency.clone(),
                receipt: receipt.clone(),
                payment_capture: 1,
                notes: json!({
                    "user_id": user_id.to_string(),
                    "created_at": now.to_rfc3339(),
                }),
            })
            .await?;

        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(request.order_id),
            user_id: Set(user_id),
            amount: Set(paise_to_amount(paise)),
            currency: Set(currency),
            status: Set(PaymentRecordStatus::Pending),
            receipt: Set(receipt),
            gateway_order_id: Set(gateway_order.id.clone()),
            gateway_payment_id: Set(None),
            signature: Set(None),
            failure_reason: Set(None),
            refund_id: Set(None),
            refund_amount: Set(None),
            refunded_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(gateway_order_id = %gateway_order.id, %user_id, "payment order created");
        Ok(CreatedPaymentOrder {
            order: gateway_order,
            key_id: gateway.key_id(),
        })
    }

    /// Confirms a checkout: the order becomes Paid and Processing.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify(
        &self,
        user_id: Uuid,
        request: VerifyPaymentRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request.validate()?;
        let gateway = self.gateway()?;

        let txn = self.db.begin().await?;
        let found = Self::owned_order(&txn, user_id, request.order_id).await?;
        if found.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::BadRequest(
                "Payment already verified for this order".to_string(),
            ));
        }
        // Cancelled orders have already given their stock back.
        if found.order_status == OrderStatus::Cancelled {
            return Err(ServiceError::BadRequest(
                "Cannot verify payment for a cancelled order".to_string(),
            ));
        }

        if !gateway.verify_signature(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        ) {
            warn!(%user_id, order_id = %request.order_id, "payment signature mismatch");
            return Err(ServiceError::BadRequest(
                "Payment verification failed: Invalid signature".to_string(),
            ));
        }

        let now = Utc::now();
        let total = found.total_amount;
        let mut active: order::ActiveModel = found.into();
        active.payment_status = Set(PaymentStatus::Paid);
        active.order_status = Set(OrderStatus::Processing);
        active.payment_details = Set(Some(json!({
            "razorpay_order_id": request.razorpay_order_id,
            "razorpay_payment_id": request.razorpay_payment_id,
            "razorpay_signature": request.razorpay_signature,
            "verified": true,
            "verifiedAt": now.to_rfc3339(),
            "verifiedBy": user_id.to_string(),
        })));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        let record = payment::Entity::find()
            .filter(payment::Column::GatewayOrderId.eq(request.razorpay_order_id.clone()))
            .one(&txn)
            .await?;
        match record {
            Some(record) => {
                let mut active: payment::ActiveModel = record.into();
                active.order_id = Set(Some(updated.id));
                active.status = Set(PaymentRecordStatus::Completed);
                active.gateway_payment_id = Set(Some(request.razorpay_payment_id.clone()));
                active.signature = Set(Some(request.razorpay_signature.clone()));
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                payment::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(Some(updated.id)),
                    user_id: Set(user_id),
                    amount: Set(total),
                    currency: Set(self.default_currency.clone()),
                    status: Set(PaymentRecordStatus::Completed),
                    receipt: Set(updated.order_number.clone()),
                    gateway_order_id: Set(request.razorpay_order_id.clone()),
                    gateway_payment_id: Set(Some(request.razorpay_payment_id.clone())),
                    signature: Set(Some(request.razorpay_signature.clone())),
                    failure_reason: Set(None),
                    refund_id: Set(None),
                    refund_amount: Set(None),
                    refunded_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }
        txn.commit().await?;

        info!(order_id = %updated.id, amount = %total, "payment verified");
        self.event_sender.send_or_log(Event::PaymentCaptured {
            order_id: updated.id,
            gateway_payment_id: request.razorpay_payment_id,
        });

        single(attach_items(&*self.db, vec![updated]).await?)
    }

    /// Records a failed checkout: the order is cancelled and its stock restored.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn record_failure(
        &self,
        user_id: Uuid,
        request: PaymentFailureRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let found = Self::owned_order(&txn, user_id, request.order_id).await?;
        if found.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::BadRequest(
                "Cannot mark successful payment as failed".to_string(),
            ));
        }

        if found.order_status != OrderStatus::Cancelled {
            restore_stock(&txn, found.id).await?;
        }

        let now = Utc::now();
        let mut details = found.payment_details.clone().unwrap_or_else(|| json!({}));
        if let Some(map) = details.as_object_mut() {
            map.insert("error_reason".into(), json!(request.error_reason));
            map.insert("failedAt".into(), json!(now.to_rfc3339()));
            map.insert("failedBy".into(), json!(user_id.to_string()));
        }

        let order_id = found.id;
        let mut active: order::ActiveModel = found.into();
        active.payment_status = Set(PaymentStatus::Failed);
        active.order_status = Set(OrderStatus::Cancelled);
        active.payment_details = Set(Some(details));
        active.cancelled_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        if let Some(record) = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.eq(PaymentRecordStatus::Pending))
            .order_by_desc(payment::Column::CreatedAt)
            .one(&txn)
            .await?
        {
            let mut active: payment::ActiveModel = record.into();
            active.status = Set(PaymentRecordStatus::Failed);
            active.failure_reason = Set(request.error_reason.clone());
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }
        txn.commit().await?;

        warn!(%order_id, reason = request.error_reason.as_deref().unwrap_or(""), "payment failure recorded");
        self.event_sender.send_or_log(Event::PaymentFailed {
            order_id,
            reason: request.error_reason,
        });

        single(attach_items(&*self.db, vec![updated]).await?)
    }

    /// Gateway status of a payment made by the caller.
    #[instrument(skip(self))]
    pub async fn status(
        &self,
        user_id: Uuid,
        payment_id: &str,
    ) -> Result<PaymentStatusView, ServiceError> {
        if !payment_id.starts_with("pay_") {
            return Err(ServiceError::BadRequest(
                "Invalid payment ID format".to_string(),
            ));
        }
        let gateway = self.gateway()?;

        let owned = payment::Entity::find()
            .filter(payment::Column::GatewayPaymentId.eq(payment_id))
            .filter(payment::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .is_some();
        if !owned {
            return Err(ServiceError::Forbidden(
                "Access denied: Payment not associated with your account".to_string(),
            ));
        }

        let fetched = gateway.fetch_payment(payment_id).await.map_err(|err| {
            if err.is_not_found() {
                ServiceError::not_found("Payment")
            } else {
                err.into()
            }
        })?;
        Ok(fetched.into())
    }

    /// Refunds a completed payment through the gateway.
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        payment_id: &str,
        amount: Option<Decimal>,
    ) -> Result<payment::Model, ServiceError> {
        let gateway = self.gateway()?;
        let record = payment::Entity::find()
            .filter(payment::Column::GatewayPaymentId.eq(payment_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Payment"))?;

        if record.status != PaymentRecordStatus::Completed {
            return Err(ServiceError::BadRequest(
                "Only completed payments can be refunded".to_string(),
            ));
        }

        let paise = match amount {
            Some(amount) => {
                if amount > record.amount {
                    return Err(ServiceError::BadRequest(
                        "Refund amount exceeds the payment amount".to_string(),
                    ));
                }
                Some(amount_to_paise(amount)?)
            }
            None => None,
        };

        let refund = gateway.refund(payment_id, paise).await?;

        let mut active: payment::ActiveModel = record.into();
        active.status = Set(PaymentRecordStatus::Refunded);
        active.refund_id = Set(Some(refund.id.clone()));
        active.refund_amount = Set(Some(paise_to_amount(refund.amount)));
        active.refunded_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(%payment_id, refund_id = %refund.id, "payment refunded");
        Ok(updated)
    }
}

fn single(mut orders: Vec<OrderWithItems>) -> Result<OrderWithItems, ServiceError> {
    orders.pop().ok_or_else(|| ServiceError::not_found("Order"))
}
