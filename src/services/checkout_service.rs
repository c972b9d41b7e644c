use crate::config::SiteConfig;
use crate::database::DbPool;
use crate::emails::{self, PurchaseEmailData};
use crate::entities::{OrderStatus, order_entity as orders, product_entity as products};
use crate::error::{AppError, AppResult};
use crate::external::{CheckoutSessionParams, DynMailClient, EmailMessage, StripeService};
use crate::models::{CheckoutRequest, CheckoutResponse};
use crate::services::{CouponRejection, CouponService, OrderService, RedemptionOutcome};
use crate::utils::AuthUser;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use stripe::{CheckoutSessionPaymentStatus, Event, EventObject, EventType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed,
    /// 订单已处理过 (重复 webhook)
    AlreadyProcessed,
}

#[derive(Clone)]
pub struct CheckoutService {
    pool: DbPool,
    stripe_service: StripeService,
    order_service: OrderService,
    mail_client: DynMailClient,
    site: SiteConfig,
}

impl CheckoutService {
    pub fn new(
        pool: DbPool,
        stripe_service: StripeService,
        order_service: OrderService,
        mail_client: DynMailClient,
        site: SiteConfig,
    ) -> Self {
        Self {
            pool,
            stripe_service,
            order_service,
            mail_client,
            site,
        }
    }

    /// 创建订单并返回支付跳转地址
    ///
    /// 逻辑:
    /// 1. 读取上架商品, 小计 = 商品价格
    /// 2. 若提供优惠码则校验并计算折扣
    /// 3. 写入 pending 订单
    /// 4. 实付为 0 时直接完成订单, 否则创建 Stripe Checkout 会话
    pub async fn checkout(
        &self,
        user: &AuthUser,
        req: CheckoutRequest,
    ) -> AppResult<CheckoutResponse> {
        let product = products::Entity::find_by_id(req.product_id)
            .filter(products::Column::IsActive.eq(true))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", req.product_id)))?;

        let subtotal = product.price;
        let (coupon_id, discount_amount) = match req.coupon_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let (_, quote) = CouponService::quote(
                    &*self.pool,
                    code,
                    user.id,
                    product.id,
                    subtotal,
                    Utc::now(),
                )
                .await?;
                (Some(quote.coupon_id), quote.discount_amount)
            }
            _ => (None, 0),
        };
        let total = subtotal - discount_amount;

        let now = Utc::now();
        let order = orders::ActiveModel {
            user_id: Set(user.id),
            user_email: Set(user.email.clone()),
            product_id: Set(product.id),
            coupon_id: Set(coupon_id),
            subtotal: Set(subtotal),
            discount_amount: Set(discount_amount),
            total: Set(total),
            currency: Set(product.currency.clone()),
            status: Set(OrderStatus::Pending),
            stripe_session_id: Set(None),
            completed_at: Set(None),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!(
            "Order {} created for user {} (product={}, total={})",
            order.id,
            user.id,
            product.id,
            total
        );

        if total == 0 {
            // 免费订单: 优惠券名额必须在此刻拿到, 否则整单失败
            if let Err(e) = self.finalize(&order, false).await {
                self.order_service.mark_failed(order.id).await?;
                return Err(e);
            }
            return Ok(CheckoutResponse {
                order_id: order.id,
                free: true,
                redirect_url: self.success_url(order.id),
                subtotal,
                discount_amount,
                total,
            });
        }

        let success_url = self.success_url(order.id);
        let cancel_url = self.site.url(&format!("checkout/cancel?order_id={}", order.id));
        let customer_email = (!user.email.is_empty()).then_some(user.email.as_str());
        let session = match self
            .stripe_service
            .create_checkout_session(CheckoutSessionParams {
                order_id: order.id,
                product_name: &product.name,
                amount: total,
                customer_email,
                success_url: &success_url,
                cancel_url: &cancel_url,
            })
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.order_service.mark_failed(order.id).await?;
                return Err(e);
            }
        };
        self.order_service
            .attach_session(order.id, &session.id)
            .await?;

        Ok(CheckoutResponse {
            order_id: order.id,
            free: false,
            redirect_url: session.url,
            subtotal,
            discount_amount,
            total,
        })
    }

    /// Completes a paid order. Safe to call repeatedly for the same order.
    pub async fn complete_order(&self, order_id: i64) -> AppResult<CompletionOutcome> {
        let order = orders::Entity::find_by_id(order_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;
        // 已付款: 即使优惠券名额被并发用完也要完成
        self.finalize(&order, true).await
    }

    /// Dispatches a verified Stripe event. Unknown event types are ignored.
    pub async fn handle_stripe_event(&self, event: Event) -> AppResult<()> {
        let session = match event.data.object {
            EventObject::CheckoutSession(session) => session,
            _ => {
                log::debug!("Ignoring Stripe event {} ({})", event.id, event.type_);
                return Ok(());
            }
        };
        let order_id = parse_order_reference(session.client_reference_id.as_deref())?;

        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                if session.payment_status == CheckoutSessionPaymentStatus::Unpaid {
                    // 延迟支付方式, 等待 async_payment_succeeded
                    log::info!("Checkout for order {order_id} completed but not yet paid");
                    return Ok(());
                }
                self.complete_order(order_id).await?;
            }
            EventType::CheckoutSessionAsyncPaymentSucceeded => {
                self.complete_order(order_id).await?;
            }
            EventType::CheckoutSessionExpired | EventType::CheckoutSessionAsyncPaymentFailed => {
                self.order_service.mark_failed(order_id).await?;
            }
            other => {
                log::debug!("Ignoring Stripe event {} ({other})", event.id);
            }
        }
        Ok(())
    }

    fn success_url(&self, order_id: i64) -> String {
        self.site
            .url(&format!("checkout/success?order_id={order_id}"))
    }

    /// pending -> completed, redeeming the coupon in the same transaction.
    ///
    /// With `lenient`, a coupon that ran out meanwhile (globally or for this user) is
    /// logged and skipped instead of failing the order. The nested transaction keeps the
    /// order update intact.
    async fn finalize(&self, order: &orders::Model, lenient: bool) -> AppResult<CompletionOutcome> {
        let txn = self.pool.begin().await?;

        let now = Utc::now();
        let updated = orders::Entity::update_many()
            .col_expr(orders::Column::Status, OrderStatus::Completed.as_enum())
            .col_expr(orders::Column::CompletedAt, Expr::value(now))
            .col_expr(orders::Column::UpdatedAt, Expr::value(now))
            .filter(orders::Column::Id.eq(order.id))
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            txn.commit().await?;
            log::info!("Order {} already processed, skipping", order.id);
            return Ok(CompletionOutcome::AlreadyProcessed);
        }

        if let Some(coupon_id) = order.coupon_id {
            match CouponService::redeem(
                &txn,
                coupon_id,
                order.id,
                order.user_id,
                order.discount_amount,
            )
            .await
            {
                Ok(RedemptionOutcome::Redeemed) => {}
                Ok(RedemptionOutcome::AlreadyRecorded) => {
                    log::warn!("Coupon usage for order {} was already recorded", order.id);
                }
                Err(AppError::CouponRejected(
                    reason @ (CouponRejection::UsageLimitReached | CouponRejection::AlreadyUsed),
                )) if lenient => {
                    log::warn!(
                        "Coupon {} not redeemed for paid order {} ({}); honouring the order",
                        coupon_id,
                        order.id,
                        reason
                    );
                }
                Err(e) => return Err(e),
            }
        }

        txn.commit().await?;
        log::info!("Order {} completed", order.id);

        self.send_confirmation(order).await;
        Ok(CompletionOutcome::Completed)
    }

    async fn send_confirmation(&self, order: &orders::Model) {
        if order.user_email.is_empty() {
            log::warn!("Order {} has no email address, confirmation skipped", order.id);
            return;
        }
        let product = match products::Entity::find_by_id(order.product_id)
            .one(&*self.pool)
            .await
        {
            Ok(Some(product)) => product,
            Ok(None) => {
                log::error!("Product {} of order {} is gone", order.product_id, order.id);
                return;
            }
            Err(e) => {
                log::error!("Failed to load product for order {}: {e}", order.id);
                return;
            }
        };

        let template = emails::purchase_confirmation(&PurchaseEmailData {
            product_name: &product.name,
            order_id: order.id,
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            total: order.total,
            download_url: product.file_url.as_deref(),
        });
        if let Err(e) = self
            .mail_client
            .send(EmailMessage::new(order.user_email.clone(), template))
            .await
        {
            log::error!(
                "Failed to send purchase confirmation for order {}: {e}",
                order.id
            );
        }
    }
}

/// `client_reference_id` carries the order id.
pub fn parse_order_reference(reference: Option<&str>) -> AppResult<i64> {
    reference
        .and_then(|r| r.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "Checkout session has an invalid client_reference_id: {reference:?}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use crate::entities::{AppliesTo, CouponStatus, DiscountType, coupon_entity};
    use crate::external::testing::RecordingMailClient;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use uuid::Uuid;

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn product() -> products::Model {
        products::Model {
            id: 3,
            name: "Starter Kit".into(),
            slug: "starter-kit".into(),
            description: None,
            price: 5000,
            currency: "usd".into(),
            file_url: Some("https://cdn.example.com/kit.zip".into()),
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn fixed_coupon() -> coupon_entity::Model {
        coupon_entity::Model {
            id: 8,
            code: "FREEKIT".into(),
            description: None,
            discount_type: DiscountType::FixedAmount,
            discount_value: 7500,
            max_uses: Some(1),
            max_uses_per_user: None,
            starts_at: None,
            expires_at: None,
            minimum_purchase: None,
            applies_to: AppliesTo::All,
            status: CouponStatus::Active,
            current_uses: 0,
            created_at: None,
            updated_at: None,
        }
    }

    fn order(user_id: Uuid, discount_amount: i64) -> orders::Model {
        orders::Model {
            id: 21,
            user_id,
            user_email: "buyer@example.com".into(),
            product_id: 3,
            coupon_id: Some(8),
            subtotal: 5000,
            discount_amount,
            total: 5000 - discount_amount,
            currency: "usd".into(),
            status: OrderStatus::Pending,
            stripe_session_id: None,
            completed_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn once_per_user_coupon() -> coupon_entity::Model {
        coupon_entity::Model {
            max_uses: None,
            max_uses_per_user: Some(1),
            ..fixed_coupon()
        }
    }

    fn usage_count(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    /// Stripe 推送的 checkout.session.* 事件
    fn session_event(event_type: &str, payment_status: &str) -> Event {
        serde_json::from_value(json!({
            "id": "evt_test_1",
            "object": "event",
            "api_version": "2023-10-16",
            "created": 1_700_000_000,
            "livemode": false,
            "pending_webhooks": 1,
            "type": event_type,
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "object": "checkout.session",
                    "automatic_tax": { "enabled": false },
                    "client_reference_id": "21",
                    "created": 1_700_000_000,
                    "custom_fields": [],
                    "custom_text": {},
                    "expires_at": 1_700_086_400,
                    "livemode": false,
                    "mode": "payment",
                    "payment_method_types": ["card"],
                    "payment_status": payment_status,
                    "shipping_options": []
                }
            }
        }))
        .unwrap()
    }

    fn service(db: DatabaseConnection, mail: Arc<RecordingMailClient>) -> CheckoutService {
        let pool = Arc::new(db);
        CheckoutService::new(
            pool.clone(),
            StripeService::new(StripeConfig {
                secret_key: "sk_test_dummy".into(),
                webhook_secret: "whsec_dummy".into(),
            }),
            OrderService::new(pool),
            mail,
            SiteConfig {
                base_url: "https://shop.example.com".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_free_order_skips_payment() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "buyer@example.com".into(),
            is_admin: false,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product()]])
            .append_query_results([vec![fixed_coupon()]])
            .append_query_results([vec![order(user.id, 5000)]])
            // 兑换时锁定优惠券行
            .append_query_results([vec![fixed_coupon()]])
            .append_query_results([vec![product()]])
            // order -> completed, usage insert, coupon increment
            .append_exec_results([exec(1), exec(1), exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        let resp = service
            .checkout(
                &user,
                CheckoutRequest {
                    product_id: 3,
                    coupon_code: Some("freekit".into()),
                },
            )
            .await
            .unwrap();

        assert!(resp.free);
        assert_eq!(resp.total, 0);
        assert_eq!(resp.discount_amount, 5000);
        assert_eq!(
            resp.redirect_url,
            "https://shop.example.com/checkout/success?order_id=21"
        );
        let sent = mail.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "buyer@example.com");
        assert!(sent[0].subject.contains("Starter Kit"));
    }

    #[tokio::test]
    async fn test_paid_order_completes_even_if_coupon_ran_out() {
        let user_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(user_id, 1000)]])
            .append_query_results([vec![fixed_coupon()]])
            .append_query_results([vec![product()]])
            // order -> completed, usage insert, coupon increment blocked by max_uses
            .append_exec_results([exec(1), exec(1), exec(0)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        let outcome = service.complete_order(21).await.unwrap();
        assert_eq!(outcome, CompletionOutcome::Completed);
        assert_eq!(mail.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_completion_is_ignored() {
        let user_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(user_id, 1000)]])
            .append_exec_results([exec(0)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        let outcome = service.complete_order(21).await.unwrap();
        assert_eq!(outcome, CompletionOutcome::AlreadyProcessed);
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_free_order_fails_when_user_already_used_coupon() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "buyer@example.com".into(),
            is_admin: false,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product()]])
            .append_query_results([vec![once_per_user_coupon()]])
            // 报价时另一笔订单尚未完成
            .append_query_results([vec![usage_count(0)]])
            .append_query_results([vec![order(user.id, 5000)]])
            .append_query_results([vec![once_per_user_coupon()]])
            // 兑换时已包含另一笔订单和本单
            .append_query_results([vec![usage_count(2)]])
            // order -> completed, usage insert, then order -> failed
            .append_exec_results([exec(1), exec(1), exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        let err = service
            .checkout(
                &user,
                CheckoutRequest {
                    product_id: 3,
                    coupon_code: Some("FREEKIT".into()),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::CouponRejected(CouponRejection::AlreadyUsed)
        ));
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_paid_order_completes_past_per_user_limit() {
        let user_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(user_id, 1000)]])
            .append_query_results([vec![once_per_user_coupon()]])
            .append_query_results([vec![usage_count(2)]])
            .append_query_results([vec![product()]])
            // order -> completed, usage insert (rolled back with the savepoint)
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        let outcome = service.complete_order(21).await.unwrap();
        assert_eq!(outcome, CompletionOutcome::Completed);
        assert_eq!(mail.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_paid_session_event_completes_order() {
        for event_type in [
            "checkout.session.completed",
            "checkout.session.async_payment_succeeded",
        ] {
            let user_id = Uuid::new_v4();
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![order(user_id, 1000)]])
                .append_query_results([vec![fixed_coupon()]])
                .append_query_results([vec![product()]])
                .append_exec_results([exec(1), exec(1), exec(1)])
                .into_connection();
            let mail = Arc::new(RecordingMailClient::default());
            let service = service(db, mail.clone());

            service
                .handle_stripe_event(session_event(event_type, "paid"))
                .await
                .unwrap();

            let sent = mail.sent();
            assert_eq!(sent.len(), 1, "{event_type}");
            assert_eq!(sent[0].to, "buyer@example.com");
        }
    }

    #[tokio::test]
    async fn test_unpaid_completion_waits_for_async_payment() {
        // 空的 mock: 任何数据库访问都会报错
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        service
            .handle_stripe_event(session_event("checkout.session.completed", "unpaid"))
            .await
            .unwrap();
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expired_or_failed_session_marks_order_failed() {
        for event_type in [
            "checkout.session.expired",
            "checkout.session.async_payment_failed",
        ] {
            // 只有一次 pending -> failed 更新, 没有查询结果
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1)])
                .into_connection();
            let mail = Arc::new(RecordingMailClient::default());
            let service = service(db, mail.clone());

            service
                .handle_stripe_event(session_event(event_type, "unpaid"))
                .await
                .unwrap();
            assert!(mail.sent().is_empty(), "{event_type}");
        }
    }

    #[tokio::test]
    async fn test_unrelated_event_type_is_ignored() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let mail = Arc::new(RecordingMailClient::default());
        let service = service(db, mail.clone());

        service
            .handle_stripe_event(session_event("invoice.paid", "paid"))
            .await
            .unwrap();
        assert!(mail.sent().is_empty());
    }

    #[tokio::test]
    async fn test_session_without_order_reference_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service(db, Arc::new(RecordingMailClient::default()));

        let mut event = session_event("checkout.session.completed", "paid");
        if let EventObject::CheckoutSession(session) = &mut event.data.object {
            session.client_reference_id = None;
        }
        let err = service.handle_stripe_event(event).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_parse_order_reference() {
        assert_eq!(parse_order_reference(Some("42")).unwrap(), 42);
        assert!(parse_order_reference(Some("abc")).is_err());
        assert!(parse_order_reference(None).is_err());
    }
}
