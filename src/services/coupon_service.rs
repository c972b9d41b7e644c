use crate::database::DbPool;
use crate::entities::{
    AppliesTo, CouponStatus, DiscountType, coupon_entity as coupons,
    coupon_product_entity as coupon_products, coupon_usage_entity as usages, product_entity,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CouponQuery, CouponReportResponse, CouponRequest, CouponResponse, CouponSummary,
    CouponUsageResponse, PaginatedResponse, PaginationParams, ValidateCouponRequest,
    ValidateCouponResponse,
};
use crate::utils::{format_usd, generate_coupon_code, normalize_coupon_code, validate_coupon_code};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

const RECENT_USAGE_LIMIT: u64 = 20;

/// Why a coupon cannot be applied. `Display` is the message shown to shoppers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    InvalidCode,
    Inactive,
    NotYetActive,
    Expired,
    UsageLimitReached,
    AlreadyUsed,
    MinimumNotMet { minimum: i64 },
    ProductNotEligible,
}

impl std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponRejection::InvalidCode => write!(f, "Invalid coupon code"),
            CouponRejection::Inactive => write!(f, "This coupon is no longer active"),
            CouponRejection::NotYetActive => write!(f, "This coupon is not yet active"),
            CouponRejection::Expired => write!(f, "This coupon has expired"),
            CouponRejection::UsageLimitReached => {
                write!(f, "This coupon has reached its usage limit")
            }
            CouponRejection::AlreadyUsed => write!(f, "You have already used this coupon"),
            CouponRejection::MinimumNotMet { minimum } => write!(
                f,
                "A minimum purchase of {} is required to use this coupon",
                format_usd(*minimum)
            ),
            CouponRejection::ProductNotEligible => {
                write!(f, "This coupon does not apply to this product")
            }
        }
    }
}

impl std::error::Error for CouponRejection {}

/// 规则校验所需的上下文(券本身除外)
#[derive(Debug, Clone)]
pub struct CouponContext<'a> {
    /// 购买的商品
    pub product_id: i64,
    /// 订单小计(美分)
    pub subtotal: i64,
    /// 该用户已使用此券的次数
    pub user_uses: u64,
    /// applies_to = specific_products 时的可用商品
    pub eligible_products: &'a [i64],
    /// 校验时间点
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountQuote {
    pub coupon_id: i64,
    pub discount_amount: i64,
    pub new_total: i64,
    pub is_free: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Redeemed,
    /// 该订单已记录过使用，未重复计数
    AlreadyRecorded,
}

/// Discount in cents, clamped to `0..=subtotal`. Percentages round half-up to the cent.
pub fn calculate_discount(discount_type: DiscountType, value: i64, subtotal: i64) -> i64 {
    if subtotal <= 0 || value <= 0 {
        return 0;
    }
    match discount_type {
        DiscountType::Percentage => {
            // i128 避免大额小计乘法溢出
            let raw = (i128::from(subtotal) * i128::from(value.min(100)) + 50) / 100;
            raw.min(i128::from(subtotal)) as i64
        }
        DiscountType::FixedAmount => value.min(subtotal),
    }
}

/// Applies the coupon rules in order; the first failing rule decides the rejection.
pub fn evaluate(
    coupon: &coupons::Model,
    ctx: &CouponContext<'_>,
) -> Result<DiscountQuote, CouponRejection> {
    if coupon.status != CouponStatus::Active {
        return Err(CouponRejection::Inactive);
    }
    if let Some(starts_at) = coupon.starts_at
        && ctx.now < starts_at
    {
        return Err(CouponRejection::NotYetActive);
    }
    if let Some(expires_at) = coupon.expires_at
        && ctx.now > expires_at
    {
        return Err(CouponRejection::Expired);
    }
    if !coupon.has_remaining_uses() {
        return Err(CouponRejection::UsageLimitReached);
    }
    if let Some(per_user) = coupon.max_uses_per_user
        && ctx.user_uses >= per_user.max(0) as u64
    {
        return Err(CouponRejection::AlreadyUsed);
    }
    if let Some(minimum) = coupon.minimum_purchase
        && ctx.subtotal < minimum
    {
        return Err(CouponRejection::MinimumNotMet { minimum });
    }
    if coupon.is_product_restricted() && !ctx.eligible_products.contains(&ctx.product_id) {
        return Err(CouponRejection::ProductNotEligible);
    }

    let discount_amount =
        calculate_discount(coupon.discount_type, coupon.discount_value, ctx.subtotal);
    let new_total = ctx.subtotal - discount_amount;
    Ok(DiscountQuote {
        coupon_id: coupon.id,
        discount_amount,
        new_total,
        is_free: new_total == 0,
    })
}

#[derive(Clone)]
pub struct CouponService {
    pool: DbPool,
}

impl CouponService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// 不区分大小写查找
    pub async fn find_by_code<C: ConnectionTrait>(
        db: &C,
        code: &str,
    ) -> AppResult<Option<coupons::Model>> {
        let code = normalize_coupon_code(code);
        let found = coupons::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(coupons::Column::Code)))
                    .eq(code.to_lowercase()),
            )
            .one(db)
            .await?;
        Ok(found)
    }

    /// Loads the coupon snapshot for `user_id` and evaluates it against the purchase.
    pub async fn quote<C: ConnectionTrait>(
        db: &C,
        code: &str,
        user_id: Uuid,
        product_id: i64,
        subtotal: i64,
        now: DateTime<Utc>,
    ) -> AppResult<(coupons::Model, DiscountQuote)> {
        let coupon = Self::find_by_code(db, code)
            .await?
            .ok_or(CouponRejection::InvalidCode)?;

        let user_uses = if coupon.max_uses_per_user.is_some() {
            Self::count_user_uses(db, coupon.id, user_id).await?
        } else {
            0
        };

        let eligible_products = if coupon.is_product_restricted() {
            Self::load_product_ids(db, coupon.id).await?
        } else {
            Vec::new()
        };

        let quote = evaluate(
            &coupon,
            &CouponContext {
                product_id,
                subtotal,
                user_uses,
                eligible_products: &eligible_products,
                now,
            },
        )?;
        Ok((coupon, quote))
    }

    pub async fn validate(
        &self,
        user_id: Uuid,
        req: &ValidateCouponRequest,
    ) -> AppResult<ValidateCouponResponse> {
        let (coupon, quote) = Self::quote(
            &*self.pool,
            &req.code,
            user_id,
            req.product_id,
            req.subtotal,
            Utc::now(),
        )
        .await?;

        Ok(ValidateCouponResponse {
            coupon: CouponSummary::from(&coupon),
            discount_amount: quote.discount_amount,
            new_total: quote.new_total,
            is_free: quote.is_free,
        })
    }

    async fn count_user_uses<C: ConnectionTrait>(
        db: &C,
        coupon_id: i64,
        user_id: Uuid,
    ) -> AppResult<u64> {
        let count = usages::Entity::find()
            .filter(usages::Column::CouponId.eq(coupon_id))
            .filter(usages::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        Ok(count)
    }

    /// Records one use of the coupon for `order_id` and bumps `current_uses`.
    ///
    /// Runs in its own transaction (a savepoint when `db` already is one) holding a row
    /// lock on the coupon, so concurrent checkouts by the same user are serialised. The
    /// usage row is keyed on the order so replays are no-ops. The per-user limit is
    /// re-checked against the committed usages, and the counter only moves while it is
    /// below `max_uses`. Either violation rolls everything back.
    pub async fn redeem<C: ConnectionTrait + TransactionTrait>(
        db: &C,
        coupon_id: i64,
        order_id: i64,
        user_id: Uuid,
        discount_amount: i64,
    ) -> AppResult<RedemptionOutcome> {
        let txn = db.begin().await?;

        let Some(coupon) = coupons::Entity::find_by_id(coupon_id)
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Err(CouponRejection::InvalidCode.into());
        };

        let usage = usages::ActiveModel {
            id: NotSet,
            coupon_id: Set(coupon_id),
            order_id: Set(order_id),
            user_id: Set(user_id),
            discount_amount: Set(discount_amount),
            created_at: Set(Some(Utc::now())),
        };
        let inserted = usages::Entity::insert(usage)
            .on_conflict(
                OnConflict::column(usages::Column::OrderId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if inserted == 0 {
            txn.commit().await?;
            return Ok(RedemptionOutcome::AlreadyRecorded);
        }

        // 计数已包含刚插入的这一行
        if let Some(per_user) = coupon.max_uses_per_user {
            let uses = Self::count_user_uses(&txn, coupon_id, user_id).await?;
            if uses > per_user.max(0) as u64 {
                txn.rollback().await?;
                return Err(CouponRejection::AlreadyUsed.into());
            }
        }

        let updated = coupons::Entity::update_many()
            .col_expr(
                coupons::Column::CurrentUses,
                Expr::col(coupons::Column::CurrentUses).add(1),
            )
            .col_expr(coupons::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupons::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupons::Column::MaxUses.is_null())
                    .add(
                        Expr::col(coupons::Column::CurrentUses)
                            .lt(Expr::col(coupons::Column::MaxUses)),
                    ),
            )
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Err(CouponRejection::UsageLimitReached.into());
        }

        txn.commit().await?;
        Ok(RedemptionOutcome::Redeemed)
    }

    // -----------------------------
    // 管理端
    // -----------------------------

    pub async fn create(&self, req: CouponRequest) -> AppResult<CouponResponse> {
        let code = match req.code.as_deref() {
            Some(code) => normalize_coupon_code(code),
            None => generate_coupon_code(),
        };
        validate_coupon_code(&code)?;
        if Self::find_by_code(&*self.pool, &code).await?.is_some() {
            return Err(AppError::ValidationError(format!(
                "Coupon code {code} already exists"
            )));
        }
        let product_ids = dedup_ids(&req.product_ids);

        let txn = self.pool.begin().await?;
        if !product_ids.is_empty() {
            Self::ensure_products_exist(&txn, &product_ids).await?;
        }

        let now = Utc::now();
        let coupon = coupons::ActiveModel {
            code: Set(code),
            description: Set(req.description),
            discount_type: Set(req.discount_type),
            discount_value: Set(req.discount_value),
            max_uses: Set(req.max_uses),
            max_uses_per_user: Set(req.max_uses_per_user),
            starts_at: Set(req.starts_at),
            expires_at: Set(req.expires_at),
            minimum_purchase: Set(req.minimum_purchase),
            applies_to: Set(req.applies_to),
            status: Set(req.status.unwrap_or(CouponStatus::Active)),
            current_uses: Set(0),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        Self::replace_products(&txn, coupon.id, &product_ids).await?;
        txn.commit().await?;

        log::info!("Coupon {} created (id={})", coupon.code, coupon.id);
        Ok(CouponResponse::new(coupon, product_ids))
    }

    pub async fn list(&self, query: &CouponQuery) -> AppResult<PaginatedResponse<CouponResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = coupons::Entity::find();
        if let Some(status) = query.status {
            base_query = base_query.filter(coupons::Column::Status.eq(status));
        }

        let total = base_query.clone().count(&*self.pool).await?;
        let models = base_query
            .order_by_desc(coupons::Column::CreatedAt)
            .order_by_desc(coupons::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?;

        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let mut products_by_coupon: HashMap<i64, Vec<i64>> = HashMap::new();
        if !ids.is_empty() {
            let links = coupon_products::Entity::find()
                .filter(coupon_products::Column::CouponId.is_in(ids))
                .order_by_asc(coupon_products::Column::ProductId)
                .all(&*self.pool)
                .await?;
            for link in links {
                products_by_coupon
                    .entry(link.coupon_id)
                    .or_default()
                    .push(link.product_id);
            }
        }

        let items = models
            .into_iter()
            .map(|m| {
                let product_ids = products_by_coupon.remove(&m.id).unwrap_or_default();
                CouponResponse::new(m, product_ids)
            })
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, id: i64) -> AppResult<CouponResponse> {
        let coupon = self.find_by_id(id).await?;
        let product_ids = Self::load_product_ids(&*self.pool, id).await?;
        Ok(CouponResponse::new(coupon, product_ids))
    }

    /// Replaces every editable field. `current_uses` is never touched here.
    pub async fn update(&self, id: i64, req: CouponRequest) -> AppResult<CouponResponse> {
        let existing = self.find_by_id(id).await?;

        let code = match req.code.as_deref() {
            Some(code) => normalize_coupon_code(code),
            None => existing.code.clone(),
        };
        validate_coupon_code(&code)?;
        if code != existing.code
            && let Some(other) = Self::find_by_code(&*self.pool, &code).await?
            && other.id != id
        {
            return Err(AppError::ValidationError(format!(
                "Coupon code {code} already exists"
            )));
        }
        if let Some(max_uses) = req.max_uses
            && max_uses < existing.current_uses
        {
            return Err(AppError::ValidationError(format!(
                "max_uses cannot be lower than the {} uses already recorded",
                existing.current_uses
            )));
        }
        let product_ids = dedup_ids(&req.product_ids);

        let txn = self.pool.begin().await?;
        if !product_ids.is_empty() {
            Self::ensure_products_exist(&txn, &product_ids).await?;
        }

        let status = req.status.unwrap_or(existing.status);
        let mut am = existing.into_active_model();
        am.code = Set(code);
        am.description = Set(req.description);
        am.discount_type = Set(req.discount_type);
        am.discount_value = Set(req.discount_value);
        am.max_uses = Set(req.max_uses);
        am.max_uses_per_user = Set(req.max_uses_per_user);
        am.starts_at = Set(req.starts_at);
        am.expires_at = Set(req.expires_at);
        am.minimum_purchase = Set(req.minimum_purchase);
        am.applies_to = Set(req.applies_to);
        am.status = Set(status);
        am.updated_at = Set(Some(Utc::now()));
        let coupon = am.update(&txn).await?;

        Self::replace_products(&txn, id, &product_ids).await?;
        txn.commit().await?;

        Ok(CouponResponse::new(coupon, product_ids))
    }

    /// Archived coupons stay for reporting but can no longer be applied.
    pub async fn archive(&self, id: i64) -> AppResult<CouponResponse> {
        let existing = self.find_by_id(id).await?;
        let mut am = existing.into_active_model();
        am.status = Set(CouponStatus::Archived);
        am.updated_at = Set(Some(Utc::now()));
        let coupon = am.update(&*self.pool).await?;
        let product_ids = Self::load_product_ids(&*self.pool, id).await?;
        log::info!("Coupon {} archived", coupon.code);
        Ok(CouponResponse::new(coupon, product_ids))
    }

    pub async fn set_products(&self, id: i64, product_ids: &[i64]) -> AppResult<CouponResponse> {
        let coupon = self.find_by_id(id).await?;
        let product_ids = dedup_ids(product_ids);
        if coupon.applies_to == AppliesTo::SpecificProducts && product_ids.is_empty() {
            return Err(AppError::ValidationError(
                "A product-restricted coupon needs at least one product".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;
        if !product_ids.is_empty() {
            Self::ensure_products_exist(&txn, &product_ids).await?;
        }
        Self::replace_products(&txn, id, &product_ids).await?;
        txn.commit().await?;

        Ok(CouponResponse::new(coupon, product_ids))
    }

    pub async fn report(&self, id: i64) -> AppResult<CouponReportResponse> {
        let coupon = self.get(id).await?;

        let (total_uses, unique_users, total_discount): (i64, i64, i64) = usages::Entity::find()
            .select_only()
            .column_as(Expr::cust("COUNT(*)"), "total_uses")
            .column_as(Expr::cust("COUNT(DISTINCT user_id)"), "unique_users")
            .column_as(
                Expr::cust("COALESCE(SUM(discount_amount), 0)::BIGINT"),
                "total_discount",
            )
            .filter(usages::Column::CouponId.eq(id))
            .into_tuple()
            .one(&*self.pool)
            .await?
            .unwrap_or((0, 0, 0));

        let recent_usages = usages::Entity::find()
            .filter(usages::Column::CouponId.eq(id))
            .order_by_desc(usages::Column::CreatedAt)
            .limit(RECENT_USAGE_LIMIT)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(CouponUsageResponse::from)
            .collect();

        Ok(CouponReportResponse {
            coupon,
            total_uses: total_uses.max(0) as u64,
            unique_users: unique_users.max(0) as u64,
            total_discount,
            recent_usages,
        })
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    async fn find_by_id(&self, id: i64) -> AppResult<coupons::Model> {
        coupons::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Coupon {id} not found")))
    }

    async fn load_product_ids<C: ConnectionTrait>(db: &C, coupon_id: i64) -> AppResult<Vec<i64>> {
        let links = coupon_products::Entity::find()
            .filter(coupon_products::Column::CouponId.eq(coupon_id))
            .order_by_asc(coupon_products::Column::ProductId)
            .all(db)
            .await?;
        Ok(links.into_iter().map(|l| l.product_id).collect())
    }

    async fn ensure_products_exist<C: ConnectionTrait>(db: &C, ids: &[i64]) -> AppResult<()> {
        let found = product_entity::Entity::find()
            .filter(product_entity::Column::Id.is_in(ids.to_vec()))
            .count(db)
            .await?;
        if found != ids.len() as u64 {
            return Err(AppError::NotFound(
                "One or more products do not exist".to_string(),
            ));
        }
        Ok(())
    }

    async fn replace_products<C: ConnectionTrait>(
        db: &C,
        coupon_id: i64,
        product_ids: &[i64],
    ) -> AppResult<()> {
        coupon_products::Entity::delete_many()
            .filter(coupon_products::Column::CouponId.eq(coupon_id))
            .exec(db)
            .await?;
        if product_ids.is_empty() {
            return Ok(());
        }
        let links = product_ids.iter().map(|&product_id| coupon_products::ActiveModel {
            coupon_id: Set(coupon_id),
            product_id: Set(product_id),
        });
        coupon_products::Entity::insert_many(links)
            .exec_without_returning(db)
            .await?;
        Ok(())
    }
}

fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn coupon() -> coupons::Model {
        coupons::Model {
            id: 1,
            code: "SAVE20".into(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 20,
            max_uses: None,
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

    fn ctx(subtotal: i64) -> CouponContext<'static> {
        CouponContext {
            product_id: 7,
            subtotal,
            user_uses: 0,
            eligible_products: &[],
            now: Utc::now(),
        }
    }

    #[test]
    fn test_twenty_percent_of_fifty_dollars() {
        let quote = evaluate(&coupon(), &ctx(5000)).unwrap();
        assert_eq!(quote.discount_amount, 1000);
        assert_eq!(quote.new_total, 4000);
        assert!(!quote.is_free);
    }

    #[test]
    fn test_fixed_amount_above_subtotal_makes_order_free() {
        let mut c = coupon();
        c.discount_type = DiscountType::FixedAmount;
        c.discount_value = 7500;
        let quote = evaluate(&c, &ctx(5000)).unwrap();
        assert_eq!(quote.discount_amount, 5000);
        assert_eq!(quote.new_total, 0);
        assert!(quote.is_free);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 15% of $0.99 = 14.85 cents
        assert_eq!(calculate_discount(DiscountType::Percentage, 15, 99), 15);
        // 10% of $0.05 = 0.5 cents
        assert_eq!(calculate_discount(DiscountType::Percentage, 10, 5), 1);
        assert_eq!(calculate_discount(DiscountType::Percentage, 100, 1234), 1234);
        assert_eq!(calculate_discount(DiscountType::FixedAmount, 500, 0), 0);
    }

    #[test]
    fn test_percentage_of_huge_subtotal_does_not_overflow() {
        let subtotal = 1_000_000_000_000_000_000;
        assert_eq!(
            calculate_discount(DiscountType::Percentage, 20, subtotal),
            200_000_000_000_000_000
        );
        assert_eq!(
            calculate_discount(DiscountType::Percentage, 100, i64::MAX),
            i64::MAX
        );
        assert_eq!(
            calculate_discount(DiscountType::FixedAmount, i64::MAX, 5000),
            5000
        );
    }

    #[test]
    fn test_inactive_and_archived_are_rejected() {
        for status in [CouponStatus::Inactive, CouponStatus::Archived] {
            let mut c = coupon();
            c.status = status;
            assert_eq!(evaluate(&c, &ctx(5000)), Err(CouponRejection::Inactive));
        }
    }

    #[test]
    fn test_date_window() {
        let now = Utc::now();
        let mut c = coupon();
        c.starts_at = Some(now + Duration::days(1));
        assert_eq!(evaluate(&c, &ctx(5000)), Err(CouponRejection::NotYetActive));

        let mut c = coupon();
        c.expires_at = Some(now - Duration::days(1));
        assert_eq!(evaluate(&c, &ctx(5000)), Err(CouponRejection::Expired));

        let mut c = coupon();
        c.starts_at = Some(now - Duration::days(1));
        c.expires_at = Some(now + Duration::days(1));
        assert!(evaluate(&c, &ctx(5000)).is_ok());
    }

    #[test]
    fn test_usage_limits() {
        let mut c = coupon();
        c.max_uses = Some(3);
        c.current_uses = 3;
        assert_eq!(
            evaluate(&c, &ctx(5000)),
            Err(CouponRejection::UsageLimitReached)
        );

        let mut c = coupon();
        c.max_uses_per_user = Some(1);
        let mut context = ctx(5000);
        context.user_uses = 1;
        assert_eq!(evaluate(&c, &context), Err(CouponRejection::AlreadyUsed));
    }

    #[test]
    fn test_minimum_purchase_message() {
        let mut c = coupon();
        c.minimum_purchase = Some(2500);
        let err = evaluate(&c, &ctx(2000)).unwrap_err();
        assert_eq!(err, CouponRejection::MinimumNotMet { minimum: 2500 });
        assert_eq!(
            err.to_string(),
            "A minimum purchase of $25.00 is required to use this coupon"
        );
        assert!(evaluate(&c, &ctx(2500)).is_ok());
    }

    #[test]
    fn test_product_restriction() {
        let mut c = coupon();
        c.applies_to = AppliesTo::SpecificProducts;
        let mut context = ctx(5000);
        context.eligible_products = &[3, 4];
        assert_eq!(
            evaluate(&c, &context),
            Err(CouponRejection::ProductNotEligible)
        );
        context.product_id = 4;
        assert!(evaluate(&c, &context).is_ok());
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let mut c = coupon();
        c.status = CouponStatus::Inactive;
        c.expires_at = Some(Utc::now() - Duration::days(1));
        c.minimum_purchase = Some(10_000);
        assert_eq!(evaluate(&c, &ctx(100)), Err(CouponRejection::Inactive));
    }

    #[tokio::test]
    async fn test_quote_unknown_code() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<coupons::Model>::new()])
            .into_connection();
        let err = CouponService::quote(&db, "nope", Uuid::new_v4(), 1, 5000, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CouponRejected(CouponRejection::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_quote_loaded_coupon() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon()]])
            .into_connection();
        let (model, quote) =
            CouponService::quote(&db, "save20", Uuid::new_v4(), 1, 5000, Utc::now())
                .await
                .unwrap();
        assert_eq!(model.code, "SAVE20");
        assert_eq!(quote.discount_amount, 1000);
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn usage_count(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn test_redeem_increments_once() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon()]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let outcome = CouponService::redeem(&db, 1, 10, Uuid::new_v4(), 1000)
            .await
            .unwrap();
        assert_eq!(outcome, RedemptionOutcome::Redeemed);
    }

    #[tokio::test]
    async fn test_redeem_replay_is_noop() {
        // ON CONFLICT (order_id) DO NOTHING 未插入
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon()]])
            .append_exec_results([exec(0)])
            .into_connection();
        let outcome = CouponService::redeem(&db, 1, 10, Uuid::new_v4(), 1000)
            .await
            .unwrap();
        assert_eq!(outcome, RedemptionOutcome::AlreadyRecorded);
    }

    #[tokio::test]
    async fn test_redeem_past_limit_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon()]])
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        let err = CouponService::redeem(&db, 1, 11, Uuid::new_v4(), 1000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CouponRejected(CouponRejection::UsageLimitReached)
        ));
    }

    #[tokio::test]
    async fn test_redeem_unknown_coupon() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<coupons::Model>::new()])
            .into_connection();
        let err = CouponService::redeem(&db, 99, 10, Uuid::new_v4(), 1000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CouponRejected(CouponRejection::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_redeem_within_per_user_limit() {
        let mut once = coupon();
        once.max_uses_per_user = Some(2);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![once]])
            .append_query_results([vec![usage_count(2)]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let outcome = CouponService::redeem(&db, 1, 12, Uuid::new_v4(), 1000)
            .await
            .unwrap();
        assert_eq!(outcome, RedemptionOutcome::Redeemed);
    }

    #[tokio::test]
    async fn test_two_orders_by_one_user_cannot_both_redeem_once_only_coupon() {
        // 两个结账都通过了报价；第二个完成时计数里已有第一单
        let mut once = coupon();
        once.max_uses_per_user = Some(1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![once]])
            .append_query_results([vec![usage_count(2)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let err = CouponService::redeem(&db, 1, 13, Uuid::new_v4(), 1000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CouponRejected(CouponRejection::AlreadyUsed)
        ));
    }
}
