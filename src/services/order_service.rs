use crate::database::DbPool;
use crate::entities::{OrderStatus, order_entity as orders};
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct OrderService {
    pool: DbPool,
}

impl OrderService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_user_orders(
        &self,
        user_id: Uuid,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        // 构建查询条件
        let mut base_query = orders::Entity::find().filter(orders::Column::UserId.eq(user_id));
        if let Some(status) = &query.status {
            base_query = base_query.filter(orders::Column::Status.eq(status.clone()));
        }

        // 获取总数
        let total = base_query.clone().count(&*self.pool).await?;

        let items: Vec<OrderResponse> = base_query
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(OrderResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_user_order(&self, user_id: Uuid, order_id: i64) -> AppResult<OrderResponse> {
        orders::Entity::find_by_id(order_id)
            .filter(orders::Column::UserId.eq(user_id))
            .one(&*self.pool)
            .await?
            .map(OrderResponse::from)
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }

    pub async fn attach_session(&self, order_id: i64, session_id: &str) -> AppResult<()> {
        orders::Entity::update_many()
            .col_expr(orders::Column::StripeSessionId, Expr::value(session_id))
            .col_expr(orders::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(orders::Column::Id.eq(order_id))
            .exec(&*self.pool)
            .await?;
        Ok(())
    }

    /// Moves a pending order to failed. Returns false when the order was not pending.
    pub async fn mark_failed(&self, order_id: i64) -> AppResult<bool> {
        let result = orders::Entity::update_many()
            .col_expr(orders::Column::Status, OrderStatus::Failed.as_enum())
            .col_expr(orders::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(orders::Column::Id.eq(order_id))
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.pool)
            .await?;
        if result.rows_affected == 0 {
            log::info!("Order {order_id} was not pending, failure ignored");
            return Ok(false);
        }
        log::info!("Order {order_id} marked failed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mark_failed_only_touches_pending_orders() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let service = OrderService::new(Arc::new(db));
        assert!(service.mark_failed(5).await.unwrap());
        assert!(!service.mark_failed(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_users_order_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<orders::Model>::new()])
            .into_connection();
        let service = OrderService::new(Arc::new(db));
        let err = service
            .get_user_order(Uuid::new_v4(), 9)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
