use crate::database::DbPool;
use crate::entities::product_entity as products;
use crate::error::{AppError, AppResult};
use crate::models::{PaginatedResponse, PaginationParams, ProductQuery, ProductRequest, ProductResponse};
use crate::utils::validate_slug;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

#[derive(Clone)]
pub struct ProductService {
    pool: DbPool,
}

impl ProductService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// 商品列表；公开接口只返回上架商品
    pub async fn list(
        &self,
        query: &ProductQuery,
        include_inactive: bool,
    ) -> AppResult<PaginatedResponse<ProductResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = products::Entity::find();
        if !include_inactive {
            base_query = base_query.filter(products::Column::IsActive.eq(true));
        }

        let total = base_query.clone().count(&*self.pool).await?;
        let items = base_query
            .order_by_asc(products::Column::Name)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(ProductResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, id: i64, include_inactive: bool) -> AppResult<ProductResponse> {
        let product = self.find(id).await?;
        if !include_inactive && !product.is_active {
            return Err(AppError::NotFound(format!("Product {id} not found")));
        }
        Ok(product.into())
    }

    /// Loads a product that can currently be bought.
    pub async fn find_active(&self, id: i64) -> AppResult<products::Model> {
        products::Entity::find_by_id(id)
            .filter(products::Column::IsActive.eq(true))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
    }

    pub async fn create(&self, req: ProductRequest) -> AppResult<ProductResponse> {
        validate_slug(&req.slug)?;
        self.ensure_slug_free(&req.slug, None).await?;

        let now = Utc::now();
        let product = products::ActiveModel {
            name: Set(req.name),
            slug: Set(req.slug),
            description: Set(req.description),
            price: Set(req.price),
            currency: Set("usd".to_string()),
            file_url: Set(req.file_url),
            is_active: Set(req.is_active),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!("Product {} created (id={})", product.slug, product.id);
        Ok(product.into())
    }

    pub async fn update(&self, id: i64, req: ProductRequest) -> AppResult<ProductResponse> {
        validate_slug(&req.slug)?;
        let existing = self.find(id).await?;
        if existing.slug != req.slug {
            self.ensure_slug_free(&req.slug, Some(id)).await?;
        }

        let mut am = existing.into_active_model();
        am.name = Set(req.name);
        am.slug = Set(req.slug);
        am.description = Set(req.description);
        am.price = Set(req.price);
        am.file_url = Set(req.file_url);
        am.is_active = Set(req.is_active);
        am.updated_at = Set(Some(Utc::now()));
        let product = am.update(&*self.pool).await?;
        Ok(product.into())
    }

    async fn find(&self, id: i64) -> AppResult<products::Model> {
        products::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
    }

    async fn ensure_slug_free(&self, slug: &str, except: Option<i64>) -> AppResult<()> {
        let mut query = products::Entity::find().filter(products::Column::Slug.eq(slug));
        if let Some(id) = except {
            query = query.filter(products::Column::Id.ne(id));
        }
        if query.one(&*self.pool).await?.is_some() {
            return Err(AppError::ValidationError(format!(
                "Slug {slug} is already in use"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn product(is_active: bool) -> products::Model {
        products::Model {
            id: 3,
            name: "Starter Kit".into(),
            slug: "starter-kit".into(),
            description: None,
            price: 5000,
            currency: "usd".into(),
            file_url: None,
            is_active,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_inactive_product_hidden_from_public() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(false)], vec![product(false)]])
            .into_connection();
        let service = ProductService::new(Arc::new(db));
        assert!(matches!(
            service.get(3, false).await,
            Err(AppError::NotFound(_))
        ));
        assert!(service.get(3, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_slug() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = ProductService::new(Arc::new(db));
        let err = service
            .create(ProductRequest {
                name: "Kit".into(),
                slug: "Not A Slug".into(),
                description: None,
                price: 100,
                file_url: None,
                is_active: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
