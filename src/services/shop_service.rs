use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::dto::catalog_dto::{NewProductFields, ProductQuery, UpdateProductPayload, UpsertShopPayload};
use crate::error::{Error, Result};
use crate::models::catalog::{Product, Shop};

const SHOP_COLUMNS: &str =
    "id, owner_id, name, description, address, phone, image_url, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, shop_id, name, description, price, stock, category, image_url, \
    is_active, created_at, updated_at";

#[derive(Clone)]
pub struct ShopService {
    pool: PgPool,
}

impl ShopService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One shop per owner: creates it on first call, updates it afterwards.
    pub async fn upsert_own(&self, owner_id: Uuid, payload: UpsertShopPayload) -> Result<Shop> {
        let sql = format!(
            r#"
            INSERT INTO shops (owner_id, name, description, address, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                updated_at = NOW()
            RETURNING {}
            "#,
            SHOP_COLUMNS
        );
        let shop = sqlx::query_as::<_, Shop>(&sql)
            .bind(owner_id)
            .bind(payload.name.trim())
            .bind(&payload.description)
            .bind(&payload.address)
            .bind(&payload.phone)
            .fetch_one(&self.pool)
            .await?;
        info!(shop_id = %shop.id, owner_id = %owner_id, "shop saved");
        Ok(shop)
    }

    pub async fn get_own(&self, owner_id: Uuid) -> Result<Shop> {
        let sql = format!("SELECT {} FROM shops WHERE owner_id = $1", SHOP_COLUMNS);
        sqlx::query_as::<_, Shop>(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("You have not created a shop yet".into()))
    }

    /// Returns the shop and the image URL it replaced.
    pub async fn set_own_image(&self, owner_id: Uuid, image_url: &str) -> Result<(Shop, Option<String>)> {
        let previous = self.get_own(owner_id).await?.image_url;
        let sql = format!(
            "UPDATE shops SET image_url = $2, updated_at = NOW() WHERE owner_id = $1 RETURNING {}",
            SHOP_COLUMNS
        );
        let shop = sqlx::query_as::<_, Shop>(&sql)
            .bind(owner_id)
            .bind(image_url)
            .fetch_one(&self.pool)
            .await?;
        Ok((shop, previous))
    }

    pub async fn list_public(&self) -> Result<Vec<Shop>> {
        let sql = format!(
            "SELECT {} FROM shops WHERE is_active ORDER BY name ASC",
            SHOP_COLUMNS
        );
        let shops = sqlx::query_as::<_, Shop>(&sql).fetch_all(&self.pool).await?;
        Ok(shops)
    }

    pub async fn get_public(&self, id: Uuid) -> Result<Shop> {
        let sql = format!("SELECT {} FROM shops WHERE id = $1 AND is_active", SHOP_COLUMNS);
        sqlx::query_as::<_, Shop>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Shop not found".into()))
    }

    pub async fn list_products(&self, shop_id: Uuid, include_inactive: bool) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE shop_id = $1 AND ($2 OR is_active) ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(shop_id)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Active products of active shops matching a name/description search
    /// and an exact category.
    pub async fn search_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));
        let category = query
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let sql = format!(
            r#"
            SELECT {} FROM products p
            WHERE p.is_active
              AND EXISTS (SELECT 1 FROM shops s WHERE s.id = p.shop_id AND s.is_active)
              AND ($1::text IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1)
              AND ($2::text IS NULL OR LOWER(p.category) = LOWER($2))
            ORDER BY p.created_at DESC
            LIMIT 200
            "#,
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(search)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn add_product(&self, owner_id: Uuid, fields: NewProductFields) -> Result<Product> {
        if fields.price.is_sign_negative() {
            return Err(Error::BadRequest("price cannot be negative".into()));
        }
        if fields.stock < 0 {
            return Err(Error::BadRequest("stock cannot be negative".into()));
        }
        let shop = self.get_own(owner_id).await?;
        let sql = format!(
            r#"
            INSERT INTO products (shop_id, name, description, price, stock, category, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(shop.id)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(fields.price)
            .bind(fields.stock)
            .bind(&fields.category)
            .bind(&fields.image_url)
            .fetch_one(&self.pool)
            .await?;
        info!(product_id = %product.id, shop_id = %shop.id, "product added");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
        payload: UpdateProductPayload,
    ) -> Result<Product> {
        if payload.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(Error::BadRequest("price cannot be negative".into()));
        }
        let shop = self.get_own(owner_id).await?;
        let sql = format!(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                stock = COALESCE($6, stock),
                category = COALESCE($7, category),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1 AND shop_id = $2
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(product_id)
            .bind(shop.id)
            .bind(&payload.name)
            .bind(&payload.description)
            .bind(payload.price)
            .bind(payload.stock)
            .bind(&payload.category)
            .bind(payload.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Product not found".into()))
    }

    /// Returns the image URL of the deleted product.
    pub async fn delete_product(&self, owner_id: Uuid, product_id: Uuid) -> Result<Option<String>> {
        let shop = self.get_own(owner_id).await?;
        let image: Option<Option<String>> = sqlx::query_scalar(
            "DELETE FROM products WHERE id = $1 AND shop_id = $2 RETURNING image_url",
        )
        .bind(product_id)
        .bind(shop.id)
        .fetch_optional(&self.pool)
        .await?;
        let image = image.ok_or_else(|| Error::NotFound("Product not found".into()))?;
        info!(product_id = %product_id, shop_id = %shop.id, "product deleted");
        Ok(image)
    }
}
