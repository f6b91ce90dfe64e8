use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::dto::catalog_dto::CategoryFields;
use crate::error::{Error, Result};
use crate::models::catalog::ServiceCategory;

const CATEGORY_COLUMNS: &str = "id, name, description, image_url, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Public listing shows only active categories.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<ServiceCategory>> {
        let sql = format!(
            "SELECT {} FROM service_categories WHERE ($1 OR is_active) ORDER BY name ASC",
            CATEGORY_COLUMNS
        );
        let items = sqlx::query_as::<_, ServiceCategory>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn create(&self, fields: CategoryFields) -> Result<ServiceCategory> {
        let name = fields
            .name
            .ok_or_else(|| Error::BadRequest("name is required".into()))?;
        let sql = format!(
            r#"
            INSERT INTO service_categories (name, description, image_url, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, ServiceCategory>(&sql)
            .bind(&name)
            .bind(&fields.description)
            .bind(&fields.image_url)
            .bind(fields.is_active.unwrap_or(true))
            .fetch_one(&self.pool)
            .await
            .map_err(duplicate_name)?;
        info!(category_id = %category.id, name = %category.name, "service category created");
        Ok(category)
    }

    /// Returns the updated category and the image URL it replaced, if any.
    pub async fn update(
        &self,
        id: Uuid,
        fields: CategoryFields,
    ) -> Result<(ServiceCategory, Option<String>)> {
        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT image_url FROM service_categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let previous_image =
            previous.ok_or_else(|| Error::NotFound("Service category not found".into()))?;

        let sql = format!(
            r#"
            UPDATE service_categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                image_url = COALESCE($4, image_url),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, ServiceCategory>(&sql)
            .bind(id)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.image_url)
            .bind(fields.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(duplicate_name)?
            .ok_or_else(|| Error::NotFound("Service category not found".into()))?;

        let replaced = previous_image.filter(|_| fields.image_url.is_some());
        info!(category_id = %id, "service category updated");
        Ok((category, replaced))
    }

    /// Returns the image URL of the deleted category.
    pub async fn delete(&self, id: Uuid) -> Result<Option<String>> {
        let image: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM service_categories WHERE id = $1 RETURNING image_url")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let image = image.ok_or_else(|| Error::NotFound("Service category not found".into()))?;
        info!(category_id = %id, "service category deleted");
        Ok(image)
    }
}

fn duplicate_name(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::BadRequest("A service category with this name already exists".into())
        }
        other => other.into(),
    }
}
