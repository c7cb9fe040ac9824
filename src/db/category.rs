use super::DBClient;
use crate::models::Category;

/// Category database operations trait
pub trait CategoryExt {
    /// Paginated category list, optionally filtered by a name substring.
    async fn get_categories(
        &self,
        search: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<Category>, sqlx::Error>;

    async fn get_category_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error>;

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, sqlx::Error>;

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, sqlx::Error>;

    /// Delete by slug; referencing titles get their category detached by the
    /// schema (ON DELETE SET NULL). RowNotFound when the slug is unknown.
    async fn delete_category(&self, slug: &str) -> Result<(), sqlx::Error>;
}

impl CategoryExt for DBClient {
    async fn get_categories(
        &self,
        search: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<Category>, sqlx::Error> {
        let offset = (page - 1) * limit;
        let pattern = format!("%{}%", search.unwrap_or(""));

        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories \
             WHERE name ILIKE $1 \
             ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(pattern)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn get_category_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let pattern = format!("%{}%", search.unwrap_or(""));

        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE name ILIKE $1")
                .bind(pattern)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
