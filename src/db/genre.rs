use super::DBClient;
use crate::models::Genre;

/// Genre database operations trait
pub trait GenreExt {
    async fn get_genres(
        &self,
        search: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<Genre>, sqlx::Error>;

    async fn get_genre_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error>;

    /// Resolve a batch of slugs for title writes. The caller compares the
    /// result length against its input to spot unknown slugs.
    async fn get_genres_by_slugs(&self, slugs: &[String]) -> Result<Vec<Genre>, sqlx::Error>;

    async fn create_genre(&self, name: &str, slug: &str) -> Result<Genre, sqlx::Error>;

    /// Delete by slug; the schema drops the genre_titles links (CASCADE).
    async fn delete_genre(&self, slug: &str) -> Result<(), sqlx::Error>;
}

impl GenreExt for DBClient {
    async fn get_genres(
        &self,
        search: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<Genre>, sqlx::Error> {
        let offset = (page - 1) * limit;
        let pattern = format!("%{}%", search.unwrap_or(""));

        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name, slug FROM genres \
             WHERE name ILIKE $1 \
             ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(pattern)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn get_genre_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let pattern = format!("%{}%", search.unwrap_or(""));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM genres WHERE name ILIKE $1")
            .bind(pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_genres_by_slugs(&self, slugs: &[String]) -> Result<Vec<Genre>, sqlx::Error> {
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name, slug FROM genres WHERE slug = ANY($1) ORDER BY name",
        )
        .bind(slugs)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn create_genre(&self, name: &str, slug: &str) -> Result<Genre, sqlx::Error> {
        let genre = sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;

        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM genres WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
