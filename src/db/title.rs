use std::collections::HashMap;

use super::DBClient;
use crate::dtos::{TagDto, TitleDto};
use crate::models::{Genre, GenreTitle, Title};

/// Row shape for title reads: category columns come from a LEFT JOIN, the
/// rating from an AVG over the title's reviews. The cast matters: Postgres
/// averages integers into NUMERIC, which does not decode as f64.
#[derive(Debug, sqlx::FromRow)]
struct TitleRow {
    id: i32,
    name: String,
    year: i32,
    description: Option<String>,
    rating: Option<f64>,
    category_name: Option<String>,
    category_slug: Option<String>,
}

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, \
        (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating, \
        c.name AS category_name, c.slug AS category_slug \
     FROM titles t \
     LEFT JOIN categories c ON t.category_id = c.id";

fn into_dto(row: TitleRow, genre: Vec<TagDto>) -> TitleDto {
    let category = match (row.category_name, row.category_slug) {
        (Some(name), Some(slug)) => Some(TagDto { name, slug }),
        _ => None,
    };
    TitleDto {
        id: row.id,
        name: row.name,
        year: row.year,
        rating: row.rating,
        description: row.description,
        genre,
        category,
    }
}

/// Title database operations trait
pub trait TitleExt {
    /// Filtered, paginated title list with embedded category/genres and the
    /// derived rating.
    async fn get_titles(
        &self,
        category: Option<&str>,
        genre: Option<&str>,
        name: Option<&str>,
        year: Option<i32>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<TitleDto>, sqlx::Error>;

    async fn get_title_count(
        &self,
        category: Option<&str>,
        genre: Option<&str>,
        name: Option<&str>,
        year: Option<i32>,
    ) -> Result<i64, sqlx::Error>;

    async fn get_title(&self, title_id: i32) -> Result<Option<TitleDto>, sqlx::Error>;

    /// Bare title record, used by the nested review/comment routes to
    /// resolve the parent before any child operation.
    async fn get_title_record(&self, title_id: i32) -> Result<Option<Title>, sqlx::Error>;

    /// Insert the title and its genre links in one transaction, returning
    /// the new id.
    async fn create_title(
        &self,
        name: &str,
        year: i32,
        description: Option<&str>,
        category_id: Option<i32>,
        genre_ids: &[i32],
    ) -> Result<i32, sqlx::Error>;

    /// Partial update; `genre_ids` of Some replaces the whole link set,
    /// `category_id` of Some replaces the category. RowNotFound when the
    /// title does not exist.
    async fn update_title(
        &self,
        title_id: i32,
        name: Option<&str>,
        year: Option<i32>,
        description: Option<&str>,
        category_id: Option<i32>,
        genre_ids: Option<&[i32]>,
    ) -> Result<(), sqlx::Error>;

    async fn delete_title(&self, title_id: i32) -> Result<(), sqlx::Error>;
}

impl DBClient {
    /// Load the genre links for a set of titles and bucket the tags by
    /// title id, sorted by genre name within each title.
    async fn genres_for_titles(
        &self,
        title_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<TagDto>>, sqlx::Error> {
        let links = sqlx::query_as::<_, GenreTitle>(
            "SELECT id, title_id, genre_id FROM genre_titles WHERE title_id = ANY($1)",
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await?;

        let genre_ids: Vec<i32> = links.iter().map(|link| link.genre_id).collect();
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name, slug FROM genres WHERE id = ANY($1)",
        )
        .bind(&genre_ids)
        .fetch_all(&self.pool)
        .await?;

        let by_id: HashMap<i32, &Genre> = genres.iter().map(|g| (g.id, g)).collect();

        let mut by_title: HashMap<i32, Vec<TagDto>> = HashMap::new();
        for link in &links {
            if let Some(genre) = by_id.get(&link.genre_id) {
                by_title.entry(link.title_id).or_default().push(TagDto {
                    name: genre.name.clone(),
                    slug: genre.slug.clone(),
                });
            }
        }
        for tags in by_title.values_mut() {
            tags.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(by_title)
    }
}

impl TitleExt for DBClient {
    async fn get_titles(
        &self,
        category: Option<&str>,
        genre: Option<&str>,
        name: Option<&str>,
        year: Option<i32>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<TitleDto>, sqlx::Error> {
        let offset = (page - 1) * limit;
        let name_pattern = format!("%{}%", name.unwrap_or(""));

        // NULL filter parameters are neutral: each predicate collapses to
        // TRUE when its bind is NULL.
        let rows = sqlx::query_as::<_, TitleRow>(&format!(
            "{TITLE_SELECT} \
             WHERE ($1::text IS NULL OR c.slug = $1) \
               AND ($2::text IS NULL OR EXISTS ( \
                     SELECT 1 FROM genre_titles gt \
                     JOIN genres g ON gt.genre_id = g.id \
                     WHERE gt.title_id = t.id AND g.slug = $2)) \
               AND t.name ILIKE $3 \
               AND ($4::int IS NULL OR t.year = $4) \
             ORDER BY t.name \
             LIMIT $5 OFFSET $6"
        ))
        .bind(category)
        .bind(genre)
        .bind(name_pattern)
        .bind(year)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut genres = self.genres_for_titles(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = genres.remove(&row.id).unwrap_or_default();
                into_dto(row, tags)
            })
            .collect())
    }

    async fn get_title_count(
        &self,
        category: Option<&str>,
        genre: Option<&str>,
        name: Option<&str>,
        year: Option<i32>,
    ) -> Result<i64, sqlx::Error> {
        let name_pattern = format!("%{}%", name.unwrap_or(""));

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM titles t \
             LEFT JOIN categories c ON t.category_id = c.id \
             WHERE ($1::text IS NULL OR c.slug = $1) \
               AND ($2::text IS NULL OR EXISTS ( \
                     SELECT 1 FROM genre_titles gt \
                     JOIN genres g ON gt.genre_id = g.id \
                     WHERE gt.title_id = t.id AND g.slug = $2)) \
               AND t.name ILIKE $3 \
               AND ($4::int IS NULL OR t.year = $4)",
        )
        .bind(category)
        .bind(genre)
        .bind(name_pattern)
        .bind(year)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_title(&self, title_id: i32) -> Result<Option<TitleDto>, sqlx::Error> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} WHERE t.id = $1"))
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut genres = self.genres_for_titles(&[row.id]).await?;
        let tags = genres.remove(&row.id).unwrap_or_default();
        Ok(Some(into_dto(row, tags)))
    }

    async fn get_title_record(&self, title_id: i32) -> Result<Option<Title>, sqlx::Error> {
        let title = sqlx::query_as::<_, Title>(
            "SELECT id, name, year, description, category_id FROM titles WHERE id = $1",
        )
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(title)
    }

    async fn create_title(
        &self,
        name: &str,
        year: i32,
        description: Option<&str>,
        category_id: Option<i32>,
        genre_ids: &[i32],
    ) -> Result<i32, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let title_id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO titles (name, year, description, category_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(name)
        .bind(year)
        .bind(description)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        for genre_id in genre_ids {
            // ON CONFLICT keeps the pairing duplicate-free even if the same
            // slug appears twice in the request body.
            sqlx::query(
                "INSERT INTO genre_titles (title_id, genre_id) VALUES ($1, $2) \
                 ON CONFLICT (title_id, genre_id) DO NOTHING",
            )
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(title_id)
    }

    async fn update_title(
        &self,
        title_id: i32,
        name: Option<&str>,
        year: Option<i32>,
        description: Option<&str>,
        category_id: Option<i32>,
        genre_ids: Option<&[i32]>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE titles SET \
                name = COALESCE($2, name), \
                year = COALESCE($3, year), \
                description = COALESCE($4, description), \
                category_id = COALESCE($5, category_id) \
             WHERE id = $1",
        )
        .bind(title_id)
        .bind(name)
        .bind(year)
        .bind(description)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        if let Some(genre_ids) = genre_ids {
            sqlx::query("DELETE FROM genre_titles WHERE title_id = $1")
                .bind(title_id)
                .execute(&mut *tx)
                .await?;

            for genre_id in genre_ids {
                sqlx::query(
                    "INSERT INTO genre_titles (title_id, genre_id) VALUES ($1, $2) \
                     ON CONFLICT (title_id, genre_id) DO NOTHING",
                )
                .bind(title_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_title(&self, title_id: i32) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(title_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
