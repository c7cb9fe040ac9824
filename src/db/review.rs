use super::DBClient;
use crate::dtos::ReviewDto;
use crate::models::Review;
use uuid::Uuid;

/// Review database operations trait
pub trait ReviewExt {
    /// Reviews of one title, newest first, with the author's username.
    async fn get_reviews(
        &self,
        title_id: i32,
        page: i32,
        limit: i32,
    ) -> Result<Vec<ReviewDto>, sqlx::Error>;

    async fn get_review_count(&self, title_id: i32) -> Result<i64, sqlx::Error>;

    /// Raw review row scoped by the parent title, for ownership checks.
    /// None covers both an unknown id and a review of a different title.
    async fn get_review(
        &self,
        title_id: i32,
        review_id: i32,
    ) -> Result<Option<Review>, sqlx::Error>;

    async fn get_review_dto(
        &self,
        title_id: i32,
        review_id: i32,
    ) -> Result<Option<ReviewDto>, sqlx::Error>;

    /// One-review-per-(author, title) probe for the creation-only rule.
    async fn has_review(&self, author_id: Uuid, title_id: i32) -> Result<bool, sqlx::Error>;

    async fn create_review(
        &self,
        title_id: i32,
        author_id: Uuid,
        text: &str,
        score: i32,
    ) -> Result<ReviewDto, sqlx::Error>;

    async fn update_review(
        &self,
        review_id: i32,
        text: Option<&str>,
        score: Option<i32>,
    ) -> Result<ReviewDto, sqlx::Error>;

    async fn delete_review(&self, review_id: i32) -> Result<(), sqlx::Error>;
}

impl ReviewExt for DBClient {
    async fn get_reviews(
        &self,
        title_id: i32,
        page: i32,
        limit: i32,
    ) -> Result<Vec<ReviewDto>, sqlx::Error> {
        let offset = (page - 1) * limit;

        let reviews = sqlx::query_as::<_, ReviewDto>(
            "SELECT r.id, r.text, u.username AS author, r.score, r.pub_date \
             FROM reviews r \
             INNER JOIN users u ON r.author_id = u.id \
             WHERE r.title_id = $1 \
             ORDER BY r.pub_date DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(title_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn get_review_count(&self, title_id: i32) -> Result<i64, sqlx::Error> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE title_id = $1")
                .bind(title_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn get_review(
        &self,
        title_id: i32,
        review_id: i32,
    ) -> Result<Option<Review>, sqlx::Error> {
        let review = sqlx::query_as::<_, Review>(
            "SELECT id, title_id, author_id, text, score, pub_date \
             FROM reviews WHERE id = $1 AND title_id = $2",
        )
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn get_review_dto(
        &self,
        title_id: i32,
        review_id: i32,
    ) -> Result<Option<ReviewDto>, sqlx::Error> {
        let review = sqlx::query_as::<_, ReviewDto>(
            "SELECT r.id, r.text, u.username AS author, r.score, r.pub_date \
             FROM reviews r \
             INNER JOIN users u ON r.author_id = u.id \
             WHERE r.id = $1 AND r.title_id = $2",
        )
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn has_review(&self, author_id: Uuid, title_id: i32) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE author_id = $1 AND title_id = $2)",
        )
        .bind(author_id)
        .bind(title_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_review(
        &self,
        title_id: i32,
        author_id: Uuid,
        text: &str,
        score: i32,
    ) -> Result<ReviewDto, sqlx::Error> {
        // CTE insert so the response carries the author's username without a
        // second round trip.
        let review = sqlx::query_as::<_, ReviewDto>(
            "WITH new_review AS ( \
                INSERT INTO reviews (title_id, author_id, text, score) \
                VALUES ($1, $2, $3, $4) \
                RETURNING * \
             ) \
             SELECT nr.id, nr.text, u.username AS author, nr.score, nr.pub_date \
             FROM new_review nr \
             JOIN users u ON nr.author_id = u.id",
        )
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: i32,
        text: Option<&str>,
        score: Option<i32>,
    ) -> Result<ReviewDto, sqlx::Error> {
        let review = sqlx::query_as::<_, ReviewDto>(
            "WITH updated_review AS ( \
                UPDATE reviews \
                SET text = COALESCE($2, text), score = COALESCE($3, score) \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT ur.id, ur.text, u.username AS author, ur.score, ur.pub_date \
             FROM updated_review ur \
             JOIN users u ON ur.author_id = u.id",
        )
        .bind(review_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    async fn delete_review(&self, review_id: i32) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
