use super::DBClient;
use crate::dtos::CommentDto;
use crate::models::Comment;
use uuid::Uuid;

/// Comment database operations trait
pub trait CommentExt {
    /// Comments of one review in publication order ascending.
    async fn get_comments(
        &self,
        review_id: i32,
        page: i32,
        limit: i32,
    ) -> Result<Vec<CommentDto>, sqlx::Error>;

    async fn get_comment_count(&self, review_id: i32) -> Result<i64, sqlx::Error>;

    /// Raw comment row scoped by the parent review, for ownership checks.
    async fn get_comment(
        &self,
        review_id: i32,
        comment_id: i32,
    ) -> Result<Option<Comment>, sqlx::Error>;

    async fn get_comment_dto(
        &self,
        review_id: i32,
        comment_id: i32,
    ) -> Result<Option<CommentDto>, sqlx::Error>;

    async fn create_comment(
        &self,
        review_id: i32,
        author_id: Uuid,
        text: &str,
    ) -> Result<CommentDto, sqlx::Error>;

    async fn update_comment(
        &self,
        comment_id: i32,
        text: &str,
    ) -> Result<CommentDto, sqlx::Error>;

    async fn delete_comment(&self, comment_id: i32) -> Result<(), sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_comments(
        &self,
        review_id: i32,
        page: i32,
        limit: i32,
    ) -> Result<Vec<CommentDto>, sqlx::Error> {
        let offset = (page - 1) * limit;

        let comments = sqlx::query_as::<_, CommentDto>(
            "SELECT c.id, c.text, u.username AS author, c.pub_date \
             FROM comments c \
             INNER JOIN users u ON c.author_id = u.id \
             WHERE c.review_id = $1 \
             ORDER BY c.pub_date ASC \
             LIMIT $2 OFFSET $3",
        )
        .bind(review_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn get_comment_count(&self, review_id: i32) -> Result<i64, sqlx::Error> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE review_id = $1")
                .bind(review_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn get_comment(
        &self,
        review_id: i32,
        comment_id: i32,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, review_id, author_id, text, pub_date \
             FROM comments WHERE id = $1 AND review_id = $2",
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn get_comment_dto(
        &self,
        review_id: i32,
        comment_id: i32,
    ) -> Result<Option<CommentDto>, sqlx::Error> {
        let comment = sqlx::query_as::<_, CommentDto>(
            "SELECT c.id, c.text, u.username AS author, c.pub_date \
             FROM comments c \
             INNER JOIN users u ON c.author_id = u.id \
             WHERE c.id = $1 AND c.review_id = $2",
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn create_comment(
        &self,
        review_id: i32,
        author_id: Uuid,
        text: &str,
    ) -> Result<CommentDto, sqlx::Error> {
        let comment = sqlx::query_as::<_, CommentDto>(
            "WITH new_comment AS ( \
                INSERT INTO comments (review_id, author_id, text) \
                VALUES ($1, $2, $3) \
                RETURNING * \
             ) \
             SELECT nc.id, nc.text, u.username AS author, nc.pub_date \
             FROM new_comment nc \
             JOIN users u ON nc.author_id = u.id",
        )
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn update_comment(&self, comment_id: i32, text: &str) -> Result<CommentDto, sqlx::Error> {
        let comment = sqlx::query_as::<_, CommentDto>(
            "WITH updated_comment AS ( \
                UPDATE comments SET text = $2 \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT uc.id, uc.text, u.username AS author, uc.pub_date \
             FROM updated_comment uc \
             JOIN users u ON uc.author_id = u.id",
        )
        .bind(comment_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: i32) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
