use crate::error::{AppError, AppResult};
use crate::models::{Comment, Post, PostForm, Role, User};
use async_trait::async_trait;
use sqlx::MySqlPool;
use std::sync::Arc;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers only ever
/// talk to this trait, which lets the router run against MySQL in production and
/// against `InMemoryRepository` or a hand-written mock in tests.
///
/// Every method returns `AppResult` so that a data-store failure reaches the
/// response mapper instead of being swallowed or crashing the process.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Posts ---
    // All posts, newest first. Unbounded.
    async fn list_posts(&self) -> AppResult<Vec<Post>>;
    async fn get_post(&self, id: i64) -> AppResult<Option<Post>>;
    // Returns the id of the new post.
    async fn create_post(&self, form: PostForm) -> AppResult<i64>;
    // `false` when no post has this id.
    async fn update_post(&self, id: i64, form: PostForm) -> AppResult<bool>;
    /// Deletes a post together with its comments, atomically. `false` when no post
    /// has this id, in which case nothing is deleted.
    async fn delete_post(&self, id: i64) -> AppResult<bool>;

    // --- Comments ---
    // Comments of one post, newest first.
    async fn get_comments(&self, post_id: i64) -> AppResult<Vec<Comment>>;
    /// Inserts a comment if and only if the post exists. `false` when it does not.
    async fn add_comment(&self, post_id: i64, username: &str, text: &str) -> AppResult<bool>;

    // --- Users ---
    /// Inserts a user. Fails with `AppError::UsernameTaken` when the name exists.
    async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> AppResult<i64>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// MySqlRepository
///
/// The concrete implementation of the `Repository` trait, backed by a MySQL (or
/// TiDB) connection pool created at startup.
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    /// list_posts
    ///
    /// `id DESC` breaks ties between posts created within the same second.
    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, image_url, created_at
               FROM posts
               ORDER BY created_at DESC, id DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, image_url, created_at
               FROM posts
               WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn create_post(&self, form: PostForm) -> AppResult<i64> {
        let result = sqlx::query("INSERT INTO posts (title, content, image_url) VALUES (?, ?, ?)")
            .bind(form.title)
            .bind(form.content)
            .bind(form.image_url)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_id() as i64)
    }

    /// update_post
    ///
    /// MySQL reports only *changed* rows for an UPDATE, so an edit that submits the
    /// current values would look like a miss. Existence is checked with a locking
    /// read in the same transaction instead.
    async fn update_post(&self, id: i64, form: PostForm) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        if !exists {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE posts SET title = ?, content = ?, image_url = ? WHERE id = ?")
            .bind(form.title)
            .bind(form.content)
            .bind(form.image_url)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// delete_post
    ///
    /// Comments first, then the post, inside one transaction. If the post row is
    /// missing the transaction is rolled back so no comment is lost.
    async fn delete_post(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let comments = sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let posts = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if posts.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        tracing::info!(
            post_id = id,
            comments_deleted = comments.rows_affected(),
            "Post deleted"
        );
        Ok(true)
    }

    async fn get_comments(&self, post_id: i64) -> AppResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"SELECT id, post_id, username, comment, created_at
               FROM comments
               WHERE post_id = ?
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    /// add_comment
    ///
    /// The INSERT ... SELECT only produces a row when the post exists, so the
    /// existence check and the write are a single statement.
    async fn add_comment(&self, post_id: i64, username: &str, text: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO comments (post_id, username, comment)
               SELECT id, ?, ? FROM posts WHERE id = ?"#,
        )
        .bind(username)
        .bind(text)
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> AppResult<i64> {
        let result = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(role.as_str())
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.last_insert_id() as i64),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::UsernameTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role FROM users WHERE username = ? LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
