use crate::error::{AppError, AppResult};
use crate::models::{Comment, Post, PostForm, Role, User};
use crate::repository::Repository;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

/// InMemoryRepository
///
/// A process-local implementation of `Repository` with the same observable rules as
/// the MySQL one: unique usernames, newest-first ordering with id as tie-breaker,
/// comments only on existing posts, and all-or-nothing post deletion. Used to drive
/// the full router in tests without a database server.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored comments, across all posts.
    pub async fn comment_count(&self) -> usize {
        self.inner.lock().await.comments.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        let tables = self.inner.lock().await;
        let mut posts = tables.posts.clone();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> AppResult<Option<Post>> {
        let tables = self.inner.lock().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn create_post(&self, form: PostForm) -> AppResult<i64> {
        let mut tables = self.inner.lock().await;
        let id = tables.allocate_id();
        tables.posts.push(Post {
            id,
            title: form.title,
            content: form.content,
            image_url: form.image_url,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_post(&self, id: i64, form: PostForm) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        match tables.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.title = form.title;
                post.content = form.content;
                post.image_url = form.image_url;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_post(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        if !tables.posts.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        tables.comments.retain(|c| c.post_id != id);
        tables.posts.retain(|p| p.id != id);
        Ok(true)
    }

    async fn get_comments(&self, post_id: i64) -> AppResult<Vec<Comment>> {
        let tables = self.inner.lock().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(comments)
    }

    async fn add_comment(&self, post_id: i64, username: &str, text: &str) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        if !tables.posts.iter().any(|p| p.id == post_id) {
            return Ok(false);
        }
        let id = tables.allocate_id();
        tables.comments.push(Comment {
            id,
            post_id,
            username: username.to_string(),
            comment: text.to_string(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn create_user(&self, username: &str, password_hash: &str, role: Role) -> AppResult<i64> {
        let mut tables = self.inner.lock().await;
        if tables.users.iter().any(|u| u.username == username) {
            return Err(AppError::UsernameTaken);
        }
        let id = tables.allocate_id();
        tables.users.push(User {
            id,
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.as_str().to_string(),
        });
        Ok(id)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
        let mut tables = self.inner.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.password = password_hash.to_string();
        }
        Ok(())
    }
}
