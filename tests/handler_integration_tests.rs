use async_trait::async_trait;
use axum::{
    Form,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use blog_portal::{
    AppError, AppResult, AppState,
    auth::{AdminUser, CurrentUser, MaybeUser},
    config::AppConfig,
    handlers,
    models::{Comment, CommentForm, Post, PostForm, Role, SessionUser, User},
    repository::Repository,
};
use chrono::Utc;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::test;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Pre-canned answers plus a record of what the handlers asked for.
#[derive(Default)]
pub struct MockRepoControl {
    pub post_to_return: Option<Post>,
    pub posts_to_return: Vec<Post>,
    pub comments_to_return: Vec<Comment>,
    pub write_succeeds: bool,
    pub username_taken: bool,

    pub comment_queries: AtomicUsize,
    pub created_post: Mutex<Option<PostForm>>,
    pub added_comment: Mutex<Option<(i64, String, String)>>,
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        Ok(self.posts_to_return.clone())
    }
    async fn get_post(&self, _id: i64) -> AppResult<Option<Post>> {
        Ok(self.post_to_return.clone())
    }
    async fn create_post(&self, form: PostForm) -> AppResult<i64> {
        *self.created_post.lock().unwrap() = Some(form);
        Ok(1)
    }
    async fn update_post(&self, _id: i64, _form: PostForm) -> AppResult<bool> {
        Ok(self.write_succeeds)
    }
    async fn delete_post(&self, _id: i64) -> AppResult<bool> {
        Ok(self.write_succeeds)
    }
    async fn get_comments(&self, _post_id: i64) -> AppResult<Vec<Comment>> {
        self.comment_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.comments_to_return.clone())
    }
    async fn add_comment(&self, post_id: i64, username: &str, text: &str) -> AppResult<bool> {
        *self.added_comment.lock().unwrap() =
            Some((post_id, username.to_string(), text.to_string()));
        Ok(self.write_succeeds)
    }
    async fn create_user(&self, _u: &str, _h: &str, _r: Role) -> AppResult<i64> {
        if self.username_taken {
            Err(AppError::UsernameTaken)
        } else {
            Ok(1)
        }
    }
    async fn find_user_by_username(&self, _username: &str) -> AppResult<Option<User>> {
        Ok(None)
    }
    async fn set_password_hash(&self, _user_id: i64, _hash: &str) -> AppResult<()> {
        Ok(())
    }
}

// --- TEST UTILITIES ---

fn create_test_state(repo: Arc<MockRepoControl>) -> AppState {
    AppState {
        repo,
        config: AppConfig::default(),
    }
}

fn sample_post(id: i64, title: &str) -> Post {
    Post {
        id,
        title: title.to_string(),
        content: "content".to_string(),
        image_url: String::new(),
        created_at: Utc::now(),
    }
}

fn admin() -> SessionUser {
    SessionUser {
        id: 1,
        username: "root".to_string(),
        role: Role::Admin,
    }
}

fn reader() -> SessionUser {
    SessionUser {
        id: 2,
        username: "ada".to_string(),
        role: Role::User,
    }
}

fn location(response: impl IntoResponse) -> String {
    let response = response.into_response();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// --- HANDLER TESTS ---

#[test]
async fn test_show_post_not_found_skips_comment_query() {
    let repo = Arc::new(MockRepoControl::default());
    let state = create_test_state(repo.clone());

    let result = handlers::show_post(State(state), MaybeUser(None), Path(99)).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(repo.comment_queries.load(Ordering::SeqCst), 0);
}

#[test]
async fn test_show_post_renders_post_and_comments() {
    let repo = Arc::new(MockRepoControl {
        post_to_return: Some(sample_post(5, "Hello")),
        comments_to_return: vec![Comment {
            id: 1,
            post_id: 5,
            username: "ada".to_string(),
            comment: "Nice!".to_string(),
            created_at: Utc::now(),
        }],
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo.clone());

    let page = handlers::show_post(State(state), MaybeUser(None), Path(5))
        .await
        .expect("post exists");

    assert_eq!(repo.comment_queries.load(Ordering::SeqCst), 1);
    let response = page.into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Hello"));
    assert!(html.contains("Nice!"));
}

#[test]
async fn test_add_comment_uses_session_username() {
    let repo = Arc::new(MockRepoControl {
        write_succeeds: true,
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo.clone());

    let result = handlers::add_comment(
        CurrentUser(reader()),
        State(state),
        Path(5),
        Form(CommentForm {
            comment: "  raw <b>text</b>  ".to_string(),
        }),
    )
    .await
    .expect("comment stored");

    assert_eq!(location(result), "/post/5");
    let recorded = repo.added_comment.lock().unwrap().clone().unwrap();
    assert_eq!(
        recorded,
        (5, "ada".to_string(), "  raw <b>text</b>  ".to_string())
    );
}

#[test]
async fn test_add_comment_on_missing_post() {
    let repo = Arc::new(MockRepoControl::default());
    let state = create_test_state(repo);

    let result = handlers::add_comment(
        CurrentUser(reader()),
        State(state),
        Path(404),
        Form(CommentForm {
            comment: "hello?".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
async fn test_create_post_stores_fields_verbatim() {
    let repo = Arc::new(MockRepoControl::default());
    let state = create_test_state(repo.clone());

    let form = PostForm {
        title: String::new(),
        content: "x".repeat(10_000),
        image_url: "javascript:alert(1)".to_string(),
    };

    let result = handlers::create_post(AdminUser(admin()), State(state), Form(form))
        .await
        .expect("created");

    assert_eq!(location(result), "/admin");
    let stored = repo.created_post.lock().unwrap().clone().unwrap();
    assert_eq!(stored.title, "");
    assert_eq!(stored.content.len(), 10_000);
    assert_eq!(stored.image_url, "javascript:alert(1)");
}

#[test]
async fn test_update_missing_post_is_not_found() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::update_post(
        AdminUser(admin()),
        State(state),
        Path(7),
        Form(PostForm::default()),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
async fn test_delete_post_success_redirects_to_admin() {
    let state = create_test_state(Arc::new(MockRepoControl {
        write_succeeds: true,
        ..MockRepoControl::default()
    }));

    let result = handlers::delete_post(AdminUser(admin()), State(state), Path(7))
        .await
        .expect("deleted");

    assert_eq!(location(result), "/admin");
}

#[test]
async fn test_delete_missing_post_is_not_found() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::delete_post(AdminUser(admin()), State(state), Path(7)).await;

    assert_eq!(
        result.unwrap_err().into_response().status(),
        StatusCode::NOT_FOUND
    );
}

#[test]
async fn test_edit_form_for_missing_post() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::edit_post_form(AdminUser(admin()), State(state), Path(3)).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
async fn test_register_duplicate_username() {
    let state = create_test_state(Arc::new(MockRepoControl {
        username_taken: true,
        ..MockRepoControl::default()
    }));

    let result = handlers::register_user(
        State(state),
        Form(blog_portal::models::CredentialsForm {
            username: "ada".to_string(),
            password: "pw".to_string(),
        }),
    )
    .await;

    let response = result.unwrap_err().into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[test]
async fn test_admin_panel_lists_posts() {
    let state = create_test_state(Arc::new(MockRepoControl {
        posts_to_return: vec![sample_post(2, "Second"), sample_post(1, "First")],
        ..MockRepoControl::default()
    }));

    let page = handlers::admin_panel(AdminUser(admin()), State(state))
        .await
        .expect("rendered");

    assert_eq!(page.0.posts.len(), 2);
    assert_eq!(page.0.posts[0].title, "Second");
}
