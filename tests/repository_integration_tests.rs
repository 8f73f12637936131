use blog_portal::{
    AppError, SESSION_TABLE,
    models::{PostForm, Role},
    mysql_session_store,
    repository::{MySqlRepository, Repository},
};
use sqlx::MySqlPool;
use tokio::test;
use tower_sessions::{
    ExpiredDeletion, SessionStore,
    session::{Id, Record},
};

// --- Test Context and Setup ---

/// Holds the pool for one test. These tests need a disposable MySQL schema named by
/// `TEST_DATABASE_URL`; without it they return early.
struct DbTestContext {
    pool: MySqlPool,
}

impl DbTestContext {
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping MySQL repository test");
            return None;
        };

        let pool = MySqlPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> MySqlRepository {
        MySqlRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Unique suffix so concurrent test runs against one schema do not collide.
fn unique(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

fn post_form(title: &str) -> PostForm {
    PostForm {
        title: title.to_string(),
        content: "integration content".to_string(),
        image_url: String::new(),
    }
}

async fn count_comments(pool: &MySqlPool, post_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .expect("count query")
}

// --- Posts ---

#[test]
async fn test_post_lifecycle() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let title = unique("lifecycle");
    let id = repo.create_post(post_form(&title)).await.unwrap();

    let post = repo.get_post(id).await.unwrap().expect("post inserted");
    assert_eq!(post.title, title);

    // Same values twice: MySQL reports zero changed rows, the post still exists.
    let updated = PostForm {
        title: title.clone(),
        content: "edited".to_string(),
        image_url: "https://example.com/a.png".to_string(),
    };
    assert!(repo.update_post(id, updated.clone()).await.unwrap());
    assert!(repo.update_post(id, updated).await.unwrap());

    let post = repo.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.content, "edited");

    assert!(repo.delete_post(id).await.unwrap());
    assert!(repo.get_post(id).await.unwrap().is_none());
    assert!(!repo.update_post(id, post_form("gone")).await.unwrap());
    assert!(!repo.delete_post(id).await.unwrap());
}

#[test]
async fn test_list_posts_newest_first() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let first = repo.create_post(post_form(&unique("first"))).await.unwrap();
    let second = repo.create_post(post_form(&unique("second"))).await.unwrap();

    let ids: Vec<i64> = repo
        .list_posts()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();

    let first_pos = ids.iter().position(|&id| id == first).unwrap();
    let second_pos = ids.iter().position(|&id| id == second).unwrap();
    assert!(second_pos < first_pos);
}

// --- Comments ---

#[test]
async fn test_delete_post_cascades_to_comments() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let post_id = repo.create_post(post_form(&unique("cascade"))).await.unwrap();
    assert!(repo.add_comment(post_id, "ada", "one").await.unwrap());
    assert!(repo.add_comment(post_id, "ada", "two").await.unwrap());
    assert_eq!(count_comments(&ctx.pool, post_id).await, 2);

    let comments = repo.get_comments(post_id).await.unwrap();
    assert_eq!(comments[0].comment, "two");

    assert!(repo.delete_post(post_id).await.unwrap());
    assert_eq!(count_comments(&ctx.pool, post_id).await, 0);
}

#[test]
async fn test_comment_on_missing_post_is_rejected() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    assert!(!repo.add_comment(i64::MAX, "ada", "orphan").await.unwrap());
    assert_eq!(count_comments(&ctx.pool, i64::MAX).await, 0);
}

// --- Users ---

#[test]
async fn test_duplicate_username_is_rejected() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let username = unique("dup");

    let id = repo.create_user(&username, "hash-one", Role::User).await.unwrap();

    let second = repo.create_user(&username, "hash-two", Role::Admin).await;
    assert!(matches!(second, Err(AppError::UsernameTaken)));

    let stored = repo
        .find_user_by_username(&username)
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(stored.id, id);
    assert_eq!(stored.password, "hash-one");
    assert_eq!(stored.role(), Role::User);

    repo.set_password_hash(id, "hash-three").await.unwrap();
    let stored = repo.find_user_by_username(&username).await.unwrap().unwrap();
    assert_eq!(stored.password, "hash-three");
}

// --- Sessions ---

async fn count_sessions(pool: &MySqlPool, id: &Id) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", SESSION_TABLE);
    sqlx::query_scalar(&sql)
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .expect("session count query")
}

#[test]
async fn test_expired_sessions_are_deleted() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let schema: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    let store = mysql_session_store(ctx.pool.clone(), &schema.expect("database selected"))
        .await
        .expect("session store ready");

    let mut expired = Record {
        id: Id::default(),
        data: Default::default(),
        expiry_date: time::OffsetDateTime::now_utc() - time::Duration::minutes(5),
    };
    let mut live = Record {
        id: Id::default(),
        data: Default::default(),
        expiry_date: time::OffsetDateTime::now_utc() + time::Duration::minutes(5),
    };
    store.create(&mut expired).await.unwrap();
    store.create(&mut live).await.unwrap();

    // Loading hides the expired record, but it is still stored until swept.
    assert!(store.load(&expired.id).await.unwrap().is_none());
    assert_eq!(count_sessions(&ctx.pool, &expired.id).await, 1);

    store.delete_expired().await.unwrap();

    assert_eq!(count_sessions(&ctx.pool, &expired.id).await, 0);
    assert_eq!(count_sessions(&ctx.pool, &live.id).await, 1);
    assert!(store.load(&live.id).await.unwrap().is_some());
}
