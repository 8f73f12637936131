use crate::{
    AppState,
    auth::{self, AdminUser, CurrentUser, MaybeUser},
    error::{AppError, AppResult},
    models::{CommentForm, CredentialsForm, PostForm},
    views::{
        AboutPage, AdminPage, ContactPage, Html, IndexPage, LoginPage, PostFormPage, PostPage,
        RegisterPage,
    },
};
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use tower_sessions::Session;

const POST_NOT_FOUND: &str = "Post not found.";

// --- Public pages ---

/// list_posts
///
/// [Public Route] Home page: every post, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Html<IndexPage>> {
    let posts = state.repo.list_posts().await?;
    Ok(Html(IndexPage { user, posts }))
}

pub async fn about(MaybeUser(user): MaybeUser) -> Html<AboutPage> {
    Html(AboutPage { user })
}

pub async fn contact(MaybeUser(user): MaybeUser) -> Html<ContactPage> {
    Html(ContactPage { user })
}

/// show_post
///
/// [Public Route] A post and its comments. Two sequential reads: the comment query
/// only runs once the post is known to exist, so a missing post costs one query.
pub async fn show_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Html<PostPage>> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or(AppError::NotFound(POST_NOT_FOUND))?;

    let comments = state.repo.get_comments(post.id).await?;

    Ok(Html(PostPage {
        user,
        post,
        comments,
    }))
}

// --- Account ---

pub async fn register_form(MaybeUser(user): MaybeUser) -> Html<RegisterPage> {
    Html(RegisterPage { user })
}

/// register_user
///
/// [Public Route] Creates an account with role `user`. A duplicate username is
/// answered with 409 and the existing account is not modified.
pub async fn register_user(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Redirect> {
    auth::register(state.repo.as_ref(), &form.username, &form.password).await?;
    Ok(Redirect::to("/"))
}

pub async fn login_form(MaybeUser(user): MaybeUser) -> Html<LoginPage> {
    Html(LoginPage { user })
}

/// login
///
/// [Public Route] On success the session becomes authenticated and admins land on
/// the admin panel, everyone else on the home page. On failure the session is
/// not touched.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Redirect> {
    let Some(user) = auth::authenticate(state.repo.as_ref(), &form.username, &form.password).await?
    else {
        tracing::info!(username = %form.username, "Failed login");
        return Err(AppError::InvalidCredentials);
    };

    auth::start_session(&session, &user).await?;
    tracing::info!(user_id = user.id, role = %user.role, "User logged in");

    Ok(Redirect::to(if user.is_admin() { "/admin" } else { "/" }))
}

/// logout
///
/// Destroys the session whether or not anyone was logged in.
pub async fn logout(session: Session) -> AppResult<Redirect> {
    auth::end_session(&session).await?;
    Ok(Redirect::to("/"))
}

// --- Authenticated ---

/// add_comment
///
/// [Authenticated Route] The author name is copied from the session. The text is
/// stored as submitted; escaping happens when it is rendered.
pub async fn add_comment(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Redirect> {
    if !state
        .repo
        .add_comment(post_id, &user.username, &form.comment)
        .await?
    {
        return Err(AppError::NotFound(POST_NOT_FOUND));
    }

    Ok(Redirect::to(&format!("/post/{}", post_id)))
}

// --- Admin ---

/// admin_panel
///
/// [Admin Route] Same listing as the home page, with management links.
pub async fn admin_panel(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Html<AdminPage>> {
    let posts = state.repo.list_posts().await?;
    Ok(Html(AdminPage {
        user: Some(admin),
        posts,
    }))
}

pub async fn new_post_form(AdminUser(admin): AdminUser) -> Html<PostFormPage> {
    Html(PostFormPage::create(admin))
}

/// create_post
///
/// [Admin Route] Title, content and image URL are stored exactly as submitted.
pub async fn create_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Form(form): Form<PostForm>,
) -> AppResult<Redirect> {
    let id = state.repo.create_post(form).await?;
    tracing::info!(post_id = id, admin = %admin.username, "Post created");
    Ok(Redirect::to("/admin"))
}

pub async fn edit_post_form(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Html<PostFormPage>> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or(AppError::NotFound(POST_NOT_FOUND))?;
    Ok(Html(PostFormPage::edit(admin, post)))
}

pub async fn update_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> AppResult<Redirect> {
    if !state.repo.update_post(id, form).await? {
        return Err(AppError::NotFound(POST_NOT_FOUND));
    }
    tracing::info!(post_id = id, admin = %admin.username, "Post updated");
    Ok(Redirect::to("/admin"))
}

/// delete_post
///
/// [Admin Route] Removes the post and all of its comments in one transaction.
pub async fn delete_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    if !state.repo.delete_post(id).await? {
        return Err(AppError::NotFound(POST_NOT_FOUND));
    }
    tracing::info!(post_id = id, admin = %admin.username, "Post deleted with its comments");
    Ok(Redirect::to("/admin"))
}
