use askama::Template;
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::{Comment, Post, PostForm, SessionUser},
};

/// Wrapper to render askama templates as axum responses.
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => AppError::Template(e).into_response(),
        }
    }
}

// Every page carries `user` so the shared layout can render the navigation.

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub user: Option<SessionUser>,
    pub posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutPage {
    pub user: Option<SessionUser>,
}

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactPage {
    pub user: Option<SessionUser>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostPage {
    pub user: Option<SessionUser>,
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage {
    pub user: Option<SessionUser>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub user: Option<SessionUser>,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminPage {
    pub user: Option<SessionUser>,
    pub posts: Vec<Post>,
}

/// PostFormPage
///
/// Shared by the create and edit screens; `action` is where the form posts to.
#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormPage {
    pub user: Option<SessionUser>,
    pub heading: &'static str,
    pub action: String,
    pub form: PostForm,
}

impl PostFormPage {
    pub fn create(user: SessionUser) -> Self {
        Self {
            user: Some(user),
            heading: "New post",
            action: "/add-post".to_string(),
            form: PostForm::default(),
        }
    }

    pub fn edit(user: SessionUser, post: Post) -> Self {
        Self {
            user: Some(user),
            heading: "Edit post",
            action: format!("/edit-post/{}", post.id),
            form: PostForm {
                title: post.title,
                content: post.content,
                image_url: post.image_url,
            },
        }
    }
}
