//! Signed-in actions: post forms, comments and follow toggles.

use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, warn};

use crate::{
    application::{
        error::{HttpError, repo_error_to_http},
        follow::FollowError,
        posts::{FormErrors, ImageUpload, PostDraft, PostError},
    },
    domain::entities::{GroupRecord, PostRecord},
    presentation::views::{
        LayoutChrome, LayoutContext, PostFormContext, PostFormTemplate, render_not_found_response,
        render_template_response,
    },
};

use super::{
    HttpState,
    identity::RequireUser,
    public::{feed_error_to_response, parse_post_id, render_post_detail},
    routes,
};

const SOURCE: &str = "infra::http::write";

pub(super) async fn post_create_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), routes::POST_CREATE);
    match state.posts.group_choices().await {
        Ok(groups) => render_post_form(
            chrome,
            None,
            &PostDraft::default(),
            &groups,
            &FormErrors::default(),
        ),
        Err(err) => post_error_to_response(err, chrome, routes::POST_CREATE),
    }
}

pub(super) async fn post_create(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), routes::POST_CREATE);
    let draft = match read_post_draft(multipart).await {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };

    match state.posts.create_post(&user, draft.clone()).await {
        Ok(_) => Redirect::to(&routes::profile(&user.username)).into_response(),
        Err(PostError::Invalid(errors)) => match state.posts.group_choices().await {
            Ok(groups) => render_post_form(chrome, None, &draft, &groups, &errors),
            Err(err) => post_error_to_response(err, chrome, routes::POST_CREATE),
        },
        Err(err) => post_error_to_response(err, chrome, routes::POST_CREATE),
    }
}

pub(super) async fn post_edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), uri.path());
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, uri.path());
    };

    let post = match state.posts.load_for_edit(&user, post_id).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, chrome, uri.path()),
    };
    match state.posts.group_choices().await {
        Ok(groups) => render_post_form(
            chrome,
            Some(&post),
            &PostDraft::from_post(&post),
            &groups,
            &FormErrors::default(),
        ),
        Err(err) => post_error_to_response(err, chrome, uri.path()),
    }
}

pub(super) async fn post_edit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
    multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), uri.path());
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, uri.path());
    };
    let draft = match read_post_draft(multipart).await {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };

    match state.posts.edit_post(&user, post_id, draft.clone()).await {
        Ok(post) => Redirect::to(&routes::post_detail(post.id)).into_response(),
        Err(PostError::Invalid(errors)) => {
            let post = match state.posts.load_for_edit(&user, post_id).await {
                Ok(post) => post,
                Err(err) => return post_error_to_response(err, chrome, uri.path()),
            };
            match state.posts.group_choices().await {
                Ok(groups) => render_post_form(chrome, Some(&post), &draft, &groups, &errors),
                Err(err) => post_error_to_response(err, chrome, uri.path()),
            }
        }
        Err(err) => post_error_to_response(err, chrome, uri.path()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(post_id) = parse_post_id(&raw_id) else {
        let chrome = LayoutChrome::new(Some(&user), uri.path());
        return render_not_found_response(chrome, uri.path());
    };
    let detail_path = routes::post_detail(post_id);
    let chrome = LayoutChrome::new(Some(&user), &detail_path);

    match state.posts.add_comment(&user, post_id, &form.text).await {
        Ok(_) => Redirect::to(&detail_path).into_response(),
        Err(PostError::Invalid(errors)) => {
            render_post_detail(
                &state,
                chrome,
                Some(&user),
                post_id,
                &detail_path,
                Some((form.text.as_str(), &errors)),
            )
            .await
        }
        Err(err) => post_error_to_response(err, chrome, &detail_path),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.follow.follow(&user, &username).await {
        Ok((author, _)) => Redirect::to(&routes::profile(&author.username)).into_response(),
        Err(err) => {
            let chrome = LayoutChrome::new(Some(&user), uri.path());
            follow_error_to_response(err, chrome, uri.path())
        }
    }
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.follow.unfollow(&user, &username).await {
        Ok((author, _)) => Redirect::to(&routes::profile(&author.username)).into_response(),
        Err(err) => {
            let chrome = LayoutChrome::new(Some(&user), uri.path());
            follow_error_to_response(err, chrome, uri.path())
        }
    }
}

fn render_post_form(
    chrome: LayoutChrome,
    editing: Option<&PostRecord>,
    draft: &PostDraft,
    groups: &[GroupRecord],
    errors: &FormErrors,
) -> Response {
    let (title, content) = match editing {
        Some(post) => ("Edit post", PostFormContext::edit(post, draft, groups, errors)),
        None => ("New post", PostFormContext::create(draft, groups, errors)),
    };
    let view = LayoutContext::new(chrome, title, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

/// Collects the `text`, `group` and `image` fields of a post form.
async fn read_post_draft(mut multipart: Multipart) -> Result<PostDraft, HttpError> {
    let mut draft = PostDraft::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(HttpError::new(
                    SOURCE,
                    status,
                    "Invalid form data",
                    err.body_text(),
                ));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                draft.text = field.text().await.map_err(invalid_form_data)?;
            }
            Some("group") => {
                draft.group = Some(field.text().await.map_err(invalid_form_data)?);
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|value| !value.trim().is_empty());
                let data = field.bytes().await.map_err(invalid_form_data)?;
                if let Some(filename) = filename {
                    draft.image = Some(ImageUpload {
                        filename,
                        data,
                    });
                }
            }
            _ => continue,
        }
    }
    Ok(draft)
}

fn invalid_form_data(err: axum::extract::multipart::MultipartError) -> HttpError {
    HttpError::new(SOURCE, err.status(), "Invalid form data", err.body_text())
}

fn post_error_to_response(err: PostError, chrome: LayoutChrome, path: &str) -> Response {
    match err {
        PostError::UnknownPost(_) => render_not_found_response(chrome, path),
        PostError::NotAuthor(post_id) => Redirect::to(&routes::post_detail(post_id)).into_response(),
        PostError::Repo(repo) => repo_error_to_http(SOURCE, &repo).into_response(),
        PostError::Invalid(errors) => HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid form",
            errors.to_string(),
        )
        .into_response(),
        PostError::Storage(storage) => {
            warn!(target = SOURCE, error = %storage, "failed to store upload");
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store upload",
                &storage,
            )
            .into_response()
        }
    }
}

fn follow_error_to_response(err: FollowError, chrome: LayoutChrome, path: &str) -> Response {
    match err {
        FollowError::UnknownAuthor(_) => render_not_found_response(chrome, path),
        FollowError::Feed(feed) => feed_error_to_response(feed, chrome, path),
        FollowError::Repo(repo) => repo_error_to_http(SOURCE, &repo).into_response(),
    }
}
