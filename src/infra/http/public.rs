use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::{
        context::Services,
        error::{HttpError, repo_error_to_http},
        feed::{FeedError, FeedService},
        follow::FollowService,
        pagination::PageQuery,
        posts::PostService,
        users::UserService,
    },
    cache::{CacheState, page_cache_layer},
    domain::entities::{PostId, UserRecord},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, FeedContext, FollowIndexContext,
        FollowIndexTemplate, GroupListContext, GroupListTemplate, IndexTemplate, LayoutChrome,
        LayoutContext, PostDetailContext, PostDetailTemplate, ProfileContext, ProfileTemplate,
        render_not_found_response, render_template_response,
    },
};

use super::{
    identity::{CurrentUser, RequireUser},
    middleware::trace_requests,
    routes, write,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follow: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub users: Arc<UserService>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: CacheState,
    pub upload_body_limit: usize,
}

impl HttpState {
    pub fn new(
        services: &Services,
        upload_storage: Arc<UploadStorage>,
        cache: CacheState,
        upload_body_limit: usize,
    ) -> Self {
        Self {
            feed: services.feed.clone(),
            follow: services.follow.clone(),
            posts: services.posts.clone(),
            users: services.users.clone(),
            upload_storage,
            cache,
            upload_body_limit,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let index_route = get(index).layer(middleware::from_fn_with_state(
        state.cache.clone(),
        page_cache_layer,
    ));

    let form_routes = Router::new()
        .route(
            routes::POST_CREATE,
            get(write::post_create_form).post(write::post_create),
        )
        .route(
            routes::POST_EDIT,
            get(write::post_edit_form).post(write::post_edit),
        )
        .layer(DefaultBodyLimit::max(state.upload_body_limit));

    Router::new()
        .route(routes::INDEX, index_route)
        .route(routes::GROUP_LIST, get(group_list))
        .route(routes::PROFILE, get(profile))
        .route(routes::POST_DETAIL, get(post_detail))
        .route(routes::ADD_COMMENT, axum::routing::post(write::add_comment))
        .route(routes::FOLLOW_INDEX, get(follow_index))
        .route(routes::PROFILE_FOLLOW, get(write::profile_follow))
        .route(routes::PROFILE_UNFOLLOW, get(write::profile_unfollow))
        .route(routes::ABOUT_AUTHOR, get(about_author))
        .route(routes::ABOUT_TECH, get(about_tech))
        .route(routes::MEDIA, get(serve_media))
        .merge(form_routes)
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(trace_requests))
}

async fn index(
    State(state): State<HttpState>,
    CurrentUser(viewer): CurrentUser,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), routes::INDEX);
    match state.feed.index(query.request()).await {
        Ok(page) => {
            let content = FeedContext::new(&page, routes::INDEX);
            let view = LayoutContext::new(chrome, "Latest updates", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome, uri.path()),
    }
}

async fn group_list(
    State(state): State<HttpState>,
    CurrentUser(viewer): CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), uri.path());
    match state.feed.group_list(&slug, query.request()).await {
        Ok(listing) => {
            let content = GroupListContext::from(&listing);
            let view = LayoutContext::new(chrome, listing.group.label(), content);
            render_template_response(GroupListTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome, uri.path()),
    }
}

async fn profile(
    State(state): State<HttpState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), uri.path());
    match state
        .feed
        .profile(&username, viewer.as_ref(), query.request())
        .await
    {
        Ok(listing) => {
            let title = format!("Profile of {}", listing.author.username);
            let view = LayoutContext::new(chrome, title, ProfileContext::from(&listing));
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome, uri.path()),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    CurrentUser(viewer): CurrentUser,
    Path(raw_id): Path<String>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), uri.path());
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, uri.path());
    };
    render_post_detail(&state, chrome, viewer.as_ref(), post_id, uri.path(), None).await
}

/// Post page, optionally re-showing a rejected comment.
pub(super) async fn render_post_detail(
    state: &HttpState,
    chrome: LayoutChrome,
    viewer: Option<&UserRecord>,
    post_id: PostId,
    path: &str,
    rejected_comment: Option<(&str, &crate::application::posts::FormErrors)>,
) -> Response {
    match state.feed.post_detail(post_id).await {
        Ok(detail) => {
            let mut content = PostDetailContext::new(&detail, viewer);
            if let Some((text, errors)) = rejected_comment {
                content = content.with_comment_errors(text, errors);
            }
            let title = format!("Post {}", detail.post.label());
            let view = LayoutContext::new(chrome, title, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome, path),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(Some(&viewer), routes::FOLLOW_INDEX);
    let loaded = match state.follow.feed(&viewer, query.request()).await {
        Ok(page) => state
            .follow
            .following(&viewer)
            .await
            .map(|authors| (page, authors)),
        Err(err) => Err(err),
    };
    match loaded {
        Ok((page, authors)) => {
            let content = FollowIndexContext::new(&page, &authors);
            let view = LayoutContext::new(chrome, "Authors you follow", content);
            render_template_response(FollowIndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => {
            error!(
                target = "infra::http::public::follow_index",
                viewer = %viewer.username,
                path = %uri.path(),
                error = %err,
                "failed to load follow feed"
            );
            HttpError::from_error(
                "infra::http::public::follow_index",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load follow feed",
                &err,
            )
            .into_response()
        }
    }
}

async fn about_author(CurrentUser(viewer): CurrentUser) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), routes::ABOUT_AUTHOR);
    let view = LayoutContext::new(chrome, "About the author", ());
    render_template_response(AboutAuthorTemplate { view }, StatusCode::OK)
}

async fn about_tech(CurrentUser(viewer): CurrentUser) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), routes::ABOUT_TECH);
    let view = LayoutContext::new(chrome, "Technologies", ());
    render_template_response(AboutTechTemplate { view }, StatusCode::OK)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

async fn fallback(CurrentUser(viewer): CurrentUser, uri: Uri) -> Response {
    let chrome = LayoutChrome::new(viewer.as_ref(), uri.path());
    render_not_found_response(chrome, uri.path())
}

pub(super) fn parse_post_id(raw: &str) -> Option<PostId> {
    raw.parse::<PostId>().ok().filter(|id| *id > 0)
}

pub(super) fn feed_error_to_response(err: FeedError, chrome: LayoutChrome, path: &str) -> Response {
    match err {
        err if err.is_not_found() => render_not_found_response(chrome, path),
        FeedError::Repo(repo) => {
            repo_error_to_http("infra::http::feed_error_to_response", &repo).into_response()
        }
        other => HttpError::from_error(
            "infra::http::feed_error_to_response",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load listing",
            &other,
        )
        .into_response(),
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_must_be_positive_integers() {
        assert_eq!(parse_post_id("12"), Some(12));
        assert_eq!(parse_post_id("0"), None);
        assert_eq!(parse_post_id("-3"), None);
        assert_eq!(parse_post_id("abc"), None);
    }

    #[test]
    fn upload_response_sets_media_headers() {
        let response = build_upload_response("posts/small.gif", Bytes::from_static(b"GIF89a"));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/gif");
        assert_eq!(response.headers()[CONTENT_LENGTH], "6");
    }
}
