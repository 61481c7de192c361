use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use tempfile::TempDir;
use tower::ServiceExt;
use yatube::{
    application::{
        context::{Repositories, Services},
        pagination::PageRequest,
        repos::{
            CommentsRepo, CreateGroupParams, CreatePostParams, FollowsRepo, GroupsRepo,
            PostListScope, PostsRepo, PostsWriteRepo, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState, INDEX_PAGE_PREFIX, PageCache},
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::{
        http::{HttpState, REQUEST_ID_HEADER, build_router, identity::REMOTE_USER_HEADER},
        memory::InMemoryRepositories,
        uploads::UploadStorage,
    },
};

const BOUNDARY: &str = "yatube-test-boundary";

struct Harness {
    router: Router,
    repos: Arc<InMemoryRepositories>,
    cache: Arc<PageCache>,
    _uploads: TempDir,
}

fn harness() -> Harness {
    let uploads_dir = tempfile::tempdir().expect("temp uploads dir");
    let repos = Arc::new(InMemoryRepositories::new());
    let uploads = Arc::new(
        UploadStorage::new(uploads_dir.path().to_path_buf()).expect("upload storage"),
    );
    let services = Services::new(&Repositories::from_store(repos.clone()), uploads.clone());

    let config = CacheConfig::default();
    let cache = Arc::new(PageCache::new(&config));
    let cache_state = CacheState::new(config, cache.clone(), INDEX_PAGE_PREFIX);
    let state = HttpState::new(&services, uploads, cache_state, 1024 * 1024);

    Harness {
        router: build_router(state),
        repos,
        cache,
        _uploads: uploads_dir,
    }
}

impl Harness {
    async fn user(&self, username: &str) -> UserRecord {
        self.repos.create_user(username).await.expect("user")
    }

    async fn group(&self, slug: &str) -> GroupRecord {
        self.repos
            .create_group(CreateGroupParams {
                title: "Test group".into(),
                slug: slug.into(),
                description: "Test description".into(),
            })
            .await
            .expect("group")
    }

    async fn post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
    ) -> PostRecord {
        self.repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.into(),
                group_id: group.map(|group| group.id),
                image: None,
            })
            .await
            .expect("post")
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    async fn get(&self, uri: &str, viewer: Option<&str>) -> Response {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(viewer) = viewer {
            request = request.header(REMOTE_USER_HEADER, viewer);
        }
        self.send(request.body(Body::empty()).expect("request"))
            .await
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn post_cards(html: &str) -> usize {
    html.matches("<article class=\"post\">").count()
}

fn multipart_post_form(text: &str, group: &str) -> Body {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"text\"\r\n\r\n\
         {text}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"group\"\r\n\r\n\
         {group}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Body::from(body)
}

/// Smallest valid GIF: one transparent pixel.
const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

fn multipart_post_form_with_image(text: &str, group: &str) -> Body {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"text\"\r\n\r\n\
         {text}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"group\"\r\n\r\n\
         {group}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"small.gif\"\r\n\
         Content-Type: image/gif\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(SMALL_GIF);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, viewer: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(REMOTE_USER_HEADER, viewer)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .expect("request")
}

#[tokio::test]
async fn index_paginates_ten_posts_per_page() {
    let h = harness();
    let author = h.user("auth").await;
    for n in 0..13 {
        h.post(&author, &format!("Post number {n}"), None).await;
    }

    let first = h.get("/", None).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_text(first).await;
    assert_eq!(post_cards(&first), 10);
    assert!(first.contains("Post number 12"));

    let second = body_text(h.get("/?page=2", None).await).await;
    assert_eq!(post_cards(&second), 3);
    assert!(second.contains("Post number 0"));
}

#[tokio::test]
async fn group_and_profile_pages_list_their_posts() {
    let h = harness();
    let author = h.user("auth").await;
    let other = h.user("other").await;
    let group = h.group("test-slug").await;
    h.post(&author, "Grouped post", Some(&group)).await;
    h.post(&other, "Ungrouped post", None).await;

    let group_page = body_text(h.get("/group/test-slug/", None).await).await;
    assert!(group_page.contains("Grouped post"));
    assert!(!group_page.contains("Ungrouped post"));

    let profile = body_text(h.get("/profile/other/", None).await).await;
    assert!(profile.contains("Ungrouped post"));
    assert!(profile.contains("Posts: 1"));

    assert_eq!(
        h.get("/group/missing/", None).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        h.get("/profile/nobody/", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn unknown_pages_render_the_not_found_template() {
    let h = harness();

    let response = h.get("/unexisting_page/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));

    assert_eq!(h.get("/posts/999/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.get("/posts/abc/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn about_pages_are_public() {
    let h = harness();
    assert_eq!(h.get("/about/author/", None).await.status(), StatusCode::OK);
    assert_eq!(h.get("/about/tech/", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let h = harness();
    let author = h.user("auth").await;
    let post = h.post(&author, "Text", None).await;

    let response = h.get("/create/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=%2Fcreate%2F");

    let edit = format!("/posts/{}/edit/", post.id);
    let response = h.get(&edit, None).await;
    assert_eq!(
        location(&response),
        format!("/auth/login/?next=%2Fposts%2F{}%2Fedit%2F", post.id)
    );

    let response = h.get("/follow/", None).await;
    assert_eq!(location(&response), "/auth/login/?next=%2Ffollow%2F");
}

#[tokio::test]
async fn creating_a_post_redirects_to_the_profile() {
    let h = harness();
    h.user("auth").await;
    let group = h.group("test-slug").await;

    let response = h
        .send(multipart_request(
            "/create/",
            "auth",
            multipart_post_form("Fresh post", &group.id.to_string()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/auth/");

    let posts = h
        .repos
        .list_posts(PostListScope::All, PageRequest::posts(1))
        .await
        .expect("posts");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "Fresh post");
    assert_eq!(
        posts[0].group.as_ref().map(|group| group.id),
        Some(group.id)
    );
}

#[tokio::test]
async fn blank_post_text_re_renders_the_form() {
    let h = harness();
    h.user("auth").await;

    let response = h
        .send(multipart_request(
            "/create/",
            "auth",
            multipart_post_form("   ", ""),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = h
        .repos
        .count_posts(PostListScope::All)
        .await
        .expect("count");
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn only_the_author_can_edit() {
    let h = harness();
    let author = h.user("auth").await;
    h.user("other").await;
    let post = h.post(&author, "Original", None).await;
    let edit = format!("/posts/{}/edit/", post.id);

    let response = h
        .send(multipart_request(
            &edit,
            "other",
            multipart_post_form("Hijacked", ""),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let response = h
        .send(multipart_request(
            &edit,
            "auth",
            multipart_post_form("Edited", ""),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let stored = PostsRepo::find_by_id(h.repos.as_ref(), post.id)
        .await
        .expect("lookup")
        .expect("post");
    assert_eq!(stored.text, "Edited");
}

#[tokio::test]
async fn comments_require_a_signed_in_user() {
    let h = harness();
    let author = h.user("auth").await;
    let post = h.post(&author, "Commented post", None).await;
    let uri = format!("/posts/{}/comment/", post.id);

    let anonymous = Request::builder()
        .method(Method::POST)
        .uri(&uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("text=Hello"))
        .expect("request");
    let response = h.send(anonymous).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(h.repos.count_comments().await.expect("count"), 0);

    let signed_in = Request::builder()
        .method(Method::POST)
        .uri(&uri)
        .header(REMOTE_USER_HEADER, "auth")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("text=Nice+post"))
        .expect("request");
    let response = h.send(signed_in).await;
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
    assert_eq!(h.repos.count_comments().await.expect("count"), 1);

    let detail = body_text(h.get(&format!("/posts/{}/", post.id), None).await).await;
    assert!(detail.contains("Nice post"));
}

#[tokio::test]
async fn follow_and_unfollow_toggle_the_edge() {
    let h = harness();
    h.user("reader").await;
    let author = h.user("auth").await;
    h.user("stranger").await;
    h.post(&author, "Followed author post", None).await;

    let response = h.get("/profile/auth/follow/", Some("reader")).await;
    assert_eq!(location(&response), "/profile/auth/");
    assert_eq!(h.repos.count_follows().await.expect("count"), 1);

    h.get("/profile/auth/follow/", Some("reader")).await;
    assert_eq!(h.repos.count_follows().await.expect("count"), 1);

    h.get("/profile/auth/follow/", Some("auth")).await;
    assert_eq!(h.repos.count_follows().await.expect("count"), 1);

    let feed = body_text(h.get("/follow/", Some("reader")).await).await;
    assert!(feed.contains("Followed author post"));
    let other_feed = body_text(h.get("/follow/", Some("stranger")).await).await;
    assert!(!other_feed.contains("Followed author post"));

    assert!(feed.contains("<ul class=\"following\">"));
    assert!(feed.contains("<li><a href=\"/profile/auth/\">auth</a></li>"));

    h.get("/profile/auth/unfollow/", Some("reader")).await;
    assert_eq!(h.repos.count_follows().await.expect("count"), 0);

    let feed = body_text(h.get("/follow/", Some("reader")).await).await;
    assert!(!feed.contains("Followed author post"));
    assert!(!feed.contains("class=\"following\""));
    assert!(feed.contains("No posts yet."));
}

#[tokio::test]
async fn non_ascii_usernames_produce_encoded_locations() {
    let h = harness();
    h.user("reader").await;
    let author = h.user("Тест").await;
    h.post(&author, "Пост автора", None).await;
    let encoded = "/profile/%D0%A2%D0%B5%D1%81%D1%82/";

    let response = h
        .get(&format!("{encoded}follow/"), Some("reader"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), encoded);
    assert_eq!(h.repos.count_follows().await.expect("count"), 1);

    let profile = h.get(encoded, None).await;
    assert_eq!(profile.status(), StatusCode::OK);
    let index = body_text(h.get("/", None).await).await;
    assert!(index.contains(&format!("href=\"{encoded}\"")));
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let h = harness();

    let response = h.get("/about/tech/", None).await;
    let id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("request id header");
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn uploaded_image_is_stored_and_shown_everywhere() {
    let h = harness();
    h.user("auth").await;
    let group = h.group("test-slug").await;

    let response = h
        .send(multipart_request(
            "/create/",
            "auth",
            multipart_post_form_with_image("Post with image", &group.id.to_string()),
        ))
        .await;
    assert_eq!(location(&response), "/profile/auth/");

    let posts = h
        .repos
        .list_posts(PostListScope::All, PageRequest::posts(1))
        .await
        .expect("posts");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].image.as_deref(), Some("posts/small.gif"));
    let image_src = "src=\"/media/posts/small.gif\"";

    for uri in [
        "/".to_string(),
        "/group/test-slug/".to_string(),
        "/profile/auth/".to_string(),
        format!("/posts/{}/", posts[0].id),
    ] {
        let page = body_text(h.get(&uri, None).await).await;
        assert!(page.contains(image_src), "no image on {uri}");
    }

    let media = h.get("/media/posts/small.gif", None).await;
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(media.headers()[header::CONTENT_TYPE], "image/gif");
    let bytes = axum::body::to_bytes(media.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(bytes.as_ref(), SMALL_GIF);

    assert_eq!(
        h.get("/media/posts/missing.gif", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn index_render_is_reused_until_the_cache_is_cleared() {
    let h = harness();
    let author = h.user("auth").await;
    let post = h.post(&author, "Soon deleted", None).await;

    let before = body_text(h.get("/", None).await).await;
    assert!(before.contains("Soon deleted"));

    h.repos.delete_post(post.id).await.expect("delete");
    let cached = body_text(h.get("/", None).await).await;
    assert_eq!(cached, before);

    h.cache.clear();
    let fresh = body_text(h.get("/", None).await).await;
    assert_ne!(fresh, before);
    assert!(!fresh.contains("Soon deleted"));
}
