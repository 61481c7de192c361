//! Route patterns and path builders for the public site.

use url::form_urlencoded;

use crate::domain::entities::PostId;

pub const INDEX: &str = "/";
pub const GROUP_LIST: &str = "/group/{slug}/";
pub const PROFILE: &str = "/profile/{username}/";
pub const POST_DETAIL: &str = "/posts/{post_id}/";
pub const POST_CREATE: &str = "/create/";
pub const POST_EDIT: &str = "/posts/{post_id}/edit/";
pub const ADD_COMMENT: &str = "/posts/{post_id}/comment/";
pub const FOLLOW_INDEX: &str = "/follow/";
pub const PROFILE_FOLLOW: &str = "/profile/{username}/follow/";
pub const PROFILE_UNFOLLOW: &str = "/profile/{username}/unfollow/";
pub const ABOUT_AUTHOR: &str = "/about/author/";
pub const ABOUT_TECH: &str = "/about/tech/";
pub const MEDIA: &str = "/media/{*path}";
pub const LOGIN: &str = "/auth/login/";

pub fn group_list(slug: &str) -> String {
    format!("/group/{}/", segment(slug))
}

pub fn profile(username: &str) -> String {
    format!("/profile/{}/", segment(username))
}

pub fn post_detail(post_id: PostId) -> String {
    format!("/posts/{post_id}/")
}

pub fn post_create() -> String {
    POST_CREATE.to_string()
}

pub fn post_edit(post_id: PostId) -> String {
    format!("/posts/{post_id}/edit/")
}

pub fn add_comment(post_id: PostId) -> String {
    format!("/posts/{post_id}/comment/")
}

pub fn follow_index() -> String {
    FOLLOW_INDEX.to_string()
}

pub fn profile_follow(username: &str) -> String {
    format!("/profile/{}/follow/", segment(username))
}

pub fn profile_unfollow(username: &str) -> String {
    format!("/profile/{}/unfollow/", segment(username))
}

pub fn media(stored_path: &str) -> String {
    let encoded: Vec<String> = stored_path.split('/').map(segment).collect();
    format!("/media/{}", encoded.join("/"))
}

/// Login page that returns to `next` afterwards.
pub fn login(next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN}?{query}")
}

/// `base` with `?page=N` appended.
pub fn with_page(base: &str, page: u32) -> String {
    format!("{base}?page={page}")
}

/// Percent-encodes one path segment.
fn segment(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
