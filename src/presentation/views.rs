use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{GroupListing, PostDetail, ProfileListing};
use crate::application::pagination::Page;
use crate::application::posts::{FormErrors, PostDraft};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::format_human_date;
use crate::infra::http::routes;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome, path: &str) -> Response {
    let content = NotFoundView {
        path: path.to_string(),
    };
    let view = LayoutContext::new(chrome, "Page not found", content);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub profile_path: String,
}

/// Page furniture shared by every template.
#[derive(Clone)]
pub struct LayoutChrome {
    pub viewer: Option<ViewerView>,
    pub navigation: NavigationView,
}

impl LayoutChrome {
    pub fn new(viewer: Option<&UserRecord>, current_path: &str) -> Self {
        let mut links = vec![
            ("About the author", routes::ABOUT_AUTHOR.to_string()),
            ("Technologies", routes::ABOUT_TECH.to_string()),
        ];
        if viewer.is_some() {
            links.push(("Following", routes::follow_index()));
            links.push(("New post", routes::post_create()));
        }

        let entries = links
            .into_iter()
            .map(|(label, href)| NavigationLinkView {
                label: label.to_string(),
                is_active: href == current_path,
                href,
            })
            .collect();

        Self {
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                profile_path: routes::profile(&user.username),
            }),
            navigation: NavigationView { entries },
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub title: String,
    pub viewer: Option<ViewerView>,
    pub navigation: NavigationView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        Self {
            title: title.into(),
            viewer: chrome.viewer,
            navigation: chrome.navigation,
            content,
        }
    }
}

/// One post as shown in listings and on its detail page.
#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub label: String,
    pub author: String,
    pub author_path: String,
    pub created: String,
    pub detail_path: String,
    pub group_title: Option<String>,
    pub group_path: Option<String>,
    pub image_url: Option<String>,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            label: post.label(),
            author: post.author.username.clone(),
            author_path: routes::profile(&post.author.username),
            created: format_human_date(post.created.timestamp()),
            detail_path: routes::post_detail(post.id),
            group_title: post.group.as_ref().map(|group| group.title.clone()),
            group_path: post.group.as_ref().map(|group| routes::group_list(&group.slug)),
            image_url: post.image.as_deref().map(routes::media),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    pub fn new<T>(page: &Page<T>, base_path: &str) -> Self {
        let pages = (1..=page.num_pages())
            .map(|number| PageLinkView {
                number,
                href: routes::with_page(base_path, number),
                is_current: number == page.number,
            })
            .collect();

        Self {
            number: page.number,
            num_pages: page.num_pages(),
            previous: page
                .previous_number()
                .map(|number| routes::with_page(base_path, number)),
            next: page
                .next_number()
                .map(|number| routes::with_page(base_path, number)),
            pages,
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct ListingContext {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl ListingContext {
    pub fn new(page: &Page<PostRecord>, base_path: &str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::new(page, base_path),
        }
    }
}

/// Listing without surrounding context: the index page.
pub struct FeedContext {
    pub listing: ListingContext,
}

impl FeedContext {
    pub fn new(page: &Page<PostRecord>, base_path: &str) -> Self {
        Self {
            listing: ListingContext::new(page, base_path),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedContext>,
}

/// Personal feed plus the authors it is built from.
pub struct FollowIndexContext {
    pub authors: Vec<ViewerView>,
    pub listing: ListingContext,
}

impl FollowIndexContext {
    pub fn new(page: &Page<PostRecord>, authors: &[UserRecord]) -> Self {
        Self {
            authors: authors
                .iter()
                .map(|author| ViewerView {
                    username: author.username.clone(),
                    profile_path: routes::profile(&author.username),
                })
                .collect(),
            listing: ListingContext::new(page, routes::FOLLOW_INDEX),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowIndexTemplate {
    pub view: LayoutContext<FollowIndexContext>,
}

pub struct GroupListContext {
    pub title: String,
    pub description: String,
    pub listing: ListingContext,
}

impl From<&GroupListing> for GroupListContext {
    fn from(listing: &GroupListing) -> Self {
        Self {
            title: listing.group.label().to_string(),
            description: listing.group.description.clone(),
            listing: ListingContext::new(&listing.page, &routes::group_list(&listing.group.slug)),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub view: LayoutContext<GroupListContext>,
}

pub struct ProfileContext {
    pub username: String,
    pub post_count: u64,
    pub following: bool,
    pub can_follow: bool,
    pub follow_path: String,
    pub unfollow_path: String,
    pub listing: ListingContext,
}

impl From<&ProfileListing> for ProfileContext {
    fn from(profile: &ProfileListing) -> Self {
        let username = profile.author.username.clone();
        Self {
            post_count: profile.post_count,
            following: profile.following,
            can_follow: profile.can_follow,
            follow_path: routes::profile_follow(&username),
            unfollow_path: routes::profile_unfollow(&username),
            listing: ListingContext::new(&profile.page, &routes::profile(&username)),
            username,
        }
    }
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author: String,
    pub author_path: String,
    pub created: String,
    pub text: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author: comment.author.username.clone(),
            author_path: routes::profile(&comment.author.username),
            created: format_human_date(comment.created.timestamp()),
            text: comment.text.clone(),
        }
    }
}

pub struct CommentFormView {
    pub action: String,
    pub text: String,
    pub errors: Vec<String>,
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    /// Present for signed-in viewers only.
    pub comment_form: Option<CommentFormView>,
    pub edit_path: Option<String>,
}

impl PostDetailContext {
    pub fn new(detail: &PostDetail, viewer: Option<&UserRecord>) -> Self {
        let post = &detail.post;
        Self {
            post: PostCard::from(post),
            author_post_count: detail.author_post_count,
            comments: detail.comments.iter().map(CommentView::from).collect(),
            comment_form: viewer.map(|_| CommentFormView {
                action: routes::add_comment(post.id),
                text: String::new(),
                errors: Vec::new(),
            }),
            edit_path: viewer
                .filter(|user| user.id == post.author.id)
                .map(|_| routes::post_edit(post.id)),
        }
    }

    /// Re-show a rejected comment with its errors.
    pub fn with_comment_errors(mut self, text: &str, errors: &FormErrors) -> Self {
        if let Some(form) = self.comment_form.as_mut() {
            form.text = text.to_string();
            form.errors = errors.field("text").to_vec();
        }
        self
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Clone)]
pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub no_group_selected: bool,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormContext {
    pub fn create(draft: &PostDraft, groups: &[GroupRecord], errors: &FormErrors) -> Self {
        Self::build(false, routes::post_create(), draft, groups, errors, None)
    }

    pub fn edit(
        post: &PostRecord,
        draft: &PostDraft,
        groups: &[GroupRecord],
        errors: &FormErrors,
    ) -> Self {
        Self::build(
            true,
            routes::post_edit(post.id),
            draft,
            groups,
            errors,
            post.image.as_deref().map(routes::media),
        )
    }

    fn build(
        is_edit: bool,
        action: String,
        draft: &PostDraft,
        groups: &[GroupRecord],
        errors: &FormErrors,
        current_image: Option<String>,
    ) -> Self {
        let selected = draft.group.as_deref().map(str::trim).unwrap_or("");
        Self {
            is_edit,
            action,
            text: draft.text.clone(),
            groups: groups
                .iter()
                .map(|group| GroupOptionView {
                    id: group.id,
                    title: group.label().to_string(),
                    selected: group.id.to_string() == selected,
                })
                .collect(),
            no_group_selected: selected.is_empty(),
            current_image,
            text_errors: errors.field("text").to_vec(),
            group_errors: errors.field("group").to_vec(),
            image_errors: errors.field("image").to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct NotFoundView {
    pub path: String,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}
