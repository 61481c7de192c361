//! Post authoring: create, edit and comment, with form validation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupId, GroupRecord, PostId, PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::clean_text;
use crate::infra::uploads::{UploadStorage, UploadStorageError};

pub const INVALID_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Field-keyed validation messages, rendered next to the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (*field, messages.as_slice()))
    }

    fn absorb(&mut self, error: DomainError) {
        match error {
            DomainError::Validation { field, message } => self.add(field, message),
            other => self.add("__all__", other.to_string()),
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("invalid form: {0}")]
    Invalid(FormErrors),
    #[error("unknown post {0}")]
    UnknownPost(PostId),
    #[error("post {0} belongs to another author")]
    NotAuthor(PostId),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Raw post form input as submitted.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    /// Group id as typed in the select; blank means no group.
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

impl PostDraft {
    /// Prefill from an existing post for the edit form.
    pub fn from_post(post: &PostRecord) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group.as_ref().map(|group| group.id.to_string()),
            image: None,
        }
    }
}

struct CleanPost {
    text: String,
    group_id: Option<GroupId>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    uploads: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        uploads: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            uploads,
        }
    }

    /// Groups offered by the post form, ordered by title.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let clean = self.validate(draft).await?;
        let image = self.store_image(clean.image).await?;

        let created = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: clean.text,
                group_id: clean.group_id,
                image: image.clone(),
            })
            .await;
        let post = match created {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image.as_deref(), "create").await;
                return Err(err.into());
            }
        };

        info!(
            target = "application::posts",
            post_id = post.id,
            author = %author.username,
            "post created"
        );
        Ok(post)
    }

    /// The post `editor` may edit. Other authors get [`PostError::NotAuthor`].
    pub async fn load_for_edit(
        &self,
        editor: &UserRecord,
        post_id: PostId,
    ) -> Result<PostRecord, PostError> {
        let post = self.find(post_id).await?;
        if post.author.id != editor.id {
            return Err(PostError::NotAuthor(post_id));
        }
        Ok(post)
    }

    pub async fn edit_post(
        &self,
        editor: &UserRecord,
        post_id: PostId,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let current = self.load_for_edit(editor, post_id).await?;
        let clean = self.validate(draft).await?;
        let image = self.store_image(clean.image).await?;

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                text: clean.text,
                group_id: clean.group_id,
                image: image.clone(),
            })
            .await;
        let post = match updated {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image.as_deref(), "edit").await;
                return Err(err.into());
            }
        };

        // A replaced image is no longer referenced by any post.
        if image.is_some() && current.image != post.image {
            self.discard_image(current.image.as_deref(), "replace").await;
        }

        info!(target = "application::posts", post_id, "post updated");
        Ok(post)
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: PostId,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        self.find(post_id).await?;
        let text = clean_text("text", text).map_err(|err| {
            let mut errors = FormErrors::default();
            errors.absorb(err);
            PostError::Invalid(errors)
        })?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = "application::posts",
            post_id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(comment)
    }

    async fn find(&self, post_id: PostId) -> Result<PostRecord, PostError> {
        self.reader
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost(post_id))
    }

    async fn validate(&self, draft: PostDraft) -> Result<CleanPost, PostError> {
        let mut errors = FormErrors::default();

        let text = match clean_text("text", &draft.text) {
            Ok(text) => Some(text),
            Err(err) => {
                errors.absorb(err);
                None
            }
        };

        let group_id = match draft.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match self.resolve_group(raw).await? {
                Some(id) => Some(id),
                None => {
                    errors.add("group", INVALID_GROUP_MESSAGE);
                    None
                }
            },
        };

        let image = draft.image.filter(|upload| !upload.data.is_empty());
        if let Some(upload) = &image
            && imagesize::blob_size(&upload.data).is_err()
        {
            errors.add("image", INVALID_IMAGE_MESSAGE);
        }

        match text {
            Some(text) if errors.is_empty() => Ok(CleanPost {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn resolve_group(&self, raw: &str) -> Result<Option<GroupId>, PostError> {
        let Ok(id) = raw.parse::<GroupId>() else {
            return Ok(None);
        };
        Ok(self.groups.find_by_id(id).await?.map(|group| group.id))
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        match image {
            Some(upload) => {
                let stored = self
                    .uploads
                    .store_image(&upload.filename, upload.data)
                    .await?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    /// Best-effort removal of a stored image; failures are only logged.
    async fn discard_image(&self, stored: Option<&str>, stage: &'static str) {
        let Some(stored) = stored else {
            return;
        };
        if let Err(err) = self.uploads.delete(stored).await {
            warn!(
                target = "application::posts",
                stage,
                image = stored,
                error = %err,
                "failed to remove post image"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{CreateGroupParams, UsersRepo};
    use crate::infra::memory::InMemoryRepositories;

    /// Smallest valid GIF: one transparent pixel.
    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    struct Fixture {
        repos: Arc<InMemoryRepositories>,
        service: PostService,
        uploads_dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let repos = Arc::new(InMemoryRepositories::new());
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = Arc::new(UploadStorage::new(dir.path().to_path_buf()).expect("storage"));
        let service = PostService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            uploads,
        );
        Fixture {
            repos,
            service,
            uploads_dir: dir,
        }
    }

    async fn user(repos: &InMemoryRepositories, name: &str) -> UserRecord {
        UsersRepo::create_user(repos, name).await.expect("user")
    }

    async fn group(repos: &InMemoryRepositories) -> GroupRecord {
        GroupsRepo::create_group(
            repos,
            CreateGroupParams {
                title: "Тестовая группа".into(),
                slug: "test-slug".into(),
                description: "Тестовое описание".into(),
            },
        )
        .await
        .expect("group")
    }

    #[tokio::test]
    async fn create_post_stores_text_group_and_image() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;
        let group = group(&fx.repos).await;

        let post = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "  Тестовый текст  ".into(),
                    group: Some(group.id.to_string()),
                    image: Some(ImageUpload {
                        filename: "small.gif".into(),
                        data: Bytes::from_static(SMALL_GIF),
                    }),
                },
            )
            .await
            .expect("post");

        assert_eq!(post.text, "Тестовый текст");
        assert_eq!(post.group.as_ref().map(|g| g.id), Some(group.id));
        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
        assert_eq!(post.author.id, author.id);
    }

    #[tokio::test]
    async fn invalid_form_collects_every_field_error() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;

        let result = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "   ".into(),
                    group: Some("999".into()),
                    image: Some(ImageUpload {
                        filename: "fake.gif".into(),
                        data: Bytes::from_static(b"not an image"),
                    }),
                },
            )
            .await;

        match result {
            Err(PostError::Invalid(errors)) => {
                assert_eq!(errors.field("text").len(), 1);
                assert_eq!(errors.field("group"), [INVALID_GROUP_MESSAGE]);
                assert_eq!(errors.field("image"), [INVALID_IMAGE_MESSAGE]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn edit_by_other_author_is_refused() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;
        let other = user(&fx.repos, "other").await;
        let post = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "original".into(),
                    ..PostDraft::default()
                },
            )
            .await
            .expect("post");

        let result = fx
            .service
            .edit_post(
                &other,
                post.id,
                PostDraft {
                    text: "hijacked".into(),
                    ..PostDraft::default()
                },
            )
            .await;
        assert!(matches!(result, Err(PostError::NotAuthor(id)) if id == post.id));

        let stored = PostsRepo::find_by_id(fx.repos.as_ref(), post.id)
            .await
            .expect("find")
            .expect("post");
        assert_eq!(stored.text, "original");
    }

    #[tokio::test]
    async fn edit_keeps_creation_time_and_image() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;
        let post = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "original".into(),
                    group: None,
                    image: Some(ImageUpload {
                        filename: "small.gif".into(),
                        data: Bytes::from_static(SMALL_GIF),
                    }),
                },
            )
            .await
            .expect("post");

        let edited = fx
            .service
            .edit_post(
                &author,
                post.id,
                PostDraft {
                    text: "changed".into(),
                    ..PostDraft::default()
                },
            )
            .await
            .expect("edit");

        assert_eq!(edited.text, "changed");
        assert_eq!(edited.created, post.created);
        assert_eq!(edited.image, post.image);
    }

    #[tokio::test]
    async fn comment_requires_text_and_existing_post() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;
        let post = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "post".into(),
                    ..PostDraft::default()
                },
            )
            .await
            .expect("post");

        let comment = fx
            .service
            .add_comment(&author, post.id, "Вежливый комментарий")
            .await
            .expect("comment");
        assert_eq!(comment.post_id, post.id);
        assert_eq!(comment.author.id, author.id);

        let blank = fx.service.add_comment(&author, post.id, "  ").await;
        assert!(matches!(blank, Err(PostError::Invalid(_))));

        let missing = fx.service.add_comment(&author, 999, "text").await;
        assert!(matches!(missing, Err(PostError::UnknownPost(999))));
    }

    #[tokio::test]
    async fn deleting_post_removes_comments() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;
        let post = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "post".into(),
                    ..PostDraft::default()
                },
            )
            .await
            .expect("post");
        fx.service
            .add_comment(&author, post.id, "comment")
            .await
            .expect("comment");

        fx.repos.delete_post(post.id).await.expect("delete");

        assert_eq!(fx.repos.count_comments().await.expect("count"), 0);
        assert!(
            PostsRepo::find_by_id(fx.repos.as_ref(), post.id)
                .await
                .expect("find")
                .is_none()
        );
    }

    fn stored_images(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("posts"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    struct RejectingWriter;

    #[async_trait::async_trait]
    impl PostsWriteRepo for RejectingWriter {
        async fn create_post(&self, _params: CreatePostParams) -> Result<PostRecord, RepoError> {
            Err(RepoError::Persistence("write refused".into()))
        }

        async fn update_post(&self, _params: UpdatePostParams) -> Result<PostRecord, RepoError> {
            Err(RepoError::Persistence("write refused".into()))
        }

        async fn delete_post(&self, _id: PostId) -> Result<(), RepoError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_write_removes_the_stored_image() {
        let repos = Arc::new(InMemoryRepositories::new());
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = Arc::new(UploadStorage::new(dir.path().to_path_buf()).expect("storage"));
        let service = PostService::new(
            repos.clone(),
            Arc::new(RejectingWriter),
            repos.clone(),
            repos.clone(),
            uploads,
        );
        let author = user(&repos, "auth").await;

        let result = service
            .create_post(
                &author,
                PostDraft {
                    text: "with image".into(),
                    group: None,
                    image: Some(ImageUpload {
                        filename: "small.gif".into(),
                        data: Bytes::from_static(SMALL_GIF),
                    }),
                },
            )
            .await;

        assert!(matches!(result, Err(PostError::Repo(_))));
        assert_eq!(stored_images(&dir), 0);
    }

    #[tokio::test]
    async fn replacing_an_image_removes_the_old_file() {
        let fx = fixture();
        let author = user(&fx.repos, "auth").await;
        let post = fx
            .service
            .create_post(
                &author,
                PostDraft {
                    text: "first".into(),
                    group: None,
                    image: Some(ImageUpload {
                        filename: "first.gif".into(),
                        data: Bytes::from_static(SMALL_GIF),
                    }),
                },
            )
            .await
            .expect("post");

        let edited = fx
            .service
            .edit_post(
                &author,
                post.id,
                PostDraft {
                    text: "second".into(),
                    group: None,
                    image: Some(ImageUpload {
                        filename: "second.gif".into(),
                        data: Bytes::from_static(SMALL_GIF),
                    }),
                },
            )
            .await
            .expect("edit");

        assert_eq!(edited.image.as_deref(), Some("posts/second.gif"));
        assert_eq!(stored_images(&fx.uploads_dir), 1);
        assert!(
            fx.uploads_dir
                .path()
                .join("posts/second.gif")
                .exists()
        );
    }
}
