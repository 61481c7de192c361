mod read;
mod types;
mod write;

pub(crate) use types::{POST_SELECT, PostRow};
