//! Locally displayed posts with optimistic edits.

use super::types::{Post, PostCategory, PostDraft, PostPage};

/// The posts currently on screen.
///
/// Edits are applied locally as soon as the server accepts them; the next
/// `replace` from a fresh fetch wins over anything applied here.
#[derive(Debug, Clone, Default)]
pub struct PostList {
    posts: Vec<Post>,
    current_page: u32,
    total_pages: Option<u32>,
}

impl PostList {
    pub fn new(page: PostPage) -> Self {
        let mut list = Self::default();
        list.replace(page);
        list
    }

    /// Resets from a server page.
    pub fn replace(&mut self, page: PostPage) {
        self.current_page = page.current_page.unwrap_or(1);
        self.total_pages = page.total_pages;
        self.posts = page.posts;
    }

    /// Merges the set fields of `draft` into the post with `id`.
    ///
    /// Returns false when no such post is shown.
    pub fn apply_update(&mut self, id: &str, draft: &PostDraft) -> bool {
        let Some(post) = self.posts.iter_mut().find(|p| p.id == id) else {
            return false;
        };

        if let Some(title) = &draft.title {
            post.title.clone_from(title);
        }
        if let Some(excerpt) = &draft.excerpt {
            post.excerpt.clone_from(excerpt);
        }
        if let Some(content) = &draft.content {
            post.content.clone_from(content);
        }
        if let Some(tag) = &draft.tag {
            post.tag.clone_from(tag);
        }
        if let Some(image) = &draft.primary_image {
            post.primary_image = Some(image.clone());
        }
        if let Some(trending) = draft.is_trending {
            post.is_trending = trending;
        }
        if let Some(category) = &draft.category {
            // Keep the populated category when only the id was resent.
            let unchanged = post
                .category
                .as_ref()
                .is_some_and(|current| current.id() == category);
            if !unchanged {
                post.category = Some(PostCategory::Id(category.clone()));
            }
        }
        true
    }

    /// Drops the post with `id`. Returns the removed post.
    pub fn remove(&mut self, id: &str) -> Option<Post> {
        let index = self.posts.iter().position(|p| p.id == id)?;
        Some(self.posts.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }
}
