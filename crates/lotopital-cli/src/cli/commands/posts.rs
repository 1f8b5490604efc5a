//! Post command handlers.

use anyhow::Result;
use lotopital_core::api::{Post, PostDraft, PostList, PostPage, PostQuery};

use super::format_timestamp;
use crate::cli::client::AdminClient;

fn category_label(post: &Post) -> &str {
    post.category
        .as_ref()
        .map_or("-", |category| category.name().unwrap_or(category.id()))
}

fn print_summary(post: &Post) {
    let trending = if post.is_trending { "  [trending]" } else { "" };
    println!(
        "{}  {}  {}  {}{}",
        post.id,
        post.title,
        category_label(post),
        format_timestamp(post.created_at()),
        trending
    );
}

/// The post as currently stored, so local edits can be shown without a
/// second fetch.
async fn shown_post(client: &AdminClient, id: &str) -> Result<PostList> {
    let post = client.content().get_post(id).await?;
    Ok(PostList::new(PostPage {
        posts: vec![post],
        ..PostPage::default()
    }))
}

pub async fn list(client: &AdminClient, q: String, category: String, page: u32) -> Result<()> {
    let query = PostQuery { q, category, page };
    let list = PostList::new(client.content().search_posts(&query).await?);

    if list.is_empty() {
        println!("No posts found.");
        return Ok(());
    }
    for post in list.posts() {
        print_summary(post);
    }
    if let Some(total) = list.total_pages() {
        println!("Page {} of {}", list.current_page(), total);
    }
    Ok(())
}

pub async fn show(client: &AdminClient, id: &str) -> Result<()> {
    let post = client.content().get_post(id).await?;

    println!("{}", post.title);
    println!("id: {}", post.id);
    println!("category: {}", category_label(&post));
    if let Some(author) = post.author_name() {
        println!("author: {author}");
    }
    println!("created: {}", format_timestamp(post.created_at()));
    if !post.tag.is_empty() {
        println!("tags: {}", post.tag.join(", "));
    }
    if let Some(image) = &post.primary_image {
        println!("image: {image}");
    }
    if post.is_trending {
        println!("trending: yes");
    }
    if !post.excerpt.is_empty() {
        println!("\n{}", post.excerpt);
    }
    println!("\n{}", post.content);
    Ok(())
}

pub async fn create(client: &AdminClient, draft: PostDraft) -> Result<()> {
    if draft.title.is_none() || draft.content.is_none() || draft.category.is_none() {
        anyhow::bail!("A new post needs --title, --content and --category");
    }
    let ack = client.content().create_post(&draft).await?;
    println!("{}", ack.message_or("Post created successfully"));
    Ok(())
}

pub async fn update(client: &AdminClient, id: &str, draft: PostDraft) -> Result<()> {
    if draft == PostDraft::default() {
        anyhow::bail!("Nothing to update. Pass at least one field to change");
    }
    let mut shown = shown_post(client, id).await?;
    let ack = client.content().update_post(id, &draft).await?;
    println!("{}", ack.message_or("Post updated successfully"));
    if shown.apply_update(id, &draft)
        && let Some(post) = shown.get(id)
    {
        print_summary(post);
    }
    Ok(())
}

pub async fn delete(client: &AdminClient, id: &str) -> Result<()> {
    let mut shown = shown_post(client, id).await?;
    let ack = client.content().delete_post(id).await?;
    println!("{}", ack.message_or("Post deleted successfully"));
    if let Some(post) = shown.remove(id) {
        println!("Removed \"{}\"", post.title);
    }
    Ok(())
}
