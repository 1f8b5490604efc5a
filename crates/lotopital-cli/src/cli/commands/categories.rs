//! Category command handlers.

use anyhow::Result;
use lotopital_core::api::CategoryDraft;

use crate::cli::client::AdminClient;

pub async fn list(client: &AdminClient) -> Result<()> {
    let categories = client.content().list_categories().await?;
    if categories.is_empty() {
        println!("No categories found.");
        return Ok(());
    }
    for category in categories {
        match category.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => println!("{}  {}  {}", category.id, category.name, description),
            None => println!("{}  {}", category.id, category.name),
        }
    }
    Ok(())
}

pub async fn create(
    client: &AdminClient,
    name: String,
    description: Option<String>,
) -> Result<()> {
    let ack = client
        .content()
        .create_category(&CategoryDraft { name, description })
        .await?;
    println!("{}", ack.message_or("Category created successfully"));
    Ok(())
}

pub async fn update(
    client: &AdminClient,
    id: &str,
    name: String,
    description: Option<String>,
) -> Result<()> {
    let ack = client
        .content()
        .update_category(id, &CategoryDraft { name, description })
        .await?;
    println!("{}", ack.message_or("Category updated successfully"));
    Ok(())
}

pub async fn delete(client: &AdminClient, id: &str) -> Result<()> {
    let ack = client.content().delete_category(id).await?;
    println!("{}", ack.message_or("Category deleted successfully"));
    Ok(())
}
