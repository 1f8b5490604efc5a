//! Contact message command handlers.

use anyhow::Result;

use super::format_timestamp;
use crate::cli::client::AdminClient;

pub async fn list(client: &AdminClient) -> Result<()> {
    let messages = client.content().list_messages().await?;
    if messages.is_empty() {
        println!("No messages found.");
        return Ok(());
    }

    for (index, msg) in messages.iter().enumerate() {
        if index > 0 {
            println!();
        }
        println!(
            "{} <{}>  {}",
            msg.name,
            msg.email,
            format_timestamp(msg.created_at())
        );
        let details: Vec<&str> = [&msg.phone, &msg.company, &msg.service]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .filter(|field| !field.is_empty())
            .collect();
        if !details.is_empty() {
            println!("{}", details.join(" | "));
        }
        println!("{}", msg.message);
    }
    Ok(())
}
