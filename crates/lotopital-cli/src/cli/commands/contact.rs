//! Contact form command handler.

use anyhow::Result;
use lotopital_core::api::ContactForm;

use crate::cli::client::AdminClient;

pub async fn send(client: &AdminClient, form: &ContactForm) -> Result<()> {
    let ack = client.content().send_contact(form).await?;
    println!(
        "{}",
        ack.message_or("Your message has been sent successfully. We'll get back to you shortly.")
    );
    Ok(())
}
