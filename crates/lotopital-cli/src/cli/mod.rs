//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use lotopital_core::api::{ApiError, ContactForm, PostDraft, split_tags};
use lotopital_core::{config, logging};

mod client;
mod commands;

use client::AdminClient;

#[derive(Parser)]
#[command(name = "lotopital")]
#[command(version = "0.1")]
#[command(about = "Lotopital site admin back office")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the site API (overrides LOTOPITAL_API_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    #[command(flatten)]
    Admin(AdminCommands),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that talk to the site API.
#[derive(clap::Subcommand)]
enum AdminCommands {
    /// Log in as an admin
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// End the admin session and forget stored cookies
    Logout,
    /// Show the logged-in admin
    Whoami,
    /// Register a new admin account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long = "confirm-password")]
        confirm_password: String,
    },
    /// Password recovery
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },
    /// Confirm an email address with the token from the verification email
    VerifyEmail {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Send the verification email again
    ResendVerification,
    /// Manage blog categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage blog posts
    Posts {
        #[command(subcommand)]
        command: PostCommands,
    },
    /// Read contact form messages
    Messages {
        #[command(subcommand)]
        command: MessageCommands,
    },
    /// Submit the public contact form
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, default_value = "")]
        service: String,
    },
}

#[derive(clap::Subcommand)]
enum PasswordCommands {
    /// Email a password reset link
    Forgot {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token
    Reset {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(clap::Subcommand)]
enum CategoryCommands {
    /// List categories
    List,
    /// Create a category
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename or describe a category
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a category
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Post fields shared by create and update.
#[derive(clap::Args, Debug, Clone, Default)]
struct PostFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    excerpt: Option<String>,
    #[arg(long)]
    content: Option<String>,
    /// Category ID
    #[arg(long)]
    category: Option<String>,
    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,
    /// URL of the already uploaded primary image
    #[arg(long = "image", value_name = "URL")]
    primary_image: Option<String>,
    /// Mark the post as trending (true/false)
    #[arg(long)]
    trending: Option<bool>,
}

#[derive(clap::Subcommand)]
enum PostCommands {
    /// Search posts
    List {
        /// Search text
        #[arg(long, default_value = "")]
        q: String,
        /// Category ID
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one post
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Create a post
    Create {
        #[command(flatten)]
        fields: PostFields,
    },
    /// Update a post (only the given fields change)
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[command(flatten)]
        fields: PostFields,
    },
    /// Delete a post
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum MessageCommands {
    /// List contact form messages
    List,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Store the API base URL in the config file
    SetApiUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let Cli { command, api_url } = Cli::parse();

    // Config commands must work even when the config file is broken.
    let command = match command {
        Commands::Config { command } => {
            return match command {
                ConfigCommands::Path => {
                    commands::config::path();
                    Ok(())
                }
                ConfigCommands::Init => commands::config::init(),
                ConfigCommands::SetApiUrl { url } => commands::config::set_api_url(&url),
            };
        }
        Commands::Admin(command) => command,
    };

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config).context("init logging")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(command, api_url.as_deref(), &config).await })
}

async fn dispatch(
    command: AdminCommands,
    api_url: Option<&str>,
    config: &config::Config,
) -> Result<()> {
    let mut client = AdminClient::open(config, api_url)?;
    let result = execute(command, &mut client).await;
    let saved = client.finish();

    let result = result.map_err(|err| {
        let unauthorized = err
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_unauthorized);
        if unauthorized {
            err.context("Not logged in. Run `lotopital login` first")
        } else {
            err
        }
    });
    result?;
    saved
}

async fn execute(command: AdminCommands, client: &mut AdminClient) -> Result<()> {
    match command {
        AdminCommands::Login { email, password } => {
            commands::auth::login(client, &email, password).await
        }
        AdminCommands::Logout => commands::auth::logout(client).await,
        AdminCommands::Whoami => commands::auth::whoami(client).await,
        AdminCommands::Signup {
            name,
            email,
            password,
            confirm_password,
        } => commands::auth::signup(client, &name, &email, &password, &confirm_password).await,
        AdminCommands::Password { command } => match command {
            PasswordCommands::Forgot { email } => {
                commands::auth::forgot_password(client, &email).await
            }
            PasswordCommands::Reset { token, password } => {
                commands::auth::reset_password(client, &token, &password).await
            }
        },
        AdminCommands::VerifyEmail { token } => commands::auth::verify_email(client, &token).await,
        AdminCommands::ResendVerification => commands::auth::resend_verification(client).await,

        AdminCommands::Categories { command } => match command {
            CategoryCommands::List => commands::categories::list(client).await,
            CategoryCommands::Create { name, description } => {
                commands::categories::create(client, name, description).await
            }
            CategoryCommands::Update {
                id,
                name,
                description,
            } => commands::categories::update(client, &id, name, description).await,
            CategoryCommands::Delete { id } => commands::categories::delete(client, &id).await,
        },

        AdminCommands::Posts { command } => match command {
            PostCommands::List { q, category, page } => {
                commands::posts::list(client, q, category, page).await
            }
            PostCommands::Show { id } => commands::posts::show(client, &id).await,
            PostCommands::Create { fields } => {
                commands::posts::create(client, fields.into_draft()).await
            }
            PostCommands::Update { id, fields } => {
                commands::posts::update(client, &id, fields.into_draft()).await
            }
            PostCommands::Delete { id } => commands::posts::delete(client, &id).await,
        },

        AdminCommands::Messages { command } => match command {
            MessageCommands::List => commands::messages::list(client).await,
        },

        AdminCommands::Contact {
            name,
            email,
            message,
            phone,
            company,
            service,
        } => {
            let form = ContactForm {
                name,
                email,
                phone,
                company,
                service,
                message,
            };
            commands::contact::send(client, &form).await
        }
    }
}

impl PostFields {
    fn into_draft(self) -> PostDraft {
        PostDraft {
            title: self.title,
            excerpt: self.excerpt,
            content: self.content,
            category: self.category,
            tag: self.tags.as_deref().map(split_tags),
            primary_image: self.primary_image,
            is_trending: self.trending,
        }
    }
}
