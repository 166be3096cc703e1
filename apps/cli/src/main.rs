use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, parse_tags, selectors, Engine, HttpBackend, Operation, PostDraft,
    SessionStatus,
};
use shared::{domain::PostId, protocol::PostPatch};
use storage::SqliteTokenStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blog", about = "Command-line client for the blog backend")]
struct Cli {
    /// Settings file; defaults to ./client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Register {
        name: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Whoami,
    /// Lists posts, one page at a time.
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        summary: Option<String>,
        /// Comma-separated.
        #[arg(long, default_value = "")]
        tags: String,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        published: Option<bool>,
    },
    Delete {
        id: String,
    },
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    let tokens = SqliteTokenStore::new(&settings.token_database_url)
        .await
        .context("failed to open token store")?;
    let backend = HttpBackend::new(&settings)?;
    let engine = Engine::new(settings, Arc::new(backend), Arc::new(tokens)).await?;

    if let Some(restore) = engine.restore_session() {
        restore.await?;
    }
    info!(status = ?engine.select(selectors::session_status), "session restored");

    match cli.command {
        Command::Register {
            name,
            email,
            password,
        } => {
            engine
                .dispatch(Operation::Register {
                    name,
                    email,
                    password,
                })
                .await?;
            session_outcome(&engine)?;
        }
        Command::Login { email, password } => {
            engine.dispatch(Operation::Login { email, password }).await?;
            session_outcome(&engine)?;
        }
        Command::Logout => {
            engine.dispatch(Operation::Logout).await?;
            let warning = engine.select(|s| selectors::session_error(s).map(str::to_string));
            if let Some(message) = warning {
                eprintln!("warning: {message}");
            }
            println!("signed out");
        }
        Command::Whoami => session_outcome(&engine)?,
        Command::List { page } => {
            engine.dispatch(Operation::ListPosts).await?;
            content_outcome(&engine)?;
            let pagination = engine.pagination();
            let page_index = page.saturating_sub(1);
            engine.select(|state| {
                let items = selectors::items(state);
                for item in selectors::page(state, pagination, page_index) {
                    println!("{}  {}  by {}", item.id, item.title, item.author_ref.display_name);
                }
                println!(
                    "page {page}/{} ({} posts)",
                    pagination.page_count(items.len()).max(1),
                    items.len()
                );
            });
        }
        Command::Show { id } => {
            let id = PostId::new(id);
            engine
                .dispatch(Operation::FetchPost { id: id.clone() })
                .await?;
            content_outcome(&engine)?;
            let item = engine
                .select(|state| selectors::item(state, &id).cloned())
                .context("post missing after fetch")?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Command::Create {
            title,
            body,
            summary,
            tags,
        } => {
            let mut draft = PostDraft::new(title, body).with_tags(parse_tags(&tags));
            if let Some(summary) = summary {
                draft = draft.with_summary(summary);
            }
            engine.dispatch(Operation::CreatePost(draft)).await?;
            content_outcome(&engine)?;
            if let Some(item) = engine.select(|state| selectors::items(state).first().cloned()) {
                println!("created {}", item.id);
            }
        }
        Command::Update {
            id,
            title,
            body,
            summary,
            tags,
            published,
        } => {
            let patch = PostPatch {
                title,
                body,
                summary,
                tags: tags.as_deref().map(parse_tags),
                is_published: published,
            };
            if patch.is_empty() {
                bail!("nothing to update");
            }
            engine
                .dispatch(Operation::UpdatePost {
                    id: PostId::new(id.clone()),
                    patch,
                })
                .await?;
            content_outcome(&engine)?;
            println!("updated {id}");
        }
        Command::Delete { id } => {
            engine
                .dispatch(Operation::DeletePost {
                    id: PostId::new(id.clone()),
                })
                .await?;
            content_outcome(&engine)?;
            println!("deleted {id}");
        }
        Command::Status => print_session(&engine),
    }

    Ok(())
}

fn session_outcome(engine: &Engine) -> Result<()> {
    if let Some(message) = engine.select(|s| selectors::session_error(s).map(str::to_string)) {
        bail!(message);
    }
    print_session(engine);
    Ok(())
}

fn content_outcome(engine: &Engine) -> Result<()> {
    match engine.select(|s| selectors::content_error(s).map(str::to_string)) {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn print_session(engine: &Engine) {
    engine.select(|state| match selectors::current_identity(state) {
        Some(identity) => println!(
            "signed in as {} <{}> ({} authored posts)",
            identity.display_name,
            identity.email,
            selectors::authored(state).len()
        ),
        None if selectors::session_status(state) == SessionStatus::Authenticating => {
            println!("session pending confirmation")
        }
        None => println!("not signed in"),
    });
}
