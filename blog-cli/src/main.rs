use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use blog_client::{
    AuthEvent, AuthScreen, BlogClientError, BlogPost, FileStorage, NewBlogPost, Store,
};
use clap::{Parser, Subcommand};
use tracing::debug;

mod app;
mod logging;
mod settings;

use logging::init_logging;
use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "blog-cli", version, about = "Terminal client for the blog API")]
struct Cli {
    /// Базовый URL API (по умолчанию BLOG_API_URL или http://localhost:3000/api).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Файл хранилища токена (по умолчанию BLOG_STORAGE_PATH или .blog_storage.json).
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Интерактивный режим с экранами входа, регистрации и ленты (по умолчанию).
    App,
    /// Вход пользователя.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Регистрация пользователя.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Все посты.
    Posts,
    /// Посты текущего пользователя (требует токен).
    Mine,
    /// Один пост из ленты.
    Show {
        #[arg(long)]
        id: String,
    },
    /// Создание поста (требует токен).
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value = "")]
        content: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    init_logging(&settings.log_level)?;

    let mut config = settings.client_config();
    if let Some(server) = cli.server {
        config.api_base_url = normalize_server(server);
    }
    let storage_path = cli.storage.unwrap_or_else(|| settings.storage_path.clone());
    debug!(api = %config.api_base_url, storage = %storage_path.display(), "starting");

    let store = Store::new(&config, Arc::new(FileStorage::new(storage_path)))
        .context("failed to build client")?;

    match cli.command.unwrap_or(Command::App) {
        Command::App => app::run(store).await?,
        Command::Login { email, password } => {
            let mut session = store.session().map_err(map_client_error)?;
            if session.screen() == AuthScreen::Home {
                return Err(anyhow!(
                    "already signed in; remove the storage file to sign in as another user"
                ));
            }
            let token = store
                .auth()
                .login(&email, &password)
                .await
                .and_then(|response| response.into_data())
                .map_err(map_client_error)?
                .token;
            session
                .apply(AuthEvent::LoginSucceeded { token })
                .map_err(map_client_error)?;
            println!("Signed in");
        }
        Command::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            let response = store
                .auth()
                .register(&first_name, &last_name, &email, &password)
                .await
                .map_err(map_client_error)?;
            if !response.success {
                return Err(map_client_error(BlogClientError::Rejected(
                    response.failure_message(),
                )));
            }
            println!("Registered: {email}");
        }
        Command::Posts => {
            let posts = store
                .blog()
                .fetch_all_posts()
                .await
                .and_then(|response| response.into_data())
                .map_err(map_client_error)?;
            print_list(&posts);
        }
        Command::Mine => {
            let posts = store
                .blog()
                .fetch_personal_posts()
                .await
                .and_then(|response| response.into_data())
                .map_err(map_client_error)?;
            print_list(&posts);
        }
        Command::Show { id } => {
            store
                .blog()
                .fetch_all_posts()
                .await
                .map_err(map_client_error)?;
            let post = store
                .blog()
                .cached_post(&id)
                .ok_or_else(|| map_client_error(BlogClientError::NotFound(format!("post {id}"))))?;
            print_post("Post", &post);
        }
        Command::Create {
            title,
            subtitle,
            content,
        } => {
            let post = NewBlogPost {
                title,
                subtitle,
                content,
            };
            let created = store
                .blog()
                .create_blog_post(&post)
                .await
                .and_then(|response| response.into_data())
                .map_err(map_client_error)?;
            print_post("Post created", &created);
        }
    }

    Ok(())
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn map_client_error(err: BlogClientError) -> anyhow::Error {
    let message = match err {
        BlogClientError::Unauthorized(message) => format!(
            "authorization required ({message}): run `blog-cli login ...` first"
        ),
        BlogClientError::NotFound(message) => format!("not found: {message}"),
        BlogClientError::InvalidRequest(message) => format!("invalid request: {message}"),
        BlogClientError::Rejected(message) => message,
        BlogClientError::Http(err) => format!("network error: {err}"),
        other => other.to_string(),
    };
    anyhow!(message)
}

fn print_post(title: &str, post: &BlogPost) {
    println!("{title}");
    println!("id: {}", post.id);
    println!("title: {}", post.title);
    println!("subtitle: {}", post.subtitle);
    println!("content: {}", post.content);
    println!("author_id: {}", post.author_id);
    println!("created_at: {}", post.created_at);
    println!("updated_at: {}", post.updated_at);
}

fn print_list(posts: &[BlogPost]) {
    if posts.is_empty() {
        println!("No posts found");
        return;
    }

    println!("Posts: {}", posts.len());
    for post in posts {
        println!("- [{}] {} (author_id={})", post.id, post.title, post.author_id);
    }
}
