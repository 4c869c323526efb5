//! Интерактивный режим: экраны входа, регистрации и ленты в терминале.

use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result};
use blog_client::views::{
    CreatePostForm, HomeView, LoginForm, PostsView, RegisterForm, SubmitOutcome,
};
use blog_client::{AuthEvent, AuthScreen, BlogPost, Session, Store, ViewScope};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tracing::warn;

const TO_REGISTER: &str = ":register";
const TO_LOGIN: &str = ":login";
const CANCEL: &str = ":cancel";
const QUIT: &str = ":q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HomeCommand {
    NewPost,
    Open(usize),
    Quit,
    Unknown,
}

/// Нажатия Ctrl-C за всё время работы приложения.
///
/// После регистрации обработчика tokio Ctrl-C больше не завершает процесс,
/// поэтому слушатель один и живёт до выхода.
struct Interrupts {
    presses: watch::Receiver<u64>,
}

impl Interrupts {
    fn listen() -> Self {
        let (tx, presses) = watch::channel(0);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tx.send_modify(|count| *count += 1);
            }
            warn!("ctrl-c listener stopped");
        });
        Self { presses }
    }

    /// Ждёт следующего нажатия. Если слушатель остановился, не завершается никогда.
    async fn next(&mut self) {
        if self.presses.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

struct Console {
    lines: Lines<BufReader<Stdin>>,
    interrupts: Interrupts,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            interrupts: Interrupts::listen(),
        }
    }

    /// `None` означает конец ввода (Ctrl-D) или Ctrl-C.
    async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}: ");
        std::io::stdout().flush().context("failed to flush stdout")?;
        let line = tokio::select! {
            line = self.lines.next_line() => line.context("failed to read stdin")?,
            _ = self.interrupts.next() => {
                println!();
                None
            }
        };
        Ok(line.map(|line| line.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn alert(&mut self, message: &str) -> Result<Flow> {
        println!();
        println!("!! {message}");
        Ok(match self.prompt("press Enter to continue").await? {
            Some(_) => Flow::Continue,
            None => Flow::Quit,
        })
    }

    /// Ctrl-C отменяет область представления; future доходит до конца уже как отменённая.
    async fn interruptible<F: Future>(&mut self, scope: &ViewScope, future: F) -> F::Output {
        interruptible(scope, &mut self.interrupts, future).await
    }
}

/// Запускает экранный цикл. Экран определяется до первой отрисовки.
pub async fn run(store: Store) -> Result<()> {
    let mut session = store.session().context("failed to restore session")?;
    let mut console = Console::new();

    loop {
        let flow = match session.screen() {
            AuthScreen::Login => login_screen(&store, &mut session, &mut console).await?,
            AuthScreen::Register => register_screen(&store, &mut session, &mut console).await?,
            AuthScreen::Home => return home_screen(store.clone(), &mut console).await,
        };
        if flow == Flow::Quit {
            return Ok(());
        }
    }
}

async fn interruptible<F: Future>(
    scope: &ViewScope,
    interrupts: &mut Interrupts,
    future: F,
) -> F::Output {
    tokio::pin!(future);
    tokio::select! {
        output = &mut future => output,
        _ = interrupts.next() => {
            scope.cancel();
            future.await
        }
    }
}

async fn report(console: &mut Console, outcome: &SubmitOutcome) -> Result<Flow> {
    match outcome {
        SubmitOutcome::Success => {}
        SubmitOutcome::Inline(message) => println!("error: {message}"),
        SubmitOutcome::Alert(message) => return console.alert(message).await,
        SubmitOutcome::Cancelled => println!("cancelled"),
    }
    Ok(Flow::Continue)
}

async fn login_screen(store: &Store, session: &mut Session, console: &mut Console) -> Result<Flow> {
    println!();
    println!("== Sign in ==  ({TO_REGISTER}: no account? register, {QUIT}: quit)");

    let Some(email) = console.prompt("email").await? else {
        return Ok(Flow::Quit);
    };
    match email.trim() {
        QUIT => return Ok(Flow::Quit),
        TO_REGISTER => {
            session.apply(AuthEvent::ShowRegister)?;
            return Ok(Flow::Continue);
        }
        _ => {}
    }
    let Some(password) = console.prompt("password").await? else {
        return Ok(Flow::Quit);
    };

    let form = LoginForm { email, password };
    let scope = ViewScope::new();
    println!("Loading...");
    let outcome = console
        .interruptible(&scope, form.submit(store, session, &scope.token()))
        .await;
    report(console, &outcome).await
}

async fn register_screen(
    store: &Store,
    session: &mut Session,
    console: &mut Console,
) -> Result<Flow> {
    println!();
    println!("== Sign up ==  ({TO_LOGIN}: already have account? login, {QUIT}: quit)");

    let mut values = Vec::with_capacity(4);
    for label in ["firstname", "lastname", "email", "password"] {
        let Some(value) = console.prompt(label).await? else {
            return Ok(Flow::Quit);
        };
        match value.trim() {
            QUIT => return Ok(Flow::Quit),
            TO_LOGIN => {
                session.apply(AuthEvent::ShowLogin)?;
                return Ok(Flow::Continue);
            }
            _ => values.push(value),
        }
    }

    let [first_name, last_name, email, password]: [String; 4] = values
        .try_into()
        .map_err(|_| anyhow::anyhow!("register form is incomplete"))?;
    let form = RegisterForm {
        first_name,
        last_name,
        email,
        password,
    };

    let scope = ViewScope::new();
    println!("Loading...");
    let outcome = console
        .interruptible(&scope, form.submit(store, session, &scope.token()))
        .await;
    if outcome == SubmitOutcome::Success {
        println!("Registered. Please sign in.");
    }
    report(console, &outcome).await
}

async fn home_screen(store: Store, console: &mut Console) -> Result<()> {
    let mut home = HomeView::new(store);

    loop {
        if let Some(post) = home.selected_post() {
            println!("{}", render_post(post));
            if console.prompt("press Enter to close").await?.is_none() {
                return Ok(());
            }
            home.close_post();
            continue;
        }

        if home.show_create_form() {
            if create_post_form(&mut home, console).await? == Flow::Quit {
                return Ok(());
            }
            continue;
        }

        println!();
        println!("== My Blog ==");
        let scope = ViewScope::new();
        println!("loading posts...");
        let view = console
            .interruptible(&scope, home.load_posts(&scope.token()))
            .await;
        if scope.is_cancelled() {
            println!("loading cancelled");
        } else {
            println!("{}", render_feed(&view));
        }

        let input = tokio::select! {
            input = console.prompt("[n] new post, [1..] open post, [q] quit") => input?,
            // лента обновилась в кэше: перерисовываем
            _ = home.posts_changed() => continue,
        };
        let Some(input) = input else {
            return Ok(());
        };

        match parse_home_command(&input) {
            HomeCommand::NewPost => home.open_create_form(),
            HomeCommand::Quit => return Ok(()),
            HomeCommand::Open(number) => {
                let id = match &view {
                    PostsView::Loaded(posts) => posts.get(number - 1).map(|post| post.id.clone()),
                    _ => None,
                };
                if !id.is_some_and(|id| home.open_post(&id)) {
                    println!("no post #{number}");
                }
            }
            HomeCommand::Unknown => println!("unknown command: {input}"),
        }
    }
}

async fn create_post_form(home: &mut HomeView, console: &mut Console) -> Result<Flow> {
    println!();
    println!("== New Post ==  ({CANCEL}: cancel)");

    let mut values = Vec::with_capacity(3);
    for label in ["Enter blog title", "Enter blog subtitle", "Enter blog content"] {
        let Some(value) = console.prompt(label).await? else {
            return Ok(Flow::Quit);
        };
        if value.trim() == CANCEL {
            home.close_create_form();
            return Ok(Flow::Continue);
        }
        values.push(value);
    }

    let [title, subtitle, content]: [String; 3] = values
        .try_into()
        .map_err(|_| anyhow::anyhow!("post form is incomplete"))?;
    let form = CreatePostForm {
        title,
        subtitle,
        content,
    };

    let scope = ViewScope::new();
    println!("Creating...");
    let outcome = console
        .interruptible(&scope, home.create_post(&form, &scope.token()))
        .await;
    report(console, &outcome).await
}

fn parse_home_command(input: &str) -> HomeCommand {
    match input.trim() {
        "n" | "N" => HomeCommand::NewPost,
        "q" | "Q" | QUIT => HomeCommand::Quit,
        other => match other.parse::<usize>() {
            Ok(number) if number > 0 => HomeCommand::Open(number),
            _ => HomeCommand::Unknown,
        },
    }
}

fn render_card(number: usize, post: &BlogPost) -> String {
    format!("[{number}] {}\n    {}", post.title, post.subtitle)
}

fn render_feed(view: &PostsView) -> String {
    match view {
        PostsView::Loaded(posts) => posts
            .iter()
            .enumerate()
            .map(|(index, post)| render_card(index + 1, post))
            .collect::<Vec<_>>()
            .join("\n"),
        PostsView::Empty => "No posts found".to_string(),
        PostsView::Failed(message) => format!("error: {message}"),
    }
}

fn render_post(post: &BlogPost) -> String {
    format!(
        "\n# {}\n## {}\n{}\n{}\n{}",
        post.title,
        post.subtitle,
        post.created_at.format("%Y-%m-%d"),
        "-".repeat(40),
        post.content
    )
}
