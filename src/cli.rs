use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::access::UserIdentity;
use crate::actions::{Action, PageDirection};
use crate::app::App;
use crate::chat::{Message, MessageId, Role, EXAMPLE_PROMPTS, MAX_PROMPT_LENGTH};
use crate::client::{HttpBackend, ScholarBackend, UploadFile};
use crate::config::{ApiConfig, ScholarConfig};
use crate::document::DocumentPhase;
use crate::enrichment::EnrichmentKind;
use crate::error::ScholarResult;
use crate::language::{Language, LANGUAGES};
use crate::markdown;

/// Column limit for `/history` output
const HISTORY_WIDTH: usize = 100;

#[derive(Parser)]
#[command(name = "scholarly")]
#[command(version)]
#[command(about = "Extract text from documents, then explain, summarize or chat about it")]
pub struct Cli {
    /// Settings file (TOML); defaults plus SCHOLARLY_* environment variables when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path or URL of the API document (`{"localapi": ...}`)
    #[arg(long, global = true)]
    pub api_config: Option<String>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Signed-in user name; falls back to $USER
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run OCR on a document and print its pages
    Extract {
        file: PathBuf,

        /// Only print this page
        #[arg(short, long)]
        page: Option<String>,
    },
    /// Explain one page of a document
    Explain {
        file: PathBuf,

        #[arg(short, long, default_value = "1")]
        page: String,

        #[arg(short, long, default_value = "Hindi", value_parser = parse_language)]
        language: Language,
    },
    /// Summarize a whole document
    Summarize {
        file: PathBuf,

        #[arg(short, long, default_value = "Hindi", value_parser = parse_language)]
        language: Language,
    },
    /// Interactive chat on stdin
    Chat,
    /// List supported response languages
    Languages,
}

fn parse_language(value: &str) -> std::result::Result<Language, String> {
    Language::from_name(value).ok_or_else(|| format!("unknown language `{}`", value))
}

/// Load the API document and build the runtime
pub async fn build_app(cli: &Cli, config: &ScholarConfig) -> App {
    let source = cli
        .api_config
        .clone()
        .unwrap_or_else(|| config.api.config_source.clone());

    let backend = connect(&source, config).await;
    let user = cli
        .user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .filter(|name| !name.trim().is_empty())
        .map(|name| UserIdentity::new(name.clone(), name));

    App::new(backend, config.typing.tick_interval(), user)
}

async fn connect(source: &str, config: &ScholarConfig) -> ScholarResult<Arc<dyn ScholarBackend>> {
    let timeout = config.api.request_timeout();
    let api = ApiConfig::load(source, timeout).await?;
    let backend = HttpBackend::new(api, timeout)?;
    Ok(Arc::new(backend))
}

pub async fn run(cli: Cli, config: ScholarConfig) -> Result<()> {
    if let Commands::Languages = cli.command {
        languages_command();
        return Ok(());
    }

    let mut app = build_app(&cli, &config).await;
    match cli.command {
        Commands::Extract { file, page } => extract_command(&mut app, &file, page).await,
        Commands::Explain {
            file,
            page,
            language,
        } => enrich_command(&mut app, &file, EnrichmentKind::Explain, Some(page), language).await,
        Commands::Summarize { file, language } => {
            enrich_command(&mut app, &file, EnrichmentKind::Summarize, None, language).await
        }
        Commands::Chat => chat_command(&mut app).await,
        Commands::Languages => Ok(()),
    }
}

pub fn languages_command() {
    for (name, code) in LANGUAGES {
        println!("{:<20} {}", name, code);
    }
}

async fn load_document(app: &mut App, path: &Path) -> Result<()> {
    let file = UploadFile::from_path(path).await.map_err(|e| anyhow!(e.user_message()))?;
    println!("{} ({})", file.name, file.size_label());

    app.dispatch(Action::SelectFile(file));
    app.dispatch(Action::Extract);
    app.run_until_settled().await;

    if app.document().phase() != DocumentPhase::Extracted {
        bail!(app
            .document()
            .error()
            .unwrap_or("Extraction did not finish")
            .to_string());
    }
    Ok(())
}

fn jump(app: &mut App, page: &str) -> Result<()> {
    app.dispatch(Action::NavigatePage(PageDirection::Jump(page.to_string())));
    match app.document().pagination().cursor() {
        Some(cursor) if cursor.key.trim() == page.trim() => Ok(()),
        _ => bail!("Document has no page {}", page),
    }
}

pub async fn extract_command(app: &mut App, path: &Path, page: Option<String>) -> Result<()> {
    load_document(app, path).await?;

    if let Some(page) = page {
        jump(app, &page)?;
        print_current_page(app);
        return Ok(());
    }

    loop {
        print_current_page(app);
        if app.document().pagination().is_last() {
            break;
        }
        app.dispatch(Action::NavigatePage(PageDirection::Next));
    }
    Ok(())
}

fn print_current_page(app: &App) {
    let pagination = app.document().pagination();
    if let Some(label) = pagination.page_label() {
        println!("\n── {} ──", label);
    }
    println!("{}", pagination.current_text());
}

pub async fn enrich_command(
    app: &mut App,
    path: &Path,
    kind: EnrichmentKind,
    page: Option<String>,
    language: Language,
) -> Result<()> {
    load_document(app, path).await?;
    if let Some(page) = page {
        jump(app, &page)?;
    }

    app.dispatch(Action::RequestEnrichment(kind));
    if app.document().phase() != DocumentPhase::AwaitingLanguage {
        bail!(app
            .document()
            .error()
            .unwrap_or("Action is not available")
            .to_string());
    }

    app.dispatch(Action::SelectLanguage(language));
    app.dispatch(Action::ConfirmLanguage);
    eprintln!("{} ({})", kind.progress_label(), language);

    stream(app, |app| app.document().popup().map(|p| p.displayed.clone())).await?;

    if let Some(error) = app.document().error() {
        bail!(error.to_string());
    }
    Ok(())
}

/// Run the app until settled, echoing whatever `view` shows as it grows
async fn stream<F>(app: &mut App, mut view: F) -> Result<()>
where
    F: FnMut(&App) -> Option<String>,
{
    let mut stdout = std::io::stdout();
    let mut printed = 0usize;

    while !app.is_settled() {
        if !app.step().await {
            break;
        }
        if let Some(text) = view(app) {
            if text.len() > printed && text.is_char_boundary(printed) {
                write!(stdout, "{}", &text[printed..])?;
                stdout.flush()?;
                printed = text.len();
            }
        }
    }

    if printed > 0 {
        writeln!(stdout)?;
    }
    Ok(())
}

pub async fn chat_command(app: &mut App) -> Result<()> {
    println!("Type a message, /example N, /history, /clear or /quit.");
    for (i, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
        println!("  {}. {}", i + 1, prompt);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => {
                app.dispatch(Action::Quit);
                break;
            }
            "/clear" => {
                app.dispatch(Action::ClearChat);
                println!("Conversation cleared.");
                continue;
            }
            "/history" => {
                print_history(app);
                continue;
            }
            _ => {}
        }

        if let Some(number) = line.strip_prefix("/example") {
            let index = number.trim().parse::<usize>().unwrap_or(0).saturating_sub(1);
            app.dispatch(Action::UseExamplePrompt(index));
        } else {
            app.dispatch(Action::UpdateComposer(line.to_string()));
        }

        if let Some(notice) = app.chat().notice() {
            warn!(notice, "Composer rejected input");
            eprintln!("{} ({})", notice, app.chat().composer().counter());
            continue;
        }
        if line.starts_with("/example") {
            println!("{}", app.chat().composer().text());
        }

        app.dispatch(Action::SubmitChat);
        if let Some(notice) = app.chat().notice() {
            eprintln!("{}", notice);
            continue;
        }

        // The reply slot exists once the backend answers
        let mut reply: Option<MessageId> = None;
        stream(app, |app| {
            if reply.is_none() {
                reply = app.chat().typing_slot();
            }
            reply
                .and_then(|id| app.chat().transcript().get(id))
                .map(|m| m.content.clone())
        })
        .await?;
    }
    Ok(())
}

fn print_history(app: &App) {
    for message in app.chat().transcript().messages() {
        println!("{}", format_message(message));
    }
    println!("({} messages, prompt limit {} chars)", app.chat().transcript().len(), MAX_PROMPT_LENGTH);
}

/// Header line plus the styled body, wrapped and indented by two columns
fn format_message(message: &Message) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let body = textwrap::fill(&markdown::to_ansi(&message.content), HISTORY_WIDTH - 2);
    format!(
        "[{}] {}:\n{}",
        message.created_at.format("%H:%M:%S"),
        who,
        textwrap::indent(&body, "  ")
    )
}
