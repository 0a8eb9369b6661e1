//! Bible Annotations CLI
//!
//! Fetches and edits a chapter's annotations against the note/highlight
//! service from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bible_annotations::annotations::{Annotation, SharedStore, VerseRef};
use bible_annotations::config::ClientConfig;
use bible_annotations::sync::AnnotationSyncClient;

/// Verse annotations and highlights from the command line
#[derive(Parser)]
#[command(name = "bible-annotations")]
#[command(version)]
struct Cli {
    /// Service base URL (overrides BIBLE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token (overrides BIBLE_API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every verse's notes and highlights in a chapter
    Show { book: String, chapter: u32 },
    /// Highlight a character range of a verse
    Highlight {
        book: String,
        chapter: u32,
        verse: u32,
        start: usize,
        end: usize,

        /// Highlight color (default: BIBLE_HIGHLIGHT_COLOR)
        #[arg(long)]
        color: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bible_annotations=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (mut config, problem) = ClientConfig::from_env_lossy();
    if let Some(e) = problem {
        tracing::warn!("{}, using the default", e);
    }
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url);
    }
    if let Some(token) = &cli.token {
        config = config.with_token(token);
    }
    tracing::debug!("Using service at {}", config.api.base_url);

    let store = SharedStore::create();
    let client = AnnotationSyncClient::from_config(&config, store.clone())
        .context("Failed to build HTTP client")?;

    match cli.command {
        Commands::Show { book, chapter } => {
            let count = client
                .fetch_chapter(&book, chapter)
                .await
                .with_context(|| format!("Failed to fetch {} {}", book, chapter))?;
            println!("{} {}: {} annotations", book, chapter, count);

            let store = store.read();
            for note in store.chapter_notes(&book, chapter) {
                println!("  [chapter] {}", note.content);
            }
            for verse in store.annotated_verses(&book, chapter) {
                for annotation in store.get(&book, chapter, verse) {
                    println!("  {}:{} {}", chapter, verse, describe(annotation));
                }
            }
        }
        Commands::Highlight {
            book,
            chapter,
            verse,
            start,
            end,
            color,
        } => {
            let verse = VerseRef::new(&book, chapter, verse);
            let highlights = client
                .save_highlight(&verse, start, end, color.as_deref())
                .await
                .with_context(|| format!("Failed to highlight {}", verse))?;

            println!("{}: {} highlights", verse, highlights.len());
            for highlight in &highlights {
                println!(
                    "  [{}, {}) {} ({})",
                    highlight.start_offset, highlight.end_offset, highlight.color, highlight.id
                );
            }
        }
    }

    store.dispose();
    Ok(())
}

fn describe(annotation: &Annotation) -> String {
    let owner = annotation.owner().username().unwrap_or("me");
    match annotation {
        Annotation::Note(note) => format!("[{} note, {}] {}", note.kind.as_str(), owner, note.content),
        Annotation::Highlight(h) => format!(
            "[highlight, {}] [{}, {}) {}",
            owner, h.start_offset, h.end_offset, h.color
        ),
    }
}
