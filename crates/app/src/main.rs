use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_chat_core::config::{
    DEFAULT_AZURE_EMBEDDING_DIMENSIONS, DEFAULT_CHAT_API_VERSION, DEFAULT_CHAT_DEPLOYMENT,
    DEFAULT_EMBEDDING_DEPLOYMENT,
};
use pdf_chat_core::{
    extract_text, load_documents, resolve_pdf_inputs, split_text, AzureOpenAiChat,
    AzureOpenAiConfig, AzureOpenAiEmbedder, CharacterNgramEmbedder, ChatOrchestrator,
    ChunkingConfig, EmbeddingService, GenerationService, IngestionOptions, SessionOptions,
    SourceDocument, Turn,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum chunk length in characters
    #[arg(long, global = true, default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by neighbouring chunks
    #[arg(long, global = true, default_value = "200")]
    chunk_overlap: usize,

    /// Preferred chunk boundary
    #[arg(long, global = true, default_value = "\n")]
    chunk_separator: String,

    #[command(flatten)]
    services: ServiceArgs,
}

#[derive(Args)]
struct ServiceArgs {
    /// Azure OpenAI endpoint used for embeddings
    #[arg(long, global = true, env = "AZURE_OPENAI_ENDPOINT")]
    embedding_endpoint: Option<String>,

    /// Azure OpenAI endpoint used for chat; defaults to the embedding endpoint
    #[arg(long, global = true, env = "ENDPOINT_URL")]
    chat_endpoint: Option<String>,

    /// Azure OpenAI API key
    #[arg(long, global = true, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API version for the embeddings deployment
    #[arg(long, global = true, env = "AZURE_OPENAI_API_VERSION", default_value = DEFAULT_CHAT_API_VERSION)]
    embedding_api_version: String,

    /// API version for the chat deployment
    #[arg(long, global = true, default_value = DEFAULT_CHAT_API_VERSION)]
    chat_api_version: String,

    /// Embeddings deployment name
    #[arg(long, global = true, default_value = DEFAULT_EMBEDDING_DEPLOYMENT)]
    embedding_deployment: String,

    /// Dimensionality of the embeddings deployment
    #[arg(long, global = true, default_value_t = DEFAULT_AZURE_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Chat deployment name
    #[arg(long, global = true, default_value = DEFAULT_CHAT_DEPLOYMENT)]
    chat_deployment: String,

    /// Use the local character n-gram embedder instead of the embeddings service
    #[arg(long, global = true, default_value_t = false)]
    offline_embeddings: bool,

    /// Number of chunks retrieved per question
    #[arg(long, global = true, default_value = "4")]
    top_k: usize,

    /// Rewrite follow-up questions into standalone questions before retrieval
    #[arg(long, global = true, default_value_t = false)]
    condense_question: bool,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, default_value = "60")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Extract and chunk PDFs without calling any service.
    Chunks {
        /// PDF files or folders that contain PDFs.
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
    },
    /// Process PDFs, then ask the given questions in order.
    Ask {
        /// PDF files or folders that contain PDFs.
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
        /// Question to ask; repeat for a multi-turn conversation.
        #[arg(long = "question", required = true)]
        questions: Vec<String>,
    },
    /// Process PDFs, then read questions from stdin.
    Chat {
        /// PDF files or folders that contain PDFs.
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
    },
}

type Orchestrator = ChatOrchestrator<dyn EmbeddingService, dyn GenerationService>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    if let Err(error) = dotenv::dotenv() {
        if !error.not_found() {
            eprintln!("ignoring unreadable .env file: {error}");
        }
    }

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    let ingestion = IngestionOptions {
        chunk_max_chars: cli.chunk_size,
        chunk_overlap_chars: cli.chunk_overlap,
        chunk_separator: cli.chunk_separator.clone(),
        ..IngestionOptions::default()
    };

    match cli.command {
        Command::Chunks { pdfs } => {
            let documents = read_documents(&pdfs).await?;
            let text = extract_text(&documents)?;
            let chunks = split_text(&text, &ChunkingConfig::from(&ingestion))?;

            println!(
                "{} documents, {} characters, {} chunks",
                documents.len(),
                text.chars().count(),
                chunks.len()
            );
            for chunk in chunks {
                let preview: String = chunk.text.chars().take(80).collect();
                println!(
                    "[{}] start={} chars={} {}",
                    chunk.chunk_index,
                    chunk.start_char,
                    chunk.char_len(),
                    preview.replace('\n', " ")
                );
            }
        }
        Command::Ask { pdfs, questions } => {
            let mut chat = build_orchestrator(&cli.services, ingestion)?;
            process(&mut chat, &pdfs).await?;

            for question in questions {
                chat.ask(&question).await?;
            }
            print_history(&chat.history());
        }
        Command::Chat { pdfs } => {
            let mut chat = build_orchestrator(&cli.services, ingestion)?;
            process(&mut chat, &pdfs).await?;
            run_prompt(&mut chat).await?;
        }
    }

    Ok(())
}

fn build_orchestrator(
    services: &ServiceArgs,
    ingestion: IngestionOptions,
) -> anyhow::Result<Orchestrator> {
    let timeout = Duration::from_secs(services.timeout_secs);
    let api_key = services.api_key.clone().unwrap_or_default();
    let embedding_endpoint = services.embedding_endpoint.clone().unwrap_or_default();
    let chat_endpoint = services
        .chat_endpoint
        .clone()
        .unwrap_or_else(|| embedding_endpoint.clone());

    let embedder: Arc<dyn EmbeddingService> = if services.offline_embeddings {
        Arc::new(CharacterNgramEmbedder::default())
    } else {
        let config = AzureOpenAiConfig::new(
            embedding_endpoint,
            api_key.clone(),
            services.embedding_api_version.clone(),
            services.embedding_deployment.clone(),
        )
        .with_timeout(timeout);
        Arc::new(AzureOpenAiEmbedder::new(config, services.embedding_dimensions)?)
    };

    let chat_config = AzureOpenAiConfig::new(
        chat_endpoint,
        api_key,
        services.chat_api_version.clone(),
        services.chat_deployment.clone(),
    )
    .with_timeout(timeout);
    let generator: Arc<dyn GenerationService> = Arc::new(AzureOpenAiChat::new(chat_config)?);

    let session = SessionOptions {
        top_k: services.top_k,
        condense_question: services.condense_question,
    };

    Ok(ChatOrchestrator::with_options(
        embedder, generator, ingestion, session,
    ))
}

async fn read_documents(pdfs: &[PathBuf]) -> anyhow::Result<Vec<SourceDocument>> {
    let paths = resolve_pdf_inputs(pdfs)?;
    info!(files = paths.len(), "loading pdfs");
    Ok(load_documents(&paths).await?)
}

async fn process(chat: &mut Orchestrator, pdfs: &[PathBuf]) -> anyhow::Result<()> {
    let documents = read_documents(pdfs).await?;
    let report = chat.process_documents(&documents).await?;

    println!(
        "processed {} documents into {} chunks at {}",
        report.document_count,
        report.chunk_count,
        Utc::now().to_rfc3339()
    );
    Ok(())
}

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq)]
enum PromptCommand {
    Skip,
    Quit,
    Reset,
    Process(Vec<PathBuf>),
    Ask(String),
}

impl PromptCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match word {
            "" => Self::Skip,
            "/quit" | "/exit" => Self::Quit,
            "/reset" => Self::Reset,
            "/process" => Self::Process(rest.split_whitespace().map(PathBuf::from).collect()),
            _ => Self::Ask(line.to_string()),
        }
    }
}

async fn run_prompt(chat: &mut Orchestrator) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout
            .write_all(b"Ask a question about your documents (/process <pdf>..., /reset, /quit): ")
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match PromptCommand::parse(&line) {
            PromptCommand::Skip => continue,
            PromptCommand::Quit => break,
            PromptCommand::Reset => {
                chat.reset_history();
                println!("conversation cleared");
            }
            PromptCommand::Process(pdfs) if pdfs.is_empty() => {
                println!("usage: /process <pdf or folder>...");
            }
            PromptCommand::Process(pdfs) => {
                // History is kept; only the knowledge base is replaced.
                if let Err(error) = process(chat, &pdfs).await {
                    warn!(%error, "processing failed");
                    println!("error: {error}");
                }
            }
            PromptCommand::Ask(question) => match chat.ask(&question).await {
                Ok(_) => print_history(&chat.history()),
                Err(error) => {
                    warn!(%error, "question failed");
                    println!("error: {error}");
                }
            },
        }
    }

    Ok(())
}

fn print_history(history: &[&Turn]) {
    for turn in history {
        println!("user: {}", turn.question);
        println!("assistant: {}", turn.answer);
        println!();
    }
}
