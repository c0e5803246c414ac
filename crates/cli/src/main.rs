use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use hakach_agents::{
    AssistantSettings, ChatWidget, FixtureProvider, HttpDataProvider, SupportAssistant,
    TransferDataProvider, TurnOutcome, DEFAULT_PROVIDER_BASE_URL,
};
use hakach_core::{
    classify_intent, typing_duration, KeywordTable, Language, LanguageSet, TypingAnimation,
    WidgetConfig,
};
use hakach_knowledge::KnowledgeSource;
use hakach_llm::{GeminiConfig, GeminiModel, LanguageModel, ScriptedModel};
use hakach_observability::{init_tracing, AppMetrics};
use hakach_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "hakach")]
#[command(about = "Hakach Transfert support assistant CLI")]
struct Cli {
    /// Knowledge base file, directory or URL.
    #[arg(long, env = "HAKACH_KB_PATH", default_value = "data/knowledge_base.json")]
    kb: String,

    #[arg(long, env = "HAKACH_LANGUAGES", default_value = "fr,en,es,de,ar")]
    languages: String,

    #[arg(long, env = "HAKACH_DEFAULT_LANGUAGE", default_value = "fr")]
    default_language: String,

    #[arg(long, env = "HAKACH_PROVIDER_BASE_URL", default_value = DEFAULT_PROVIDER_BASE_URL)]
    provider_base_url: String,

    #[arg(long, env = "HAKACH_DATABASE_URL")]
    database_url: Option<String>,

    /// Use no network backends at all.
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat {
        /// Delay between revealed characters, 0 prints replies at once.
        #[arg(long, default_value_t = 50)]
        char_delay_ms: u64,
    },
    Classify {
        text: String,
        #[arg(long)]
        language: Option<String>,
    },
    Rates {
        #[arg(long)]
        lang: Option<String>,
    },
    Kb,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("hakach_cli");
    let cli = Cli::parse();

    let default_language = Language::from_code(&cli.default_language)
        .with_context(|| format!("unknown --default-language {}", cli.default_language))?;
    let languages = LanguageSet::parse_list(&cli.languages, default_language);

    match cli.command {
        Command::Classify { ref text, ref language } => {
            let language = match language {
                Some(code) => Language::from_code(code)
                    .with_context(|| format!("unknown --language {code}"))?,
                None => languages.default_language(),
            };
            let intent = classify_intent(text, language, &KeywordTable::builtin());
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "language": language,
                    "intent": intent,
                }))?
            );
        }
        Command::Kb => {
            let knowledge = KnowledgeSource::from_location(&cli.kb)
                .load(&reqwest::Client::new())
                .await
                .with_context(|| format!("failed loading knowledge base from {}", cli.kb))?;
            println!("{}", serde_json::to_string_pretty(&knowledge)?);
        }
        Command::Rates { ref lang } => {
            let assistant = build_assistant(&cli, languages).await?;
            let language = lang.as_deref().and_then(|code| assistant.languages().parse_code(code));
            println!("{}", assistant.rate_overview(language).await);
        }
        Command::Chat { char_delay_ms } => {
            let assistant = build_assistant(&cli, languages.clone()).await?;
            let config = WidgetConfig {
                default_language: languages.default_language().as_code().to_string(),
                ..WidgetConfig::default()
            };
            run_chat(
                ChatWidget::create(Arc::new(assistant), config),
                Duration::from_millis(char_delay_ms),
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_chat(mut widget: ChatWidget<Store>, delay: Duration) -> Result<()> {
    println!("Hakach Transfert chat. '/close' starts over, 'exit' quits.\n");
    for message in widget.open().await?.to_vec() {
        type_out(&message.text, delay).await?;
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message == "/close" {
            widget.close().await?;
            for message in widget.open().await?.to_vec() {
                type_out(&message.text, delay).await?;
            }
            continue;
        }

        match widget.send(message).await? {
            TurnOutcome::Replied(reply) => {
                for bot in reply.messages.iter().filter(|message| !message.is_user) {
                    type_out(&bot.text, delay).await?;
                }
            }
            TurnOutcome::Busy => println!("(still answering the previous message)"),
            TurnOutcome::Ignored => {}
        }
    }

    widget.close().await
}

async fn type_out(text: &str, delay: Duration) -> Result<()> {
    println!();
    if delay.is_zero() {
        println!("{text}\n");
        return Ok(());
    }

    let mut stdout = io::stdout();
    write!(stdout, "…")?;
    stdout.flush()?;
    tokio::time::sleep(typing_duration(text)).await;
    write!(stdout, "\r \r")?;

    let animation = TypingAnimation::with_delay(text, delay);
    let tick = animation.delay();
    let graphemes = futures::stream::iter(animation.increments()).then(|grapheme| async move {
        tokio::time::sleep(tick).await;
        grapheme
    });
    futures::pin_mut!(graphemes);

    while let Some(grapheme) = graphemes.next().await {
        write!(stdout, "{grapheme}")?;
        stdout.flush()?;
    }
    writeln!(stdout, "\n")?;
    Ok(())
}

async fn build_assistant(cli: &Cli, languages: LanguageSet) -> Result<SupportAssistant<Store>> {
    let http_client = reqwest::Client::new();

    let knowledge = KnowledgeSource::from_location(&cli.kb)
        .load_or_empty(&http_client)
        .await;

    let model: Arc<dyn LanguageModel> = if cli.offline {
        Arc::new(ScriptedModel::offline())
    } else {
        Arc::new(GeminiModel::new(GeminiConfig::from_env())?)
    };
    let provider: Arc<dyn TransferDataProvider> = if cli.offline {
        Arc::new(FixtureProvider::new())
    } else {
        Arc::new(
            HttpDataProvider::new(&cli.provider_base_url)
                .context("invalid --provider-base-url")?,
        )
    };

    let store = match cli.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };

    Ok(SupportAssistant::new(
        AssistantSettings {
            languages,
            ..AssistantSettings::default()
        },
        knowledge,
        model,
        provider,
        Arc::new(store),
        AppMetrics::shared(),
    ))
}
