//! CLI for Lumina Studio - text-to-image generation.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lumina::{
    ApiKeyStore, AspectRatio, GeminiModel, GeminiProvider, GenerationOptions, HistoryEntry,
    ImageSize, LuminaConfig, LuminaError, Studio,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumina")]
#[command(about = "Generate images from text prompts with Gemini image models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to <config dir>/lumina/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one image from a text prompt
    Generate(GenerateArgs),

    /// Start an interactive studio session
    Studio(OptionArgs),

    /// List available models
    Models,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Output file path (defaults to <output_dir>/lumina-<id>.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    options: OptionArgs,
}

#[derive(Args)]
struct OptionArgs {
    /// Aspect ratio
    #[arg(long, value_enum)]
    aspect_ratio: Option<AspectRatioArg>,

    /// Use the Pro engine (Gemini 3 Pro, enables 2K/4K)
    #[arg(long)]
    pro: bool,

    /// Resolution for the Pro engine
    #[arg(long, value_enum)]
    size: Option<ImageSizeArg>,
}

impl OptionArgs {
    fn apply(&self, mut options: GenerationOptions) -> GenerationOptions {
        if let Some(ar) = self.aspect_ratio {
            options.aspect_ratio = ar.into();
        }
        if self.pro {
            options.high_quality = true;
        }
        if let Some(size) = self.size {
            options.image_size = size.into();
        }
        options
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "16:9")]
    Cinematic,
    #[value(name = "3:4")]
    Portrait,
    #[value(name = "9:16")]
    Mobile,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::Cinematic => AspectRatio::Cinematic,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Mobile => AspectRatio::Mobile,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImageSizeArg {
    #[value(name = "1K")]
    OneK,
    #[value(name = "2K")]
    TwoK,
    #[value(name = "4K")]
    FourK,
}

impl From<ImageSizeArg> for ImageSize {
    fn from(arg: ImageSizeArg) -> Self {
        match arg {
            ImageSizeArg::OneK => ImageSize::OneK,
            ImageSizeArg::TwoK => ImageSize::TwoK,
            ImageSizeArg::FourK => ImageSize::FourK,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = LuminaConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate(args) => {
            generate_image(args, &config, cli.json).await?;
        }
        Commands::Studio(args) => {
            run_studio(args, &config).await?;
        }
        Commands::Models => {
            list_models(cli.json)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "lumina=debug" } else { "lumina=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_studio(
    config: &LuminaConfig,
    options: &OptionArgs,
) -> anyhow::Result<(Studio, ApiKeyStore)> {
    let keys = config.key_store();
    let provider = GeminiProvider::builder()
        .key_store(keys.clone())
        .base_url(&config.base_url)
        .timeout(config.request_timeout())
        .build()?;
    let studio = Studio::new(Arc::new(provider))
        .with_options(options.apply(config.defaults))
        .with_loading_interval(config.loading_interval());
    Ok((studio, keys))
}

/// Runs the current prompt, echoing loading messages to stderr.
async fn generate_with_progress(
    studio: &Studio,
    show_progress: bool,
) -> lumina::Result<HistoryEntry> {
    let mut loading = studio.subscribe_loading();
    let mut watching = show_progress;
    let generation = studio.generate();
    tokio::pin!(generation);

    loop {
        tokio::select! {
            biased;
            result = &mut generation => return result,
            changed = loading.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                if let Some(message) = *loading.borrow_and_update() {
                    eprintln!("  {message}");
                }
            }
        }
    }
}

async fn generate_image(
    args: GenerateArgs,
    config: &LuminaConfig,
    json_output: bool,
) -> anyhow::Result<()> {
    let (studio, keys) = build_studio(config, &args.options)?;
    if !keys.has_selected_api_key() {
        anyhow::bail!("no API key selected: set GEMINI_API_KEY or api_key in the config file");
    }

    studio.set_prompt(&args.prompt);
    if !studio.can_submit() {
        anyhow::bail!("prompt is empty");
    }

    let entry = generate_with_progress(&studio, !json_output).await?;

    let path = match args.output {
        Some(ref path) => {
            entry.image.save(path)?;
            path.clone()
        }
        None => studio.download(None, &config.output_dir)?,
    };

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "id": entry.id.to_string(),
            "output": path.display().to_string(),
            "size_bytes": entry.image.size(),
            "format": entry.image.format.extension(),
            "model": entry.model,
            "aspect_ratio": entry.aspect_ratio.as_str(),
            "duration_ms": entry.image.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} bytes) via {}",
            path.display(),
            entry.image.size(),
            entry.model
        );
        if let Some(duration) = entry.image.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

/// A line typed into the studio.
#[derive(Debug, PartialEq, Eq)]
enum StudioCommand {
    Prompt(String),
    Ratio(AspectRatio),
    Pro(Option<bool>),
    Size(ImageSize),
    Settings,
    History,
    Show(usize),
    Save {
        index: Option<usize>,
        dir: Option<PathBuf>,
    },
    Clear,
    Key(Option<String>),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<StudioCommand, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(StudioCommand::Prompt(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();

    match name {
        "ratio" | "r" => {
            let arg = arg.ok_or("usage: /ratio <1:1|4:3|16:9|3:4|9:16>")?;
            arg.parse().map(StudioCommand::Ratio).map_err(|e: LuminaError| e.to_string())
        }
        "pro" => match arg {
            None => Ok(StudioCommand::Pro(None)),
            Some("on") => Ok(StudioCommand::Pro(Some(true))),
            Some("off") => Ok(StudioCommand::Pro(Some(false))),
            Some(other) => Err(format!("usage: /pro [on|off] (got '{other}')")),
        },
        "size" => {
            let arg = arg.ok_or("usage: /size <1K|2K|4K>")?;
            arg.parse().map(StudioCommand::Size).map_err(|e: LuminaError| e.to_string())
        }
        "settings" => Ok(StudioCommand::Settings),
        "history" | "h" => Ok(StudioCommand::History),
        "show" => {
            let arg = arg.ok_or("usage: /show <n>")?;
            parse_index(arg).map(StudioCommand::Show)
        }
        "save" | "download" => {
            let mut index = None;
            let mut dir = None;
            for word in [arg, words.next()].into_iter().flatten() {
                match parse_index(word) {
                    Ok(n) if index.is_none() && dir.is_none() => index = Some(n),
                    _ => dir = Some(PathBuf::from(word)),
                }
            }
            Ok(StudioCommand::Save { index, dir })
        }
        "clear" => Ok(StudioCommand::Clear),
        "key" => Ok(StudioCommand::Key(arg.map(str::to_string))),
        "help" | "?" => Ok(StudioCommand::Help),
        "quit" | "exit" | "q" => Ok(StudioCommand::Quit),
        other => Err(format!("unknown command '/{other}', try /help")),
    }
}

/// History positions are shown 1-based.
fn parse_index(word: &str) -> Result<usize, String> {
    match word.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("'{word}' is not a history number")),
    }
}

const STUDIO_HELP: &str = "\
Type a prompt and press Enter to generate. End a line with \\ to continue on the next.

  /ratio <r>          aspect ratio: 1:1, 4:3, 16:9, 3:4, 9:16
  /pro [on|off]       toggle the Pro engine (2K/4K, Gemini 3 Pro)
  /size <s>           Pro resolution: 1K, 2K, 4K
  /settings           show current settings and active model
  /history            list creations, newest first
  /show <n>           display creation n
  /save [n] [dir]     save the displayed image (or creation n)
  /clear              clear history
  /key [value|clear]  select the API key
  /help               this text
  /quit               leave (history is not kept)";

async fn run_studio(args: OptionArgs, config: &LuminaConfig) -> anyhow::Result<()> {
    let (studio, keys) = build_studio(config, &args)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Lumina Studio ({}). /help for commands.", studio.provider_name());
    print_settings(&studio);
    if !keys.has_selected_api_key() {
        println!("No API key selected. Use /key to select one.");
    }

    loop {
        eprint!("> ");
        let Some(mut line) = lines.next_line().await? else {
            break;
        };
        while let Some(head) = line.strip_suffix('\\') {
            let head = head.to_string();
            let Some(next) = lines.next_line().await? else {
                line = head;
                break;
            };
            line = format!("{head}\n{next}");
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match parse_command(line) {
            Ok(c) => c,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };

        match command {
            StudioCommand::Prompt(prompt) => {
                studio.set_prompt(prompt);
                match generate_with_progress(&studio, true).await {
                    Ok(entry) => print_entry(&entry),
                    Err(e) if e.is_rejected_submission() => eprintln!("{e}"),
                    Err(_) => {
                        if let Some(message) = studio.error() {
                            eprintln!("Error: {message}");
                        }
                    }
                }
            }
            StudioCommand::Ratio(ratio) => {
                studio.set_aspect_ratio(ratio);
                println!("Aspect ratio: {}", ratio.label());
            }
            StudioCommand::Pro(enabled) => {
                let enabled = enabled.unwrap_or(!studio.options().high_quality);
                studio.set_high_quality(enabled);
                println!(
                    "Pro engine {} (model: {})",
                    if enabled { "on" } else { "off" },
                    studio.active_model()
                );
            }
            StudioCommand::Size(size) => {
                studio.set_image_size(size);
                if studio.options().high_quality {
                    println!("Resolution: {}", size.label());
                } else {
                    println!("Resolution: {} (takes effect with /pro on)", size.label());
                }
            }
            StudioCommand::Settings => print_settings(&studio),
            StudioCommand::History => print_history(&studio),
            StudioCommand::Show(index) => match studio.select_index(index) {
                Ok(entry) => print_entry(&entry),
                Err(e) => eprintln!("{e}"),
            },
            StudioCommand::Save { index, dir } => {
                let dir = dir.unwrap_or_else(|| config.output_dir.clone());
                match save_entry(&studio, index, &dir) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => eprintln!("{e:#}"),
                }
            }
            StudioCommand::Clear => {
                studio.clear_history();
                println!("History cleared.");
            }
            StudioCommand::Key(value) => {
                let value = match value {
                    Some(v) => v,
                    None => {
                        eprint!("API key: ");
                        lines.next_line().await?.unwrap_or_default()
                    }
                };
                if value == "clear" {
                    keys.clear();
                } else {
                    keys.set(value);
                }
                if keys.has_selected_api_key() {
                    println!("API key selected.");
                } else {
                    println!("No API key selected.");
                }
            }
            StudioCommand::Help => println!("{STUDIO_HELP}"),
            StudioCommand::Quit => break,
        }
    }

    Ok(())
}

fn save_entry(studio: &Studio, index: Option<usize>, dir: &Path) -> anyhow::Result<PathBuf> {
    let id = match index {
        Some(n) => Some(
            studio
                .with_history(|h| h.get_index(n).map(|e| e.id))
                .with_context(|| format!("no creation #{}", n + 1))?,
        ),
        None => None,
    };
    Ok(studio.download(id, dir)?)
}

fn print_entry(entry: &HistoryEntry) {
    println!(
        "[{}] \"{}\" ({}, {}, {} bytes)",
        entry.id,
        entry.prompt,
        entry.model_badge(),
        entry.aspect_ratio,
        entry.image.size()
    );
}

fn print_settings(studio: &Studio) {
    let options = studio.options();
    println!("  Aspect ratio: {}", options.aspect_ratio.label());
    println!(
        "  Pro engine:   {}",
        if options.high_quality { "on" } else { "off" }
    );
    if let Some(size) = options.effective_image_size() {
        println!("  Resolution:   {}", size.label());
    }
    println!("  Active model: {}", studio.active_model());
}

fn print_history(studio: &Studio) {
    let current = studio.current().map(|e| e.id);
    studio.with_history(|history| {
        if history.is_empty() {
            println!("No creations yet.");
            return;
        }
        for (i, entry) in history.entries().iter().enumerate() {
            let marker = if Some(entry.id) == current { "*" } else { " " };
            println!(
                "{marker}{:>3}. \"{}\" ({}, {})",
                i + 1,
                entry.prompt,
                entry.model_badge(),
                entry.aspect_ratio
            );
        }
    });
}

fn list_models(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ModelInfo {
        id: &'static str,
        engine: &'static str,
        pro: bool,
        sizes: Vec<&'static str>,
        aspect_ratios: Vec<&'static str>,
    }

    let aspect_ratios: Vec<&'static str> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();
    let models: Vec<ModelInfo> = [GeminiModel::Flash, GeminiModel::Pro]
        .into_iter()
        .map(|model| ModelInfo {
            id: model.as_str(),
            engine: if model.supports_image_size() { "Pro" } else { "Standard" },
            pro: model.supports_image_size(),
            sizes: if model.supports_image_size() {
                ImageSize::ALL.iter().map(|s| s.as_str()).collect()
            } else {
                Vec::new()
            },
            aspect_ratios: aspect_ratios.clone(),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        println!("Available models:\n");
        for m in &models {
            println!("  {} ({} engine{})", m.id, m.engine, if m.pro { ", --pro" } else { "" });
            println!("    Aspect ratios: {}", m.aspect_ratios.join(", "));
            if !m.sizes.is_empty() {
                println!("    Resolutions:   {}", m.sizes.join(", "));
            }
        }
        println!("\nAPI key: GEMINI_API_KEY or GOOGLE_API_KEY");
    }

    Ok(())
}
