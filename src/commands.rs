/// Command-line surface. Each subcommand is a thin wrapper over the library.

use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::bbox::colour::FixedColours;
use crate::bbox::decoder::decode_detailed;
use crate::bbox::font::FileFontProvider;
use crate::bbox::image_prep::{load_image, resize_to_fit};
use crate::bbox::renderer::{AnnotatedImage, BoxRenderer, RenderStyle};
use crate::config::AppConfig;
use crate::errors::{BoxLensError, BoxLensResult};
use crate::llm::registry::ProviderRegistry;
use crate::pipeline;

pub const DEFAULT_OUTPUT: &str = "image_with_bounding_boxes.png";
pub const NO_BOXES_MESSAGE: &str = "No valid bounding box coordinates found in the response.";

#[derive(Parser)]
#[command(name = "boxlens")]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config.toml (default: next to the executable, then the working
    /// directory, then the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Ask a vision model for bounding boxes and draw them onto the image.
    Detect(DetectArgs),
    /// Decode boxes from saved model output and print them as JSON.
    Decode(DecodeArgs),
    /// Draw boxes from saved model output onto an image, without calling a model.
    Render(RenderArgs),
    /// List configured providers and their models.
    Models,
}

#[derive(Args)]
pub struct DetectArgs {
    /// Input image (JPG, JPEG or PNG).
    pub image: PathBuf,

    /// Prompt sent with the image (default: prompts.detect from config).
    #[arg(long)]
    pub prompt: Option<String>,

    /// Provider id from config (default: llm.active_provider).
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name (default: the provider's configured model).
    #[arg(long)]
    pub model: Option<String>,

    /// API key for the selected provider only. Gemini providers otherwise
    /// read GEMINI_API_KEY, any provider reads BOXLENS_<ID>_API_KEY.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Where to write the annotated PNG.
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Longest side of the image sent to the model (default: render.max_image_size).
    #[arg(long)]
    pub max_size: Option<u32>,

    /// Font file for labels; may be repeated. Replaces render.font_files.
    #[arg(long = "font")]
    pub fonts: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DecodeArgs {
    /// File holding the model output; reads stdin when omitted or '-'.
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Input image (JPG, JPEG or PNG).
    pub image: PathBuf,

    /// File holding the model output; '-' reads stdin.
    pub response: PathBuf,

    /// Where to write the annotated PNG.
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Downscale the image to this longest side before drawing.
    #[arg(long)]
    pub max_size: Option<u32>,

    /// Font file for labels; may be repeated. Replaces render.font_files.
    #[arg(long = "font")]
    pub fonts: Vec<PathBuf>,
}

pub async fn dispatch(command: Command, config: &AppConfig) -> BoxLensResult<()> {
    match command {
        Command::Detect(args) => detect(args, config).await,
        Command::Decode(args) => decode(args),
        Command::Render(args) => render(args, config),
        Command::Models => {
            print!("{}", list_models(config));
            Ok(())
        }
    }
}

async fn detect(args: DetectArgs, config: &AppConfig) -> BoxLensResult<()> {
    let image = load_image(&args.image)?;
    let registry =
        ProviderRegistry::from_config(config, args.provider.as_deref(), args.api_key.as_deref());
    let (model, call) = registry.call_config(args.provider.as_deref(), args.model.as_deref())?;
    let renderer = build_renderer(config, &args.fonts);
    let mut colours = FixedColours::from_hex_list(&config.render.palette)?;
    let prompt = args.prompt.as_deref().unwrap_or(&config.prompts.detect);
    let max_size = args.max_size.unwrap_or(config.render.max_image_size);

    let outcome = until_interrupted(
        pipeline::run(model.as_ref(), &call, image, prompt, &renderer, &mut colours, max_size),
        tokio::signal::ctrl_c(),
    )
    .await?;

    println!("{}", outcome.response_text);
    match outcome.annotated {
        Some(annotated) => save_annotated(&annotated, &args.output),
        None => {
            eprintln!("{NO_BOXES_MESSAGE}");
            Ok(())
        }
    }
}

/// Run `work` unless `interrupt` fires first. If the interrupt listener itself
/// fails, `work` runs to completion.
async fn until_interrupted<T, W, I>(work: W, interrupt: I) -> BoxLensResult<T>
where
    W: Future<Output = BoxLensResult<T>>,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(work);
    tokio::select! {
        res = &mut work => res,
        signal = interrupt => match signal {
            Ok(()) => Err(BoxLensError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C, waiting for the model");
                work.await
            }
        },
    }
}

fn decode(args: DecodeArgs) -> BoxLensResult<()> {
    let text = read_text(args.input.as_deref())?;
    let decoded = decode_detailed(&text);
    tracing::info!(count = decoded.boxes.len(), source = ?decoded.source, "decoded");
    println!("{}", serde_json::to_string_pretty(&decoded.boxes)?);
    Ok(())
}

fn render(args: RenderArgs, config: &AppConfig) -> BoxLensResult<()> {
    let mut image = load_image(&args.image)?;
    if let Some(max_size) = args.max_size {
        image = resize_to_fit(image, max_size);
    }
    let text = read_text(Some(args.response.as_path()))?;
    let decoded = decode_detailed(&text);
    if decoded.boxes.is_empty() {
        eprintln!("{NO_BOXES_MESSAGE}");
        return Ok(());
    }

    let renderer = build_renderer(config, &args.fonts);
    let mut colours = FixedColours::from_hex_list(&config.render.palette)?;
    let annotated = renderer.render(&image, &decoded.boxes, &mut colours);
    save_annotated(&annotated, &args.output)
}

pub fn list_models(config: &AppConfig) -> String {
    let mut ids: Vec<&String> = config.llm.providers.keys().collect();
    ids.sort();

    let mut out = String::new();
    for id in ids {
        let entry = &config.llm.providers[id];
        let marker = if *id == config.llm.active_provider { "*" } else { " " };
        out.push_str(&format!("{marker} {id} ({})\n", entry.display_name));

        let mut models = entry.models.clone();
        if !models.contains(&entry.model) {
            models.insert(0, entry.model.clone());
        }
        for m in models {
            let default = if m == entry.model { " (default)" } else { "" };
            out.push_str(&format!("    {m}{default}\n"));
        }
    }
    out
}

fn build_renderer(config: &AppConfig, font_override: &[PathBuf]) -> BoxRenderer<FileFontProvider> {
    let fonts = if font_override.is_empty() {
        config.render.font_files.clone()
    } else {
        font_override.to_vec()
    };
    let style = RenderStyle {
        font_size: config.render.font_size,
        outline_width: config.render.outline_width,
        ..RenderStyle::default()
    };
    BoxRenderer::new(FileFontProvider::new(fonts)).with_style(style)
}

fn save_annotated(annotated: &AnnotatedImage, output: &Path) -> BoxLensResult<()> {
    std::fs::write(output, annotated.to_png()?)?;
    for b in &annotated.boxes {
        eprintln!("{} {}", b.colour, b.label);
    }
    tracing::info!(path = %output.display(), boxes = annotated.boxes.len(), "annotated image saved");
    eprintln!("Saved {}", output.display());
    Ok(())
}

fn read_text(path: Option<&Path>) -> BoxLensResult<String> {
    match path {
        Some(p) if p != Path::new("-") => Ok(std::fs::read_to_string(p)?),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn detect_defaults() {
        let cli = Cli::try_parse_from(["boxlens", "detect", "photo.jpg"]).unwrap();
        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.image, PathBuf::from("photo.jpg"));
        assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT));
        assert!(args.fonts.is_empty());
        assert!(args.max_size.is_none());
    }

    #[test]
    fn api_key_comes_from_the_flag_only() {
        let cli = Cli::try_parse_from(["boxlens", "detect", "photo.jpg"]).unwrap();
        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert!(args.api_key.is_none());
    }

    #[tokio::test]
    async fn interrupt_cancels_pending_work() {
        let res: BoxLensResult<()> =
            until_interrupted(std::future::pending(), std::future::ready(Ok(()))).await;
        assert!(matches!(res, Err(BoxLensError::Cancelled)));
    }

    #[tokio::test]
    async fn failed_interrupt_listener_lets_work_finish() {
        let work = async {
            tokio::task::yield_now().await;
            Ok(7)
        };
        let broken = std::future::ready(Err(std::io::Error::other("no signal handler")));
        assert_eq!(until_interrupted(work, broken).await.unwrap(), 7);
    }

    #[test]
    fn model_list_marks_active_provider_and_default_model() {
        let listing = list_models(&AppConfig::default());
        assert!(listing.starts_with("* gemini (Google Gemini)\n"));
        assert!(listing.contains("    gemini-1.5-pro (default)\n"));
        assert!(listing.contains("    gemini-1.5-flash-8b-exp-0827\n"));
    }

    #[test]
    fn renderer_style_comes_from_config() {
        let cfg = AppConfig::default();
        let renderer = build_renderer(&cfg, &[]);
        assert_eq!(renderer.style().font_size, 20.0);
        assert_eq!(renderer.style().outline_width, 3);
    }
}
