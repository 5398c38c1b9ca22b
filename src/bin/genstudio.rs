//! CLI for genstudio - prompt-to-image generation with local history.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::{
    GenerationRecord, ImageProviderKind, ImageSettings, Notice, Notifier, Studio, StudioConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Generate images from prompts (Gemini, Stability AI) and keep a local history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Backend to use (overrides GENSTUDIO_BACKEND)
    #[arg(short, long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Data directory (overrides GENSTUDIO_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// List history, optionally filtered by prompt text
    History {
        /// Case-insensitive prompt filter
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Delete one history entry
    Delete {
        /// Entry id
        id: String,
    },

    /// Delete all history
    Clear,

    /// Show the prompt and settings of a history entry
    Restore {
        /// Entry id
        id: String,
    },

    /// Save a history entry's image to disk
    Download {
        /// Entry id
        id: String,

        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Share a history entry's image
    Share {
        /// Entry id
        id: String,
    },

    /// Show or toggle the display theme
    Theme {
        /// Flip between dark and light
        #[arg(long)]
        toggle: bool,
    },

    /// List available backends
    Backends,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// What the image should avoid
    #[arg(short, long, default_value = genstudio::image::DEFAULT_NEGATIVE_PROMPT)]
    negative: String,

    /// Image width in pixels
    #[arg(long, default_value_t = ImageSettings::default().width)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = ImageSettings::default().height)]
    height: u32,

    /// Diffusion steps
    #[arg(long, default_value_t = ImageSettings::default().steps)]
    steps: u32,

    /// Seed (0 = random)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Guidance scale
    #[arg(long, default_value_t = ImageSettings::default().cfg_scale)]
    cfg_scale: u32,

    /// Also save the image into this directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Gemini,
    Stability,
}

impl From<BackendArg> for ImageProviderKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Gemini => ImageProviderKind::Gemini,
            BackendArg::Stability => ImageProviderKind::Stability,
        }
    }
}

/// Prints notices as they arrive.
struct ConsoleNotifier {
    json: bool,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        if self.json {
            match serde_json::to_string(notice) {
                Ok(line) => eprintln!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode notice"),
            }
        } else if notice.is_destructive() {
            eprintln!("✗ {notice}");
        } else {
            eprintln!("✓ {notice}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Backends = cli.command {
        list_backends(cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = StudioConfig::from_env()?;
    if let Some(backend) = cli.backend {
        config = config.with_backend(backend.into());
    }
    if let Some(ref dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    let notifier = Arc::new(ConsoleNotifier { json: cli.json });
    let mut studio = open_studio(&config, notifier)?;

    let ok = match cli.command {
        Commands::Generate(args) => generate(&mut studio, args, cli.json).await?,
        Commands::History { search } => {
            print_history(studio.search(&search), cli.json)?;
            true
        }
        Commands::Delete { id } => studio.delete(&id).is_ok(),
        Commands::Clear => studio.clear_history().is_ok(),
        Commands::Restore { id } => match studio.restore(&id) {
            Ok(record) => {
                print_restore(&record, cli.json)?;
                true
            }
            Err(_) => false,
        },
        Commands::Download { id, output } => match studio.download(&id) {
            Ok(download) => {
                let path = download.save_in(&output)?;
                print_saved(&path, cli.json)?;
                true
            }
            Err(_) => false,
        },
        Commands::Share { id } => studio.share(&id).is_ok(),
        Commands::Theme { toggle } => {
            let theme = if toggle {
                match studio.toggle_theme() {
                    Ok(theme) => theme,
                    Err(_) => return Ok(ExitCode::FAILURE),
                }
            } else {
                studio.state().theme
            };
            if cli.json {
                println!("{}", serde_json::json!({ "theme": theme }));
            } else {
                println!("Theme: {theme}");
            }
            true
        }
        Commands::Backends => unreachable!("handled before opening the studio"),
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Opens the studio. History-only commands work without an API key, so a
/// missing key falls back to a backend that fails on use.
fn open_studio(config: &StudioConfig, notifier: Arc<ConsoleNotifier>) -> anyhow::Result<Studio> {
    let provider: Box<dyn genstudio::ImageProvider> = match config.build_provider() {
        Ok(provider) => provider,
        Err(e) => Box::new(Unconfigured {
            kind: config.backend,
            reason: e.to_string(),
        }),
    };
    let storage = config.open_storage()?;
    Ok(Studio::new(provider, Box::new(storage), config.limits, notifier))
}

/// Stand-in backend used when the configured one cannot be built.
struct Unconfigured {
    kind: ImageProviderKind,
    reason: String,
}

#[async_trait::async_trait]
impl genstudio::ImageProvider for Unconfigured {
    async fn generate(
        &self,
        _request: &genstudio::GenerationRequest,
    ) -> genstudio::Result<genstudio::GeneratedImage> {
        Err(genstudio::StudioError::ProviderNotAvailable(format!(
            "{}: {}",
            self.kind, self.reason
        )))
    }

    fn kind(&self) -> ImageProviderKind {
        self.kind
    }
}

async fn generate(
    studio: &mut Studio,
    args: GenerateArgs,
    json_output: bool,
) -> anyhow::Result<bool> {
    let settings = ImageSettings {
        width: args.width,
        height: args.height,
        steps: args.steps,
        seed: args.seed,
        cfg_scale: args.cfg_scale,
    };

    let Ok(record) = studio.generate(&args.prompt, &args.negative, settings).await else {
        return Ok(false);
    };

    let saved = match args.output {
        Some(ref dir) => match studio.download(&record.id) {
            Ok(download) => Some(download.save_in(dir)?),
            Err(_) => None,
        },
        None => None,
    };

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "id": record.id,
            "provider": studio.provider().kind().to_string(),
            "output": saved.as_ref().map(|p| p.display().to_string()),
            "history_len": studio.history().len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image {} via {}",
            record.id,
            studio.provider().name()
        );
        if let Some(path) = saved {
            println!("Saved: {}", path.display());
        }
    }

    Ok(true)
}

fn print_history(records: Vec<&GenerationRecord>, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        #[derive(serde::Serialize)]
        struct Entry<'a> {
            id: &'a str,
            prompt: &'a str,
            negative_prompt: &'a str,
            timestamp: i64,
            settings: ImageSettings,
            image_bytes: usize,
        }

        let entries: Vec<_> = records
            .iter()
            .map(|r| Entry {
                id: &r.id,
                prompt: &r.prompt,
                negative_prompt: &r.negative_prompt,
                timestamp: r.timestamp,
                settings: r.settings,
                image_bytes: r.image_data.len(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No images in history.");
        return Ok(());
    }

    for r in records {
        let when = r
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into());
        println!("{}  {}  {}", r.id, when, r.prompt);
        let s = r.settings;
        println!(
            "    {}x{}, {} steps, seed {}, cfg {}",
            s.width, s.height, s.steps, s.seed, s.cfg_scale
        );
    }
    Ok(())
}

fn print_restore(record: &GenerationRecord, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "prompt": record.prompt,
            "negative_prompt": record.negative_prompt,
            "settings": record.settings,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let s = record.settings;
        println!("Prompt: {}", record.prompt);
        println!("Negative: {}", record.negative_prompt);
        println!(
            "Settings: --width {} --height {} --steps {} --seed {} --cfg-scale {}",
            s.width, s.height, s.steps, s.seed, s.cfg_scale
        );
    }
    Ok(())
}

fn print_saved(path: &std::path::Path, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({ "output": path.display().to_string() });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn list_backends(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct BackendInfo {
        name: &'static str,
        kind: &'static str,
        env_var: &'static str,
        enabled: bool,
    }

    let backends = vec![
        BackendInfo {
            name: "Gemini (Google)",
            kind: "gemini",
            env_var: "GOOGLE_API_KEY",
            enabled: cfg!(feature = "gemini-image"),
        },
        BackendInfo {
            name: "Stability AI",
            kind: "stability",
            env_var: "STABILITY_API_KEY",
            enabled: cfg!(feature = "stability-image"),
        },
    ];

    if json_output {
        println!("{}", serde_json::to_string_pretty(&backends)?);
    } else {
        println!("Available backends:\n");
        for b in &backends {
            let status = if b.enabled { "✓" } else { "✗" };
            println!("  {} {} ({})", status, b.name, b.kind);
            println!("    API key: {}", b.env_var);
        }
    }

    Ok(())
}
