//! reportlayout CLI - layout reconstruction for PDF report tokens

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use reportlayout::{
    render, Document, DocumentStats, JsonFormat, LayoutConfig, LayoutEngine, MemorySource,
    PageSelection, RenderOptions, TokenSource,
};

#[derive(Parser)]
#[command(name = "reportlayout")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Reconstruct tables, paragraphs and sections from PDF report tokens", long_about = None)]
struct Cli {
    /// Input token file (JSON)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Engine settings shared by every command that analyzes a file.
#[derive(Args, Clone, Default)]
struct EngineArgs {
    /// Layout configuration file (JSON; missing fields take defaults)
    #[arg(long, value_name = "FILE", env = "REPORTLAYOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Number of page workers (0 = one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Process pages one at a time
    #[arg(long)]
    sequential: bool,

    /// Abandon a page after this many milliseconds
    #[arg(long, value_name = "MS")]
    page_timeout_ms: Option<u64>,
}

impl EngineArgs {
    fn layout_config(&self) -> Result<LayoutConfig, Box<dyn std::error::Error>> {
        let mut config = match self.config {
            Some(ref path) => LayoutConfig::from_path(path)?,
            None => LayoutConfig::default(),
        };
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.sequential {
            config = config.sequential();
        }
        if let Some(ms) = self.page_timeout_ms {
            config = config.with_page_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a token file and write Markdown, text and JSON
    Analyze {
        /// Input token file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Render as Markdown
    #[command(alias = "md")]
    Markdown {
        /// Input token file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Maximum heading level (1-6)
        #[arg(long, default_value = "6")]
        max_heading: u8,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Mark where each page starts
        #[arg(long)]
        page_markers: bool,

        /// Leave out blocks below this confidence
        #[arg(long, default_value = "0.0")]
        min_confidence: f64,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Render as plain text
    Text {
        /// Input token file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Render the block list as JSON
    Json {
        /// Input token file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Show document statistics and per-page status
    Info {
        /// Input token file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Print the default configuration, or validate a configuration file
    Config {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Analyze {
            input,
            output,
            engine,
        }) => cmd_analyze(&input, output.as_deref(), &engine),
        Some(Commands::Markdown {
            input,
            output,
            max_heading,
            pages,
            page_markers,
            min_confidence,
            engine,
        }) => cmd_markdown(
            &input,
            output.as_deref(),
            max_heading,
            pages.as_deref(),
            page_markers,
            min_confidence,
            &engine,
        ),
        Some(Commands::Text {
            input,
            output,
            pages,
            engine,
        }) => cmd_text(&input, output.as_deref(), pages.as_deref(), &engine),
        Some(Commands::Json {
            input,
            output,
            compact,
            engine,
        }) => cmd_json(&input, output.as_deref(), compact, &engine),
        Some(Commands::Info { input, engine }) => cmd_info(&input, &engine),
        Some(Commands::Config { file }) => cmd_config(file.as_deref()),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: analyze if input is provided
            if let Some(input) = cli.input {
                cmd_analyze(&input, cli.output.as_deref(), &EngineArgs::default())
            } else {
                println!("{}", "Usage: reportlayout <FILE> [OUTPUT]".yellow());
                println!("       reportlayout --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn analyze(input: &Path, engine: &EngineArgs) -> Result<Document, Box<dyn std::error::Error>> {
    let config = engine.layout_config()?;
    let source = MemorySource::from_path(input)?;
    let engine = LayoutEngine::new(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Analyzing {} pages on {} workers...",
        source.page_count(),
        engine.workers()
    ));

    let doc = engine.process(Arc::new(source));
    spinner.finish_and_clear();

    if !doc.degraded_pages.is_empty() {
        log::warn!("degraded pages: {:?}", doc.degraded_pages);
    }
    Ok(doc)
}

fn parse_pages(pages: Option<&str>) -> Result<PageSelection, Box<dyn std::error::Error>> {
    match pages {
        Some(p) => Ok(PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?),
        None => Ok(PageSelection::All),
    }
}

fn write_or_print(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_analyze(
    input: &Path,
    output: Option<&Path>,
    engine: &EngineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_layout", stem))
    });
    fs::create_dir_all(&output_dir)?;

    let doc = analyze(input, engine)?;

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    let render_options = RenderOptions::new().with_page_markers(true);

    pb.set_message("Generating Markdown...");
    let markdown = render::to_markdown(&doc, &render_options)?;
    fs::write(output_dir.join("layout.md"), &markdown)?;
    pb.inc(1);

    pb.set_message("Generating text...");
    let text = render::to_text(&doc, &RenderOptions::new())?;
    fs::write(output_dir.join("layout.txt"), &text)?;
    pb.inc(1);

    pb.set_message("Generating JSON...");
    let json = render::to_json(&doc, JsonFormat::Pretty)?;
    fs::write(output_dir.join("blocks.json"), &json)?;
    pb.inc(1);

    pb.finish_with_message("Done!");

    println!("\n{}", "Output files:".green().bold());
    println!("  {} layout.md", "├─".dimmed());
    println!("  {} layout.txt", "├─".dimmed());
    println!("  {} blocks.json", "└─".dimmed());

    if !doc.degraded_pages.is_empty() {
        println!(
            "\n{} {:?}",
            "Degraded pages:".yellow().bold(),
            doc.degraded_pages
        );
    }

    Ok(())
}

fn cmd_markdown(
    input: &Path,
    output: Option<&Path>,
    max_heading: u8,
    pages: Option<&str>,
    page_markers: bool,
    min_confidence: f64,
    engine: &EngineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let page_selection = parse_pages(pages)?;
    let doc = analyze(input, engine)?;

    let render_options = RenderOptions::new()
        .with_max_heading(max_heading)
        .with_pages(page_selection)
        .with_page_markers(page_markers)
        .with_min_confidence(min_confidence);

    let markdown = render::to_markdown(&doc, &render_options)?;
    write_or_print(output, &markdown)
}

fn cmd_text(
    input: &Path,
    output: Option<&Path>,
    pages: Option<&str>,
    engine: &EngineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let page_selection = parse_pages(pages)?;
    let doc = analyze(input, engine)?;

    let render_options = RenderOptions::new().with_pages(page_selection);
    let text = render::to_text(&doc, &render_options)?;
    write_or_print(output, &text)
}

fn cmd_json(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    engine: &EngineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = analyze(input, engine)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let json = render::to_json(&doc, format)?;
    write_or_print(output, &json)
}

fn cmd_info(input: &Path, engine: &EngineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let doc = analyze(input, engine)?;
    let stats = DocumentStats::from_document(&doc);

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), stats.page_count);
    println!("{}: {}", "Degraded pages".bold(), stats.degraded_page_count);
    println!("{}: {}", "Malformed tokens".bold(), stats.malformed_token_count);

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Headers".bold(), stats.header_count);
    println!("{}: {}", "Paragraphs".bold(), stats.paragraph_count);
    println!("{}: {}", "List items".bold(), stats.list_item_count);
    println!(
        "{}: {} ({} rows)",
        "Tables".bold(),
        stats.table_count,
        stats.table_row_count
    );
    println!("{}: {}", "Words".bold(), stats.word_count);
    println!("{}: {:.2}", "Mean confidence".bold(), stats.mean_confidence());

    let outline = doc.outline();
    if !outline.is_empty() {
        println!("{}: {}", "Sections".bold(), outline.total_items());
    }

    let troubled: Vec<_> = doc.pages.iter().filter(|p| !p.issues.is_empty()).collect();
    if !troubled.is_empty() {
        println!();
        println!("{}", "Page Issues".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        for report in troubled {
            let label = format!("Page {}", report.page_number);
            let label = if report.is_degraded() {
                label.yellow().bold()
            } else {
                label.bold()
            };
            for issue in &report.issues {
                println!("{}: {}", label, issue);
            }
        }
    }

    Ok(())
}

fn cmd_config(file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match file {
        Some(path) => {
            let config = LayoutConfig::from_path(path)?;
            println!("{} {}", "Valid configuration:".green(), path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&LayoutConfig::default())?);
        }
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "reportlayout".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Page layout reconstruction for PDF report tokens");
    println!();
    println!("License: MIT");
}
