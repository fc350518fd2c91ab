use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfgraph::parser::{ObjectId, ParseOptions, PdfDocument, ScanStore};
use pdfgraph::text::{ExtractionOptions, TextExtractor};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pdfgraph",
    about = "Inspect PDF object graphs and extract text",
    version,
    author
)]
struct Cli {
    /// Skip malformed structures instead of failing
    #[arg(long, global = true)]
    lenient: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get information about a PDF file
    Info {
        /// Input PDF file
        input: PathBuf,

        /// Show per-page details
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract text from a PDF file
    ExtractText {
        /// Input PDF file
        input: PathBuf,

        /// Output text file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Page number to extract (0-based, extracts all if not specified)
        #[arg(short = 'p', long)]
        page: Option<usize>,

        /// Do not interpret form XObjects
        #[arg(long)]
        no_forms: bool,

        /// Never insert spaces for TJ adjustments
        #[arg(long)]
        no_spacing: bool,
    },

    /// Print one indirect object
    Object {
        /// Input PDF file
        input: PathBuf,

        /// Object number
        number: u32,

        /// Generation number
        #[arg(default_value_t = 0)]
        generation: u16,
    },

    /// List the fonts available to a page
    Fonts {
        /// Input PDF file
        input: PathBuf,

        /// Page number (0-based)
        #[arg(short = 'p', long, default_value_t = 0)]
        page: usize,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(input: &Path, lenient: bool) -> Result<PdfDocument<ScanStore>> {
    let options = if lenient {
        ParseOptions::lenient()
    } else {
        ParseOptions::strict()
    };
    PdfDocument::open_with_options(input, options)
        .with_context(|| format!("Failed to open PDF: {}", input.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { input, detailed } => {
            let document = open(&input, cli.lenient)?;
            let page_count = document
                .page_count()
                .context("Failed to read the page tree")?;

            println!("PDF Information for: {}", input.display());
            println!("==========================================");
            println!("Objects: {}", document.resolver().store().len());
            println!("Page tree root: {} R", document.pages_root());
            println!("Pages: {page_count}");

            if detailed {
                println!("\nPage Information:");
                println!("-----------------");
                for index in 0..page_count {
                    match document.page_at(index) {
                        Ok(page) => println!(
                            "Page {}: {} R, {:.0}x{:.0} pts, rotation {}",
                            index + 1,
                            page.id,
                            page.width(),
                            page.height(),
                            page.rotation
                        ),
                        Err(e) => println!("Page {}: [Could not read: {e}]", index + 1),
                    }
                }
            }

            let stats = document.resolver().stats();
            tracing::info!(
                "Resolver: {} hits, {} misses, {} cached",
                stats.hits,
                stats.misses,
                stats.cached
            );
        }

        Commands::ExtractText {
            input,
            output,
            page,
            no_forms,
            no_spacing,
        } => {
            let document = open(&input, cli.lenient)?;
            let extractor = TextExtractor::with_options(ExtractionOptions {
                follow_form_xobjects: !no_forms,
                space_threshold: if no_spacing {
                    None
                } else {
                    ExtractionOptions::default().space_threshold
                },
                ..Default::default()
            });

            let pages = match page {
                Some(index) => vec![index],
                None => (0..document.page_count()?).collect(),
            };

            let mut texts = Vec::with_capacity(pages.len());
            for index in pages {
                let page = document
                    .page_at(index)
                    .with_context(|| format!("Failed to load page {index}"))?;
                let text = extractor
                    .extract_text(&document, &page)
                    .with_context(|| format!("Failed to extract text from page {index}"))?;
                texts.push(text);
            }
            let full_text = texts.join("\n\n");

            // Write to output file or stdout
            if let Some(output_path) = output {
                std::fs::write(&output_path, &full_text).with_context(|| {
                    format!("Failed to write output file: {}", output_path.display())
                })?;
                println!("✓ Text extracted to: {}", output_path.display());
            } else {
                println!("{full_text}");
            }
        }

        Commands::Object {
            input,
            number,
            generation,
        } => {
            let document = open(&input, cli.lenient)?;
            let id = ObjectId::new(number, generation);
            let object = document
                .resolve(id)
                .with_context(|| format!("Failed to resolve {id} R"))?;
            println!("{object}");
        }

        Commands::Fonts { input, page } => {
            let document = open(&input, cli.lenient)?;
            let parsed = document
                .page_at(page)
                .with_context(|| format!("Failed to load page {page}"))?;
            let fonts = document
                .font_dictionary(&parsed)
                .with_context(|| format!("Failed to read fonts of page {page}"))?;

            if fonts.is_empty() {
                println!("Page {page} has no fonts");
            }
            for name in fonts.names() {
                let Some(font) = fonts.font(name) else {
                    continue;
                };
                println!(
                    "/{name}: {} ({}){}{}",
                    font.base_font.as_deref().unwrap_or("unnamed"),
                    font.subtype.as_deref().unwrap_or("unknown subtype"),
                    font.id.map(|id| format!(", {id} R")).unwrap_or_default(),
                    if font.to_unicode.is_some() {
                        ", ToUnicode"
                    } else {
                        ""
                    }
                );
            }
        }
    }

    Ok(())
}
