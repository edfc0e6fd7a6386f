//! CLI for publications - Expand BibTeX publication lists in text documents.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use publications::{
    builtin_template_names,
    config::{Config, ConfigError},
    processor::ProcessorError,
    sort::SortError,
    Processor, Renderer, SortMode,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Expand BibTeX publication lists in text documents
#[derive(Parser)]
#[command(name = "publications")]
#[command(version)]
#[command(after_help = "\
Examples:
  publications process page.rst -o page.out.rst
  publications process page.rst --template-dir theme/templates --sort key
  publications render refs.bib --template list.html
  publications render refs.bib --json
  publications templates")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand every publications directive in a document
    #[command(after_help = "\
Directive syntax:
  .. publications:: refs.bib [template.html]
     :sort: date | key | id | name
     :template: path/to/template.html")]
    Process {
        /// Input document (use '-' for stdin)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Theme directory containing the publications template
        #[arg(long)]
        template_dir: Option<PathBuf>,

        /// Default sort for directives without a :sort: option
        #[arg(short, long)]
        sort: Option<String>,
    },

    /// Render a single BibTeX file as a publication list
    Render {
        /// BibTeX file
        bib: PathBuf,

        /// Template file (default: builtin 'publications' template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Sort order: date, key, id or name
        #[arg(short, long, default_value = "date")]
        sort: String,

        /// Print the normalized entries as JSON instead of rendering
        #[arg(long, conflicts_with = "template")]
        json: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available builtin templates
    Templates,
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: input file not found / unreadable
    InputFile(String),
    /// Exit 11: bibliography file not found / invalid
    BibFile(String),
    /// Exit 12: template not found / invalid
    Template(String),
    /// Exit 13: malformed directive or sort option
    Directive(String),
    /// Exit 15: cannot write output file
    OutputFile(String),
    /// Exit 16: configuration file not found / invalid
    Config(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::BibFile(_) => 11,
            AppError::Template(_) => 12,
            AppError::Directive(_) => 13,
            AppError::OutputFile(_) => 15,
            AppError::Config(_) => 16,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::BibFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: bibliography paths are relative to the document's directory",
                    msg
                )
            }
            AppError::Template(msg) => {
                let names = builtin_template_names().join(", ");
                write!(
                    f,
                    "{}\n  available builtin templates: {}\n  hint: provide a path to a template file, or a theme directory containing <name>.html",
                    msg, names
                )
            }
            AppError::Directive(msg) => {
                write!(
                    f,
                    "{}\n  hint: valid sort options are {}",
                    msg,
                    SortMode::NAMES.join(", ")
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
            AppError::Config(msg) => {
                write!(
                    f,
                    "{}\n  hint: valid keys are default_sort, template_dir and template_name",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "publications=warn",
        1 => "publications=info",
        _ => "publications=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            template_dir,
            sort,
        } => {
            process_command(
                &input,
                output.as_deref(),
                config.as_deref(),
                template_dir,
                sort.as_deref(),
            )?;
        }
        Commands::Render {
            bib,
            template,
            sort,
            json,
            output,
        } => {
            render_command(&bib, template.as_deref(), &sort, json, output.as_deref())?;
        }
        Commands::Templates => {
            templates_command();
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Expand the publication directives of a document.
fn process_command(
    input: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
    template_dir: Option<PathBuf>,
    sort: Option<&str>,
) -> Result<(), AppError> {
    // 1. Load configuration, then apply command-line overrides
    let mut config = match config_path {
        Some(path) => Config::load(path).map_err(|e| map_config_error(path, e))?,
        None => Config::default(),
    };
    if let Some(dir) = template_dir {
        config.template_dir = Some(dir);
    }
    if let Some(sort) = sort {
        config.default_sort = parse_sort(sort)?;
    }

    // 2. Read the document (support '-' for stdin)
    let (text, base_dir) = if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::InputFile(format!("failed to read from stdin: {}", e)))?;
        (buf, PathBuf::from("."))
    } else {
        let text = fs::read_to_string(input)
            .map_err(|e| AppError::InputFile(format!("'{}': {}", input.display(), e)))?;
        let base_dir = match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (text, base_dir)
    };

    // 3. Expand directives
    let renderer = config.renderer();
    let processor = Processor::new(&renderer)
        .with_base_dir(base_dir)
        .with_default_sort(config.default_sort);
    let result = processor
        .process_document(&text)
        .map_err(map_processor_error)?;

    // 4. Write to file or stdout
    write_output(output, &result)
}

/// Render one bibliography file directly, or dump it as JSON.
fn render_command(
    bib: &Path,
    template: Option<&Path>,
    sort: &str,
    json: bool,
    output: Option<&Path>,
) -> Result<(), AppError> {
    let mode = parse_sort(sort)?;
    let renderer = Renderer::new();
    let processor = Processor::new(&renderer);

    if json {
        let publications = processor
            .load_publications(bib, Some(mode))
            .map_err(map_processor_error)?;
        let mut dump = serde_json::to_string_pretty(&publications)
            .map_err(|e| AppError::OutputFile(format!("failed to serialize entries: {}", e)))?;
        dump.push('\n');
        return write_output(output, &dump);
    }

    let (rendered, entries) = processor
        .render_bibliography(bib, template, Some(mode))
        .map_err(map_processor_error)?;
    info!(entries, bib = %bib.display(), "rendered bibliography");

    write_output(output, &rendered)
}

/// List available builtin templates.
fn templates_command() {
    for name in builtin_template_names() {
        println!("{}", name);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_sort(sort: &str) -> Result<SortMode, AppError> {
    sort.parse::<SortMode>()
        .map_err(|e| AppError::Directive(e.to_string()))
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), AppError> {
    if let Some(output_path) = output {
        fs::write(output_path, content).map_err(|e| {
            AppError::OutputFile(format!("'{}': {}", output_path.display(), e))
        })?;
        info!(path = %output_path.display(), "wrote output");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{}", content)
            .map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }
    Ok(())
}

/// Maps a ProcessorError to an AppError using type-safe matching.
fn map_processor_error(e: ProcessorError) -> AppError {
    match e {
        ProcessorError::Directive(_) | ProcessorError::Sort(SortError::InvalidSortMode(_)) => {
            AppError::Directive(e.to_string())
        }
        // Unparseable year or month in an entry
        ProcessorError::Sort(_) | ProcessorError::Bibliography { .. } => {
            AppError::BibFile(e.to_string())
        }
        ProcessorError::Template(_) => AppError::Template(e.to_string()),
    }
}

fn map_config_error(path: &Path, e: ConfigError) -> AppError {
    AppError::Config(format!("'{}': {}", path.display(), e))
}
