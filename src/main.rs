use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use topic_press::config::{self, SiteConfig};
use topic_press::store::FsStore;
use topic_press::{output, pipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "topic-press")]
#[command(about = "Pre-render topic pages and the index for a discussion-poll site")]
#[command(long_about = "\
Pre-render topic pages and the index for a discussion-poll site

Reads every topic from a document-store export and writes static HTML.

Project structure:

  project/
  ├── site.toml                    # Config (store.root is required)
  ├── .env                         # Optional TOPIC_PRESS_* overrides
  ├── index-template.html          # Contains <!--TOPIC_LIST_PLACEHOLDER-->
  ├── topic-template.html          # Contains __OG_*__ and __TOPIC_DATA_JSON__
  └── admin.html                   # Copied verbatim to the output root

Store export layout:

  <root>/categories/<category>/subcategories/<subcategory>/topics/<id>.json

Output:

  dist/index.html                  # 12 most recent topics pre-rendered
  dist/topics/<slug>.html          # One page per titled topic

Run 'topic-press gen-config' to generate a documented site.toml.")]
#[command(version)]
struct Cli {
    /// Project directory holding site.toml and the templates
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Output directory (overrides site.toml and TOPIC_PRESS_OUTPUT_DIR)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Store export root (overrides site.toml and TOPIC_PRESS_STORE_ROOT)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: fetch → index → topic pages
    Build,
    /// Validate config, templates, and store without writing anything
    Check,
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let root = cli.root.canonicalize()?;
    config::load_dotenv(&root)?;
    let site_config = resolve_config(&cli, &root)?;
    init_tracing(&site_config.log_level);

    let store = FsStore::new(&site_config.store.root);

    match cli.command {
        Command::Build => {
            init_thread_pool(&site_config.processing);
            println!("==> Building {}", site_config.output_dir.display());
            let report = pipeline::build(&site_config, &store)?;
            output::print_build_output(&report);
        }
        Command::Check => {
            println!("==> Checking {}", site_config.store.root.display());
            let plan = pipeline::plan(&site_config, &store)?;
            output::print_plan(&plan);
            println!("==> Project is valid");
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// site.toml → environment → CLI flags, then validate. Environment paths
/// resolve against the project root, CLI paths against the working directory.
fn resolve_config(cli: &Cli, root: &Path) -> Result<SiteConfig, config::ConfigError> {
    let mut site_config = config::load_config(root)?
        .apply_env(|key| std::env::var(key).ok())
        .resolve_paths(root);
    if let Some(output) = &cli.output {
        site_config.output_dir = output.clone();
    }
    if let Some(store) = &cli.store {
        site_config.store.root = store.clone();
    }
    site_config.validate()?;
    Ok(site_config)
}

/// `RUST_LOG` wins; otherwise the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
