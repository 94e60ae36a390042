use clap::{Parser, Subcommand};
use poster_batch::naming::BACKGROUND_NAME;
use poster_batch::pipeline::{self, RunEvent, RunInputs};
use poster_batch::{config, output};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Spreadsheet and photo inputs shared by `build` and `check`.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Spreadsheet (xlsx, xls, xlsb, ods) with school, major and image columns
    #[arg(long)]
    table: PathBuf,

    /// Photo files or directories of photos, matched by file name
    #[arg(long, num_args = 1..)]
    images: Vec<PathBuf>,
}

#[derive(Parser)]
#[command(name = "poster-batch")]
#[command(version)]
#[command(about = "Batch-render announcement posters from a spreadsheet and photos")]
#[command(long_about = "\
Batch-render announcement posters from a spreadsheet and photos

Each spreadsheet row names a school, a major and a photo file. The photo is
looked up by exact file name among --images, drawn onto the background
template with both captions, and every poster is bundled into one archive.

Project structure:

  project/
  ├── config.toml        # Layout, font and processing settings (optional)
  └── background.png     # Poster background template

Output:

  dist/
  ├── 批量生成的海报.zip   # 喜报-{school}-{major}.png per row
  └── manifest.json      # Entries, skipped rows, failed rows

Rows missing school, major or image, or naming a photo that was not supplied,
are skipped. Run 'poster-batch gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Project directory holding config.toml and background.png
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Output directory for the archive and manifest
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every row and write the archive
    Build {
        #[command(flatten)]
        inputs: InputArgs,

        /// Background template (default: background.png in the project directory)
        #[arg(long)]
        background: Option<PathBuf>,
    },
    /// Validate inputs and list what would be rendered
    Check(InputArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("re-run with RUST_LOG=debug for details");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build { inputs, background } => {
            let config = config::load_config(&cli.project)?;
            init_thread_pool(&config.processing);
            let run_inputs = RunInputs {
                table: inputs.table,
                images: inputs.images,
                background: background.unwrap_or_else(|| cli.project.join(BACKGROUND_NAME)),
            };

            println!("==> Building posters → {}", cli.output.display());
            let (tx, rx) = mpsc::channel();
            let printer = spawn_status_printer(rx);
            let result = pipeline::build(&run_inputs, &config, &cli.output, Some(tx));
            if printer.join().is_err() {
                tracing::warn!("status printer panicked");
            }
            let built = result?;

            output::print_summary(&built.outcome);
            println!("==> Wrote {}", built.archive.display());
        }
        Command::Check(inputs) => {
            config::load_config(&cli.project)?;
            println!("==> Checking {}", inputs.table.display());
            let plan = pipeline::check(&inputs.table, &inputs.images, None)?;
            output::print_plan(&plan);
            println!("==> Inputs are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr. Row-level problems already reach the status line, so only
/// errors are logged unless `RUST_LOG` says otherwise.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn spawn_status_printer(rx: Receiver<RunEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut status = output::StatusLine::stdout();
        for event in rx {
            if status.show(&event).is_err() {
                break;
            }
        }
        let _ = status.finish();
    })
}
