use std::path::{Path, PathBuf};
use std::process::ExitCode;

use arccrypt::{Advisory, Builtin, Engine, Games, Mode, PathIndex, RunConfig, Summary};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input file or directory
    #[arg(index = 1)]
    input: PathBuf,

    /// Modes to apply: encrypt, decrypt, md5encrypt, md5decrypt, deflate, inflate,
    /// switchdeflate, switchinflate or auto. Detected per file when omitted
    #[arg(short, long, num_args = 0.., value_delimiter = ',')]
    mode: Vec<String>,

    /// Game the files belong to: bbct, bbcsex, bbcpex or bbtag
    #[arg(short, long, num_args = 1..)]
    game: Vec<String>,

    /// File listing known relative paths, used to recover MD5 file names. Defaults to
    /// paths.txt next to the executable
    #[arg(short, long)]
    paths: Option<PathBuf>,

    /// Output directory. Defaults to the directory of the executable
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing output files instead of moving them to .bak
    #[arg(short, long, default_value = "false")]
    replace: bool,

    /// Exit without waiting for Enter once done
    #[arg(short = 'c', long = "continue", default_value = "false")]
    auto_continue: bool,
}

fn set_up_tracing() {
    use std::io::IsTerminal;
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_ansi(std::io::stdout().is_terminal()),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn main() -> ExitCode {
    set_up_tracing();
    let args = Args::parse();

    let code = match run(&args) {
        Ok(summary) => {
            info!(
                "finished: {} written, {} skipped, {} failed",
                summary.written(),
                summary.skipped(),
                summary.failed()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    };

    if !args.auto_continue {
        println!("Press Enter to exit");
        let _ = std::io::stdin().read_line(&mut String::new());
    }
    code
}

fn run(args: &Args) -> Result<Summary, arccrypt::Error> {
    let (mode, mut advisories) = Mode::parse_tokens(&args.mode);
    let (games, game_advisories) = Games::parse_tokens(&args.game);
    advisories.extend(game_advisories);

    let exe_dir = std::env::current_exe()?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let paths = args.paths.clone().unwrap_or_else(|| {
        let paths = exe_dir.join("paths.txt");
        advisories.push(Advisory::DefaultManifest(paths.clone()));
        paths
    });
    let output = args.output.clone().unwrap_or_else(|| {
        advisories.push(Advisory::DefaultOutput(exe_dir.clone()));
        exe_dir.clone()
    });
    let index = match PathIndex::load(&paths) {
        Ok(index) => Some(index),
        Err(_) => {
            advisories.push(Advisory::ManifestUnavailable(paths));
            None
        }
    };
    for advisory in &advisories {
        warn!("{advisory}");
    }

    let config = RunConfig::new(&args.input, output)
        .mode(mode)
        .games(games)
        .index(index)
        .replace(args.replace);
    Engine::new(config, Builtin::new()).run()
}
