//! nvtune - NVML-based GPU telemetry and tuning tool
//!
//! A command-line tool for reading NVIDIA GPU telemetry and adjusting power
//! limits, clock offsets and the core clock lock.

use clap::Parser;
use nvtune::cli::args::{generate_completions, Cli, Commands};
use nvtune::commands::{run_apply, run_list, run_reset, run_save, run_set, run_status};
use nvtune::config::{Config, ConfigBuilder};
use nvtune::error::{AppError, NvmlError};

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let result = load_config(&cli).and_then(|config| {
        init_logging(config.general.verbose);
        run(&cli, &config)
    });

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.format_timestamp(None);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let interval = match &cli.command {
        Commands::Status(args) => args.interval,
        _ => None,
    };

    Ok(ConfigBuilder::new()
        .with_file(cli.config.as_deref())?
        .with_verbose(cli.verbose)
        .with_dry_run(cli.dry_run)
        .with_interval(interval)
        .with_store_path(cli.store.clone())
        .with_gpu_index(cli.gpu)
        .with_gpu_uuid(cli.gpu_uuid.clone())
        .build())
}

fn run(cli: &Cli, config: &Config) -> Result<(), AppError> {
    match &cli.command {
        Commands::List => run_list(cli.format),

        Commands::Status(args) => run_status(args, config, cli.format),

        Commands::Set(args) => run_set(args, config, cli.format),

        Commands::Reset(args) => run_reset(args, config, cli.format),

        Commands::Save => run_save(config, cli.format),

        Commands::Apply => run_apply(config, cli.format),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Nvml(NvmlError::LibraryNotFound(_)) => {
            eprintln!();
            eprintln!("Hint: Make sure the NVIDIA driver is installed.");
            eprintln!("      On Linux, install the nvidia-utils package.");
        }
        AppError::Nvml(NvmlError::InsufficientPermissions(_)) => {
            eprintln!();
            eprintln!("Hint: Changing tunables usually requires root.");
        }
        AppError::Nvml(NvmlError::HardwareLocked(_)) => {
            eprintln!();
            eprintln!("Hint: The board firmware does not allow changing this setting.");
        }
        AppError::NoGpusFound => {
            eprintln!();
            eprintln!("Hint: Make sure you have an NVIDIA GPU installed.");
            eprintln!("      Check 'nvidia-smi' for GPU detection.");
        }
        _ => {}
    }
}
