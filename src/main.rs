use clap::Parser;
use replay_engine::cli::commands::{RunArgs, cmd_locate, cmd_run, cmd_validate};
use replay_engine::cli::config::{Cli, Commands, load_config};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);
    let config = load_config(cli.config.as_deref());

    let ok = match &cli.command {
        Commands::Run {
            sequence,
            data,
            url,
            format,
            output,
            trace,
            project,
        } => {
            let args = RunArgs {
                sequence,
                data: data.as_deref(),
                url: url.as_deref(),
                format: format.as_deref(),
                output: output.as_deref(),
                trace: trace.as_deref(),
                project: project.as_deref(),
            };
            cmd_run(&args, &config)?
        }
        Commands::Locate { snapshot, bundle } => cmd_locate(snapshot, bundle)?,
        Commands::Validate { sequence } => cmd_validate(sequence)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
