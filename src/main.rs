use clap::Parser;

use sketchrun::cli::{self, Args};
use sketchrun::interrupt::{setup_ctrlc_handler, Interrupt};

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let interrupt = Interrupt::new();
    if let Err(e) = setup_ctrlc_handler(&interrupt) {
        eprintln!("Warning: Could not set up Ctrl+C handler: {}", e);
    }

    match cli::run(args, &interrupt) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
