//! Subcommand handlers.

use std::io::{IsTerminal, Write};
use std::path::Path;

use super::args::{Args, Command, ConfigAction, ShowTarget};
use crate::backend::Backend;
use crate::board::{BoardPrompt, LinePrompt, NoPrompt};
use crate::config::{self, Config, ConfigError, DEFAULT_CONFIG};
use crate::error::AppError;
use crate::interrupt::Interrupt;
use crate::workflow::{RunPlan, Session};

/// Prompt on the terminal when there is one, otherwise refuse to guess.
fn board_prompt() -> Box<dyn BoardPrompt> {
    if std::io::stdin().is_terminal() {
        Box::new(LinePrompt::new(std::io::stdin().lock(), std::io::stdout()))
    } else {
        Box::new(NoPrompt)
    }
}

/// Execute the parsed command and return the process exit code.
pub fn run(args: Args, interrupt: &Interrupt) -> Result<i32, AppError> {
    if let Command::Config { action } = args.command {
        handle_config_action(action, args.config.as_deref())?;
        return Ok(0);
    }

    let cfg = Config::load(args.config.as_deref())?;
    let backend = Backend::new(cfg.arduino.cli.clone()).with_interrupt(interrupt.clone());
    let mut session = Session::new(&backend, std::io::stdout());

    let status = match args.command {
        Command::Compile { fqbn, path } => {
            let sketch = cfg.sketch_path(path.as_deref());
            session.compile(&cfg.fqbn(fqbn.as_deref()), &sketch)?
        }
        Command::Upload {
            fqbn,
            port,
            speed,
            path,
        } => {
            let board = session.detect_board(port.as_deref(), &mut *board_prompt())?;
            let sketch = cfg.sketch_path(path.as_deref());
            session.upload(
                &cfg.fqbn(fqbn.as_deref()),
                &board.port,
                cfg.upload_speed(speed),
                &sketch,
            )?
        }
        Command::Monitor { port, baudrate } => {
            let board = session.detect_board(port.as_deref(), &mut *board_prompt())?;
            session.monitor(&board.port, cfg.baudrate(baudrate))?
        }
        Command::Run {
            fqbn,
            port,
            speed,
            baudrate,
            path,
        } => {
            let plan = RunPlan {
                fqbn: cfg.fqbn(fqbn.as_deref()),
                port,
                upload_speed: cfg.upload_speed(speed),
                baudrate: cfg.baudrate(baudrate),
                sketch: cfg.sketch_path(path.as_deref()),
            };
            session.run_all(&plan, &mut *board_prompt())?
        }
        Command::Show { what } => {
            match what {
                ShowTarget::Boards => session.show_boards()?,
                ShowTarget::Libraries => session.show_libraries()?,
                ShowTarget::Cores => session.show_cores()?,
                ShowTarget::Config => print_config(&cfg, &mut std::io::stdout())?,
            }
            return Ok(0);
        }
        Command::Version => {
            session.show_version()?;
            return Ok(0);
        }
        Command::Config { .. } => unreachable!("handled above"),
    };

    Ok(status.code())
}

/// Print the effective settings.
fn print_config<W: Write>(cfg: &Config, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Current configuration:")?;
    writeln!(out, "  FQBN:             {}", cfg.arduino.fqbn)?;
    writeln!(out, "  Upload speed:     {} baud", cfg.arduino.upload_speed)?;
    writeln!(out, "  Monitor baudrate: {} baud", cfg.arduino.baudrate)?;
    writeln!(out, "  Sketch path:      {}", cfg.arduino.sketch_path.display())?;
    writeln!(out, "  Backend:          {}", cfg.arduino.cli)?;
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, path: Option<&Path>) -> Result<(), AppError> {
    match action {
        ConfigAction::Show => {
            let cfg = Config::load(path)?;
            let mut out = std::io::stdout();
            print_config(&cfg, &mut out)?;
            writeln!(out)?;

            match path.map(Path::to_path_buf).or_else(config::discover_path) {
                Some(file) => writeln!(out, "Config file: {} (exists)", file.display())?,
                None => writeln!(
                    out,
                    "Config file: {} (not found, using defaults)",
                    config::default_path().display()
                )?,
            }
        }
        ConfigAction::Init => {
            let config_path = path
                .map(Path::to_path_buf)
                .unwrap_or_else(config::default_path);

            if config_path.exists() {
                return Err(ConfigError::AlreadyExists { path: config_path }.into());
            }

            if let Some(parent) = config_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&config_path, DEFAULT_CONFIG)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}
