mod completer;
mod config;

use completer::{EecalcCompleter, COMMANDS};
use config::{ColorMode, Config, IntroBanner, PrettyPrintMode};

use eecalc::diagnostic::ErrorDiagnostic;
use eecalc::pretty_print::PrettyPrint;
use eecalc::tokenizer::tokenize;
use eecalc::unit::combination_rules;
use eecalc::{BaseUnit, Session};

use anyhow::{bail, Context as AnyhowContext, Result};
use clap::Parser;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{self, termcolor};
use colored::control::SHOULD_COLORIZE;
use colored::Colorize;
use itertools::Itertools;
use log::{debug, warn};
use rustyline::config::Configurer;
use rustyline::{
    error::ReadlineError, history::DefaultHistory, Completer, Editor, Helper, Highlighter, Hinter,
    Validator,
};

use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error,
}

type ControlFlow = std::ops::ControlFlow<ExitStatus>;

#[derive(Parser, Debug)]
#[command(version, about, name("eecalc"), max_term_width = 90)]
struct Args {
    /// Path to a file with one expression per line. Empty lines and lines starting
    /// with '#' are skipped. If neither a file nor an expression is given, an
    /// interactive session is started.
    file: Option<PathBuf>,

    /// Expression to evaluate. Repeat the flag to evaluate several expressions in one session.
    #[arg(
        short,
        long,
        value_name = "EXPR",
        action = clap::ArgAction::Append
    )]
    expression: Option<Vec<String>>,

    /// Enter interactive session after evaluating a file or expressions
    #[arg(short, long)]
    inspect_interactively: bool,

    /// Ignore the configuration file and start from the defaults.
    #[arg(long, hide_short_help = true)]
    no_config: bool,

    /// When to echo the parsed value tree before each result.
    #[arg(long, value_name = "WHEN")]
    pretty_print: Option<PrettyPrintMode>,

    /// When to use colors in results and error messages.
    #[arg(long, value_name = "WHEN")]
    color: Option<ColorMode>,

    /// Banner printed when an interactive session starts.
    #[arg(long, value_name = "MODE")]
    intro_banner: Option<IntroBanner>,

    /// Write a configuration file with all default values and exit.
    #[arg(long, hide_short_help = true)]
    generate_config: bool,

    /// Log the token stream and value tree of every input (hidden, mainly for development)
    #[arg(long, short, hide = true)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExecutionMode {
    Normal,
    Interactive,
}

impl ExecutionMode {
    fn exit_status_in_case_of_error(&self) -> ControlFlow {
        if matches!(self, ExecutionMode::Normal) {
            ControlFlow::Break(ExitStatus::Error)
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[derive(Completer, Helper, Hinter, Validator, Highlighter)]
struct EecalcHelper {
    #[rustyline(Completer)]
    completer: EecalcCompleter,
}

struct Cli {
    config: Config,
    session: Arc<Mutex<Session>>,
    file: Option<PathBuf>,
    expression: Option<Vec<String>>,
}

impl Cli {
    fn new(args: Args) -> Result<Self> {
        let user_config_path = Self::get_config_path().join("config.toml");

        let mut config = if args.no_config {
            Config::default()
        } else if let Ok(contents) = fs::read_to_string(&user_config_path) {
            toml::from_str(&contents).context(format!(
                "Invalid configuration file {}",
                user_config_path.to_string_lossy()
            ))?
        } else {
            debug!(
                "No configuration file at {}, using defaults",
                user_config_path.to_string_lossy()
            );
            Config::default()
        };

        config.intro_banner = args.intro_banner.unwrap_or(config.intro_banner);
        config.pretty_print = args.pretty_print.unwrap_or(config.pretty_print);
        config.color = args.color.unwrap_or(config.color);

        config.enter_repl =
            (args.file.is_none() && args.expression.is_none()) || args.inspect_interactively;

        Ok(Self {
            config,
            session: Arc::new(Mutex::new(Session::new())),
            file: args.file,
            expression: args.expression,
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&mut self) -> Result<()> {
        match self.config.color {
            ColorMode::Never => SHOULD_COLORIZE.set_override(false),
            ColorMode::Always => SHOULD_COLORIZE.set_override(true),
            ColorMode::Auto => (),
        }

        let mut lines = Vec::new();

        if let Some(ref path) = self.file {
            let contents = fs::read_to_string(path).context(format!(
                "Could not load source file '{}'",
                path.to_string_lossy()
            ))?;
            lines.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(String::from),
            );
        }

        if let Some(expressions) = &self.expression {
            lines.extend(expressions.iter().cloned());
        }

        for line in lines {
            let control_flow =
                self.parse_and_evaluate(&line, ExecutionMode::Normal, self.config.pretty_print);
            if control_flow.is_break() {
                bail!("Evaluation stopped")
            }
        }

        if self.config.enter_repl {
            self.repl()?;
        }

        Ok(())
    }

    fn repl(&mut self) -> Result<()> {
        let interactive = std::io::stdin().is_terminal();
        let history_path = self.get_history_path()?;

        let mut rl = Editor::<EecalcHelper, DefaultHistory>::new()?;
        rl.set_max_history_size(1000)
            .context("Could not set the history size")?;
        rl.set_completion_type(rustyline::CompletionType::List);
        rl.set_helper(Some(EecalcHelper {
            completer: EecalcCompleter {
                session: self.session.clone(),
            },
        }));
        rl.load_history(&history_path).ok();

        if interactive {
            match self.config.intro_banner {
                IntroBanner::Long => {
                    println!();
                    println!("  EECalc {}", env!("CARGO_PKG_VERSION"));
                    println!("  Arithmetic with units: try '1W * 10s' or 'x = 5V'. Type 'help' for more.");
                    println!();
                }
                IntroBanner::Short => {
                    println!("EECalc {}", env!("CARGO_PKG_VERSION"));
                }
                IntroBanner::Off => {}
            }
        }

        let result = self.repl_loop(&mut rl, interactive);

        if interactive {
            rl.save_history(&history_path).context(format!(
                "Could not save history to '{}'",
                history_path.to_string_lossy()
            ))?;
        }

        result
    }

    fn repl_loop(
        &mut self,
        rl: &mut Editor<EecalcHelper, DefaultHistory>,
        interactive: bool,
    ) -> Result<()> {
        loop {
            let readline = rl.readline(&self.config.prompt);
            match readline {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)?;

                    let control_flow = if COMMANDS.contains(&line) {
                        self.run_command(rl, line)?
                    } else {
                        self.parse_and_evaluate(
                            line,
                            if interactive {
                                ExecutionMode::Interactive
                            } else {
                                ExecutionMode::Normal
                            },
                            self.config.pretty_print,
                        )
                    };

                    match control_flow {
                        std::ops::ControlFlow::Continue(()) => {}
                        std::ops::ControlFlow::Break(ExitStatus::Success) => {
                            return Ok(());
                        }
                        std::ops::ControlFlow::Break(ExitStatus::Error) => {
                            bail!("Evaluation stopped due to error")
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {}
                Err(ReadlineError::Eof) => {
                    return Ok(());
                }
                Err(err) => {
                    bail!(err);
                }
            }
        }
    }

    fn run_command(
        &self,
        rl: &mut Editor<EecalcHelper, DefaultHistory>,
        command: &str,
    ) -> Result<ControlFlow> {
        match command {
            "help" => print_help(),
            "list" => self.print_list(),
            "clear" => rl.clear_screen()?,
            _ => return Ok(ControlFlow::Break(ExitStatus::Success)),
        }
        Ok(ControlFlow::Continue(()))
    }

    #[must_use]
    fn parse_and_evaluate(
        &mut self,
        input: &str,
        execution_mode: ExecutionMode,
        pretty_print_mode: PrettyPrintMode,
    ) -> ControlFlow {
        let interactive = execution_mode == ExecutionMode::Interactive;

        let pretty_print = match pretty_print_mode {
            PrettyPrintMode::Always => true,
            PrettyPrintMode::Never => false,
            PrettyPrintMode::Auto => interactive,
        };

        if let Ok(tokens) = tokenize(input) {
            debug!("tokens: {}", tokens.iter().join(" "));
        }

        let result = {
            let mut session = self.session();
            session.parse(input).and_then(|value| {
                debug!("value tree: {value:?}");
                let quantity = session.evaluate_value(&value)?;
                Ok((value, quantity))
            })
        };

        match result {
            Ok((value, quantity)) => {
                if interactive || pretty_print {
                    println!();
                }

                if pretty_print {
                    println!("  {}", value.pretty_print());
                    println!();
                    println!("    = {}", quantity.pretty_print().bold());
                } else {
                    println!("{quantity}");
                }

                if interactive || pretty_print {
                    println!();
                }

                ControlFlow::Continue(())
            }
            Err(e) => {
                self.print_diagnostic(&e, input);
                execution_mode.exit_status_in_case_of_error()
            }
        }
    }

    fn print_diagnostic(&self, error: &impl ErrorDiagnostic, input: &str) {
        let color_choice = match self.config.color {
            ColorMode::Always => termcolor::ColorChoice::Always,
            ColorMode::Never => termcolor::ColorChoice::Never,
            ColorMode::Auto if std::io::stderr().is_terminal() => termcolor::ColorChoice::Auto,
            ColorMode::Auto => termcolor::ColorChoice::Never,
        };

        let file = SimpleFile::new("<input>", input);
        let writer = termcolor::StandardStream::stderr(color_choice);
        let config = term::Config::default();

        if let Err(e) = term::emit(&mut writer.lock(), &config, &file, &error.diagnostic()) {
            warn!("Could not render diagnostic: {e}");
        };
    }

    fn print_list(&self) {
        println!("{}", "Units:".bold());
        for unit in BaseUnit::all().filter(|unit| *unit != BaseUnit::Scalar) {
            println!("  {:<5} {}", unit.shorthand().cyan(), unit.full_name());
        }

        println!();
        println!("{}", "Rules:".bold());
        for rule in combination_rules()
            .iter()
            .filter(|rule| rule.lhs != BaseUnit::Scalar)
        {
            println!(
                "  {} × {} = {}",
                rule.lhs.full_name(),
                rule.rhs.full_name(),
                rule.product.full_name()
            );
        }

        let session = self.session();
        if !session.variables().is_empty() {
            println!();
            println!("{}", "Variables:".bold());
            for variable in session.variables().iter() {
                if let Some(quantity) = variable.quantity() {
                    println!("  {} = {}", variable.name().green(), quantity);
                }
            }
        }
        println!();
    }

    fn get_config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("eecalc")
    }

    fn get_history_path(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eecalc");
        if let Err(e) = fs::create_dir_all(&data_dir) {
            warn!(
                "Could not create data directory '{}': {e}",
                data_dir.to_string_lossy()
            );
        }
        Ok(data_dir.join("history"))
    }
}

fn print_help() {
    println!();
    println!("{}", "EECalc".bold());
    println!();
    println!("  Numbers take an optional unit suffix: 5V, 2.5A, 10s, 3m/s");
    println!("  Suffixes accept a metric prefix: 3mA, 4.7kR, 10uF");
    println!("  Operators: + - * / ^ and parentheses, abs(...) for absolute values");
    println!("  Assign a variable with 'name = expression'. Its unit is fixed from then on.");
    println!();
    println!("  Examples:");
    println!("    1W * 10s           = 10J");
    println!("    supply = 12V");
    println!("    supply / 4R        = 3A");
    println!();
    println!("  Commands: help, list, clear, quit, exit");
    println!();
}

fn generate_config() -> Result<()> {
    let config_folder_path = Cli::get_config_path();
    let config_file_path = config_folder_path.join("config.toml");

    if config_file_path.exists() {
        bail!(
            "Refusing to overwrite existing configuration file '{}'",
            config_file_path.to_string_lossy()
        );
    }

    fs::create_dir_all(&config_folder_path).context(format!(
        "Could not create configuration directory '{}'",
        config_folder_path.to_string_lossy()
    ))?;

    let config = Config::default();
    let content = toml::to_string(&config).context("Could not serialize the default configuration")?;

    fs::write(&config_file_path, content)?;

    println!(
        "Wrote the default configuration to '{}'.",
        config_file_path.to_string_lossy()
    );
    println!("Edit the fields you want to change. Removed fields fall back to their defaults.");

    Ok(())
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if args.generate_config {
        if let Err(e) = generate_config() {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
        std::process::exit(0);
    }

    if let Err(e) = Cli::new(args).and_then(|mut cli| cli.run()) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
