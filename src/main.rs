//! akh-resolve CLI: answer rule-based queries over a fact program.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use akh_resolve::config::ReasonerConfig;
use akh_resolve::pattern::Resolvable;
use akh_resolve::program::{AnswerRecord, Program};
use akh_resolve::resolution::Reasoner;

#[derive(Parser)]
#[command(name = "akh-resolve", version, about = "Rule-based resolution over stored facts")]
struct Cli {
    /// TOML reasoner configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the query of a JSON program and print its answers.
    Run {
        /// Path to the JSON program (facts, rules, query).
        program: PathBuf,

        /// Print the derivation of every answer.
        #[arg(long)]
        explain: bool,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Override `max_iterations` from the configuration.
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Parse a program and show how its query would be planned.
    Check {
        /// Path to the JSON program.
        program: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ReasonerConfig::load(path)?,
        None => ReasonerConfig::default(),
    };

    match cli.command {
        Commands::Run {
            program,
            explain,
            format,
            max_iterations,
        } => {
            if let Some(max) = max_iterations {
                config.max_iterations = max;
            }
            let program = Program::load(&program)?;
            let reasoner = Reasoner::new(Arc::new(program.fact_store()?), Arc::new(program.rule_set()?))
                .with_config(config);
            let query = program.conjunction()?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .into_diagnostic()?;
            runtime.block_on(async {
                let mut resolution = reasoner.resolve(query)?;
                let mut total = 0;
                while let Some(report) = resolution.next_iteration().await? {
                    for answer in &report.answers {
                        match format {
                            OutputFormat::Text => {
                                let tag = if answer.is_inferred() { "inferred" } else { "stored" };
                                println!("[{}] {answer} ({tag})", report.iteration);
                                if explain {
                                    print!("{}", answer.explain());
                                }
                            }
                            OutputFormat::Json => {
                                let record = AnswerRecord::new(report.iteration, answer, explain);
                                println!("{}", serde_json::to_string(&record).into_diagnostic()?);
                            }
                        }
                    }
                    total += report.answers.len();
                    if report.fixpoint {
                        if let OutputFormat::Text = format {
                            println!(
                                "{total} answer(s), fixpoint after {} iteration(s)",
                                report.iteration + 1
                            );
                        }
                    }
                }
                Ok::<(), miette::Report>(())
            })?;
        }

        Commands::Check { program } => {
            let program = Program::load(&program)?;
            let facts = program.fact_store()?;
            let rules = program.rule_set()?;
            let query = program.conjunction()?;
            println!("{} fact(s), {} rule(s)", facts.len(), rules.len());
            println!("query: {query}");
            for resolvable in query.resolvables(&rules) {
                match &resolvable {
                    Resolvable::Concludable(c) => {
                        let rule_names: Vec<_> = c
                            .applicable_rules(&rules)
                            .into_iter()
                            .map(|(rule, _)| rule.name().to_string())
                            .collect();
                        println!("  {resolvable} <- {}", rule_names.join(", "));
                    }
                    Resolvable::Retrievable(_) => println!("  {resolvable}"),
                }
            }
        }
    }

    Ok(())
}
