mod repl;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faqbot_core::eval::DEFAULT_REQUIRED_PASS_RATE;
use faqbot_core::{
    evaluate_cases, fallback, read_cases_json, Config, EmptyCorpusError, GenerativeFallback,
    MatchResult, Resolver, Session,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

type ChatResolver = Resolver<Box<dyn GenerativeFallback>>;

#[derive(Debug, Parser)]
#[command(name = "faqbot")]
#[command(version, about = "FAQ chatbot with a generative fallback")]
struct Cli {
    /// Config file. Defaults to faqbot/config.toml in the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset name from the config, or a CSV/JSONL path or URL.
    #[arg(short, long, global = true, env = "FAQBOT_DATASET")]
    dataset: Option<String>,

    /// Scores strictly above this answer from the corpus.
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Bound on a single fallback request, e.g. "30s".
    #[arg(long, global = true)]
    timeout: Option<humantime::Duration>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat (the default).
    Chat,
    /// Answer one question and exit.
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Show the best corpus matches without calling the fallback.
    Search {
        #[arg(long)]
        question: String,
        #[arg(long, default_value_t = 1)]
        top: usize,
        #[arg(long)]
        json: bool,
    },
    /// Replay expectation cases against the corpus.
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value_t = DEFAULT_REQUIRED_PASS_RATE)]
        min_pass_rate: f64,
        #[arg(long)]
        json: bool,
    },
    /// List configured datasets.
    Datasets,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("load config")?;
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if let Some(timeout) = cli.timeout {
        config.fallback.timeout = Some(timeout.to_string());
    }
    config.validate().context("invalid settings")?;
    Ok(config)
}

fn build_resolver(config: &Config) -> Result<ChatResolver> {
    let fallback = fallback::from_config(&config.fallback).context("set up fallback")?;
    Ok(Resolver::new(fallback).with_threshold(config.threshold))
}

pub(crate) fn activate(resolver: &mut ChatResolver, config: &Config, selection: &str) -> Result<()> {
    let (name, location) = config.resolve_dataset(selection);
    let active = resolver
        .select_dataset(&name, &location)
        .with_context(|| format!("activate dataset '{name}'"))?;
    info!(
        name = active.name(),
        entries = active.index().len(),
        "ready"
    );
    Ok(())
}

fn selection<'a>(cli: &'a Cli, config: &'a Config) -> &'a str {
    cli.dataset.as_deref().unwrap_or(&config.default_dataset)
}

fn run_ask(cli: &Cli, config: &Config, question: &[String]) -> Result<ExitCode> {
    let mut resolver = build_resolver(config)?;
    activate(&mut resolver, config, selection(cli, config))?;

    let mut session = Session::new();
    let report = resolver.handle_turn(&mut session, &question.join(" "))?;
    println!("{}", report.reply);

    Ok(if report.outcome.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_search(cli: &Cli, config: &Config, question: &str, top: usize, json: bool) -> Result<()> {
    let mut resolver = build_resolver(config)?;
    activate(&mut resolver, config, selection(cli, config))?;
    let index = resolver
        .active()
        .map(|a| a.index())
        .context("no active dataset")?;
    if index.is_empty() {
        return Err(EmptyCorpusError.into());
    }

    let results: Vec<MatchResult> = index
        .top_k(question, top.max(1))
        .into_iter()
        .map(|(entry, score)| index.judge(entry, score, config.threshold))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for r in &results {
        let entry = r.entry.unwrap_or_default();
        println!(
            "decision={:?} score={:.4} entry={} question={}",
            r.decision,
            r.score,
            entry,
            index.entries()[entry].question
        );
        if let Some(answer) = &r.answer {
            println!("answer={answer}");
        }
    }
    Ok(())
}

fn run_eval(
    cli: &Cli,
    config: &Config,
    cases: &Path,
    min_pass_rate: f64,
    json: bool,
) -> Result<ExitCode> {
    let mut resolver = build_resolver(config)?;
    activate(&mut resolver, config, selection(cli, config))?;
    let index = resolver
        .active()
        .map(|a| a.index())
        .context("no active dataset")?;

    let cases = read_cases_json(cases)?;
    let summary = evaluate_cases(index, &cases, config.threshold)?;
    let meets = summary.meets(min_pass_rate);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let run_id = format!("eval-{}", chrono::Utc::now().timestamp_millis());
        println!(
            "run_id={} dataset={} total={} passed={} failed={} pass_rate={:.4} required={:.4} meets_threshold={}",
            run_id,
            index.location(),
            summary.total,
            summary.passed,
            summary.failed(),
            summary.pass_rate,
            min_pass_rate,
            meets
        );

        for o in &summary.outcomes {
            let mut line = format!(
                "case={} passed={} decision={:?} entry={} score={:.4}",
                o.case_id,
                o.passed(),
                o.result.decision,
                o.result
                    .entry
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "null".to_string()),
                o.result.score,
            );
            if let Some(mismatch) = &o.mismatch {
                line.push_str(&format!(" mismatch=\"{mismatch}\""));
            }
            println!("{line}");
        }
    }

    Ok(if meets {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_datasets(config: &Config) {
    for (name, location) in &config.datasets {
        let marker = if *name == config.default_dataset { "*" } else { " " };
        println!("{marker} {name}\t{location}");
    }
}

fn run() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match &cli.command {
        None | Some(Commands::Chat) => {
            let mut resolver = build_resolver(&config)?;
            repl::run(&mut resolver, &config, selection(&cli, &config))?;
        }
        Some(Commands::Ask { question }) => return run_ask(&cli, &config, question),
        Some(Commands::Search {
            question,
            top,
            json,
        }) => run_search(&cli, &config, question, *top, *json)?,
        Some(Commands::Eval {
            cases,
            min_pass_rate,
            json,
        }) => return run_eval(&cli, &config, cases, *min_pass_rate, *json),
        Some(Commands::Datasets) => run_datasets(&config),
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "faqbot",
            "ask",
            "--dataset",
            "faq.csv",
            "--threshold",
            "0.5",
            "What",
            "is",
            "SVECW?",
        ])
        .expect("parse");

        assert_eq!(cli.dataset.as_deref(), Some("faq.csv"));
        assert_eq!(cli.threshold, Some(0.5));
        match cli.command {
            Some(Commands::Ask { question }) => assert_eq!(question.join(" "), "What is SVECW?"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_is_the_default() {
        let cli = Cli::try_parse_from(["faqbot", "--timeout", "5s"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(
            *cli.timeout.expect("timeout").as_ref(),
            std::time::Duration::from_secs(5)
        );
    }

    #[test]
    fn eval_defaults_pass_rate() {
        let cli = Cli::try_parse_from(["faqbot", "eval", "--cases", "cases.json"]).expect("parse");
        match cli.command {
            Some(Commands::Eval { min_pass_rate, .. }) => {
                assert_eq!(min_pass_rate, DEFAULT_REQUIRED_PASS_RATE)
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
