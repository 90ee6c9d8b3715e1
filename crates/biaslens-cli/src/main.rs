//! biaslens CLI
//!
//! Command-line interface for bias analysis and mitigation.
//!
//! ## Usage
//!
//! ```bash
//! # Analyze a response to a prompt
//! biaslens analyze --prompt "Describe Sikhs." --response response.txt
//!
//! # Pipe from stdin, with a model hint
//! cat response.txt | biaslens analyze --prompt "Describe Sikhs." --model gpt-4
//!
//! # JSON output
//! biaslens analyze --prompt "Describe Sikhs." --response response.txt --format json
//!
//! # Rewrite with a specific strategy
//! biaslens mitigate --response response.txt --strategy counter_narrative
//!
//! # Validate a configuration file
//! biaslens config validate biaslens.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - 0: low risk
//! - 1: medium risk
//! - 2: high risk
//! - 3: Error

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use biaslens_core::{to_ten_point_scale, Dimension, Mitigator, MitigationRecord, RiskTier, Strategy};
use biaslens_runtime::{Pipeline, PipelineConfig, PipelineResult};

/// biaslens: bias analysis and mitigation for generated text
#[derive(Parser)]
#[command(name = "biaslens")]
#[command(version)]
#[command(about = "Score, check and rewrite generated text for bias", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a prompt and response
    Analyze {
        /// The prompt that produced the response
        #[arg(short, long)]
        prompt: String,

        /// Path to the response text (reads from stdin if not provided)
        #[arg(short, long)]
        response: Option<PathBuf>,

        /// Name of the model that generated the response
        #[arg(short, long)]
        model: Option<String>,

        /// Path to a pipeline configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Show per-dimension reasoning and strategy candidates
        #[arg(long)]
        explain: bool,

        /// Report scores on the 0-10 scale instead of 1-5
        #[arg(long)]
        ten_point: bool,

        /// Explicit timestamp for reproducible output (RFC 3339).
        /// Example: --analyzed-at 2025-01-15T10:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        analyzed_at: Option<DateTime<Utc>>,
    },

    /// Rewrite a response without scoring it
    Mitigate {
        /// Path to the response text (reads from stdin if not provided)
        #[arg(short, long)]
        response: Option<PathBuf>,

        /// Strategy to apply (best fit if omitted)
        #[arg(short, long, value_parser = parse_strategy, conflicts_with = "layered")]
        strategy: Option<Strategy>,

        /// Apply every applicable strategy in sequence
        #[arg(long)]
        layered: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List the mitigation strategies
    Strategies,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        path: PathBuf,
    },

    /// Show the effective configuration (defaults if no path is given)
    Show {
        /// Path to the configuration file
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse an RFC 3339 datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected RFC 3339 (e.g., 2025-01-15T10:00:00Z)", e))
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse()
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    match run() {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            prompt,
            response,
            model,
            config,
            format,
            explain,
            ten_point,
            analyzed_at,
        } => analyze_command(
            &prompt,
            response,
            model.as_deref(),
            config,
            format,
            ViewOptions { explain, ten_point },
            analyzed_at,
        ),

        Commands::Mitigate {
            response,
            strategy,
            layered,
            format,
        } => mitigate_command(response, strategy, layered, format),

        Commands::Strategies => list_strategies(),

        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => validate_config(path),
            ConfigAction::Show { path } => show_config(path),
        },
    }
}

#[derive(Clone, Copy)]
struct ViewOptions {
    explain: bool,
    ten_point: bool,
}

fn load_config(path: &Path) -> Result<PipelineConfig, biaslens_runtime::ConfigError> {
    if path.extension().map(|e| e == "json").unwrap_or(false) {
        PipelineConfig::from_json_file(path)
    } else {
        PipelineConfig::from_yaml_file(path)
    }
}

fn read_response(path: Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read response from {:?}", path)),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn analyze_command(
    prompt: &str,
    response_path: Option<PathBuf>,
    model: Option<&str>,
    config_path: Option<PathBuf>,
    format: OutputFormat,
    display: ViewOptions,
    analyzed_at: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let mut config = match &config_path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    let pipeline = Pipeline::builder()
        .config(config)
        .build()
        .context("Failed to build pipeline")?;

    let response = read_response(response_path)?;

    let result = match analyzed_at {
        Some(timestamp) => pipeline.process_at(prompt, &response, model, timestamp),
        None => pipeline.process(prompt, &response, model),
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&*result)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print_text_result(&result, display);
        }
    }

    Ok(match result.risk_tier {
        RiskTier::Low => ExitCode::from(0),
        RiskTier::Medium => ExitCode::from(1),
        RiskTier::High => ExitCode::from(2),
    })
}

fn print_text_result(result: &PipelineResult, display: ViewOptions) {
    let scale = |score: f64| {
        if display.ten_point {
            format!("{:.1}/10", to_ten_point_scale(score))
        } else {
            format!("{:.1}/5", score)
        }
    };

    println!("{} RISK", result.risk_tier.to_string().to_uppercase());
    println!();
    println!("Prompt type: {}", result.prompt_subtype);
    println!("Bias category: {}", result.bias_category);
    if !result.model.is_unknown() {
        println!("Model: {}", result.model.as_str());
    }
    println!();

    println!("Scores (original -> mitigated):");
    for dimension in Dimension::ALL {
        println!(
            "  {:<15} {} -> {}",
            dimension.name(),
            scale(result.original_score.get(dimension)),
            scale(result.mitigated_score.get(dimension)),
        );
    }
    println!(
        "  {:<15} {} -> {}",
        "overall",
        scale(result.original_score.overall),
        scale(result.mitigated_score.overall),
    );
    println!(
        "  {:<15} {} -> {}",
        "bias score",
        scale(result.original_score.bias_score),
        scale(result.mitigated_score.bias_score),
    );
    println!();

    if result.similarity.degraded {
        println!("Stereotype similarity: unavailable");
    } else {
        println!(
            "Stereotype similarity: {:.2} ({})",
            result.similarity.max_similarity, result.similarity.severity_tier
        );
        for phrase in &result.similarity.matched_phrases {
            println!("  - \"{}\" {:.2} ({})", phrase.phrase, phrase.score, phrase.category);
        }
    }
    println!();

    print_mitigation(&result.mitigation);

    if !result.recommendations.is_empty() {
        println!("Recommendations:");
        for (i, recommendation) in result.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, recommendation);
        }
        println!();
    }

    if result.is_degraded() {
        println!("Degraded stages:");
        for degradation in &result.degradations {
            println!("  - {:?}: {}", degradation.stage, degradation.reason);
        }
        println!();
    }

    if display.explain {
        println!("--- Rubric Details ---");
        println!();
        for detail in &result.original_score.details {
            println!("{}: {} ({})", detail.dimension.name(), scale(detail.score), detail.level);
            println!("  {}", detail.dimension.question());
            for reason in &detail.reasoning {
                println!("  - {}", reason);
            }
        }
        if !result.original_score.explanations.is_empty() {
            println!();
            println!("Flagged patterns:");
            for explanation in &result.original_score.explanations {
                println!("  - {}", explanation);
            }
        }
        println!();

        println!("--- Strategy Selection ---");
        println!();
        println!("{}", result.selection.reasoning);
        for candidate in &result.selection.candidates {
            println!(
                "  {:<30} {:.2}{}",
                candidate.strategy.display_name(),
                candidate.combined,
                if candidate.model_bonus > 0.0 {
                    format!(" (+{:.1} model preference)", candidate.model_bonus)
                } else {
                    String::new()
                }
            );
        }
        if !result.improvement_adjustments.is_empty() {
            println!();
            println!("Raised by the improvement guarantee:");
            for adjustment in &result.improvement_adjustments {
                println!(
                    "  {}: {:.2} -> {:.2}",
                    adjustment.dimension, adjustment.before, adjustment.after
                );
            }
        }
    }
}

fn print_mitigation(mitigation: &MitigationRecord) {
    println!("Strategy: {}", mitigation.strategy);
    println!(
        "Estimated bias reduction: {:.0}% (confidence {:.0}%)",
        mitigation.bias_reduction_estimate * 100.0,
        mitigation.confidence * 100.0
    );
    println!();
    println!("Rewritten:");
    println!("{}", mitigation.rewritten_text.trim_end());
    println!();

    if let Some(sources) = &mitigation.grounding_sources {
        println!("Sources:");
        for source in sources {
            println!("  - {} ({})", source.source, source.url);
        }
        println!();
    }

    if !mitigation.explanations.is_empty() {
        println!("Notes:");
        for explanation in &mitigation.explanations {
            println!("  - {}", explanation);
        }
        println!();
    }

    if !mitigation.suggested_followup_prompts.is_empty() {
        println!("Follow-up prompts:");
        for prompt in &mitigation.suggested_followup_prompts {
            println!("  - {}", prompt);
        }
        println!();
    }
}

fn mitigate_command(
    response_path: Option<PathBuf>,
    strategy: Option<Strategy>,
    layered: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let text = read_response(response_path)?;
    let mitigator = Mitigator::new();

    if layered {
        let result = mitigator.mitigate_layered(&text);
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            OutputFormat::Text => {
                if result.steps.is_empty() {
                    println!("No applicable strategies.");
                    println!();
                }
                for step in &result.steps {
                    print_mitigation(step);
                }
                println!("Final:");
                println!("{}", result.rewritten_text.trim_end());
            }
        }
    } else {
        let result = mitigator.mitigate(&text, strategy);
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            OutputFormat::Text => print_mitigation(&result),
        }
    }

    Ok(ExitCode::from(0))
}

fn list_strategies() -> Result<ExitCode> {
    for info in Mitigator::new().available_strategies() {
        println!("{} ({})", info.name, info.strategy.id());
        println!("  {}", info.description);
        println!("  Applicable to: {}", info.applicable_to.join(", "));
        println!();
    }
    Ok(ExitCode::from(0))
}

fn validate_config(path: PathBuf) -> Result<ExitCode> {
    match load_config(&path) {
        Ok(config) => {
            println!("Configuration is valid: {:?}", path);
            println!();
            println!(
                "Similarity: {} (threshold {:.2})",
                if config.similarity.enabled { "enabled" } else { "disabled" },
                config.similarity.threshold
            );
            println!("Improvement margin: {:.2}", config.improvement.min_margin);
            println!(
                "Cache: {}",
                if config.cache.enabled {
                    format!("{} entries", config.cache.capacity)
                } else {
                    "disabled".to_string()
                }
            );
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

fn show_config(path: Option<PathBuf>) -> Result<ExitCode> {
    let mut config = match &path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    print!("{}", serde_yaml::to_string(&config)?);
    Ok(ExitCode::from(0))
}
