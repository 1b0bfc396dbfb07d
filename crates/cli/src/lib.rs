//! Quest template lint
//!
//! Parses every reward formula of every template file in a directory and
//! reports the variables each formula references, or why it does not parse.
//! Variables are not resolved: that needs the progress-state types, which only
//! exist inside the game server.

use anyhow::Context;
use clap::Parser;
use qreward_config::{QuestTemplateConfig, RewardDeclaration};
use qreward_formula::parse;
use qreward_quests::BUILTIN_REWARDS;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "formula-lint")]
#[command(about = "Check the reward formulas of a quest template directory")]
pub struct Cli {
    /// Directory of `*.quest` template files
    pub dir: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Lint result of one reward declaration
#[derive(Debug, Serialize)]
pub struct FormulaReport {
    pub line: usize,
    pub reward_type: String,
    pub formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Lint result of one template file
#[derive(Debug, Serialize)]
pub struct TemplateReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub formulas: Vec<FormulaReport>,
}

/// Lint result of a directory
#[derive(Debug, Default, Serialize)]
pub struct LintReport {
    pub templates: Vec<TemplateReport>,
    pub errors: usize,
    pub warnings: usize,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Lint one reward declaration
pub fn lint_reward(reward: &RewardDeclaration) -> FormulaReport {
    let mut warnings = Vec::new();
    if !BUILTIN_REWARDS.contains(&reward.reward_type.get()) {
        warnings.push(format!("reward type {} is not built in", reward.reward_type));
    }

    let (variables, error) = match parse(&reward.formula) {
        Ok(expr) => {
            if expr.constant_value().is_some_and(|value| !value.is_finite()) {
                warnings.push("formula is a non-finite constant".to_string());
            }
            (Some(expr.variables().into_iter().map(str::to_string).collect()), None)
        }
        Err(err) => (None, Some(err.to_string())),
    };

    FormulaReport {
        line: reward.line,
        reward_type: reward.reward_type.to_string(),
        formula: reward.formula.clone(),
        variables,
        error,
        warnings,
    }
}

fn lint_template(path: PathBuf, config: qreward_config::Result<QuestTemplateConfig>) -> TemplateReport {
    match config {
        Ok(config) => TemplateReport {
            path,
            name: Some(config.name.to_string()),
            state: Some(config.state.to_string()),
            error: None,
            formulas: config.rewards.iter().map(lint_reward).collect(),
        },
        Err(err) => TemplateReport {
            path,
            name: None,
            state: None,
            error: Some(err.to_string()),
            formulas: Vec::new(),
        },
    }
}

/// Lint every template file in `dir`
pub fn lint_dir(dir: &Path) -> anyhow::Result<LintReport> {
    let files = qreward_config::load_dir(dir)
        .with_context(|| format!("failed to scan template directory {}", dir.display()))?;

    let mut report = LintReport::default();
    for (path, config) in files {
        let template = lint_template(path, config);

        report.errors += usize::from(template.error.is_some());
        for formula in &template.formulas {
            report.errors += usize::from(formula.error.is_some());
            report.warnings += formula.warnings.len();
        }
        report.templates.push(template);
    }

    tracing::debug!(
        "Linted {} templates: {} errors, {} warnings",
        report.templates.len(),
        report.errors,
        report.warnings
    );
    Ok(report)
}

/// Human-readable report
pub fn render_text(report: &LintReport) -> String {
    let mut out = String::new();

    for template in &report.templates {
        let _ = writeln!(out, "{}", template.path.display());
        if let Some(error) = &template.error {
            let _ = writeln!(out, "  error: {}", error);
            continue;
        }
        for formula in &template.formulas {
            let _ = write!(out, "  line {}: {} = {}", formula.line, formula.reward_type, formula.formula);
            match (&formula.variables, &formula.error) {
                (_, Some(error)) => {
                    let _ = writeln!(out, "\n    error: {}", error);
                }
                (Some(variables), None) if !variables.is_empty() => {
                    let _ = writeln!(out, "  [{}]", variables.join(", "));
                }
                _ => {
                    let _ = writeln!(out, "  [constant]");
                }
            }
            for warning in &formula.warnings {
                let _ = writeln!(out, "    warning: {}", warning);
            }
        }
    }

    let _ = writeln!(
        out,
        "{} templates, {} errors, {} warnings",
        report.templates.len(),
        report.errors,
        report.warnings
    );
    out
}

/// Run the lint and print the report; returns whether it is clean
pub fn run(cli: &Cli) -> anyhow::Result<bool> {
    let report = lint_dir(&cli.dir)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report).context("failed to encode report")?);
    } else {
        print!("{}", render_text(&report));
    }

    Ok(report.is_clean())
}
