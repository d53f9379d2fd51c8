//! Built-in skill handlers.
//!
//! These are the handlers manifests under `skills/` refer to.  Each one is
//! registered in the catalog with its own documentation, so manifest entries
//! may omit a description.

use agentskills_core::{BoxError, HandlerCatalog, SkillArgs, skill_fn};
use serde_json::{Value, json};

/// Errors raised by the built-in handlers.
#[derive(Debug, thiserror::Error)]
pub enum BuiltinError {
    #[error("cannot compute the {0} of an empty list")]
    Empty(&'static str),

    #[error("the sample standard deviation needs at least two values")]
    SingleSample,

    #[error("x and y must have the same length ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },

    #[error("linear regression needs at least two points")]
    TooFewPoints,

    #[error("all x values are equal; the slope is undefined")]
    ConstantX,
}

type HandlerResult = std::result::Result<Value, BoxError>;

/// Catalog of every built-in handler.
pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .with_documented("sum", "Sum of a list of numbers.", skill_fn(sum))
        .with_documented("mean", "Arithmetic mean of a list of numbers.", skill_fn(mean))
        .with_documented("median", "Median of a list of numbers.", skill_fn(median))
        .with_documented(
            "std_dev",
            "Standard deviation of a list of numbers (sample by default, population when `sample` is false).",
            skill_fn(std_dev),
        )
        .with_documented(
            "linear_regression",
            "Least-squares fit y = slope * x + intercept, with the coefficient of determination.",
            skill_fn(linear_regression),
        )
        .with_documented("word_count", "Number of whitespace-separated words in a text.", skill_fn(word_count))
        .with_documented(
            "truncate_words",
            "Keep the first `limit` words of a text.",
            skill_fn(truncate_words),
        )
}

fn numbers(args: &SkillArgs) -> std::result::Result<Vec<f64>, BoxError> {
    Ok(args.required(0, "numbers")?)
}

fn sum(args: &SkillArgs) -> HandlerResult {
    Ok(json!(numbers(args)?.iter().sum::<f64>()))
}

fn mean(args: &SkillArgs) -> HandlerResult {
    let values = numbers(args)?;
    if values.is_empty() {
        return Err(BuiltinError::Empty("mean").into());
    }
    Ok(json!(values.iter().sum::<f64>() / values.len() as f64))
}

fn median(args: &SkillArgs) -> HandlerResult {
    let mut values = numbers(args)?;
    if values.is_empty() {
        return Err(BuiltinError::Empty("median").into());
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let mid = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    };
    Ok(json!(mid))
}

fn std_dev(args: &SkillArgs) -> HandlerResult {
    let values = numbers(args)?;
    let sample: bool = args.optional(1, "sample", true)?;
    if values.is_empty() {
        return Err(BuiltinError::Empty("standard deviation").into());
    }
    if sample && values.len() == 1 {
        return Err(BuiltinError::SingleSample.into());
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    let divisor = if sample { n - 1.0 } else { n };
    Ok(json!((squares / divisor).sqrt()))
}

fn linear_regression(args: &SkillArgs) -> HandlerResult {
    let x: Vec<f64> = args.required(0, "x")?;
    let y: Vec<f64> = args.required(1, "y")?;
    if x.len() != y.len() {
        return Err(BuiltinError::LengthMismatch { x: x.len(), y: y.len() }.into());
    }
    if x.len() < 2 {
        return Err(BuiltinError::TooFewPoints.into());
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let numerator: f64 = x.iter().zip(&y).map(|(xi, yi)| (xi - mean_x) * (yi - mean_y)).sum();
    let denominator: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    if denominator == 0.0 {
        return Err(BuiltinError::ConstantX.into());
    }

    let slope = numerator / denominator;
    let intercept = mean_y - slope * mean_x;

    let ss_res: f64 = x
        .iter()
        .zip(&y)
        .map(|(xi, yi)| (yi - (slope * xi + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };

    Ok(json!({
        "slope": slope,
        "intercept": intercept,
        "r_squared": r_squared,
    }))
}

fn word_count(args: &SkillArgs) -> HandlerResult {
    let text: String = args.required(0, "text")?;
    Ok(json!(text.split_whitespace().count()))
}

fn truncate_words(args: &SkillArgs) -> HandlerResult {
    let text: String = args.required(0, "text")?;
    let limit: usize = args.optional(1, "limit", 50)?;
    let words: Vec<&str> = text.split_whitespace().take(limit).collect();
    Ok(json!(words.join(" ")))
}
