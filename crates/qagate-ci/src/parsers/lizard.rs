//! `lizard --csv` function metrics.
//!
//! Columns: nloc, ccn, tokens, params, length, location, file, function,
//! long name, start line, end line. A metric only produces a finding when a
//! configured threshold puts it above green.

use qagate_core::domain::{Band, Finding};

use super::{relative_path, ParseContext, ParseError};

/// Metric keys for the first five columns, as used under `[thresholds]`.
const METRICS: [&str; 5] = ["nloc", "ccn", "tokens", "params", "length"];
const FILE_COLUMN: usize = 6;
const FUNCTION_COLUMN: usize = 7;
const START_COLUMN: usize = 9;

pub(super) fn parse(stdout: &str, ctx: &ParseContext<'_>) -> Result<Vec<Finding>, ParseError> {
    let mut findings = Vec::new();
    for (index, line) in stdout.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = split_csv(line);
        let numeric = fields.first().is_some_and(|f| f.parse::<f64>().is_ok());
        if !numeric {
            // header row
            continue;
        }
        if fields.len() <= START_COLUMN {
            return Err(ParseError::Malformed(format!(
                "line {}: expected {} columns, found {}",
                index + 1,
                START_COLUMN + 1,
                fields.len()
            )));
        }

        let file = relative_path(ctx.root, &fields[FILE_COLUMN]);
        let function = &fields[FUNCTION_COLUMN];
        let start = fields[START_COLUMN].parse::<u32>().ok();
        for (column, metric) in METRICS.iter().enumerate() {
            let Some(threshold) = ctx.thresholds.get(*metric) else {
                continue;
            };
            let value: f64 = fields[column].parse().map_err(|_| {
                ParseError::Malformed(format!("line {}: {metric} is not a number", index + 1))
            })?;
            let band = threshold.classify(value);
            if band == Band::Green {
                continue;
            }
            let cutoff = match band {
                Band::Red => threshold.red,
                _ => threshold.yellow,
            }
            .unwrap_or_default();
            findings.push(
                Finding::new(
                    format!("{function}: {metric} {value} exceeds {cutoff}"),
                    format!("{metric}:{value}"),
                    band,
                )
                .with_location(file.clone(), start)
                .with_code(*metric),
            );
        }
    }
    Ok(findings)
}

/// Split one CSV record, honouring double-quoted fields.
fn split_csv(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
