//! Pass/fail tools: one finding per non-zero exit.

use qagate_core::domain::Finding;

use super::ParseContext;

pub(super) fn parse(stdout: &str, stderr: &str, ctx: &ParseContext<'_>) -> Vec<Finding> {
    if ctx.exit_code == 0 {
        return Vec::new();
    }
    let token = format!("exit:{}", ctx.exit_code);
    let message = last_line(stderr)
        .or_else(|| last_line(stdout))
        .map(str::to_string)
        .unwrap_or_else(|| format!("exited with status {}", ctx.exit_code));
    let band = ctx.severity.classify(&token);
    vec![Finding::new(message, token, band)]
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|l| !l.is_empty())
}
