//! Formatter listings: one path per line names a file that needs formatting.

use qagate_core::domain::Finding;

use super::{relative_path, ParseContext};

const PREFIXES: &[&str] = &["Would reformat: ", "would reformat ", "[warn] "];
const TOKEN: &str = "unformatted";

pub(super) fn parse(stdout: &str, ctx: &ParseContext<'_>) -> Vec<Finding> {
    let band = ctx.severity.classify(TOKEN);
    stdout
        .lines()
        .filter_map(|line| listed_path(line.trim()))
        .map(|path| {
            Finding::new("file is not formatted", TOKEN, band)
                .with_location(relative_path(ctx.root, path), None)
        })
        .collect()
}

/// Summary and diff lines are not paths.
fn listed_path(line: &str) -> Option<&str> {
    let path = PREFIXES
        .iter()
        .find_map(|p| line.strip_prefix(p))
        .unwrap_or(line)
        .trim();
    let looks_like_path = !path.is_empty()
        && !path.contains(char::is_whitespace)
        && !path.starts_with(['-', '+', '@'])
        && (path.contains('.') || path.contains('/'));
    looks_like_path.then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::ctx;
    use qagate_core::domain::{Band, SeverityMap};
    use std::collections::BTreeMap;

    #[test]
    fn lists_files_and_skips_summaries() {
        let sev = SeverityMap::from([("unformatted", Band::Red)]);
        let th = BTreeMap::new();
        let out = "Would reformat: svc/app.py\n\
                   /repo/src/main.rs\n\
                   [warn] web/src/app.tsx\n\
                   1 file would be reformatted, 2 files already formatted\n\
                   Code style issues found in the above file. Forgot to run Prettier?\n";
        let findings = parse(out, &ctx(&sev, &th, 1));
        let files: Vec<_> = findings.iter().filter_map(|f| f.file.as_deref()).collect();
        assert_eq!(files, vec!["svc/app.py", "src/main.rs", "web/src/app.tsx"]);
        assert!(findings.iter().all(|f| f.band == Band::Red));
    }

    #[test]
    fn clean_output_has_no_findings() {
        let sev = SeverityMap::new();
        let th = BTreeMap::new();
        assert!(parse("\n", &ctx(&sev, &th, 0)).is_empty());
    }
}
