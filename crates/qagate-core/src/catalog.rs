//! Builtin tool descriptors and scope definitions.

use crate::domain::{Band, Dimension, ParserKind, ScopeDef, SeverityMap, ToolDescriptor};

const JS_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue"];
const PY_EXTENSIONS: &[&str] = &["py", "pyi"];

fn npx(tool: &str, args: &[&str]) -> Vec<String> {
    let mut cmd = vec!["npx".to_string(), "--no-install".to_string(), tool.to_string()];
    cmd.extend(args.iter().map(|a| a.to_string()));
    cmd
}

fn as_strs(cmd: &[String]) -> Vec<&str> {
    cmd.iter().map(String::as_str).collect()
}

fn npx_tool(id: &str, tool: &str, args: &[&str], parser: ParserKind) -> ToolDescriptor {
    let command = npx(tool, args);
    let availability = npx(tool, &["--version"]);
    ToolDescriptor::new(id, &as_strs(&command), parser).with_availability(&as_strs(&availability))
}

fn diagnostic_severity() -> SeverityMap {
    SeverityMap::from([
        ("error", Band::Red),
        ("warning", Band::Yellow),
        ("note", Band::Green),
        ("help", Band::Green),
        ("info", Band::Green),
        ("style", Band::Green),
    ])
}

fn unformatted() -> SeverityMap {
    SeverityMap::from([("unformatted", Band::Red)])
}

fn frontend_tools() -> Vec<ToolDescriptor> {
    vec![
        npx_tool(
            "prettier",
            "prettier",
            &["--list-different", "{files}"],
            ParserKind::FileList,
        )
        .with_fix_command(&["npx", "--no-install", "prettier", "--write", "{files}"])
        .with_dimensions(&[Dimension::Format])
        .with_extensions(&["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "css", "scss"])
        .with_scopes(&["frontend"])
        .with_severity(unformatted())
        .fast(),
        npx_tool(
            "eslint",
            "eslint",
            &["--format", "json", "{files}"],
            ParserKind::EslintJson,
        )
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(JS_EXTENSIONS)
        .with_scopes(&["frontend"])
        .with_severity(SeverityMap::from([("1", Band::Yellow), ("2", Band::Red)]))
        .fast(),
        npx_tool(
            "tsc",
            "tsc",
            &["--noEmit", "--pretty", "false"],
            ParserKind::LineDiagnostic,
        )
        .with_dimensions(&[Dimension::Build])
        .with_extensions(&["ts", "tsx"])
        .with_scopes(&["frontend"])
        .with_severity(diagnostic_severity()),
        npx_tool("vitest", "vitest", &["run"], ParserKind::ExitCode)
            .with_dimensions(&[Dimension::Test])
            .with_extensions(JS_EXTENSIONS)
            .with_scopes(&["frontend"])
            .fast(),
        ToolDescriptor::new(
            "npm-audit",
            &["npm", "audit", "--audit-level=high"],
            ParserKind::ExitCode,
        )
        .with_availability(&["npm", "--version"])
        .with_dimensions(&[Dimension::Security])
        .with_extensions(JS_EXTENSIONS)
        .with_scopes(&["frontend"]),
    ]
}

fn python_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "ruff",
            &["ruff", "check", "--output-format", "json", "--no-fix", "{files}"],
            ParserKind::RuffJson,
        )
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(PY_EXTENSIONS)
        .with_scopes(&["backend"])
        .with_severity(SeverityMap::from([
            ("e", Band::Red),
            ("f", Band::Red),
            ("w", Band::Yellow),
            ("c", Band::Yellow),
            ("i", Band::Yellow),
            ("n", Band::Yellow),
            ("d", Band::Green),
        ]))
        .fast(),
        ToolDescriptor::new(
            "ruff-format",
            &["ruff", "format", "--check", "{files}"],
            ParserKind::FileList,
        )
        .with_availability(&["ruff", "--version"])
        .with_fix_command(&["ruff", "format", "{files}"])
        .with_dimensions(&[Dimension::Format])
        .with_extensions(PY_EXTENSIONS)
        .with_scopes(&["backend"])
        .with_severity(unformatted())
        .fast(),
        ToolDescriptor::new(
            "mypy",
            &[
                "mypy",
                "--no-color-output",
                "--no-error-summary",
                "--show-column-numbers",
                "{files}",
            ],
            ParserKind::LineDiagnostic,
        )
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(PY_EXTENSIONS)
        .with_scopes(&["backend"])
        .with_severity(diagnostic_severity()),
        ToolDescriptor::new("pytest", &["pytest", "-q"], ParserKind::ExitCode)
            .with_dimensions(&[Dimension::Test])
            .with_extensions(PY_EXTENSIONS)
            .with_scopes(&["backend"])
            // exit 5: no tests collected
            .with_severity(SeverityMap::from([("exit:5", Band::Yellow)])),
        ToolDescriptor::new(
            "bandit",
            &["bandit", "-f", "json", "-q", "{files}"],
            ParserKind::BanditJson,
        )
        .with_dimensions(&[Dimension::Security])
        .with_extensions(PY_EXTENSIONS)
        .with_scopes(&["backend"])
        .with_severity(SeverityMap::from([
            ("low", Band::Yellow),
            ("medium", Band::Red),
            ("high", Band::Red),
        ])),
    ]
}

fn rust_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "cargo-fmt",
            &["cargo", "fmt", "--all", "--", "--check", "-l"],
            ParserKind::FileList,
        )
        .with_availability(&["cargo", "fmt", "--version"])
        .with_fix_command(&["cargo", "fmt", "--all"])
        .with_dimensions(&[Dimension::Format])
        .with_extensions(&["rs"])
        .with_scopes(&["backend"])
        .with_severity(unformatted())
        .fast(),
        ToolDescriptor::new(
            "cargo-clippy",
            &[
                "cargo",
                "clippy",
                "--workspace",
                "--all-targets",
                "--message-format",
                "json",
            ],
            ParserKind::CargoJson,
        )
        .with_availability(&["cargo", "clippy", "--version"])
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(&["rs"])
        .with_scopes(&["backend"])
        .with_severity(diagnostic_severity()),
        ToolDescriptor::new(
            "cargo-build",
            &[
                "cargo",
                "build",
                "--workspace",
                "--all-targets",
                "--message-format",
                "json",
            ],
            ParserKind::CargoJson,
        )
        .with_dimensions(&[Dimension::Build])
        .with_extensions(&["rs"])
        .with_scopes(&["backend"])
        .with_severity(diagnostic_severity()),
        ToolDescriptor::new("cargo-test", &["cargo", "test", "--workspace"], ParserKind::ExitCode)
            .with_dimensions(&[Dimension::Test])
            .with_extensions(&["rs"])
            .with_scopes(&["backend"]),
        ToolDescriptor::new("cargo-audit", &["cargo", "audit"], ParserKind::ExitCode)
            .with_availability(&["cargo", "audit", "--version"])
            .with_dimensions(&[Dimension::Security])
            .with_extensions(&["rs"])
            .with_scopes(&["backend"]),
    ]
}

fn tooling_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "shellcheck",
            &["shellcheck", "--format", "gcc", "{files}"],
            ParserKind::LineDiagnostic,
        )
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(&["sh", "bash"])
        .with_scopes(&["tooling"])
        .with_severity(diagnostic_severity())
        .fast(),
        ToolDescriptor::new("shfmt", &["shfmt", "-l", "{files}"], ParserKind::FileList)
            .with_fix_command(&["shfmt", "-w", "{files}"])
            .with_dimensions(&[Dimension::Format])
            .with_extensions(&["sh", "bash"])
            .with_scopes(&["tooling"])
            .with_severity(unformatted())
            .fast(),
    ]
}

fn data_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "buf-lint",
            &["buf", "lint", "--error-format", "text"],
            ParserKind::LineDiagnostic,
        )
        .with_dimensions(&[Dimension::Lint])
        .with_extensions(&["proto"])
        .with_scopes(&["data"])
        .fast(),
        ToolDescriptor::new(
            "buf-breaking",
            &[
                "buf",
                "breaking",
                "--error-format",
                "text",
                "--against",
                ".git#branch=main",
            ],
            ParserKind::LineDiagnostic,
        )
        .with_availability(&["buf", "--version"])
        .with_dimensions(&[Dimension::DataCompatibility])
        .with_extensions(&["proto"])
        .with_scopes(&["data"]),
    ]
}

fn metrics_tools() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::new("lizard", &["lizard", "--csv", "{files}"], ParserKind::LizardCsv)
        .with_dimensions(&[Dimension::DesignMetrics])
        .with_extensions(&["js", "jsx", "ts", "tsx", "vue", "py", "rs"])
        .with_scopes(&["frontend", "backend"])]
}

/// Every builtin tool, sorted by id.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    let mut tools: Vec<ToolDescriptor> = frontend_tools()
        .into_iter()
        .chain(python_tools())
        .chain(rust_tools())
        .chain(tooling_tools())
        .chain(data_tools())
        .chain(metrics_tools())
        .collect();
    tools.sort_by(|a, b| a.id.cmp(&b.id));
    tools
}

/// Scope definitions used when the config declares none.
pub fn default_scopes() -> Vec<ScopeDef> {
    vec![
        ScopeDef::new("backend")
            .with_extensions(&["py", "pyi", "rs"])
            .with_markers(&[
                "Cargo.toml",
                "pyproject.toml",
                "setup.py",
                "setup.cfg",
                "requirements.txt",
            ])
            .with_branch_prefixes(&["be/", "backend/"]),
        ScopeDef::new("data")
            .with_extensions(&["proto"])
            .with_markers(&["buf.yaml", "buf.work.yaml"])
            .with_branch_prefixes(&["data/", "schema/"]),
        ScopeDef::new("frontend")
            .with_extensions(&["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "css", "scss"])
            .with_markers(&["package.json", "tsconfig.json"])
            .with_branch_prefixes(&["fe/", "frontend/"]),
        ScopeDef::new("tooling")
            .with_extensions(&["sh", "bash"])
            .with_branch_prefixes(&["tooling/", "ci/"]),
    ]
}
