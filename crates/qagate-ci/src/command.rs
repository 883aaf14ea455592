//! Command template rendering.
//!
//! Templates are argv vectors. The argument `{files}` expands to the matched
//! files, and `{root}` is substituted inside any argument.

use std::path::{Path, PathBuf};

use qagate_core::domain::{FILES_PLACEHOLDER, ROOT_PLACEHOLDER};

/// Launchers that run a package-local binary by name.
const LAUNCHERS: &[&str] = &["npx"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

/// Render a template.
///
/// * `program_override` replaces the executable; a leading launcher such as
///   `npx --no-install eslint` is replaced as a whole.
/// * `extra_args` land just before `{files}`, or at the end without one.
pub fn render(
    template: &[String],
    root: &Path,
    files: &[PathBuf],
    extra_args: &[String],
    program_override: Option<&Path>,
) -> Result<CommandLine, String> {
    let (program, rest) = match program_override {
        Some(path) => (
            resolve_override(root, path).to_string_lossy().into_owned(),
            strip_program(template),
        ),
        None => match template.split_first() {
            Some((program, rest)) => (program.clone(), rest),
            None => return Err("empty command template".to_string()),
        },
    };

    let root_str = root.to_string_lossy();
    let mut args = Vec::with_capacity(rest.len() + extra_args.len() + files.len());
    let mut extras_placed = false;
    for arg in rest {
        if arg == FILES_PLACEHOLDER {
            args.extend(extra_args.iter().cloned());
            extras_placed = true;
            args.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
        } else {
            args.push(arg.replace(ROOT_PLACEHOLDER, &root_str));
        }
    }
    if !extras_placed {
        args.extend(extra_args.iter().cloned());
    }

    Ok(CommandLine {
        program: program.replace(ROOT_PLACEHOLDER, &root_str),
        args,
    })
}

/// Relative override paths are taken from the workspace root, unless they are
/// a bare name to be looked up on `PATH`.
pub fn resolve_override(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.components().count() == 1 {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Template arguments after the executable, skipping a launcher prefix.
fn strip_program(template: &[String]) -> &[String] {
    let Some((first, rest)) = template.split_first() else {
        return template;
    };
    if !LAUNCHERS.contains(&first.as_str()) {
        return rest;
    }
    let flags = rest.iter().take_while(|a| a.starts_with('-')).count();
    // flags, then the package name
    rest.get(flags + 1..).unwrap_or(&[])
}
