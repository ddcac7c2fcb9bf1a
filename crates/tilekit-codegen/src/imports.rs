use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?m)^\s*import\s+([^'"\n]+?)\s+from\s+['"]([^'"]+)['"]"#)
            .expect("import pattern is valid")
    })
}

/// Extract the relative-module imports of a component source file,
/// resolved against the file's directory.
///
/// Bare package specifiers (`react`, `some-package`) resolve through the
/// import map at run time and are ignored here, as are `import type`
/// clauses, which vanish at build time. Used to cross-check that a
/// manifest's asset list covers everything a module pulls in locally.
pub fn extract_relative_imports(source: &str, base_dir: &Path) -> Vec<PathBuf> {
    import_pattern()
        .captures_iter(source)
        .filter(|caps| !caps[1].trim_start().starts_with("type "))
        .filter_map(|caps| {
            let specifier = caps.get(2)?.as_str();
            if specifier.starts_with("./") || specifier.starts_with("../") {
                Some(normalize_path(&base_dir.join(specifier)))
            } else {
                None
            }
        })
        .collect()
}

/// Resolve `.` and `..` segments lexically; no filesystem access.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
