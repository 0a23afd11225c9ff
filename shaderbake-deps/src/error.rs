use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while walking a shader's `#include` graph.
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("can't open file '{}'{}", .path.display(), render_stack(.stack))]
    Unreadable {
        path: PathBuf,
        stack: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },
    #[error("can't find include file '{}'{}", .name.display(), render_stack(.stack))]
    IncludeNotFound { name: PathBuf, stack: Vec<PathBuf> },
}

fn render_stack(stack: &[PathBuf]) -> String {
    if stack.is_empty() {
        return String::new();
    }

    let mut out = String::from(", included in:");
    for path in stack {
        out.push_str("\n\t");
        out.push_str(&path.display().to_string());
    }
    out
}
