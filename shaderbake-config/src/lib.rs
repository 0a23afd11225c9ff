//! Parser for the shaderbake configuration format.
//!
//! A config file is UTF-8 text where every non-blank, non-`//` line declares
//! one shader build, subject to a small preprocessor (`#ifdef`, `#if 1`,
//! `#if 0`, `#else`, `#endif`) and brace-set permutation expansion
//! (`-D A={0,1}` becomes one declaration per choice).

mod error;
pub mod expand;
pub mod lex;
mod line;

use std::fs;
use std::path::Path;

pub use error::ConfigError;
pub use line::ConfigLine;

use expand::{ConditionStack, LineKind};
use shaderbake_common::ShaderModel;

/// Globals a config file is parsed against.
#[derive(Debug, Clone, Default)]
pub struct ConfigGlobals {
    /// Defines visible to `#ifdef`, exactly as passed on the command line.
    pub defines: Vec<String>,
    /// Shader model inherited by lines without `-m`.
    pub shader_model: ShaderModel,
}

/// Parse config text into expanded shader declarations, in file order.
pub fn parse_config_str(
    source: &str,
    globals: &ConfigGlobals,
) -> Result<Vec<ConfigLine>, ConfigError> {
    let mut conditions = ConditionStack::new();
    let mut lines = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line_no = index as u32 + 1;
        let line = lex::trim_line(raw);
        if lex::is_skippable(&line) {
            continue;
        }

        if conditions.apply(&line, line_no, &globals.defines)? == LineKind::Directive {
            continue;
        }

        if !conditions.active() {
            continue;
        }

        for expanded in expand::expand_braces(&line, line_no)? {
            let tokens = lex::tokenize(&expanded);
            lines.push(ConfigLine::parse(&tokens, line_no, globals.shader_model)?);
        }
    }

    Ok(lines)
}

/// Read and parse the config file at `path`.
pub fn parse_config_file(
    path: impl AsRef<Path>,
    globals: &ConfigGlobals,
) -> Result<Vec<ConfigLine>, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)
        .map_err(|e| ConfigError::IOError(path.to_path_buf(), e))?;
    parse_config_str(&source, globals)
}
