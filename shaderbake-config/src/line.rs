use std::path::PathBuf;

use shaderbake_common::{ShaderModel, ShaderProfile};

use crate::error::ConfigError;

/// One fully-expanded shader declaration from the config file.
///
/// The grammar matches the command line:
/// `path/to/shader -T profile [-E entry -O{0|1|2|3} -o "subdir" -s "suffix"
/// -m 6_5 -D DEF1 -D DEF2=1 ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLine {
    pub source: PathBuf,
    pub profile: ShaderProfile,
    pub entry_point: String,
    pub defines: Vec<String>,
    pub output_dir: Option<String>,
    pub output_suffix: Option<String>,
    pub shader_model: ShaderModel,
    /// `None` inherits the global optimization level.
    pub optimization_level: Option<u32>,
}

impl ConfigLine {
    pub fn parse(
        tokens: &[String],
        line_no: u32,
        global_model: ShaderModel,
    ) -> Result<Self, ConfigError> {
        let mut iter = tokens.iter();
        let source = iter
            .next()
            .ok_or(ConfigError::EmptyLine { line: line_no })?;

        let mut profile = None;
        let mut entry_point = None;
        let mut defines = Vec::new();
        let mut output_dir = None;
        let mut output_suffix = None;
        let mut shader_model = None;
        let mut optimization_level = None;

        while let Some(token) = iter.next() {
            let flag: &'static str = match token.as_str() {
                "-T" => "-T",
                "-E" => "-E",
                "-D" => "-D",
                "-o" => "-o",
                "-O" => "-O",
                "-s" => "-s",
                "-m" => "-m",
                _ => {
                    return Err(ConfigError::UnrecognizedToken {
                        line: line_no,
                        token: token.clone(),
                    })
                }
            };

            let value = iter
                .next()
                .ok_or(ConfigError::MissingValue { line: line_no, flag })?;

            match flag {
                "-T" => {
                    profile = Some(value.parse::<ShaderProfile>().map_err(|source| {
                        ConfigError::InvalidTarget {
                            line: line_no,
                            source,
                        }
                    })?)
                }
                "-E" => entry_point = Some(value.clone()),
                "-D" => defines.push(value.clone()),
                "-o" => output_dir = Some(value.clone()),
                "-s" => output_suffix = Some(value.clone()),
                "-m" => {
                    shader_model = Some(value.parse::<ShaderModel>().map_err(|source| {
                        ConfigError::InvalidTarget {
                            line: line_no,
                            source,
                        }
                    })?)
                }
                "-O" => {
                    let level: u32 = value.parse().map_err(|_| {
                        ConfigError::InvalidOptimizationLevel {
                            line: line_no,
                            value: value.clone(),
                        }
                    })?;
                    optimization_level = Some(level);
                }
                _ => unreachable!(),
            }
        }

        let profile = profile.ok_or(ConfigError::MissingProfile { line: line_no })?;

        Ok(ConfigLine {
            source: PathBuf::from(source),
            profile,
            entry_point: entry_point.unwrap_or_else(|| String::from("main")),
            defines,
            output_dir,
            output_suffix,
            shader_model: shader_model.unwrap_or(global_model),
            optimization_level,
        })
    }
}
