//! In-process compiler driver.
//!
//! The subprocess driver's semantics, minus the subprocess: shaderc is
//! loaded into the process and handed the same entry point, defines,
//! include resolution, optimization level and Vulkan target per task. One
//! compiler instance is created per worker thread and reused for every task
//! that worker picks up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

use shaderc::{
    CompileOptions, Compiler, IncludeCallbackResult, IncludeType, OptimizationLevel,
    ResolvedInclude, ShaderKind, SourceLanguage, TargetEnv,
};

use shaderbake_common::options::Options;
use shaderbake_common::ShaderProfile;

use crate::output;
use crate::planner::Task;
use crate::pool::{CompileOutcome, Driver};
use crate::report::Reporter;

pub struct ApiDriver<'a> {
    options: &'a Options,
    compiler: Compiler,
}

impl<'a> ApiDriver<'a> {
    /// Construct the per-worker compiler. Failure is reported once across
    /// all workers and cancels the run.
    pub fn new(options: &'a Options, reporter: &Reporter) -> Option<Self> {
        static REPORT_INIT_FAILURE: Once = Once::new();

        match Compiler::new() {
            Some(compiler) => Some(ApiDriver { options, compiler }),
            None => {
                REPORT_INIT_FAILURE.call_once(|| {
                    reporter.error("cannot create an in-process compiler instance");
                });
                None
            }
        }
    }

    fn compile_options(&self, task: &Task) -> Option<CompileOptions<'_>> {
        let mut copts = CompileOptions::new()?;

        copts.set_source_language(SourceLanguage::HLSL);
        copts.set_target_env(
            TargetEnv::Vulkan,
            vulkan_api_version(&self.options.vulkan_version),
        );
        copts.set_optimization_level(if task.optimization_level == 0 {
            OptimizationLevel::Zero
        } else {
            OptimizationLevel::Performance
        });

        if self.options.warnings_are_errors {
            copts.set_warnings_as_errors();
        }
        if self.options.pdb || self.options.embed_pdb {
            copts.set_generate_debug_info();
        }

        for define in task.defines.iter().chain(&self.options.defines) {
            match define.split_once('=') {
                Some((name, value)) => copts.add_macro_definition(name, Some(value)),
                None => copts.add_macro_definition(define, None),
            }
        }

        let include_dirs = self.options.include_dirs.clone();
        copts.set_include_callback(
            move |name, include_type, requester, _depth| -> IncludeCallbackResult {
                resolve_include(name, include_type, requester, &include_dirs)
            },
        );

        Some(copts)
    }
}

impl Driver for ApiDriver<'_> {
    fn compile(&mut self, task: &Task) -> CompileOutcome {
        let source_file = self.options.source_dir.join(&task.source);
        let source = match fs::read_to_string(&source_file) {
            Ok(source) => source,
            Err(err) => {
                return CompileOutcome::Failed {
                    log: format!("can't open file '{}': {err}", source_file.display()),
                }
            }
        };

        let Some(copts) = self.compile_options(task) else {
            return CompileOutcome::Failed {
                log: String::from("cannot create in-process compile options"),
            };
        };

        let result = self.compiler.compile_into_spirv(
            &source,
            shader_kind(task.profile),
            &source_file.to_string_lossy(),
            &task.entry_point,
            Some(&copts),
        );

        match result {
            Ok(artifact) => {
                if let Err(err) =
                    output::write_task_artifacts(self.options, task, artifact.as_binary_u8())
                {
                    return CompileOutcome::Failed {
                        log: format!("can't write output for '{}': {err}", task.source.display()),
                    };
                }
                CompileOutcome::Success {
                    log: artifact.get_warning_messages(),
                }
            }
            Err(shaderc::Error::CompilationError(_, log)) => CompileOutcome::Failed { log },
            Err(err) => CompileOutcome::Failed {
                log: err.to_string(),
            },
        }
    }
}

/// Same resolution order as the timestamp scanner: the requesting file's
/// directory first, then the include directories in configuration order.
fn resolve_include(
    name: &str,
    _include_type: IncludeType,
    requester: &str,
    include_dirs: &[PathBuf],
) -> IncludeCallbackResult {
    let parent = Path::new(requester)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let candidates =
        std::iter::once(parent.join(name)).chain(include_dirs.iter().map(|dir| dir.join(name)));

    for candidate in candidates {
        if !candidate.exists() {
            continue;
        }
        return match fs::read_to_string(&candidate) {
            Ok(content) => Ok(ResolvedInclude {
                resolved_name: candidate.to_string_lossy().into_owned(),
                content,
            }),
            Err(err) => Err(format!("can't open file '{}': {err}", candidate.display())),
        };
    }

    Err(format!("can't find include file '{name}'"))
}

fn shader_kind(profile: ShaderProfile) -> ShaderKind {
    match profile {
        ShaderProfile::Vertex => ShaderKind::Vertex,
        ShaderProfile::Pixel => ShaderKind::Fragment,
        ShaderProfile::Compute => ShaderKind::Compute,
        ShaderProfile::Geometry => ShaderKind::Geometry,
        ShaderProfile::Hull => ShaderKind::TessControl,
        ShaderProfile::Domain => ShaderKind::TessEvaluation,
        ShaderProfile::Mesh => ShaderKind::Mesh,
        ShaderProfile::Amplification => ShaderKind::Task,
        ShaderProfile::Library => ShaderKind::InferFromSource,
    }
}

/// Encode `X.Y` the way Vulkan packs API versions; unparseable input falls
/// back to the 1.3 default.
fn vulkan_api_version(version: &str) -> u32 {
    let parsed = version
        .split_once('.')
        .and_then(|(major, minor)| Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?)));

    let (major, minor) = parsed.unwrap_or((1, 3));
    (major << 22) | (minor << 12)
}
