//! Subprocess compiler driver: synthesizes a DXC/FXC or Slang command line
//! per task, runs it, and captures combined stdout/stderr.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use shaderbake_blob::text::header_variable_name;
use shaderbake_common::options::Options;
use shaderbake_common::paths::with_appended_ext;
use shaderbake_common::{Platform, ShaderProfile, VulkanMemoryLayout, SPIRV_SPACES};

use crate::output;
use crate::planner::Task;
use crate::pool::{CompileOutcome, Driver};
use crate::report::Reporter;

// FXC prints this for every -Fh run; it drowns real diagnostics.
const FXC_NOISE: &str = "compilation object save succeeded";

pub struct ExeDriver<'a> {
    options: &'a Options,
    reporter: &'a Reporter,
}

impl<'a> ExeDriver<'a> {
    pub fn new(options: &'a Options, reporter: &'a Reporter) -> Self {
        ExeDriver { options, reporter }
    }
}

impl Driver for ExeDriver<'_> {
    fn compile(&mut self, task: &Task) -> CompileOutcome {
        compile(self.options, self.reporter, task)
    }
}

fn compile(options: &Options, reporter: &Reporter, task: &Task) -> CompileOutcome {
    let output_file = with_appended_ext(&task.output_path_no_ext, &options.output_ext);
    let args = build_args(options, task, &output_file);

    if options.verbose {
        reporter.note(&render_command(&options.compiler, &args));
    }

    let result = Command::new(&options.compiler)
        .args(&args)
        .stdin(Stdio::null())
        .output();

    let output = match result {
        Ok(output) => output,
        // The host couldn't launch the compiler at all; that's not the
        // shader's fault, so it qualifies for a retry.
        Err(err) => {
            return CompileOutcome::Transient {
                log: format!("failed to run '{}': {err}", options.compiler.display()),
            }
        }
    };

    let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
    log.push_str(&String::from_utf8_lossy(&output.stderr));
    let log = log
        .lines()
        .filter(|line| !line.contains(FXC_NOISE))
        .collect::<Vec<_>>()
        .join("\n");

    if !output.status.success() {
        // 127 is the shell's command-not-found status.
        if output.status.code() == Some(127) {
            return CompileOutcome::Transient { log };
        }
        return CompileOutcome::Failed { log };
    }

    // A zero exit without the promised artifact is still a failure. Slang
    // always writes its -o binary, even when only a header was asked for.
    let binary_expected = output::needs_binary_artifact(options, task) || options.slang;
    if binary_expected && !output_file.exists() {
        return CompileOutcome::Failed {
            log: format!(
                "compiler exited successfully but produced no output at '{}'",
                output_file.display()
            ),
        };
    }

    // Slang has no header output mode; render its binary into one.
    if options.slang && output::needs_header_artifact(options, task) {
        if let Err(err) = output::convert_binary_to_header(options, task) {
            return CompileOutcome::Failed {
                log: format!(
                    "failed to convert '{}' to a header: {err}",
                    output_file.display()
                ),
            };
        }
    }

    CompileOutcome::Success { log }
}

fn push(args: &mut Vec<OsString>, arg: &str) {
    args.push(OsString::from(arg));
}

/// Full argument vector for one task, excluding the compiler path itself.
pub(crate) fn build_args(options: &Options, task: &Task, output_file: &Path) -> Vec<OsString> {
    if options.slang {
        build_slang_args(options, task, output_file)
    } else {
        build_dxc_args(options, task, output_file)
    }
}

fn build_dxc_args(options: &Options, task: &Task, output_file: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(32);

    push(&mut args, "-nologo");

    // Output files
    if output::needs_binary_artifact(options, task) {
        push(&mut args, "-Fo");
        args.push(output_file.into());
    }
    if output::needs_header_artifact(options, task) {
        push(&mut args, "-Fh");
        args.push(with_appended_ext(output_file, ".h").into());
        push(&mut args, "-Vn");
        push(
            &mut args,
            &header_variable_name(&task.output_path_no_ext, &options.output_ext),
        );
    }

    // Profile; DXBC tops out at shader model 5.0.
    let model = if options.platform == Platform::Dxbc {
        String::from("5_0")
    } else {
        task.shader_model.to_string()
    };
    push(&mut args, "-T");
    push(&mut args, &format!("{}_{}", task.profile.as_str(), model));

    push(&mut args, "-E");
    push(&mut args, &task.entry_point);

    for define in task.defines.iter().chain(&options.defines) {
        push(&mut args, "-D");
        push(&mut args, define);
    }

    for dir in &options.include_dirs {
        push(&mut args, "-I");
        args.push(dir.into());
    }

    push(
        &mut args,
        ["-Od", "-O1", "-O2", "-O3"][task.optimization_level.min(3) as usize],
    );

    if options.platform != Platform::Dxbc && task.shader_model.supports_16bit_types() {
        push(&mut args, "-enable-16bit-types");
    }

    if options.warnings_are_errors {
        push(&mut args, "-WX");
    }
    if options.all_resources_bound {
        push(&mut args, "-all_resources_bound");
    }
    if options.matrix_row_major {
        push(&mut args, "-Zpr");
    }
    if options.hlsl2021 {
        push(&mut args, "-HV");
        push(&mut args, "2021");
    }

    if options.pdb || options.embed_pdb {
        // -Zsb: only the binary code affects the hash.
        push(&mut args, "-Zi");
        push(&mut args, "-Zsb");
    }
    if options.embed_pdb {
        push(&mut args, "-Qembed_debug");
    }

    if options.platform == Platform::Spirv {
        push(&mut args, "-spirv");
        push(
            &mut args,
            &format!("-fspv-target-env=vulkan{}", options.vulkan_version),
        );

        if let Some(layout) = options.vulkan_memory_layout {
            push(&mut args, &format!("-fvk-use-{}-layout", layout.as_str()));
        }

        for ext in &options.spirv_extensions {
            push(&mut args, &format!("-fspv-extension={ext}"));
        }

        if !options.no_reg_shifts {
            for space in 0..SPIRV_SPACES {
                for (class, shift) in options.reg_shifts.classes() {
                    push(&mut args, &format!("-fvk-{class}-shift"));
                    push(&mut args, &shift.to_string());
                    push(&mut args, &space.to_string());
                }
            }
        }
    } else {
        // Not supported by the SPIR-V generator.
        if options.strip_reflection {
            push(&mut args, "-Qstrip_reflect");
        }
        if options.pdb {
            let pdb_dir = output_file
                .parent()
                .unwrap_or(Path::new(""))
                .join(shaderbake_common::PDB_DIR);
            push(&mut args, "-Fd");
            args.push(OsString::from(format!("{}/", pdb_dir.display())));
        }
    }

    for opts in &options.compiler_options {
        for token in tokenize_compiler_options(opts) {
            args.push(OsString::from(token));
        }
    }

    args.push(options.source_dir.join(&task.source).into());
    args
}

fn build_slang_args(options: &Options, task: &Task, output_file: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(32);

    // HLSL compatibility mode: Slang defaults to its own language unless
    // told otherwise, and HLSL enums are unscoped.
    if options.slang_hlsl {
        push(&mut args, "-lang");
        push(&mut args, "hlsl");
        push(&mut args, "-unscoped-enum");
    }

    push(&mut args, "-profile");
    push(
        &mut args,
        &format!("{}_{}", task.profile.as_str(), task.shader_model),
    );

    push(&mut args, "-target");
    push(&mut args, options.platform.as_str());

    push(&mut args, "-o");
    args.push(output_file.into());

    // lib profiles take their entry points from the source.
    if task.profile != ShaderProfile::Library {
        push(&mut args, "-entry");
        push(&mut args, &task.entry_point);
    }

    for define in task.defines.iter().chain(&options.defines) {
        push(&mut args, "-D");
        push(&mut args, define);
    }

    for dir in &options.include_dirs {
        push(&mut args, "-I");
        args.push(dir.into());
    }

    push(&mut args, &format!("-O{}", task.optimization_level.min(3)));

    if options.warnings_are_errors {
        push(&mut args, "-warnings-as-errors");
    }

    if options.matrix_row_major {
        push(&mut args, "-matrix-layout-row-major");
    } else {
        push(&mut args, "-matrix-layout-column-major");
    }

    if options.platform == Platform::Spirv {
        // Keep the entry point's own name in the SPIR-V output.
        push(&mut args, "-fvk-use-entrypoint-name");

        match options.vulkan_memory_layout {
            Some(VulkanMemoryLayout::Scalar) => push(&mut args, "-force-glsl-scalar-layout"),
            Some(VulkanMemoryLayout::Gl) => push(&mut args, "-fvk-use-gl-layout"),
            _ => {}
        }

        if !options.no_reg_shifts {
            for space in 0..SPIRV_SPACES {
                for (class, shift) in options.reg_shifts.classes() {
                    push(&mut args, &format!("-fvk-{class}-shift"));
                    push(&mut args, &shift.to_string());
                    push(&mut args, &space.to_string());
                }
            }
        }
    }

    for opts in &options.compiler_options {
        for token in tokenize_compiler_options(opts) {
            args.push(OsString::from(token));
        }
    }

    args.push(options.source_dir.join(&task.source).into());
    args
}

/// Split a free-form `-X "..."` option string into arguments. Double quotes
/// group, backslash escapes the next character.
pub(crate) fn tokenize_compiler_options(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quotes = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
        } else if ch == ' ' && !quotes {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else if ch == '\\' {
            escape = true;
        } else if ch == '"' {
            quotes = !quotes;
        } else {
            current.push(ch);
        }
    }

    if !current.is_empty() {
        out.push(current);
    }

    out
}

fn render_command(compiler: &Path, args: &[OsString]) -> String {
    let mut cmd = compiler.display().to_string();
    for arg in args {
        let arg = arg.to_string_lossy();
        cmd.push(' ');
        if arg.contains(' ') {
            cmd.push('"');
            cmd.push_str(&arg);
            cmd.push('"');
        } else {
            cmd.push_str(&arg);
        }
    }
    cmd
}
