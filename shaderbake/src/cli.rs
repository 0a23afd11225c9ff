//! Command-line surface and validation into the immutable [`Options`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use shaderbake_common::options::Options;
use shaderbake_common::{CompilerKind, Platform, ShaderModel, VulkanMemoryLayout};

#[derive(Parser, Debug)]
#[command(name = "shaderbake", version)]
#[command(about = "Multi-threaded shader compiling & processing tool")]
pub struct Args {
    /// Target platform: DXBC, DXIL or SPIRV.
    #[arg(short, long)]
    pub platform: String,

    /// Configuration file with the list of shaders to compile.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    pub out: PathBuf,

    /// Output binary files.
    #[arg(short, long)]
    pub binary: bool,

    /// Output header files.
    #[arg(long)]
    pub header: bool,

    /// Output binary blob files.
    #[arg(short = 'B', long = "binaryBlob")]
    pub binary_blob: bool,

    /// Output header blob files.
    #[arg(short = 'H', long = "headerBlob")]
    pub header_blob: bool,

    /// Path to a FXC/DXC/Slang compiler executable. Defaults to the
    /// conventional binary under $VULKAN_SDK when unset.
    #[arg(long)]
    pub compiler: Option<PathBuf>,

    /// Shader model for DXIL/SPIRV in 'X_Y' format (always 5_0 for DXBC).
    #[arg(short = 'm', long = "shaderModel", default_value = "6_5")]
    pub shader_model: String,

    /// Optimization level 0-3 (default = 3, disabled = 0).
    #[arg(short = 'O', long, default_value_t = 3)]
    pub optimization: u32,

    /// Custom command line options for the compiler, separated by spaces.
    #[arg(short = 'X', long = "compilerOptions")]
    pub compiler_options: Vec<String>,

    /// Maps to '-WX': treat warnings as errors.
    #[arg(long = "WX")]
    pub warnings_are_errors: bool,

    /// Maps to '-all_resources_bound'.
    #[arg(long = "allResourcesBound")]
    pub all_resources_bound: bool,

    /// Output PDB files in 'out/PDB/'.
    #[arg(long = "PDB")]
    pub pdb: bool,

    /// Embed PDB inside the shader binary.
    #[arg(long = "embedPDB")]
    pub embed_pdb: bool,

    /// Maps to '-Qstrip_reflect': strip reflection data from binaries.
    #[arg(long = "stripReflection")]
    pub strip_reflection: bool,

    /// Maps to '-Zpr': pack matrices in row-major order.
    #[arg(long = "matrixRowMajor")]
    pub matrix_row_major: bool,

    /// Maps to '-HV 2021': enable the HLSL 2021 standard.
    #[arg(long)]
    pub hlsl2021: bool,

    /// The compiler is Slang.
    #[arg(long)]
    pub slang: bool,

    /// Use HLSL compatibility mode when the compiler is Slang.
    #[arg(long = "slangHLSL")]
    pub slang_hlsl: bool,

    /// Include directory(s).
    #[arg(short = 'I', long = "include")]
    pub include_dirs: Vec<PathBuf>,

    /// Macro definition(s) in forms 'M=value' or 'M'.
    #[arg(short = 'D', long = "define")]
    pub defines: Vec<String>,

    /// Treat all source files as modified.
    #[arg(short, long)]
    pub force: bool,

    /// Source code directory.
    #[arg(long = "sourceDir", default_value = ".")]
    pub source_dir: PathBuf,

    /// Include file(s) whose modification never triggers recompilation.
    #[arg(long = "relaxedInclude")]
    pub relaxed_includes: Vec<String>,

    /// Extension for output files; defaults to .dxbc, .dxil or .spirv.
    #[arg(long = "outputExt")]
    pub output_ext: Option<String>,

    /// Disable multi-threading.
    #[arg(long)]
    pub serial: bool,

    /// Flatten the source directory structure in the output directory.
    #[arg(long)]
    pub flatten: bool,

    /// Continue compilation when an error occurs.
    #[arg(long = "continue")]
    pub continue_on_error: bool,

    /// Compile through the in-process compiler instead of spawning one.
    #[arg(long = "useAPI")]
    pub use_api: bool,

    /// Colorize console output.
    #[arg(long)]
    pub colorize: bool,

    /// Print commands before they are executed.
    #[arg(long)]
    pub verbose: bool,

    /// Retry count for compilation task sub-process failures.
    #[arg(long = "retryCount", default_value_t = 10)]
    pub retry_count: u32,

    /// Use the working directory instead of the config file's directory as
    /// the parent for relative paths.
    #[arg(long = "ignoreConfigDir")]
    pub ignore_config_dir: bool,

    /// Memory layout for Vulkan resources: dx, gl or scalar (SPIRV only).
    #[arg(long = "vulkanMemoryLayout")]
    pub vulkan_memory_layout: Option<String>,

    /// Vulkan environment version, maps to '-fspv-target-env'.
    #[arg(long = "vulkanVersion", default_value = "1.3")]
    pub vulkan_version: String,

    /// Additional SPIR-V extension(s) the compiler may use.
    #[arg(long = "spirvExt")]
    pub spirv_extensions: Vec<String>,

    /// SPIRV: register shift for texture (t#) resources.
    #[arg(long = "tRegShift", default_value_t = 0)]
    pub t_reg_shift: u32,

    /// SPIRV: register shift for sampler (s#) resources.
    #[arg(long = "sRegShift", default_value_t = 128)]
    pub s_reg_shift: u32,

    /// SPIRV: register shift for constant (b#) resources.
    #[arg(long = "bRegShift", default_value_t = 256)]
    pub b_reg_shift: u32,

    /// SPIRV: register shift for UAV (u#) resources.
    #[arg(long = "uRegShift", default_value_t = 384)]
    pub u_reg_shift: u32,

    /// Don't pass any register shifts to the compiler.
    #[arg(long = "noRegShifts")]
    pub no_reg_shifts: bool,
}

/// Validate the raw arguments into [`Options`], resolving relative
/// directories and compiler defaults.
pub fn build_options(args: Args) -> Result<Options> {
    let platform: Platform = args.platform.parse()?;

    if !(args.binary || args.header || args.binary_blob || args.header_blob) {
        bail!("one of 'binary', 'header', 'binaryBlob' or 'headerBlob' must be set");
    }

    let shader_model: ShaderModel = args.shader_model.parse()?;

    let vulkan_memory_layout = match &args.vulkan_memory_layout {
        Some(value) => {
            if platform != Platform::Spirv {
                bail!("--vulkanMemoryLayout is only supported for the SPIRV target");
            }
            let layout: VulkanMemoryLayout = value.parse()?;
            if args.slang && layout == VulkanMemoryLayout::Dx {
                bail!("only 'gl' and 'scalar' memory layouts are supported for Slang");
            }
            Some(layout)
        }
        None => None,
    };

    if args.slang && args.use_api {
        bail!("use of Slang with --useAPI is not implemented");
    }
    if args.use_api && platform != Platform::Spirv {
        bail!("--useAPI compiles through an in-process SPIR-V generator and requires '--platform SPIRV'");
    }
    #[cfg(not(feature = "api"))]
    if args.use_api {
        bail!("this build does not include the in-process compiler; rebuild with the 'api' feature");
    }

    let compiler_kind = if args.slang {
        CompilerKind::Slang
    } else if platform == Platform::Dxbc {
        CompilerKind::Fxc
    } else {
        CompilerKind::Dxc
    };

    let compiler = match args.compiler {
        Some(path) => path,
        None => default_compiler_path(compiler_kind)
            .context("compiler not specified and VULKAN_SDK is not set")?,
    };
    if !compiler.exists() {
        bail!("compiler '{}' does not exist", compiler.display());
    }

    let cwd = std::env::current_dir().context("cannot get the working directory")?;

    // Absolute config path makes compiler messages clickable.
    let config_file = cwd.join(&args.config);
    if !config_file.exists() {
        bail!("config file '{}' does not exist", config_file.display());
    }

    let parent = if args.ignore_config_dir {
        cwd.clone()
    } else {
        config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone())
    };

    let resolve = |path: &Path| -> PathBuf {
        if path.is_relative() {
            parent.join(path)
        } else {
            path.to_path_buf()
        }
    };

    let source_dir = resolve(&args.source_dir);
    let include_dirs = args.include_dirs.iter().map(|dir| resolve(dir)).collect();

    let output_ext = args
        .output_ext
        .unwrap_or_else(|| platform.extension().to_string());

    // User extensions add to the defaults rather than replacing them.
    let mut spirv_extensions = Options::default().spirv_extensions;
    spirv_extensions.extend(args.spirv_extensions);

    Ok(Options {
        platform,
        compiler_kind,
        compiler,
        config_file,
        source_dir,
        output_dir: args.out,
        output_ext,
        shader_model,
        vulkan_version: args.vulkan_version,
        vulkan_memory_layout,
        include_dirs,
        relaxed_includes: args.relaxed_includes,
        defines: args.defines,
        spirv_extensions,
        compiler_options: args.compiler_options,
        reg_shifts: shaderbake_common::RegisterShifts {
            t: args.t_reg_shift,
            s: args.s_reg_shift,
            b: args.b_reg_shift,
            u: args.u_reg_shift,
        },
        optimization_level: args.optimization.min(3),
        retry_count: args.retry_count,
        serial: args.serial,
        flatten: args.flatten,
        force: args.force,
        binary: args.binary,
        header: args.header,
        binary_blob: args.binary_blob,
        header_blob: args.header_blob,
        continue_on_error: args.continue_on_error,
        warnings_are_errors: args.warnings_are_errors,
        all_resources_bound: args.all_resources_bound,
        pdb: args.pdb,
        embed_pdb: args.embed_pdb,
        strip_reflection: args.strip_reflection,
        matrix_row_major: args.matrix_row_major,
        hlsl2021: args.hlsl2021,
        verbose: args.verbose,
        colorize: args.colorize,
        use_api: args.use_api,
        slang: args.slang,
        slang_hlsl: args.slang_hlsl,
        no_reg_shifts: args.no_reg_shifts,
    })
}

/// `VULKAN_SDK` ships dxc; use it when no compiler was given explicitly.
fn default_compiler_path(kind: CompilerKind) -> Option<PathBuf> {
    let sdk = std::env::var_os("VULKAN_SDK")?;
    let bin = if cfg!(windows) { "Bin" } else { "bin" };
    Some(PathBuf::from(sdk).join(bin).join(kind.executable_name()))
}
