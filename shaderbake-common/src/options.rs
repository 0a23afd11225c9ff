use std::path::PathBuf;

use crate::{CompilerKind, Platform, RegisterShifts, ShaderModel, VulkanMemoryLayout};

/// Process-wide configuration, immutable once command-line validation is
/// done. Relative directories have already been resolved against the config
/// file's parent (or the working directory under `--ignoreConfigDir`).
#[derive(Debug, Clone)]
pub struct Options {
    pub platform: Platform,
    pub compiler_kind: CompilerKind,
    pub compiler: PathBuf,
    pub config_file: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_ext: String,

    pub shader_model: ShaderModel,
    pub vulkan_version: String,
    pub vulkan_memory_layout: Option<VulkanMemoryLayout>,

    pub include_dirs: Vec<PathBuf>,
    pub relaxed_includes: Vec<String>,
    pub defines: Vec<String>,
    pub spirv_extensions: Vec<String>,
    pub compiler_options: Vec<String>,

    pub reg_shifts: RegisterShifts,
    pub optimization_level: u32,
    pub retry_count: u32,

    pub serial: bool,
    pub flatten: bool,
    pub force: bool,
    pub binary: bool,
    pub header: bool,
    pub binary_blob: bool,
    pub header_blob: bool,
    pub continue_on_error: bool,
    pub warnings_are_errors: bool,
    pub all_resources_bound: bool,
    pub pdb: bool,
    pub embed_pdb: bool,
    pub strip_reflection: bool,
    pub matrix_row_major: bool,
    pub hlsl2021: bool,
    pub verbose: bool,
    pub colorize: bool,
    pub use_api: bool,
    pub slang: bool,
    pub slang_hlsl: bool,
    pub no_reg_shifts: bool,
}

impl Options {
    pub fn is_blob(&self) -> bool {
        self.binary_blob || self.header_blob
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            platform: Platform::Dxil,
            compiler_kind: CompilerKind::Dxc,
            compiler: PathBuf::new(),
            config_file: PathBuf::new(),
            source_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            output_ext: Platform::Dxil.extension().to_string(),
            shader_model: ShaderModel::default(),
            vulkan_version: String::from("1.3"),
            vulkan_memory_layout: None,
            include_dirs: Vec::new(),
            relaxed_includes: Vec::new(),
            defines: Vec::new(),
            spirv_extensions: vec![
                String::from("SPV_EXT_descriptor_indexing"),
                String::from("KHR"),
            ],
            compiler_options: Vec::new(),
            reg_shifts: RegisterShifts::default(),
            optimization_level: 3,
            retry_count: 10,
            serial: false,
            flatten: false,
            force: false,
            binary: true,
            header: false,
            binary_blob: false,
            header_blob: false,
            continue_on_error: false,
            warnings_are_errors: false,
            all_resources_bound: false,
            pdb: false,
            embed_pdb: false,
            strip_reflection: false,
            matrix_row_major: false,
            hlsl2021: false,
            verbose: false,
            colorize: false,
            use_api: false,
            slang: false,
            slang_hlsl: false,
            no_reg_shifts: false,
        }
    }
}
