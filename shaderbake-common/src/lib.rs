pub mod options;
pub mod paths;

use std::convert::Infallible;
use std::str::FromStr;
use thiserror::Error;

/// Fast optimized hash map type for small sets.
pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Number of register spaces SPIR-V register shifts are emitted for.
pub const SPIRV_SPACES: u32 = 8;

/// Name of the debug-data subdirectory created next to compiled binaries.
pub const PDB_DIR: &str = "PDB";

#[derive(Error, Debug)]
pub enum ParseTargetError {
    #[error("unrecognized platform '{0}'")]
    UnknownPlatform(String),
    #[error("shader model '{0}' must have format 'X_Y'")]
    InvalidShaderModel(String),
    #[error("unknown shader profile '{0}'")]
    UnknownProfile(String),
    #[error("unsupported memory layout '{0}', expected 'dx', 'gl' or 'scalar'")]
    UnknownMemoryLayout(String),
}

/// Compilation target of a whole run.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Platform {
    Dxbc,
    Dxil,
    Spirv,
}

impl Platform {
    /// Uppercase name as spelled on the command line and in progress output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Dxbc => "DXBC",
            Platform::Dxil => "DXIL",
            Platform::Spirv => "SPIRV",
        }
    }

    /// Default extension for compiled binaries of this platform.
    pub fn extension(&self) -> &'static str {
        match self {
            Platform::Dxbc => ".dxbc",
            Platform::Dxil => ".dxil",
            Platform::Spirv => ".spirv",
        }
    }
}

impl FromStr for Platform {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DXBC" => Ok(Platform::Dxbc),
            "DXIL" => Ok(Platform::Dxil),
            "SPIRV" => Ok(Platform::Spirv),
            _ => Err(ParseTargetError::UnknownPlatform(s.to_string())),
        }
    }
}

/// The compiler family driving a run. Implied by the platform and the
/// `--slang` flag rather than selected directly.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompilerKind {
    Dxc,
    Fxc,
    Slang,
}

impl CompilerKind {
    /// Conventional executable name, used when probing `VULKAN_SDK`.
    pub fn executable_name(&self) -> &'static str {
        match self {
            CompilerKind::Dxc if cfg!(windows) => "dxc.exe",
            CompilerKind::Dxc => "dxc",
            CompilerKind::Fxc if cfg!(windows) => "fxc.exe",
            CompilerKind::Fxc => "fxc",
            CompilerKind::Slang if cfg!(windows) => "slangc.exe",
            CompilerKind::Slang => "slangc",
        }
    }
}

/// Pipeline stage a shader is compiled for, as spelled in `-T` profiles.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShaderProfile {
    Vertex,
    Pixel,
    Compute,
    Geometry,
    Hull,
    Domain,
    Library,
    Mesh,
    Amplification,
}

impl ShaderProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShaderProfile::Vertex => "vs",
            ShaderProfile::Pixel => "ps",
            ShaderProfile::Compute => "cs",
            ShaderProfile::Geometry => "gs",
            ShaderProfile::Hull => "hs",
            ShaderProfile::Domain => "ds",
            ShaderProfile::Library => "lib",
            ShaderProfile::Mesh => "ms",
            ShaderProfile::Amplification => "as",
        }
    }

    /// Profiles DXBC has no notion of; config lines using them are skipped
    /// silently when targeting DXBC.
    pub fn unsupported_by_dxbc(&self) -> bool {
        matches!(
            self,
            ShaderProfile::Library | ShaderProfile::Mesh | ShaderProfile::Amplification
        )
    }
}

impl FromStr for ShaderProfile {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vs" => Ok(ShaderProfile::Vertex),
            "ps" => Ok(ShaderProfile::Pixel),
            "cs" => Ok(ShaderProfile::Compute),
            "gs" => Ok(ShaderProfile::Geometry),
            "hs" => Ok(ShaderProfile::Hull),
            "ds" => Ok(ShaderProfile::Domain),
            "lib" => Ok(ShaderProfile::Library),
            "ms" => Ok(ShaderProfile::Mesh),
            "as" => Ok(ShaderProfile::Amplification),
            _ => Err(ParseTargetError::UnknownProfile(s.to_string())),
        }
    }
}

/// Shader model in `X_Y` notation, e.g. `6_5`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

impl ShaderModel {
    /// Two-digit index used for feature gates, e.g. `6_2` -> 62.
    pub fn index(&self) -> u32 {
        u32::from(self.major) * 10 + u32::from(self.minor)
    }

    /// SM 6.2 unlocks native 16-bit types on DXC.
    pub fn supports_16bit_types(&self) -> bool {
        self.index() >= 62
    }
}

impl Default for ShaderModel {
    fn default() -> Self {
        ShaderModel { major: 6, minor: 5 }
    }
}

impl FromStr for ShaderModel {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3
            || !bytes[0].is_ascii_digit()
            || bytes[1] != b'_'
            || !bytes[2].is_ascii_digit()
        {
            return Err(ParseTargetError::InvalidShaderModel(s.to_string()));
        }

        Ok(ShaderModel {
            major: bytes[0] - b'0',
            minor: bytes[2] - b'0',
        })
    }
}

impl std::fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.major, self.minor)
    }
}

/// Memory layout rule applied to Vulkan resources, SPIR-V targets only.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VulkanMemoryLayout {
    Dx,
    Gl,
    Scalar,
}

impl VulkanMemoryLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            VulkanMemoryLayout::Dx => "dx",
            VulkanMemoryLayout::Gl => "gl",
            VulkanMemoryLayout::Scalar => "scalar",
        }
    }
}

impl FromStr for VulkanMemoryLayout {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dx" => Ok(VulkanMemoryLayout::Dx),
            "gl" => Ok(VulkanMemoryLayout::Gl),
            "scalar" => Ok(VulkanMemoryLayout::Scalar),
            _ => Err(ParseTargetError::UnknownMemoryLayout(s.to_string())),
        }
    }
}

/// SPIR-V descriptor binding shifts per register class.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterShifts {
    pub t: u32,
    pub s: u32,
    pub b: u32,
    pub u: u32,
}

impl RegisterShifts {
    /// Shifts paired with the register class letter, in `t, s, b, u` order.
    pub fn classes(&self) -> [(char, u32); 4] {
        [('t', self.t), ('s', self.s), ('b', self.b), ('u', self.u)]
    }
}

impl Default for RegisterShifts {
    fn default() -> Self {
        RegisterShifts {
            t: 0,
            s: 128,
            b: 256,
            u: 384,
        }
    }
}

impl From<Infallible> for ParseTargetError {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}
