//! Per-task artifact emission: raw binaries and C header renderings.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use shaderbake_blob::text::{header_variable_name, ByteTextWriter};
use shaderbake_common::options::Options;
use shaderbake_common::paths::with_appended_ext;

use crate::planner::Task;

/// Whether this task must leave a raw binary on disk. Blob assembly reads
/// the per-permutation binaries back, so blob modes imply one; a header
/// blob only needs it for permutations that go into a blob (non-empty
/// defines).
pub fn needs_binary_artifact(options: &Options, task: &Task) -> bool {
    options.binary
        || options.binary_blob
        || (options.header_blob && !task.combined_defines.is_empty())
}

/// Whether this task emits its own `.h` file. Under a header blob, a
/// permutation with no defines is its own blob and is emitted directly.
pub fn needs_header_artifact(options: &Options, task: &Task) -> bool {
    options.header || (options.header_blob && task.combined_defines.is_empty())
}

/// Write the artifacts for a compiled task from in-memory bytes. Used by
/// the in-process driver; the subprocess drivers have the compiler write
/// files itself.
pub fn write_task_artifacts(options: &Options, task: &Task, data: &[u8]) -> io::Result<()> {
    let output_file = with_appended_ext(&task.output_path_no_ext, &options.output_ext);

    if needs_binary_artifact(options, task) {
        fs::write(&output_file, data)?;
    }

    if needs_header_artifact(options, task) {
        let header_file = with_appended_ext(&output_file, ".h");
        let variable = header_variable_name(&task.output_path_no_ext, &options.output_ext);
        write_header(&header_file, &variable, &task.combined_defines, data)?;
    }

    Ok(())
}

/// Render `data` as a byte-array header at `path`.
pub fn write_header(
    path: &Path,
    variable: &str,
    combined_defines: &str,
    data: &[u8],
) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = ByteTextWriter::new(BufWriter::new(file));
    writer.write_preamble(variable, combined_defines)?;
    writer.write_all(data)?;
    writer.finish()?;
    writer.flush()
}

/// Slang can only emit binaries; when a header was asked for, re-read the
/// binary output and render it, dropping the intermediate binary unless
/// binaries were requested too.
pub fn convert_binary_to_header(options: &Options, task: &Task) -> io::Result<()> {
    let output_file = with_appended_ext(&task.output_path_no_ext, &options.output_ext);
    let data = fs::read(&output_file)?;

    let header_file = with_appended_ext(&output_file, ".h");
    let variable = header_variable_name(&task.output_path_no_ext, &options.output_ext);
    write_header(&header_file, &variable, &task.combined_defines, &data)?;

    if !options.binary {
        fs::remove_file(&output_file)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use shaderbake_common::{ShaderModel, ShaderProfile};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn task_at(path: PathBuf, combined_defines: &str) -> Task {
        Task {
            source: PathBuf::from("s.hlsl"),
            entry_point: String::from("main"),
            profile: ShaderProfile::Pixel,
            shader_model: ShaderModel::default(),
            defines: Vec::new(),
            combined_defines: String::from(combined_defines),
            optimization_level: 3,
            output_path_no_ext: path,
        }
    }

    #[test]
    fn binary_artifacts_are_byte_exact() {
        let dir = TempDir::new().unwrap();
        let options = Options {
            output_ext: String::from(".dxil"),
            ..Options::default()
        };
        let task = task_at(dir.path().join("s"), "");

        let data = [0u8, 255, 127, 1];
        write_task_artifacts(&options, &task, &data).unwrap();

        assert_eq!(fs::read(dir.path().join("s.dxil")).unwrap(), data);
    }

    #[test]
    fn header_artifacts_declare_the_bytes() {
        let dir = TempDir::new().unwrap();
        let options = Options {
            binary: false,
            header: true,
            output_ext: String::from(".dxil"),
            ..Options::default()
        };
        let task = task_at(dir.path().join("s_01234567"), "A=1");

        write_task_artifacts(&options, &task, &[1, 2, 3]).unwrap();

        let text = fs::read_to_string(dir.path().join("s_01234567.dxil.h")).unwrap();
        assert!(text.starts_with("// {A=1}"));
        assert!(text.contains("const uint8_t g_s_01234567_dxil[] = {"));
        assert!(text.contains("1,2,3,"));
        assert!(text.trim_end().ends_with("};"));
    }

    #[test]
    fn header_blob_emits_plain_headers_for_defineless_permutations() {
        let options = Options {
            binary: false,
            header_blob: true,
            ..Options::default()
        };

        let plain = task_at(PathBuf::from("out/s"), "");
        assert!(needs_header_artifact(&options, &plain));
        assert!(!needs_binary_artifact(&options, &plain));

        let permuted = task_at(PathBuf::from("out/s_ab"), "A=1");
        assert!(!needs_header_artifact(&options, &permuted));
        assert!(needs_binary_artifact(&options, &permuted));
    }

    #[test]
    fn slang_header_conversion_removes_unwanted_binaries() {
        let dir = TempDir::new().unwrap();
        let options = Options {
            binary: false,
            header: true,
            output_ext: String::from(".spirv"),
            ..Options::default()
        };
        let task = task_at(dir.path().join("s"), "");

        fs::write(dir.path().join("s.spirv"), [9, 8, 7]).unwrap();
        convert_binary_to_header(&options, &task).unwrap();

        assert!(dir.path().join("s.spirv.h").exists());
        assert!(!dir.path().join("s.spirv").exists());
    }
}
