//! Blob assembly: runs after the worker pool has quiesced, so every
//! per-permutation binary it reads back is fully written.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use shaderbake_blob::text::{header_variable_name, ByteTextWriter};
use shaderbake_blob::{write_file_header, write_permutation};
use shaderbake_common::options::Options;
use shaderbake_common::paths::with_appended_ext;

use crate::planner::{BlobEntry, BlobMap};
use crate::report::Reporter;

// Reading back a blob larger than this is almost always a config mistake.
const HUGE_BINARY_SIZE: u64 = 64 << 20;

/// Assemble every planned blob. Returns `false` when a failure should abort
/// the run; under `--continue` problems are reported and skipped.
pub fn assemble_blobs(options: &Options, blobs: &BlobMap, reporter: &Reporter) -> bool {
    for (blob_name, entries) in blobs {
        // A blob with one define-less entry is just the individual file; its
        // output name is already the blob name and there is nothing to do.
        if entries.len() == 1 && entries[0].combined_defines.is_empty() {
            continue;
        }

        // A define-less permutation's output file has the same name as the
        // blob itself, which cannot work. Renaming on the fly would hide the
        // config problem, so reject it.
        if entries.iter().any(|e| e.combined_defines.is_empty()) {
            let base = Path::new(blob_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            reporter.error(&format!(
                "cannot create a blob for shader {base} where some permutation(s) have no definitions"
            ));

            if options.continue_on_error {
                continue;
            }
            return false;
        }

        if options.binary_blob
            && !create_blob(options, blob_name, entries, false, reporter)
            && !options.continue_on_error
        {
            return false;
        }

        if options.header_blob
            && !create_blob(options, blob_name, entries, true, reporter)
            && !options.continue_on_error
        {
            return false;
        }

        if !options.binary {
            remove_intermediate_files(options, entries);
        }
    }

    true
}

fn create_blob(
    options: &Options,
    blob_name: &str,
    entries: &[BlobEntry],
    text_output: bool,
    reporter: &Reporter,
) -> bool {
    let mut output_file = with_appended_ext(Path::new(blob_name), &options.output_ext);
    if text_output {
        output_file = with_appended_ext(&output_file, ".h");
    }

    let file = match File::create(&output_file) {
        Ok(file) => file,
        Err(err) => {
            reporter.error(&format!(
                "can't open output file '{}' for writing: {err}",
                output_file.display()
            ));
            return false;
        }
    };

    let result = if text_output {
        write_text_blob(file, options, blob_name, entries, reporter)
    } else {
        write_binary_blob(file, options, entries, reporter)
    };

    match result {
        Ok(()) => true,
        Err(err) => {
            reporter.error(&format!(
                "failed to write into output file '{}': {err}",
                output_file.display()
            ));
            false
        }
    }
}

fn write_text_blob(
    file: File,
    options: &Options,
    blob_name: &str,
    entries: &[BlobEntry],
    reporter: &Reporter,
) -> std::io::Result<()> {
    let mut writer = ByteTextWriter::new(BufWriter::new(file));
    let variable = header_variable_name(Path::new(blob_name), &options.output_ext);
    writer.write_preamble(&variable, "")?;
    write_entries(&mut writer, options, entries, reporter)?;
    writer.finish()?;
    writer.flush()
}

fn write_binary_blob(
    file: File,
    options: &Options,
    entries: &[BlobEntry],
    reporter: &Reporter,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    write_entries(&mut writer, options, entries, reporter)?;
    writer.flush()
}

fn write_entries(
    out: &mut dyn Write,
    options: &Options,
    entries: &[BlobEntry],
    reporter: &Reporter,
) -> std::io::Result<()> {
    write_file_header(out)?;

    for entry in entries {
        let file = with_appended_ext(&entry.permutation_path_no_ext, &options.output_ext);
        let data = read_binary_file(&file, reporter)?;
        write_permutation(out, &entry.combined_defines, &data)?;
    }

    Ok(())
}

fn read_binary_file(path: &Path, reporter: &Reporter) -> std::io::Result<Vec<u8>> {
    let data = fs::read(path).map_err(|err| {
        reporter.error(&format!("can't open file '{}': {err}", path.display()));
        err
    })?;

    if data.is_empty() {
        reporter.error(&format!("binary file '{}' is empty", path.display()));
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty binary file",
        ));
    }

    if data.len() as u64 > HUGE_BINARY_SIZE {
        reporter.warning(&format!("binary file '{}' is too large", path.display()));
    }

    Ok(data)
}

fn remove_intermediate_files(options: &Options, entries: &[BlobEntry]) {
    for entry in entries {
        let file = with_appended_ext(&entry.permutation_path_no_ext, &options.output_ext);
        let _ = fs::remove_file(file);
    }
}
