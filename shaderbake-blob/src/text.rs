//! Text-mode shader artifact emission.
//!
//! Header artifacts declare the compiled bytes as a C array:
//!
//! ```text
//! // {A=1 B=0}
//! const uint8_t g_blit_ps_dxil[] = {
//!     68,88,66,67,...
//! };
//! ```

use std::io::{self, Write};
use std::path::Path;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Columns after which the byte stream wraps to a fresh indented line.
const MAX_LINE_LENGTH: u32 = 128;

/// Adapter that renders every written byte as decimal text, wrapped to
/// roughly [`MAX_LINE_LENGTH`] columns. Implements [`Write`] so blob framing
/// can target a header file unchanged.
pub struct ByteTextWriter<W: Write> {
    inner: W,
    line_length: u32,
}

impl<W: Write> ByteTextWriter<W> {
    pub fn new(inner: W) -> Self {
        // Start past the limit so the first byte opens a fresh line.
        ByteTextWriter {
            inner,
            line_length: MAX_LINE_LENGTH + 1,
        }
    }

    /// Write the comment and array declaration that precede the byte data.
    pub fn write_preamble(&mut self, variable: &str, combined_defines: &str) -> io::Result<()> {
        write!(
            self.inner,
            "// {{{combined_defines}}}{LINE_ENDING}const uint8_t {variable}[] = {{"
        )
    }

    /// Close the array declaration.
    pub fn finish(&mut self) -> io::Result<()> {
        write!(self.inner, "{LINE_ENDING}}};{LINE_ENDING}")
    }

    /// Consume the adapter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ByteTextWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &value in buf {
            if self.line_length > MAX_LINE_LENGTH {
                write!(self.inner, "{LINE_ENDING}    ")?;
                self.line_length = 0;
            }

            write!(self.inner, "{value},")?;

            self.line_length += match value {
                0..=9 => 3,
                10..=99 => 4,
                _ => 5,
            };
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Variable name a header artifact declares, derived from the output file
/// stem: `g_` + stem with dots replaced + `_` + extension without its dot.
pub fn header_variable_name(output_path_no_ext: &Path, output_ext: &str) -> String {
    let mut name = output_path_no_ext
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .replace('.', "_");

    name.push('_');
    name.push_str(output_ext.trim_start_matches('.'));

    format!("g_{name}")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emits_preamble_bytes_and_epilog() {
        let mut writer = ByteTextWriter::new(Vec::new());
        writer.write_preamble("g_blit_dxil", "A=1").unwrap();
        writer.write_all(&[0, 10, 200]).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let expected = format!(
            "// {{A=1}}{LINE_ENDING}const uint8_t g_blit_dxil[] = {{{LINE_ENDING}    0,10,200,{LINE_ENDING}}};{LINE_ENDING}"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn wraps_long_runs_of_bytes() {
        let mut writer = ByteTextWriter::new(Vec::new());
        writer.write_all(&[200u8; 100]).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.split(LINE_ENDING).skip(1).collect();
        assert!(lines.len() > 1);
        for line in &lines {
            // 4 columns of indent plus one value written at the limit.
            assert!(line.len() <= 4 + MAX_LINE_LENGTH as usize + 5);
        }
    }

    #[test]
    fn variable_names_flatten_dots() {
        assert_eq!(
            header_variable_name(Path::new("out/blit.vs_01234567"), ".dxil"),
            "g_blit_vs_01234567_dxil"
        );
        assert_eq!(
            header_variable_name(Path::new("imgui"), ".spirv"),
            "g_imgui_spirv"
        );
    }
}
