//! Framed container for shader permutation blobs.
//!
//! A blob concatenates every compiled permutation of one logical shader.
//! The layout is a fixed file header followed by one frame per permutation,
//! each labelled with its canonical combined-defines string:
//!
//! ```text
//! magic    [u8; 4]   b"SBLB"
//! version  u32 LE    1
//! frames:
//!   defines_len  u32 LE
//!   defines      [u8; defines_len]   UTF-8, sorted "A=1 B=0" form
//!   data_len     u32 LE
//!   data         [u8; data_len]      compiled shader bytes
//! ```
//!
//! Writers go through `io::Write`, so the same framing serves raw binary
//! blobs and text headers (via [`text::ByteTextWriter`], which renders every
//! byte as decimal text).

pub mod text;

use std::io::{self, Write};

pub const BLOB_MAGIC: [u8; 4] = *b"SBLB";
pub const BLOB_VERSION: u32 = 1;

/// Write the file header. Called exactly once per blob, before any frame.
pub fn write_file_header(out: &mut dyn Write) -> io::Result<()> {
    out.write_all(&BLOB_MAGIC)?;
    out.write_all(&BLOB_VERSION.to_le_bytes())
}

/// Append one permutation frame labelled with its combined defines.
pub fn write_permutation(out: &mut dyn Write, defines: &str, data: &[u8]) -> io::Result<()> {
    out.write_all(&(defines.len() as u32).to_le_bytes())?;
    out.write_all(defines.as_bytes())?;
    out.write_all(&(data.len() as u32).to_le_bytes())?;
    out.write_all(data)
}

#[cfg(test)]
mod test {
    use super::*;

    fn read_u32(bytes: &[u8], at: &mut usize) -> u32 {
        let value = u32::from_le_bytes(bytes[*at..*at + 4].try_into().unwrap());
        *at += 4;
        value
    }

    #[test]
    fn frames_round_trip_in_order() {
        let mut blob = Vec::new();
        write_file_header(&mut blob).unwrap();
        write_permutation(&mut blob, "A=0", &[1, 2, 3]).unwrap();
        write_permutation(&mut blob, "A=1", &[4, 5]).unwrap();

        assert_eq!(&blob[..4], b"SBLB");
        let mut at = 4;
        assert_eq!(read_u32(&blob, &mut at), BLOB_VERSION);

        let mut frames = Vec::new();
        while at < blob.len() {
            let defines_len = read_u32(&blob, &mut at) as usize;
            let defines = std::str::from_utf8(&blob[at..at + defines_len]).unwrap();
            at += defines_len;
            let data_len = read_u32(&blob, &mut at) as usize;
            let data = &blob[at..at + data_len];
            at += data_len;
            frames.push((defines.to_string(), data.to_vec()));
        }

        assert_eq!(
            frames,
            [
                (String::from("A=0"), vec![1, 2, 3]),
                (String::from("A=1"), vec![4, 5]),
            ]
        );
    }

    #[test]
    fn empty_payload_is_a_valid_frame() {
        let mut blob = Vec::new();
        write_permutation(&mut blob, "", &[]).unwrap();
        assert_eq!(blob, [0, 0, 0, 0, 0, 0, 0, 0]);
    }
}
