//! Tab-separated extract encoding.
//!
//! Matches MySQL's `SELECT ... INTO OUTFILE` defaults so extracts can be restored with
//! `LOAD DATA INFILE`: fields separated by `\t`, rows by `\n`, NULL written as `\N`, and
//! backslash, tab, newline, carriage return, and NUL escaped with a backslash.

use std::io::{self, Write};

const NULL_MARKER: &[u8] = b"\\N";

/// Write one row. `None` is SQL NULL.
pub fn write_row<W, V>(out: &mut W, row: &[Option<V>]) -> io::Result<()>
where
    W: Write + ?Sized,
    V: AsRef<[u8]>,
{
    for (idx, value) in row.iter().enumerate() {
        if idx > 0 {
            out.write_all(b"\t")?;
        }
        match value {
            Some(bytes) => write_escaped(out, bytes.as_ref())?,
            None => out.write_all(NULL_MARKER)?,
        }
    }
    out.write_all(b"\n")
}

fn write_escaped<W: Write + ?Sized>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    let mut start = 0;
    for (idx, byte) in bytes.iter().enumerate() {
        let escaped: &[u8] = match *byte {
            b'\\' => b"\\\\",
            b'\t' => b"\\t",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            0 => b"\\0",
            _ => continue,
        };
        out.write_all(&bytes[start..idx])?;
        out.write_all(escaped)?;
        start = idx + 1;
    }
    out.write_all(&bytes[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(row: &[Option<&str>]) -> String {
        let mut buf = Vec::new();
        write_row(&mut buf, row).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_plain_row() {
        assert_eq!(encode(&[Some("1"), Some("alice"), Some("2024-01-01")]), "1\talice\t2024-01-01\n");
    }

    #[test]
    fn test_null_marker() {
        assert_eq!(encode(&[Some("1"), None]), "1\t\\N\n");
    }

    #[test]
    fn test_escapes_control_bytes() {
        assert_eq!(
            encode(&[Some("a\tb"), Some("line1\nline2"), Some("c:\\tmp"), Some("x\r")]),
            "a\\tb\tline1\\nline2\tc:\\\\tmp\tx\\r\n"
        );
    }

    #[test]
    fn test_nul_byte() {
        let mut buf = Vec::new();
        write_row(&mut buf, &[Some(vec![b'a', 0, b'b'])]).unwrap();
        assert_eq!(buf, b"a\\0b\n");
    }

    #[test]
    fn test_empty_string_is_not_null() {
        assert_eq!(encode(&[Some(""), None]), "\t\\N\n");
    }
}
