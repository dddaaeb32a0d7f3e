//! Hex dump formatting for frame-level traces.

use std::fmt::Write;

/// Formats `data` as a classic 16-bytes-per-line hex dump with an ASCII
/// gutter, for `tracing::debug!` output.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for (i, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", i * 16);
        for j in 0..16 {
            match chunk.get(j) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if j == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        for b in chunk {
            out.push(if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(hexdump(&[]), "");
    }

    #[test]
    fn test_single_line() {
        let dump = hexdump(b"EIP");
        assert!(dump.starts_with("00000000  45 49 50"));
        assert!(dump.trim_end().ends_with("EIP"));
        assert_eq!(dump.lines().count(), 1);
    }

    #[test]
    fn test_non_printable_bytes() {
        let dump = hexdump(&[0x00, 0x41, 0x07]);
        assert!(dump.contains("00 41 07"));
        assert!(dump.trim_end().ends_with(".A."));
    }

    #[test]
    fn test_multi_line_offsets() {
        let data = [0u8; 20];
        let dump = hexdump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000"));
        assert!(lines[1].starts_with("00000010"));
    }
}
