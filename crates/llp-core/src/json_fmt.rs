//! Byte-stable JSON output: two-space indentation plus ASCII-only escaping.
//!
//! `serde_json` has no built-in "ascii_only" mode — its `PrettyFormatter`
//! passes non-ASCII characters through UTF-8 verbatim. This pipeline needs
//! output that is byte-identical across locales (so a diff on `manifest.json`
//! or a thread file never changes just because two machines have different
//! default encodings in their toolchain), so [`AsciiEscapeFormatter`]
//! combines `PrettyFormatter`'s indentation behavior with `\uXXXX` escaping
//! of every non-ASCII code point, matching `json.dumps(..., ensure_ascii=True,
//! indent=2)` semantics.

use std::io;

use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter};

/// A formatter that escapes every non-ASCII character as `\uXXXX` (surrogate
/// pairs for characters outside the BMP), with indentation behavior
/// switchable between two-space-pretty (for `manifest.json`) and compact,
/// one-value-per-line (for `parsed.jsonl` records).
#[derive(Clone, Debug)]
pub struct AsciiEscapeFormatter {
    current_indent: usize,
    has_value: bool,
    pretty: bool,
}

impl Default for AsciiEscapeFormatter {
    fn default() -> Self {
        AsciiEscapeFormatter::pretty()
    }
}

impl AsciiEscapeFormatter {
    pub fn new() -> Self {
        AsciiEscapeFormatter::pretty()
    }

    pub fn pretty() -> Self {
        AsciiEscapeFormatter {
            current_indent: 0,
            has_value: false,
            pretty: true,
        }
    }

    pub fn compact() -> Self {
        AsciiEscapeFormatter {
            current_indent: 0,
            has_value: false,
            pretty: false,
        }
    }

    fn indent<W: ?Sized + io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for _ in 0..self.current_indent {
            writer.write_all(b"  ")?;
        }
        Ok(())
    }
}

impl Formatter for AsciiEscapeFormatter {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"[")
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent -= 1;
        if self.pretty && self.has_value {
            writer.write_all(b"\n")?;
            self.indent(writer)?;
        }
        writer.write_all(b"]")
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if !self.pretty {
            return if first {
                Ok(())
            } else {
                writer.write_all(b",")
            };
        }
        if first {
            self.has_value = true;
            writer.write_all(b"\n")?;
        } else {
            writer.write_all(b",\n")?;
        }
        self.indent(writer)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        Ok(())
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"{")
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent -= 1;
        if self.pretty && self.has_value {
            writer.write_all(b"\n")?;
            self.indent(writer)?;
        }
        writer.write_all(b"}")
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if !self.pretty {
            return if first {
                Ok(())
            } else {
                writer.write_all(b",")
            };
        }
        if first {
            self.has_value = true;
            writer.write_all(b"\n")?;
        } else {
            writer.write_all(b",\n")?;
        }
        self.indent(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        Ok(())
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut ascii_run_start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            if ascii_run_start < idx {
                writer.write_all(fragment[ascii_run_start..idx].as_bytes())?;
            }
            write_unicode_escape(writer, ch)?;
            ascii_run_start = idx + ch.len_utf8();
        }
        if ascii_run_start < fragment.len() {
            writer.write_all(fragment[ascii_run_start..].as_bytes())?;
        }
        Ok(())
    }

    fn write_char_escape<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        char_escape: CharEscape,
    ) -> io::Result<()> {
        // Control characters and quote/backslash escapes are already ASCII;
        // defer to the default `\n`/`\t`/`\uXXXX` encoding.
        default_write_char_escape(writer, char_escape)
    }
}

fn write_unicode_escape<W: ?Sized + io::Write>(writer: &mut W, ch: char) -> io::Result<()> {
    let mut buf = [0u16; 2];
    for unit in ch.encode_utf16(&mut buf) {
        write!(writer, "\\u{:04x}", unit)?;
    }
    Ok(())
}

fn default_write_char_escape<W: ?Sized + io::Write>(
    writer: &mut W,
    char_escape: CharEscape,
) -> io::Result<()> {
    let s = match char_escape {
        CharEscape::Quote => "\\\"",
        CharEscape::ReverseSolidus => "\\\\",
        CharEscape::Solidus => "\\/",
        CharEscape::Backspace => "\\b",
        CharEscape::FormFeed => "\\f",
        CharEscape::LineFeed => "\\n",
        CharEscape::CarriageReturn => "\\r",
        CharEscape::Tab => "\\t",
        CharEscape::AsciiControl(byte) => {
            return write!(writer, "\\u{:04x}", byte);
        }
    };
    writer.write_all(s.as_bytes())
}

/// Serialize `value` as ASCII-only, two-space-indented JSON bytes, with a
/// trailing newline (matching `json.dumps(...) + "\n"` output conventions).
pub fn to_vec_pretty_ascii<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut formatter = AsciiEscapeFormatter::pretty();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, &mut formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Serialize `value` as a single ASCII-only compact JSON line, without a
/// trailing newline — callers append `\n` themselves between records.
pub fn to_vec_compact_ascii<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut formatter = AsciiEscapeFormatter::compact();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, &mut formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
