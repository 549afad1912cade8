// src/process/decode.rs

use std::{
    borrow::Cow,
    io::{self, BufRead, Read},
};
use tracing::{debug, trace};

use super::dataset::{Columns, Dataset};
use crate::error::LineDecodeError;
use crate::schema::TableSchema;

/// What happens to whitespace inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimPolicy {
    /// Keep the slice as-is; a span made only of whitespace becomes `""`.
    #[default]
    Raw,
    /// Strip leading and trailing whitespace from every cell.
    Edges,
}

/// Character encoding of a table. One encoding applies to every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8 if the whole table is valid UTF-8, otherwise Latin-1.
    #[default]
    Detect,
    /// Invalid sequences become U+FFFD.
    Utf8,
    /// One byte per character.
    Latin1,
}

impl TextEncoding {
    fn resolve(self, data: &[u8]) -> TextEncoding {
        match self {
            TextEncoding::Detect if std::str::from_utf8(data).is_ok() => TextEncoding::Utf8,
            TextEncoding::Detect => TextEncoding::Latin1,
            fixed => fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Label columns with the schema headers.
    pub emit_headers: bool,
    pub trim: TrimPolicy,
    pub encoding: TextEncoding,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            emit_headers: true,
            trim: TrimPolicy::Raw,
            encoding: TextEncoding::Detect,
        }
    }
}

/// Decoder output: the rows that fit the layout plus one error per line
/// that did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub dataset: Dataset,
    pub errors: Vec<LineDecodeError>,
}

/// Decode a fixed-width stream, one record per line. With
/// `TextEncoding::Detect` the stream is read to the end before decoding.
pub fn decode_reader<R: BufRead>(
    mut reader: R,
    schema: &TableSchema,
    options: DecodeOptions,
) -> io::Result<Decoded> {
    if options.encoding == TextEncoding::Detect {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        return Ok(decode_bytes(&data, schema, options));
    }

    let mut decoder = LineDecoder::new(schema, options, options.encoding);
    for line in reader.split(b'\n') {
        decoder.feed(&line?);
    }
    Ok(decoder.finish())
}

/// Decode an in-memory fixed-width table.
pub fn decode_bytes(data: &[u8], schema: &TableSchema, options: DecodeOptions) -> Decoded {
    let encoding = options.encoding.resolve(data);
    let mut decoder = LineDecoder::new(schema, options, encoding);
    if !data.is_empty() {
        let body = data.strip_suffix(b"\n").unwrap_or(data);
        for line in body.split(|b| *b == b'\n') {
            decoder.feed(line);
        }
    }
    decoder.finish()
}

struct LineDecoder<'a> {
    schema: &'a TableSchema,
    trim: TrimPolicy,
    encoding: TextEncoding,
    expected: usize,
    line_number: usize,
    dataset: Dataset,
    errors: Vec<LineDecodeError>,
}

impl<'a> LineDecoder<'a> {
    fn new(schema: &'a TableSchema, options: DecodeOptions, encoding: TextEncoding) -> Self {
        let columns = if options.emit_headers {
            Columns::Named(schema.headers.clone())
        } else {
            Columns::Positional(schema.column_count())
        };
        Self {
            schema,
            trim: options.trim,
            encoding,
            expected: schema.line_length(),
            line_number: 0,
            dataset: Dataset::new(columns),
            errors: Vec::new(),
        }
    }

    fn feed(&mut self, raw: &[u8]) {
        self.line_number += 1;
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let text = line_text(raw, self.encoding);

        let actual = if text.is_ascii() {
            text.len()
        } else {
            text.chars().count()
        };
        if actual != self.expected {
            trace!(
                line = self.line_number,
                expected = self.expected,
                actual,
                "line length mismatch"
            );
            self.errors.push(LineDecodeError {
                line_number: self.line_number,
                expected_length: self.expected,
                actual_length: actual,
            });
            return;
        }

        let row = slice_cells(&text, &self.schema.widths, self.trim);
        self.dataset.push_row(row);
    }

    fn finish(self) -> Decoded {
        debug!(
            lines = self.line_number,
            encoding = ?self.encoding,
            rows = self.dataset.len(),
            errors = self.errors.len(),
            "decoded table"
        );
        Decoded {
            dataset: self.dataset,
            errors: self.errors,
        }
    }
}

fn line_text(raw: &[u8], encoding: TextEncoding) -> Cow<'_, str> {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(raw),
        _ if raw.is_ascii() => String::from_utf8_lossy(raw),
        _ => Cow::Owned(raw.iter().map(|&b| b as char).collect()),
    }
}

/// Split `text` into consecutive spans of `widths` characters. The caller
/// guarantees the character count equals the sum of the widths.
fn slice_cells(text: &str, widths: &[usize], trim: TrimPolicy) -> Vec<String> {
    let offsets: Option<Vec<usize>> = if text.is_ascii() {
        None
    } else {
        Some(
            text.char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(text.len()))
                .collect(),
        )
    };
    let byte_at = |n: usize| offsets.as_ref().map_or(n, |o| o[n]);

    let mut cells = Vec::with_capacity(widths.len());
    let mut pos = 0;
    for &w in widths {
        let span = &text[byte_at(pos)..byte_at(pos + w)];
        pos += w;
        let cell = match trim {
            TrimPolicy::Raw if span.trim().is_empty() => String::new(),
            TrimPolicy::Raw => span.to_string(),
            TrimPolicy::Edges => span.trim().to_string(),
        };
        cells.push(cell);
    }
    cells
}
