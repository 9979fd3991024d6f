// This module implements the static data table: constant data referenced by the program
// (string literals) that lives in the .data section instead of the frame. Interning a string
// returns a stable label of the form static.<Kind>.<id>; identical strings share one entry.
// At the end of the unit the table writes every datum as an optional .p2align directive,
// its label, and an .asciz directive with the text escaped for the assembler.

//! Interned constant data and its `.data` section text.

use std::fmt::{self, Write};

use hashbrown::HashMap;

/// Kind of an interned datum; also the middle component of its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticDataKind {
    String,
}

impl fmt::Display for StaticDataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticDataKind::String => f.write_str("String"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDatum {
    pub id: usize,
    pub kind: StaticDataKind,
    pub text: String,
}

impl StaticDatum {
    pub fn label(&self) -> String {
        format!("static.{}.{}", self.kind, self.id)
    }

    /// Alignment as a power of two.
    pub fn p2alignment(&self) -> u32 {
        match self.kind {
            StaticDataKind::String => 0,
        }
    }
}

/// All constant data of one compilation unit, in interning order.
#[derive(Debug, Default)]
pub struct StaticDataTable {
    data: Vec<StaticDatum>,
    by_text: HashMap<String, usize>,
}

impl StaticDataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string and return its label.
    pub fn intern_string(&mut self, text: &str) -> String {
        if let Some(&id) = self.by_text.get(text) {
            return self.data[id].label();
        }

        let id = self.data.len();
        let datum = StaticDatum { id, kind: StaticDataKind::String, text: text.to_owned() };
        let label = datum.label();
        log::trace!("interned {label} ({} bytes)", text.len());
        self.data.push(datum);
        self.by_text.insert(text.to_owned(), id);
        label
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StaticDatum> {
        self.data.iter()
    }

    /// Write the `.data` section.
    pub fn emit(&self, out: &mut String, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        writeln!(out, "{pad}.data")?;
        for datum in &self.data {
            let align = datum.p2alignment();
            if align > 0 {
                writeln!(out, "{pad}.p2align {align}")?;
            }
            writeln!(out, "{}:", datum.label())?;
            match datum.kind {
                StaticDataKind::String => {
                    writeln!(out, "{pad}.asciz \"{}\"", escape_asciz(&datum.text))?
                }
            }
        }
        Ok(())
    }
}

/// Escape text for an `.asciz` directive.
pub fn escape_asciz(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'\n' => escaped.push_str("\\n"),
            b'\t' => escaped.push_str("\\t"),
            b'\r' => escaped.push_str("\\r"),
            0x20..=0x7e => escaped.push(byte as char),
            _ => {
                let _ = write!(escaped, "\\{byte:03o}");
            }
        }
    }
    escaped
}
