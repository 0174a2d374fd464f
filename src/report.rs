//! Operator-facing output helpers.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;

use crate::model::Operation;

/// Echoes the raw operation object as tab-indented JSON.
///
/// # Errors
///
/// Returns an I/O error when serialisation or the write fails.
pub fn write_operation<W: Write + ?Sized>(out: &mut W, operation: &Operation) -> io::Result<()> {
    let mut serializer = Serializer::with_formatter(&mut *out, PrettyFormatter::with_indent(b"\t"));
    operation.serialize(&mut serializer)?;
    writeln!(out)
}

/// Writes one poll tick: `Status: <STATUS>, Progress: <N>`.
///
/// # Errors
///
/// Returns an I/O error when the write fails.
pub fn write_progress<W: Write + ?Sized>(out: &mut W, operation: &Operation) -> io::Result<()> {
    writeln!(
        out,
        "Status: {}, Progress: {}",
        operation.status, operation.progress
    )
}
