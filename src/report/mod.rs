//! Board rendering: HTML page, terminal table, JSON

pub mod html;
pub mod terminal;

use crate::board::BoardView;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Text,
    Html,
    Json,
}

/// Write the board in `format`.
pub fn write<W: Write>(writer: &mut W, view: &BoardView, format: Format) -> io::Result<()> {
    match format {
        Format::Text => terminal::write(writer, view),
        Format::Html => html::write(writer, view),
        Format::Json => {
            serde_json::to_writer_pretty(&mut *writer, view)?;
            writeln!(writer)
        }
    }
}
