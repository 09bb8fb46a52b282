//! JSON rendering of the raw syntax tree

pub mod expr;
pub mod select;
pub mod writer;

pub use writer::JsonWriter;

use crate::parser::ast::Select;

/// Render `select` as a complete JSON document.
///
/// `limit` bounds the output size; see [`JsonWriter::with_limit`].
pub fn select_to_json(select: &Select, limit: Option<usize>) -> String {
    let mut writer = JsonWriter::with_limit(limit);
    writer.begin();
    select::write_select(&mut writer, Some(select));
    writer.finish()
}
