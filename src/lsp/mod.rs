//! LSP feature dispatch over language modes.
//!
//! Position-scoped features ask the mode owning the cursor. Whole-document
//! features ask each mode present in the document once and concatenate the
//! results in region order.

mod color;
mod completion;
mod definition;
mod diagnostics;
mod folding;
mod hover;
mod symbols;
mod words;

pub use color::{color_presentations, document_colors};
pub use completion::{complete_this_members, completion_at_position};
pub use definition::{collect_refs, definition_at_position, references_at_position, TemplateRef};
pub use diagnostics::validate_document;
pub use folding::{folding_ranges, format_document};
pub use hover::{highlights_at_position, hover_at_position};
pub use symbols::{collect_symbols, find_symbol};
pub use words::{previous_words, word_at_position};
