//! Book indexing (spec §4.2, C3): source model, content hashing, and the
//! indexer that turns parsed paragraphs into a `BookIndex`.

pub mod hash;
pub mod index;
pub mod model;

pub use hash::{bytes_hash, file_hash};
pub use index::{build_book_index, verify_book_index};
pub use model::{
    BookIndex, BookTotals, BookWord, Paragraph, ParagraphKind, ParagraphRange, SectionKind,
    SectionRange, SentenceRange,
};
