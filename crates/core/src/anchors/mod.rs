//! Anchor computation (spec §4.3-§4.5, C4-C6): filtered views, section
//! resolution, and n-gram anchor selection.

pub mod model;
pub mod preprocess;
pub mod section;
pub mod selector;

pub use model::{AlignmentPane, Anchor, AnchorDocument, AnchorPolicySnapshot, StopwordModeLabel};
pub use preprocess::{build_asr_view, build_book_view, AsrView, BookView};
pub use section::{resolve_section, ChapterLabel};
pub use selector::select_anchors;
