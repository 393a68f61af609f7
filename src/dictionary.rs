//! Backing stores for phrase data.
//!
//! Two storage flavors cover all of the engine's data files. The sorted
//! phrase database maps a large, byte-sorted text file and answers prefix
//! queries by binary search without parsing the file into heap structures.
//! The byte-block dictionary parses a small user-editable blob into a
//! key-to-values table whose entries are zero-copy slices of the blob.

pub use blob::{ByteBlockDictionary, ColumnOrder, ParseIssue, ParseIssueKind};
pub use phrase_db::{Blob, PhraseDbError, SortedPhraseDb, SORTED_PRAGMA_HEADER};

mod blob;
mod phrase_db;
