//! `mf-parser` — map exchange file parsers.
//!
//! Two source dialects feed mapforge:
//!
//! | Module     | Format                                                     |
//! |------------|------------------------------------------------------------|
//! | [`apollo`] | Apollo-style XML (`<road>` / `<junction>` exchange files)  |
//! | [`memo`]   | The proprietary "memo" JSON dialect                        |
//!
//! Both produce id-keyed maps of domain objects; downstream crates build the
//! road graph and layer tables from these, never from raw text. No I/O
//! happens here — callers hand in the file contents as `&str`.
//!
//! # Error posture
//!
//! Apollo parsing raises [`ParseError`] on malformed structure (a road with
//! no lanes, a section with no usable lanes): the exchange format guarantees
//! these elements, so their absence means the file is broken, not partial.
//! Memo parsing is the opposite: items are resolved one by one and a broken
//! item is skipped with a warning in the job log.

pub mod apollo;
pub mod error;
pub mod memo;


pub use apollo::{parse_apollo, parse_apollo_parallel, ApolloMap};
pub use error::{ParseError, ParseResult};
pub use memo::{parse_memo, MemoMap};
