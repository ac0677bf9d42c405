//! Infrastructure Layer
//!
//! Store-side scripts. Store implementations themselves live in `platform`.

pub mod scripts;
