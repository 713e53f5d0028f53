//! Thread payload construction: import, paragraph splitting, de-duplication.

pub mod import;
