//! Presentation adapters translating external input into engine calls.

pub mod csv;
