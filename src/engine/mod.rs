//! Core engine: the batched scan loop.

pub mod scanner;
