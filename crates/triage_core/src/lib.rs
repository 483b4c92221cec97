pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod lexicon;
pub mod normalize;
