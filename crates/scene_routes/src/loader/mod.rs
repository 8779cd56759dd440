//! Getting content into a scene: the text reader, the background loader pool and its cache.
pub mod cache;
pub mod content;
pub mod lexer;
pub mod parser;

pub use cache::ContentCache;
pub use content::{
    CancelToken, Content, ContentLoader, ContentProvider, FileProvider, LoadCompletion,
    LoadOutcome, MemoryProvider,
};
pub use parser::load_str;
