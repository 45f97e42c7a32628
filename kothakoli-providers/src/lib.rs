pub mod gemini;
pub mod gemini_live;
pub mod parse;
pub mod request;
pub mod runtime;
