pub mod library;
pub mod prompts;
pub mod settings;
pub mod story;
pub mod text;
pub mod types;
pub mod view;

// Keep the public surface small and intentional.
pub use library::*;
pub use settings::*;
pub use story::*;
pub use types::*;
pub use view::*;
