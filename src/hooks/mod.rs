pub mod default_hook;
pub mod hook;

pub use default_hook::DefaultHook;
pub use hook::Hook;
