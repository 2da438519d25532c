pub mod braces;
pub mod matcher;

pub use braces::expand_braces;
pub use matcher::{
    build_context_trigger_matchers, compile_context_trigger, Channel, CompiledTrigger,
    ContextTriggerMatcher, Turn,
};
