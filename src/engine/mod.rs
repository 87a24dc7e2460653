pub mod engine;
pub mod protocol;
pub mod apply_directive;

pub mod dice;
pub mod rules;
pub mod quick_actions;

pub mod compactor;
pub mod prompt_builder;
pub mod llm_client;
pub mod directive_parser;
