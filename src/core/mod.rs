mod engine;
mod parser;
mod batch_processor;
mod diagram;

// Call graph construction
mod call_graph;

// Language-specific tree providers
mod languages;

// Export the main engine
pub use engine::Engine;
