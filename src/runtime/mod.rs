pub mod engine;
pub mod evaluator;
pub mod graph;
pub mod record;
pub mod storage;
