//! Timeline elements, operator pipelines and the tick evaluator.

pub mod element;
pub mod evaluator;
pub mod operator;
