//! Graph data model and graph generator of the pplc compiler.

mod generator;
mod graph;

pub use generator::GraphGenerator;
pub use graph::{ConditionNode, DataNode, Graph, Vertex, VertexFlags};
