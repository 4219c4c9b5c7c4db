//! Topology builder for wiring operators into a routing graph
//!
//! Operators are added parent-first: [`TopologyBuilder::add_root`] declares an
//! entry point fed directly by the source, [`TopologyBuilder::add_child`] hangs
//! an operator below an existing node. Node ids are assigned in insertion
//! order, so every child has a larger id than its parent.

use std::collections::HashSet;

use crate::error::{ProcessorError, Result};
use crate::pipeline::operator::StreamOperator;
use crate::pipeline::topology::{Node, NodeId, Topology};

/// Builder for constructing a [`Topology`]
///
/// # Example
///
/// ```rust
/// use processor::codec::{Codec, JsonCodec};
/// use processor::io::InMemorySink;
/// use processor::pipeline::{FilterOperator, SinkOperator, TopologyBuilder};
/// use std::sync::Arc;
///
/// # fn example() -> processor::ProcessorResult<()> {
/// let codec: Arc<dyn Codec<i64>> = Arc::new(JsonCodec);
/// let mut builder = TopologyBuilder::new("positive-numbers");
/// let filter = builder.add_root(FilterOperator::new("positive", codec, |x: &i64| *x > 0));
/// builder.add_child(filter, SinkOperator::new("out", "numbers.positive", Arc::new(InMemorySink::new())))?;
/// let topology = builder.build()?;
/// assert_eq!(topology.node_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TopologyBuilder {
    name: String,
    description: Option<String>,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl TopologyBuilder {
    /// Create a new, empty builder
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Set a human readable description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an operator fed directly by the source
    pub fn add_root<O: StreamOperator + 'static>(&mut self, operator: O) -> NodeId {
        let id = self.push(Box::new(operator));
        self.roots.push(id);
        id
    }

    /// Add an operator downstream of `parent`.
    ///
    /// For branch operators, children are connected to output ports in the
    /// order they are added.
    pub fn add_child<O: StreamOperator + 'static>(&mut self, parent: NodeId, operator: O) -> Result<NodeId> {
        if parent >= self.nodes.len() {
            return Err(ProcessorError::Topology(format!(
                "unknown parent node {} for operator '{}'",
                parent,
                operator.name()
            )));
        }

        let id = self.push(Box::new(operator));
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    fn push(&mut self, operator: Box<dyn StreamOperator>) -> NodeId {
        self.nodes.push(Node {
            operator,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Validate the wiring and produce the topology
    pub fn build(self) -> Result<Topology> {
        if self.name.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "topology name cannot be empty".into(),
            });
        }

        if self.roots.is_empty() {
            return Err(ProcessorError::Topology(format!(
                "topology '{}' has no root operator",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for node in &self.nodes {
            let operator = node.operator.as_ref();

            if !names.insert(operator.name()) {
                return Err(ProcessorError::Topology(format!(
                    "duplicate operator name '{}'",
                    operator.name()
                )));
            }

            if operator.is_terminal() && !node.children.is_empty() {
                return Err(ProcessorError::Topology(format!(
                    "terminal operator '{}' cannot have children",
                    operator.name()
                )));
            }

            if let Some(ports) = operator.output_ports() {
                if node.children.len() > ports {
                    return Err(ProcessorError::Topology(format!(
                        "operator '{}' has {} children but only {} output ports",
                        operator.name(),
                        node.children.len(),
                        ports
                    )));
                }
            }
        }

        Ok(Topology::new(self.name, self.description, self.nodes, self.roots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, JsonCodec};
    use crate::io::InMemorySink;
    use crate::pipeline::operator::{BranchOperator, FilterOperator, MapOperator, SinkOperator};
    use std::sync::Arc;

    fn codec() -> Arc<dyn Codec<i64>> {
        Arc::new(JsonCodec)
    }

    fn sink(name: &str) -> SinkOperator {
        SinkOperator::new(name, format!("{}.topic", name), Arc::new(InMemorySink::new()))
    }

    #[test]
    fn test_builder_basic() {
        let mut builder = TopologyBuilder::new("numbers").with_description("doubles numbers");
        let map = builder.add_root(MapOperator::new("double", codec(), codec(), |x: i64| Ok(x * 2)));
        builder.add_child(map, sink("out")).unwrap();

        let topology = builder.build().unwrap();
        assert_eq!(topology.name(), "numbers");
        assert_eq!(topology.description(), Some("doubles numbers"));
        assert_eq!(topology.node_count(), 2);
        assert_eq!(topology.roots(), &[0]);
        assert_eq!(topology.children(map), &[1]);
    }

    #[test]
    fn test_builder_requires_root() {
        let err = TopologyBuilder::new("empty").build().unwrap_err();
        assert!(matches!(err, ProcessorError::Topology(_)));
    }

    #[test]
    fn test_builder_empty_name() {
        let mut builder = TopologyBuilder::new("");
        builder.add_root(sink("out"));
        assert!(matches!(
            builder.build(),
            Err(ProcessorError::Configuration { .. })
        ));
    }

    #[test]
    fn test_builder_unknown_parent() {
        let mut builder = TopologyBuilder::new("t");
        assert!(builder.add_child(3, sink("out")).is_err());
    }

    #[test]
    fn test_builder_rejects_children_of_sink() {
        let mut builder = TopologyBuilder::new("t");
        let out = builder.add_root(sink("out"));
        builder
            .add_child(out, FilterOperator::new("after-sink", codec(), |_: &i64| true))
            .unwrap();

        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("terminal operator 'out'"));
    }

    #[test]
    fn test_builder_rejects_extra_branch_children() {
        let mut builder = TopologyBuilder::new("t");
        let branch = builder.add_root(BranchOperator::new("split", codec()).branch("big", |x: &i64| *x > 10));
        builder.add_child(branch, sink("a")).unwrap();
        builder.add_child(branch, sink("b")).unwrap();

        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("only 1 output ports"));
    }

    #[test]
    fn test_builder_allows_unconnected_ports() {
        let mut builder = TopologyBuilder::new("t");
        let branch = builder.add_root(
            BranchOperator::new("split", codec())
                .branch("big", |x: &i64| *x > 10)
                .default_branch("small"),
        );
        builder.add_child(branch, sink("big-out")).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let mut builder = TopologyBuilder::new("t");
        builder.add_root(sink("out"));
        builder.add_root(sink("out"));
        assert!(builder.build().unwrap_err().to_string().contains("duplicate"));
    }
}
