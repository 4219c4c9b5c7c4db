//! Executable operator graph
//!
//! A [`Topology`] owns its operators and routes records through them
//! depth-first. Routing uses an explicit stack, so deep chains do not grow the
//! call stack, and the visiting order is deterministic: a record's outputs are
//! delivered to children in the order the children were added, and each
//! delivery is followed all the way to the leaves before the next one starts.

use std::fmt;

use tracing::trace;

use crate::core::RawRecord;
use crate::error::Result;
use crate::pipeline::operator::{OperatorContext, Output, StreamOperator};
use crate::window::LateRecordDropped;

/// Index of a node within its topology
pub type NodeId = usize;

/// An operator and the nodes it feeds
#[derive(Debug)]
pub struct Node {
    pub(crate) operator: Box<dyn StreamOperator>,
    pub(crate) children: Vec<NodeId>,
}

/// What happened while routing one record or one watermark advance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteReport {
    /// Records dropped by window operators because their window had closed
    pub late_dropped: Vec<LateRecordDropped>,
    /// Windows emitted by window operators on watermark advance
    pub windows_emitted: usize,
}

impl RouteReport {
    pub fn merge(&mut self, other: RouteReport) {
        self.late_dropped.extend(other.late_dropped);
        self.windows_emitted += other.windows_emitted;
    }
}

/// A validated graph of operators, built by
/// [`TopologyBuilder`](crate::pipeline::TopologyBuilder)
#[derive(Debug)]
pub struct Topology {
    name: String,
    description: Option<String>,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Topology {
    pub(crate) fn new(
        name: String,
        description: Option<String>,
        nodes: Vec<Node>,
        roots: Vec<NodeId>,
    ) -> Self {
        Self {
            name,
            description,
            nodes,
            roots,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of `node`, empty for unknown ids
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map_or(&[][..], |node| node.children.as_slice())
    }

    pub fn operator(&self, node: NodeId) -> Option<&dyn StreamOperator> {
        self.nodes.get(node).map(|node| node.operator.as_ref())
    }

    /// Names of all operators in insertion order
    pub fn operator_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.operator.name()).collect()
    }

    /// Push one source record through every root.
    ///
    /// Roots run in insertion order, each to its leaves before the next. The
    /// first failing operator aborts routing of this record, so a record can be
    /// partly applied: roots before the failure have updated their stores and
    /// delivered to their sinks, and those effects stay; roots after it never
    /// see the record. When the driver skips such a record it counts it as
    /// skipped as a whole.
    pub async fn route(&self, record: RawRecord, ctx: &OperatorContext) -> Result<RouteReport> {
        let mut report = RouteReport::default();
        let mut stack: Vec<(NodeId, RawRecord)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, record.clone()))
            .collect();

        self.drain(&mut stack, ctx, &mut report).await?;
        Ok(report)
    }

    /// Notify every operator of a watermark advance and route what they emit.
    ///
    /// Nodes are visited in insertion order, so windows emitted upstream reach
    /// a downstream window operator before that operator sees the watermark.
    pub async fn advance_watermark(&self, ctx: &OperatorContext) -> Result<RouteReport> {
        let mut report = RouteReport::default();

        for (id, node) in self.nodes.iter().enumerate() {
            let outputs = node.operator.on_watermark(ctx).await?;
            if outputs.is_empty() {
                continue;
            }

            report.windows_emitted += outputs
                .iter()
                .filter(|output| !matches!(output, Output::Late(_)))
                .count();

            let mut stack = Vec::new();
            self.dispatch(id, outputs, &mut stack, &mut report);
            self.drain(&mut stack, ctx, &mut report).await?;
        }

        Ok(report)
    }

    async fn drain(
        &self,
        stack: &mut Vec<(NodeId, RawRecord)>,
        ctx: &OperatorContext,
        report: &mut RouteReport,
    ) -> Result<()> {
        while let Some((id, record)) = stack.pop() {
            let node = &self.nodes[id];
            let outputs = node.operator.process(record, ctx).await?;
            self.dispatch(id, outputs, stack, report);
        }
        Ok(())
    }

    /// Turn a node's outputs into pending deliveries on the stack
    fn dispatch(
        &self,
        from: NodeId,
        outputs: Vec<Output>,
        stack: &mut Vec<(NodeId, RawRecord)>,
        report: &mut RouteReport,
    ) {
        let node = &self.nodes[from];
        let mut pending = Vec::new();

        for output in outputs {
            match output {
                Output::Forward(record) => {
                    for &child in &node.children {
                        pending.push((child, record.clone()));
                    }
                }
                Output::Port(port, record) => match node.children.get(port) {
                    Some(&child) => pending.push((child, record)),
                    None => trace!(
                        operator = %node.operator.name(),
                        port,
                        "Dropping record for unconnected port"
                    ),
                },
                Output::Late(late) => report.late_dropped.push(late),
            }
        }

        // reversed so the first pending delivery is popped first
        stack.extend(pending.into_iter().rev());
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self.nodes[id];
        writeln!(f, "{:indent$}- {}", "", node.operator.name(), indent = depth * 2)?;
        for &child in &node.children {
            self.describe(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Topology '{}'", self.name)?;
        if let Some(description) = &self.description {
            writeln!(f, "  {}", description)?;
        }
        for &root in &self.roots {
            self.describe(f, root, 1)?;
        }
        Ok(())
    }
}
