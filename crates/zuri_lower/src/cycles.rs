//! Detection of globals whose initialization depends on itself.
//!
//! Nodes are globals; an edge `a -> b` means the initializer of value
//! global `a` (or the body of function `a`) reads `b`. A strongly connected
//! component is an error when it contains a value global and either has
//! more than one member or a self-loop. Recursion between functions alone
//! is fine.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use zuri_ir::{GlobalId, GlobalKind};

use crate::context::Lowerer;
use crate::errors::{SemanticError, SemanticErrorKind};

impl Lowerer<'_> {
    pub(crate) fn check_cycles(&self) -> Result<(), SemanticError> {
        let count = self.module.globals.len();
        let mut graph: DiGraph<GlobalId, ()> = DiGraph::with_capacity(count, self.references.len());
        let nodes: Vec<NodeIndex> = self.module.globals.iter().map(|(id, _)| graph.add_node(id)).collect();
        for (from, to) in &self.references {
            if let (Some(a), Some(b)) = (nodes.get(from.as_raw() as usize), nodes.get(to.as_raw() as usize)) {
                graph.update_edge(*a, *b, ());
            }
        }

        let is_value = |id: GlobalId| {
            self.module
                .globals
                .get(id)
                .is_some_and(|g| g.kind == GlobalKind::Value)
        };

        let mut worst: Option<Vec<GlobalId>> = None;
        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| graph.contains_edge(*n, *n));
            let mut members: Vec<GlobalId> = component.iter().map(|n| graph[*n]).collect();
            if !cyclic || !members.iter().any(|id| is_value(*id)) {
                continue;
            }
            members.sort();
            if worst.as_ref().map_or(true, |w| members[0] < w[0]) {
                worst = Some(members);
            }
        }

        let Some(members) = worst else {
            return Ok(());
        };
        let first = members
            .iter()
            .copied()
            .find(|id| is_value(*id))
            .unwrap_or(members[0]);
        let mut path: Vec<&str> = members.iter().map(|id| self.module.global_name(*id)).collect();
        path.push(self.module.global_name(members[0]));
        let span = self
            .globals
            .values()
            .find(|decl| decl.id == first)
            .map(|decl| decl.span)
            .unwrap_or(zuri_source::Span::DUMMY);
        Err(SemanticError::new(
            SemanticErrorKind::CyclicDefinition,
            format!(
                "the initializer of `{}` depends on itself ({})",
                self.module.global_name(first),
                path.join(" -> ")
            ),
            span,
        ))
    }
}
