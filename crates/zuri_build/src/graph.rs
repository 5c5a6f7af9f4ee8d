//! Module dependency graph discovery.
//!
//! Discovery starts from one or more roots and resolves imports
//! breadth-first through the [`SourceProvider`]. Only the import list of
//! each module is read at this point. Modules that fail to resolve or to
//! scan stay in the graph as failed nodes so that siblings can still be
//! built; a cycle, on the other hand, fails the whole discovery before
//! anything is compiled.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use zuri_common::InternalError;
use zuri_source::{FileId, ModuleId, ResolveError, SourceDb, SourceProvider, SourceUnit, Span};
use zuri_syntax::{scan_imports, ImportRef};

use crate::error::{CompileError, DependencyCycleError};

/// A module's source as far as discovery got.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// Resolved and scanned.
    Ready {
        /// The source text.
        unit: SourceUnit,
        /// Where the unit is registered in the source database.
        file: FileId,
        /// Imports in declaration order.
        imports: Vec<ImportRef>,
        /// Dependencies that come from a REPL session rather than from an
        /// import in the unit itself.
        carried: Vec<ModuleId>,
    },
    /// Resolution or import scanning failed.
    Failed(CompileError),
}

/// The import graph below a set of roots.
///
/// Edges point from a dependency to its importer, so a topological order
/// lists dependencies first.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ModuleId, ()>,
    nodes: HashMap<ModuleId, NodeIndex>,
    sources: HashMap<ModuleId, ModuleSource>,
    discovered: Vec<ModuleId>,
    roots: Vec<ModuleId>,
}

impl DependencyGraph {
    /// Discovers every module reachable from `root`.
    pub fn discover(
        root: &ModuleId,
        provider: &dyn SourceProvider,
        sources: &SourceDb,
    ) -> Result<Self, CompileError> {
        Self::discover_all(std::slice::from_ref(root), provider, sources)
    }

    /// Discovers every module reachable from any of `roots`.
    pub fn discover_all(
        roots: &[ModuleId],
        provider: &dyn SourceProvider,
        sources: &SourceDb,
    ) -> Result<Self, CompileError> {
        let mut discovery = Discovery::new(provider, sources);
        for root in roots {
            discovery.enqueue(root.clone(), None);
        }
        discovery.run(roots.to_vec())
    }

    /// Discovers the dependencies of a unit the provider does not know,
    /// such as a REPL fragment. The unit itself becomes the root and also
    /// depends on every module in `carried`.
    pub fn discover_unit(
        unit: SourceUnit,
        carried: &[ModuleId],
        provider: &dyn SourceProvider,
        sources: &SourceDb,
    ) -> Result<Self, CompileError> {
        let root = unit.module().clone();
        let mut discovery = Discovery::new(provider, sources);
        discovery.add(root.clone(), Ok(unit), carried.to_vec());
        discovery.run(vec![root])
    }

    /// The roots discovery started from.
    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    /// Every module in discovery order.
    pub fn modules(&self) -> &[ModuleId] {
        &self.discovered
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.discovered.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    /// What discovery learned about `module`.
    pub fn source(&self, module: &ModuleId) -> Option<&ModuleSource> {
        self.sources.get(module)
    }

    /// Direct dependencies of `module`, deduplicated, in import order.
    pub fn dependencies(&self, module: &ModuleId) -> Vec<ModuleId> {
        let Some(ModuleSource::Ready { imports, carried, .. }) = self.sources.get(module) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        imports
            .iter()
            .filter_map(|import| ModuleId::parse(&import.module).ok())
            .chain(carried.iter().cloned())
            .filter(|dep| seen.insert(dep.clone()))
            .collect()
    }

    /// All modules, dependencies before their importers.
    pub fn topological_order(&self) -> Result<Vec<ModuleId>, CompileError> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            InternalError::new(format!(
                "cycle through '{}' survived discovery",
                self.graph[cycle.node_id()]
            ))
        })?;
        Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
    }

    /// Modules grouped into levels. Every module's dependencies lie in
    /// earlier levels, so the modules of one level can build in parallel.
    pub fn levels(&self) -> Result<Vec<Vec<ModuleId>>, CompileError> {
        let mut depth: HashMap<&ModuleId, usize> = HashMap::new();
        let mut levels: Vec<Vec<ModuleId>> = Vec::new();
        let order = self.topological_order()?;
        for module in &order {
            let level = self
                .dependencies(module)
                .iter()
                .filter_map(|dep| depth.get(dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(module, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(module.clone());
        }
        Ok(levels)
    }

    /// The modules `root` depends on, transitively, plus `root` itself,
    /// dependencies first.
    pub fn closure(&self, root: &ModuleId) -> Result<Vec<ModuleId>, CompileError> {
        let mut needed = HashSet::new();
        let mut stack = vec![root.clone()];
        while let Some(module) = stack.pop() {
            if needed.insert(module.clone()) {
                stack.extend(self.dependencies(&module));
            }
        }
        Ok(self
            .topological_order()?
            .into_iter()
            .filter(|m| needed.contains(m))
            .collect())
    }
}

struct Discovery<'a> {
    provider: &'a dyn SourceProvider,
    db: &'a SourceDb,
    graph: DiGraph<ModuleId, ()>,
    nodes: HashMap<ModuleId, NodeIndex>,
    sources: HashMap<ModuleId, ModuleSource>,
    discovered: Vec<ModuleId>,
    queue: VecDeque<(ModuleId, Option<(ModuleId, Span)>)>,
}

impl<'a> Discovery<'a> {
    fn new(provider: &'a dyn SourceProvider, db: &'a SourceDb) -> Self {
        Self {
            provider,
            db,
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            sources: HashMap::new(),
            discovered: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    fn node(&mut self, module: &ModuleId) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(module) {
            return idx;
        }
        let idx = self.graph.add_node(module.clone());
        self.nodes.insert(module.clone(), idx);
        self.discovered.push(module.clone());
        idx
    }

    fn enqueue(&mut self, module: ModuleId, importer: Option<(ModuleId, Span)>) {
        if self.nodes.contains_key(&module) {
            return;
        }
        self.node(&module);
        self.queue.push_back((module, importer));
    }

    fn resolve(&self, module: &ModuleId, importer: Option<(ModuleId, Span)>) -> Result<SourceUnit, CompileError> {
        self.provider.resolve(module).map_err(|err| match err {
            ResolveError::NotFound { searched, .. } => CompileError::NotFound {
                module: module.clone(),
                importer,
                searched,
            },
            ResolveError::Io { .. } | ResolveError::TooLarge(_) => CompileError::Source {
                module: module.clone(),
                reason: err.to_string(),
            },
        })
    }

    /// Records the module's source and queues its imports and `carried`
    /// dependencies.
    fn add(&mut self, module: ModuleId, unit: Result<SourceUnit, CompileError>, carried: Vec<ModuleId>) {
        let idx = self.node(&module);
        let source = match unit {
            Err(err) => ModuleSource::Failed(err),
            Ok(unit) => {
                let file = self.db.add_unit(unit.clone());
                match scan_imports(unit.text(), file) {
                    Err(error) => ModuleSource::Failed(CompileError::Syntax {
                        module: module.clone(),
                        error,
                    }),
                    Ok(imports) => {
                        for import in &imports {
                            let dep = match ModuleId::parse(&import.module) {
                                Ok(dep) => dep,
                                Err(_) => continue,
                            };
                            self.enqueue(dep.clone(), Some((module.clone(), import.span)));
                            let dep_idx = self.node(&dep);
                            self.graph.update_edge(dep_idx, idx, ());
                        }
                        for dep in &carried {
                            self.enqueue(dep.clone(), Some((module.clone(), Span::point(file, 0))));
                            let dep_idx = self.node(dep);
                            self.graph.update_edge(dep_idx, idx, ());
                        }
                        ModuleSource::Ready {
                            unit,
                            file,
                            imports,
                            carried,
                        }
                    }
                }
            }
        };
        if let ModuleSource::Failed(err) = &source {
            tracing::debug!(module = %module, error = %err, "module failed discovery");
        }
        self.sources.insert(module, source);
    }

    fn run(mut self, roots: Vec<ModuleId>) -> Result<DependencyGraph, CompileError> {
        while let Some((module, importer)) = self.queue.pop_front() {
            let unit = self.resolve(&module, importer);
            self.add(module, unit, Vec::new());
        }
        let graph = DependencyGraph {
            graph: self.graph,
            nodes: self.nodes,
            sources: self.sources,
            discovered: self.discovered,
            roots,
        };
        if let Some(cycle) = graph.find_cycle() {
            tracing::debug!(members = cycle.members.len(), "dependency cycle detected");
            return Err(cycle.into());
        }
        tracing::debug!(modules = graph.len(), "discovered dependency graph");
        Ok(graph)
    }
}

impl DependencyGraph {
    /// The cycle containing the earliest discovered module, if any.
    fn find_cycle(&self) -> Option<DependencyCycleError> {
        let position: HashMap<&ModuleId, usize> =
            self.discovered.iter().enumerate().map(|(i, m)| (m, i)).collect();
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                scc.into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect::<HashSet<_>>()
            })
            .min_by_key(|members| {
                members
                    .iter()
                    .filter_map(|m| position.get(m))
                    .min()
                    .copied()
                    .unwrap_or(usize::MAX)
            })
            .map(|members| DependencyCycleError {
                members: self.cycle_path(&members),
            })
    }

    /// Orders the members of a strongly connected component by following
    /// imports from the earliest discovered member.
    fn cycle_path(&self, members: &HashSet<ModuleId>) -> Vec<ModuleId> {
        let in_discovery_order: Vec<&ModuleId> = self
            .discovered
            .iter()
            .filter(|m| members.contains(*m))
            .collect();
        let Some(&start) = in_discovery_order.first() else {
            return Vec::new();
        };
        let mut path = vec![start.clone()];
        let mut current = start.clone();
        while let Some(next) = self
            .dependencies(&current)
            .into_iter()
            .find(|dep| members.contains(dep) && !path.contains(dep))
        {
            path.push(next.clone());
            current = next;
        }
        for member in in_discovery_order {
            if !path.contains(member) {
                path.push(member.clone());
            }
        }
        path
    }
}
