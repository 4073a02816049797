//! The build graph: a registry of named tasks, compiled into a deduplicated
//! DAG of nodes ready for execution.
//!
//! The compiler is generic over what a "task" concretely is; it only needs a
//! way to get a task's dependencies and its action.  The name lookup is the
//! registry's job, fixed at registry construction.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// The work a node performs when it runs, with dependency inputs already
/// complete.  Borrows from the registry it was compiled from.
pub type Action<'a> = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync + 'a>;

/// Two tasks claimed the same output name.  Raised eagerly at registry
/// construction, before anything executes.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("duplicate rule for output {0:?}")]
pub struct DuplicateOutput(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A requested output has no rule producing it.  Names that appear only
    /// as inputs are plain source files and never produce this error.
    #[error("no rule to make {0:?}")]
    UnknownRule(String),
    /// The path, in traversal order, from the first repeated name back to its
    /// repetition; always at least two entries and first == last.
    #[error("dependency cycle: {}", .0.join(" depends on "))]
    Cycle(Vec<String>),
}

/// An immutable name-indexed collection of tasks, one per output name.
pub struct Registry<T> {
    tasks: Vec<T>,
    names: Vec<String>,
    by_name: FxHashMap<String, usize>,
}

impl<T> Registry<T> {
    pub fn new(tasks: Vec<T>, name_of: impl Fn(&T) -> &str) -> Result<Self, DuplicateOutput> {
        let mut names = Vec::with_capacity(tasks.len());
        let mut by_name = FxHashMap::default();
        for (i, task) in tasks.iter().enumerate() {
            let name = name_of(task).to_string();
            if by_name.insert(name.clone(), i).is_some() {
                return Err(DuplicateOutput(name));
            }
            names.push(name);
        }
        Ok(Registry { tasks, names, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).map(|&i| &self.tasks[i])
    }

    /// All output names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct NodeId(usize);
impl NodeId {
    fn index(&self) -> usize {
        self.0
    }
}

/// One compiled unit of the graph: a rule, a plain source file (no action),
/// or the anonymous root aggregating the requested outputs (no name, no
/// action).  Deduplicated by name: a task referenced from many places
/// compiles to exactly one node.
pub struct Node<'a> {
    pub name: Option<&'a str>,
    pub action: Option<Action<'a>>,
    pub deps: Vec<NodeId>,
}

/// The compiled DAG.  Nodes live in an arena indexed by [`NodeId`];
/// `root` is the synthetic entry point whose deps are the requested outputs.
pub struct Graph<'a> {
    nodes: Vec<Node<'a>>,
    root: NodeId,
}

impl<'a> Graph<'a> {
    pub fn node(&self, id: NodeId) -> &Node<'a> {
        &self.nodes[id.index()]
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, the synthetic root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Compile `requested` output names into a [`Graph`].
///
/// Every requested name must resolve to a task in the registry; an *input*
/// name with no matching task becomes a leaf node with no action, modeling an
/// already-present source file.  Repeated requested names, and tasks shared
/// between requested outputs, collapse to a single node via the memo table.
pub fn compile<'a, T>(
    registry: &'a Registry<T>,
    requested: &'a [String],
    deps_of: impl Fn(&'a T) -> &'a [String],
    action_of: impl Fn(&'a T) -> Action<'a>,
) -> Result<Graph<'a>, GraphError> {
    let mut compiler = Compiler {
        registry,
        deps_of,
        action_of,
        nodes: Vec::new(),
        memo: FxHashMap::default(),
        path: Vec::new(),
    };

    let mut top = Vec::new();
    for name in requested {
        if registry.get(name).is_none() {
            return Err(GraphError::UnknownRule(name.clone()));
        }
        let id = compiler.node_for(name)?;
        if !top.contains(&id) {
            top.push(id);
        }
    }

    let root = compiler.push(Node {
        name: None,
        action: None,
        deps: top,
    });
    Ok(Graph {
        nodes: compiler.nodes,
        root,
    })
}

/// Traversal state for one `compile` call.  `path` is the names currently on
/// the recursion stack, for cycle detection and error reporting.
struct Compiler<'a, T, D, A> {
    registry: &'a Registry<T>,
    deps_of: D,
    action_of: A,
    nodes: Vec<Node<'a>>,
    memo: FxHashMap<&'a str, NodeId>,
    path: Vec<&'a str>,
}

impl<'a, T, D, A> Compiler<'a, T, D, A>
where
    D: Fn(&'a T) -> &'a [String],
    A: Fn(&'a T) -> Action<'a>,
{
    fn push(&mut self, node: Node<'a>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn node_for(&mut self, name: &'a str) -> Result<NodeId, GraphError> {
        if let Some(&id) = self.memo.get(name) {
            return Ok(id);
        }
        if let Some(pos) = self.path.iter().position(|&n| n == name) {
            let mut cycle: Vec<String> = self.path[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(GraphError::Cycle(cycle));
        }

        let node = match self.registry.get(name) {
            // Not produced by any task: a plain file assumed to exist.
            None => Node {
                name: Some(name),
                action: None,
                deps: Vec::new(),
            },
            Some(task) => {
                self.path.push(name);
                let mut deps = Vec::new();
                for input in (self.deps_of)(task) {
                    deps.push(self.node_for(input)?);
                }
                self.path.pop();
                Node {
                    name: Some(name),
                    action: Some((self.action_of)(task)),
                    deps,
                }
            }
        };
        let id = self.push(node);
        self.memo.insert(name, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Task {
        output: &'static str,
        inputs: Vec<String>,
    }

    fn task(output: &'static str, inputs: &[&str]) -> Task {
        Task {
            output,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn registry(tasks: Vec<Task>) -> Registry<Task> {
        Registry::new(tasks, |t| t.output).unwrap()
    }

    fn compile_graph<'a>(
        registry: &'a Registry<Task>,
        requested: &'a [String],
    ) -> Result<Graph<'a>, GraphError> {
        compile(registry, requested, |t| t.inputs.as_slice(), |_| -> Action<'a> {
            Box::new(|| Ok(()))
        })
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_output_rejected() {
        let err = Registry::new(vec![task("out", &[]), task("out", &["x"])], |t| t.output)
            .err()
            .unwrap();
        assert_eq!(err, DuplicateOutput("out".to_string()));
        assert_eq!(err.to_string(), "duplicate rule for output \"out\"");
    }

    #[test]
    fn unknown_requested_output() {
        let reg = registry(vec![task("a", &[])]);
        let requested = names(&["missing"]);
        let err = compile_graph(&reg, &requested).err().unwrap();
        assert_eq!(err, GraphError::UnknownRule("missing".to_string()));
        assert_eq!(err.to_string(), "no rule to make \"missing\"");
    }

    #[test]
    fn cycle_reported_in_order() {
        let reg = registry(vec![task("a", &["b"]), task("b", &["c"]), task("c", &["a"])]);
        let requested = names(&["a"]);
        let err = compile_graph(&reg, &requested).err().unwrap();
        assert_eq!(
            err.to_string(),
            "dependency cycle: a depends on b depends on c depends on a"
        );
    }

    #[test]
    fn self_cycle() {
        let reg = registry(vec![task("a", &["a"])]);
        let requested = names(&["a"]);
        let err = compile_graph(&reg, &requested).err().unwrap();
        assert_eq!(err.to_string(), "dependency cycle: a depends on a");
    }

    #[test]
    fn shared_dependency_compiles_once() {
        // Diamond: a and b both depend on shared, which reads one source file.
        let reg = registry(vec![
            task("a", &["shared"]),
            task("b", &["shared"]),
            task("shared", &["src"]),
        ]);
        let requested = names(&["a", "b"]);
        let graph = compile_graph(&reg, &requested).unwrap();
        // src, shared, a, b, root.
        assert_eq!(graph.len(), 5);
        let root = graph.node(graph.root());
        assert_eq!(root.name, None);
        assert!(root.action.is_none());
        let a = graph.node(root.deps[0]);
        let b = graph.node(root.deps[1]);
        assert_eq!(a.deps, b.deps);
    }

    #[test]
    fn plain_file_input_is_leaf() {
        let reg = registry(vec![task("out", &["source.txt"])]);
        let requested = names(&["out"]);
        let graph = compile_graph(&reg, &requested).unwrap();
        let out = graph.node(graph.node(graph.root()).deps[0]);
        assert!(out.action.is_some());
        let leaf = graph.node(out.deps[0]);
        assert_eq!(leaf.name, Some("source.txt"));
        assert!(leaf.action.is_none());
        assert!(leaf.deps.is_empty());
    }

    #[test]
    fn empty_request_is_noop_root() {
        let reg = registry(vec![task("a", &[])]);
        let requested: Vec<String> = Vec::new();
        let graph = compile_graph(&reg, &requested).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.node(graph.root()).deps.is_empty());
    }

    #[test]
    fn repeated_request_collapses() {
        let reg = registry(vec![task("a", &[])]);
        let requested = names(&["a", "a"]);
        let graph = compile_graph(&reg, &requested).unwrap();
        assert_eq!(graph.node(graph.root()).deps.len(), 1);
    }
}
