//! Runs a compiled graph, potentially in parallel.
//!
//! Each node gets one execution unit: a completion handle every dependent
//! waits on, registered in a run-scoped concurrent table.  Registration via
//! the map's entry API is an atomic insert-or-fetch, which is what makes a
//! node shared by many dependents run at most once per `run` call.

use crate::graph::{Graph, NodeId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::Scope;

#[derive(Default)]
enum UnitState {
    #[default]
    Pending,
    Done,
    Failed,
}

/// The shared handle for one node's in-flight or finished execution.
#[derive(Default)]
struct Unit {
    state: Mutex<UnitState>,
    cond: Condvar,
}

impl Unit {
    /// Block until the unit completes; true on success.
    fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        while matches!(*state, UnitState::Pending) {
            state = self.cond.wait(state).unwrap();
        }
        matches!(*state, UnitState::Done)
    }

    fn finish(&self, ok: bool) {
        let mut state = self.state.lock().unwrap();
        *state = if ok { UnitState::Done } else { UnitState::Failed };
        drop(state);
        self.cond.notify_all();
    }
}

/// Execute every node reachable from the graph's root, honoring dependency
/// order, and block until all of them have finished.
///
/// Concurrency is bounded only by data dependencies: every unit gets its own
/// scoped thread and suspends solely while waiting on its dependencies.  A
/// failing action marks its unit failed, which keeps all transitive
/// dependents from running; independent branches still run to completion,
/// and the first failure is returned once everything has settled.
pub fn run(graph: &Graph) -> anyhow::Result<()> {
    let units: DashMap<NodeId, Arc<Unit>> = DashMap::new();
    let failure: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    std::thread::scope(|s| {
        start(s, graph, &units, &failure, graph.root());
        // The scope joins every spawned unit before returning.
    });
    match failure.into_inner().unwrap() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Fetch the unit for `id`, spawning its thread on first sight.
fn start<'scope, 'env>(
    s: &'scope Scope<'scope, 'env>,
    graph: &'env Graph<'env>,
    units: &'env DashMap<NodeId, Arc<Unit>>,
    failure: &'env Mutex<Option<anyhow::Error>>,
    id: NodeId,
) -> Arc<Unit> {
    // The entry guard must be released before spawning: the new thread
    // touches the map itself when starting dependencies.
    let unit = match units.entry(id) {
        Entry::Occupied(e) => return e.get().clone(),
        Entry::Vacant(v) => {
            let unit = Arc::new(Unit::default());
            v.insert(unit.clone());
            unit
        }
    };

    let handle = unit.clone();
    s.spawn(move || {
        let node = graph.node(id);
        let deps: Vec<Arc<Unit>> = node
            .deps
            .iter()
            .map(|&dep| start(s, graph, units, failure, dep))
            .collect();
        let mut ok = true;
        for dep in deps {
            ok &= dep.wait();
        }
        if ok {
            if let Some(action) = &node.action {
                if let Err(err) = action() {
                    ok = false;
                    let mut first = failure.lock().unwrap();
                    if first.is_none() {
                        *first = Some(err);
                    }
                }
            }
        }
        handle.finish(ok);
    });
    unit
}
