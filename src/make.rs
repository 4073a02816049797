//! The top-level entry point: a set of rules in, up-to-date outputs out.

use crate::graph::{compile, Action, Graph, GraphError, Registry};
use crate::stale::{Mtime, Recipe, Staleness};
use crate::{trace, work};
use std::path::{Path, PathBuf};

/// A named build step: produces `output` from `inputs` via `recipe`.
/// Immutable once constructed; owned by the registry for one `make` call.
pub struct Rule {
    /// Unique among all rules passed to one `make` call.
    pub output: String,
    /// Ordered; order is preserved through to the recipe and is part of the
    /// input-hash digest.  Names matching another rule's output become
    /// dependency edges, anything else is a plain source file.
    pub inputs: Vec<String>,
    pub recipe: Recipe,
}

impl Rule {
    pub fn new(
        output: impl Into<String>,
        inputs: Vec<String>,
        recipe: impl Fn(&[PathBuf], &Path) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Rule {
        Rule {
            output: output.into(),
            inputs,
            recipe: Box::new(recipe),
        }
    }
}

/// Configuration for one `make` call.
pub struct MakeOptions {
    /// Output names to bring up to date.  Empty: every rule's output.
    pub targets: Vec<String>,
    /// Directory rule names resolve against.  None: the process current
    /// directory.  Absolute names pass through unchanged.
    pub dir: Option<PathBuf>,
    /// The up-to-date check applied at every rule.  Default: [`Mtime`].
    pub staleness: Box<dyn Staleness>,
}

impl Default for MakeOptions {
    fn default() -> Self {
        MakeOptions {
            targets: Vec::new(),
            dir: None,
            staleness: Box::new(Mtime),
        }
    }
}

/// Bring the requested outputs up to date, running independent rules in
/// parallel and any shared rule at most once.
pub fn make(rules: Vec<Rule>, opts: &MakeOptions) -> anyhow::Result<()> {
    let registry = Registry::new(rules, |r| r.output.as_str())?;
    let targets: Vec<String> = if opts.targets.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        opts.targets.clone()
    };
    let graph = trace::scope("graph.compile", || build_graph(&registry, &targets, opts))?;
    trace::scope("work.run", || work::run(&graph))
}

fn build_graph<'a>(
    registry: &'a Registry<Rule>,
    targets: &'a [String],
    opts: &'a MakeOptions,
) -> Result<Graph<'a>, GraphError> {
    compile(
        registry,
        targets,
        |rule| rule.inputs.as_slice(),
        |rule| -> Action<'a> {
            let inputs: Vec<PathBuf> = rule.inputs.iter().map(|n| resolve(opts, n)).collect();
            let output = resolve(opts, &rule.output);
            let staleness = &*opts.staleness;
            Box::new(move || staleness.maybe_run(&rule.recipe, &inputs, &output))
        },
    )
}

fn resolve(opts: &MakeOptions, name: &str) -> PathBuf {
    match &opts.dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(output: &str, inputs: &[&str]) -> Rule {
        Rule::new(
            output,
            inputs.iter().map(|s| s.to_string()).collect(),
            |_, _| Ok(()),
        )
    }

    #[test]
    fn duplicate_output_fails_before_running() {
        let err = make(
            vec![noop("out", &[]), noop("out", &[])],
            &MakeOptions::default(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("duplicate rule for output \"out\""));
    }

    #[test]
    fn unknown_target_fails_before_running() {
        let opts = MakeOptions {
            targets: vec!["nope".to_string()],
            ..MakeOptions::default()
        };
        let err = make(vec![noop("out", &[])], &opts).err().unwrap();
        assert!(err.to_string().contains("no rule to make \"nope\""));
    }

    #[test]
    fn cycle_fails_before_running() {
        let err = make(
            vec![noop("a", &["b"]), noop("b", &["a"])],
            &MakeOptions::default(),
        )
        .err()
        .unwrap();
        assert!(err
            .to_string()
            .contains("dependency cycle: a depends on b depends on a"));
    }
}
