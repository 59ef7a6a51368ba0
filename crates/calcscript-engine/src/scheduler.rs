//! Topological evaluation of compiled nodes with per-node failure isolation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::compiler::CalcNode;
use crate::diagnostics::{codes, Message};
use crate::engine::EvalOptions;
use crate::eval::{Environment, Evaluator};
use crate::stdlib::StdLibrary;
use crate::value::{NodeErrorMarker, Value};

/// Result of one evaluation run. Failed and unscheduled nodes are absent from `values`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub values: BTreeMap<String, Value>,
    pub messages: Vec<Message>,
}

/// A topological order over node indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Nodes in evaluation order. Among nodes that are ready at the same time, the one declared
    /// first goes first.
    pub order: Vec<usize>,
    /// Nodes on or downstream of a cycle, in declaration order.
    pub unordered: Vec<usize>,
}

impl Schedule {
    pub fn is_complete(&self) -> bool {
        self.unordered.is_empty()
    }
}

/// Order `nodes` with Kahn's algorithm. Only dependencies naming other nodes count as edges;
/// inputs and tables are already resolved.
pub fn schedule(nodes: &[CalcNode]) -> Schedule {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name.as_str(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut indegree: Vec<usize> = vec![0; nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for dep in &node.dependencies {
            if let Some(&j) = index.get(dep.as_str()) {
                dependents[j].push(i);
                indegree[i] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(i, _)| i)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(n) = ready.pop_first() {
        order.push(n);
        for &m in &dependents[n] {
            indegree[m] -= 1;
            if indegree[m] == 0 {
                ready.insert(m);
            }
        }
    }

    let unordered = indegree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg > 0)
        .map(|(i, _)| i)
        .collect();
    Schedule { order, unordered }
}

/// Parse a timestamp override: RFC 3339 (kept as its local wall-clock time), a naive
/// `YYYY-MM-DDTHH:MM:SS`, or a plain `YYYY-MM-DD` (midnight).
pub fn parse_now(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Resolve the run's timestamp. An unparseable override is reported and treated as absent.
pub(crate) fn resolve_now(now: Option<&str>) -> (Option<NaiveDateTime>, Option<Message>) {
    let Some(text) = now else {
        return (None, None);
    };
    match parse_now(text) {
        Some(now) => (Some(now), None),
        None => {
            log::warn!("ignoring invalid timestamp override {text:?}");
            let message = Message::warning(
                codes::INVALID_NOW,
                format!("invalid timestamp override '{text}'; expected RFC 3339 or YYYY-MM-DD"),
            );
            (None, Some(message))
        }
    }
}

/// Evaluate every node in topological order.
///
/// A node that fails (or never compiled) is replaced in `env` by a [`NodeErrorMarker`], so its
/// dependents fail with an upstream error instead of repeating the original failure.
pub fn evaluate_all(
    nodes: &[CalcNode],
    mut env: Environment,
    std: &StdLibrary,
    options: &EvalOptions,
) -> Evaluation {
    let mut out = Evaluation::default();

    let (now, warning) = resolve_now(options.now.as_deref());
    out.messages.extend(warning);

    let schedule = schedule(nodes);
    if !schedule.is_complete() {
        let names: Vec<&str> = schedule
            .unordered
            .iter()
            .map(|&i| nodes[i].name.as_str())
            .collect();
        out.messages.push(Message::error(
            codes::CYCLE,
            format!("dependency cycle among: {}", names.join(", ")),
        ));
    }

    for node in nodes.iter().filter(|node| node.parsed.is_none()) {
        env.commit(
            &node.name,
            Value::NodeError(NodeErrorMarker::new(&node.name, "failed to compile")),
        );
    }

    log::debug!(
        "evaluating {} of {} node(s)",
        schedule.order.len(),
        nodes.len()
    );
    for &idx in &schedule.order {
        let node = &nodes[idx];
        let Some(expr) = node.parsed.as_deref() else {
            continue;
        };
        log::trace!("evaluating node {}", node.name);
        let result = Evaluator::new(&env, std).with_now(now).evaluate(expr);
        match result {
            Ok(value) => {
                out.values.insert(node.name.clone(), value.clone());
                env.commit(&node.name, value);
            }
            Err(err) => {
                let text = err.to_string();
                out.messages.push(
                    Message::error(err.code(), text.clone())
                        .at_line(node.source_line)
                        .for_node(&node.name),
                );
                env.commit(
                    &node.name,
                    Value::NodeError(NodeErrorMarker::new(&node.name, text)),
                );
            }
        }
    }
    out
}
