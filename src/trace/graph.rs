//! Service call graph in Graphviz DOT format.
//!
//! Pipe the output through `dot -Tpng` (or any other Graphviz layout) to get
//! an image. Synchronous calls are solid edges, asynchronous calls dashed,
//! and process-level callers are drawn as boxes.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use super::stats::{ServiceId, Snapshot};

/// Render every service and call edge in `snapshot` as a DOT digraph.
pub fn render_dot(snapshot: &Snapshot) -> String {
    let mut nodes = BTreeSet::new();
    for summary in &snapshot.services {
        nodes.insert(&summary.service);
        nodes.extend(summary.calls.iter().map(|(target, _)| target));
        nodes.extend(summary.acalls.iter().map(|(target, _)| target));
    }

    let mut out = String::from("digraph tmtrace {\n");
    for node in nodes {
        let shape = match node {
            ServiceId::Process(_) => ", shape=box",
            ServiceId::Service(_) => "",
        };
        writeln!(
            out,
            "    \"{}\" [label=\"{}\"{shape}];",
            node_id(node),
            escape(node.name())
        )
        .unwrap();
    }

    for summary in &snapshot.services {
        let from = node_id(&summary.service);
        for (target, _) in &summary.calls {
            writeln!(out, "    \"{from}\" -> \"{}\";", node_id(target)).unwrap();
        }
        for (target, _) in &summary.acalls {
            writeln!(
                out,
                "    \"{from}\" -> \"{}\" [style=dashed];",
                node_id(target)
            )
            .unwrap();
        }
    }
    out.push_str("}\n");

    out
}

fn node_id(service: &ServiceId) -> String {
    escape(&service.to_string().replace(':', "_"))
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
