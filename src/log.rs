//! Renders a sealed [`ContainerService`] tree into the human-readable
//! construction log used by `DiError::Unresolved` and (with the
//! `diagnostics` feature) in verbose panics.

use std::fmt::Write as _;

use crate::builder::{ContainerService, ServiceStatus};

pub(crate) fn render_log(root: &ContainerService) -> String {
    let mut out = String::new();
    write_node(&mut out, root, 0);
    out
}

fn write_node(out: &mut String, node: &ContainerService, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = match node.status {
        ServiceStatus::Ok => "+",
        ServiceStatus::Error => "x",
        ServiceStatus::DependencyError => "x",
        ServiceStatus::NotResolved => "?",
    };
    let _ = write!(out, "{indent}{marker} {}", node.service_name);
    if let Some(msg) = &node.error_message {
        let _ = write!(out, " — {msg}");
    }
    out.push('\n');
    for dep in &node.dependencies {
        let dep_marker = match dep.status {
            ServiceStatus::Ok => "+",
            _ => "x",
        };
        let _ = write!(out, "{}  {dep_marker} {}", indent, dep.name);
        if let Some(comment) = &dep.comment {
            let _ = write!(out, " ({comment})");
        }
        out.push('\n');
    }
}
