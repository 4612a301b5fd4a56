//! Per-call constructor argument overrides, as passed to `Container::create`.

use std::collections::HashMap;

use crate::AnyArc;

/// Constant values supplied by name for one `create(...)` call, consulted
/// before configuration (spec.md §4.5 `instantiate_dependency` step 1).
pub type ArgumentsMap = HashMap<&'static str, AnyArc>;
