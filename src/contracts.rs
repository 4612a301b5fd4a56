//! The active contract stack threaded through one resolution request.

use smallvec::SmallVec;

use crate::configuration::ConfigurationRegistry;
use crate::service_name::{ContractName, ContractStack};

/// Outcome of [`ContractsList::push`].
pub struct PushResult {
    pub ok: bool,
    pub pushed: usize,
    pub duplicated: Option<ContractName>,
}

/// Outcome of [`ContractsList::try_expand_unions`]: the popped suffix, plus
/// one alternative contract stack per member of the Cartesian product of the
/// unions found in that suffix.
pub struct ExpansionResult {
    pub popped_suffix: ContractStack,
    pub alternatives: Vec<ContractStack>,
}

/// The active contract stack for one in-flight resolution.
///
/// Mirrors spec.md §4.1: `push`/`pop`/`snapshot`/`try_expand_unions`, with
/// duplicate detection (case-insensitive) on push.
#[derive(Debug, Default, Clone)]
pub struct ContractsList {
    stack: ContractStack,
}

impl ContractsList {
    pub fn new() -> Self {
        Self { stack: ContractStack::new() }
    }

    /// Pushes `names` onto the stack. Fails without mutating the stack if
    /// any name is already present (case-insensitive).
    pub fn push(&mut self, names: &[ContractName]) -> PushResult {
        for n in names {
            if self.stack.iter().any(|existing| existing == n) {
                return PushResult { ok: false, pushed: 0, duplicated: Some(n.clone()) };
            }
        }
        for n in names {
            self.stack.push(n.clone());
        }
        PushResult { ok: true, pushed: names.len(), duplicated: None }
    }

    /// Removes and returns the last `n` entries, in their original order.
    pub fn pop(&mut self, n: usize) -> ContractStack {
        let start = self.stack.len().saturating_sub(n);
        self.stack.split_off(start)
    }

    /// The current stack, oldest first.
    pub fn snapshot(&self) -> ContractStack {
        self.stack.clone()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Finds the maximal trailing run of union contracts and, if non-empty,
    /// pops it and returns the Cartesian product of their member lists as
    /// alternative contract stacks to resolve under, one at a time.
    pub fn try_expand_unions(&mut self, registry: &dyn ConfigurationRegistry) -> Option<ExpansionResult> {
        let mut suffix_len = 0;
        let mut member_lists: Vec<Vec<ContractName>> = Vec::new();
        for c in self.stack.iter().rev() {
            match registry.union_members(c) {
                Some(members) if !members.is_empty() => {
                    member_lists.push(members);
                    suffix_len += 1;
                }
                _ => break,
            }
        }
        if suffix_len == 0 {
            return None;
        }
        // member_lists is innermost-first (closest to the top of the stack
        // first); restore outer-to-inner order for product generation.
        member_lists.reverse();

        let popped_suffix = self.pop(suffix_len);

        let mut alternatives: Vec<ContractStack> = vec![ContractStack::new()];
        for members in &member_lists {
            let mut next = Vec::with_capacity(alternatives.len() * members.len());
            for alt in &alternatives {
                for m in members {
                    let mut combo = alt.clone();
                    combo.push(m.clone());
                    next.push(combo);
                }
            }
            alternatives = next;
        }

        Some(ExpansionResult { popped_suffix, alternatives })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedUnions(Vec<(&'static str, Vec<&'static str>)>);
    impl ConfigurationRegistry for FixedUnions {
        fn get(
            &self,
            _type_ref: crate::service_name::TypeRef,
            _contracts: &[ContractName],
        ) -> (Option<std::sync::Arc<crate::configuration::ServiceConfiguration>>, Vec<ContractName>) {
            (None, Vec::new())
        }

        fn union_members(&self, contract: &ContractName) -> Option<Vec<ContractName>> {
            self.0.iter().find(|(name, _)| *name == contract.as_str()).map(|(_, members)| {
                members.iter().map(|m| ContractName::new(*m).unwrap()).collect()
            })
        }
    }

    fn c(s: &str) -> ContractName {
        ContractName::new(s).unwrap()
    }

    #[test]
    fn push_pop_symmetry() {
        let mut list = ContractsList::new();
        let names = [c("a"), c("b")];
        let res = list.push(&names);
        assert!(res.ok);
        assert_eq!(list.snapshot().len(), 2);
        let popped = list.pop(2);
        assert_eq!(popped.len(), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn push_rejects_duplicate() {
        let mut list = ContractsList::new();
        list.push(&[c("a")]);
        let res = list.push(&[c("A")]);
        assert!(!res.ok);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn expand_union_cartesian_product() {
        let mut list = ContractsList::new();
        list.push(&[c("base"), c("colors")]);
        let unions = FixedUnions(vec![("colors", vec!["red", "blue"])]);
        let expansion = list.try_expand_unions(&unions).expect("union expands");
        assert_eq!(expansion.popped_suffix.len(), 1);
        assert_eq!(expansion.alternatives.len(), 2);
        assert!(list.snapshot().iter().all(|n| n.as_str() == "base"));
    }

    #[test]
    fn no_union_returns_none() {
        let mut list = ContractsList::new();
        list.push(&[c("plain")]);
        let unions = FixedUnions(vec![]);
        assert!(list.try_expand_unions(&unions).is_none());
    }
}
