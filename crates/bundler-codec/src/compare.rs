//! Structural graph comparison
//!
//! Two graphs are isomorphic from given roots when a bijection between their
//! instances maps class tags, uuids and field values onto each other,
//! references included. Round-trip checks use this to verify that a decode
//! reproduces not just values but reference sharing.

use bundler_model::{Graph, InstanceId, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Display, Formatter};

/// First difference found between two graphs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDiff {
    /// Instance on the left
    pub left: InstanceId,
    /// Instance on the right
    pub right: InstanceId,
    /// Field where they differ, if any
    pub field: Option<String>,
    /// What differs
    pub reason: String,
}

impl Display for GraphDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} vs {} at {field}: {}", self.left, self.right, self.reason),
            None => write!(f, "{} vs {}: {}", self.left, self.right, self.reason),
        }
    }
}

/// Compare two graphs from their roots, following every reference
#[must_use]
pub fn diff_graphs(
    left: &Graph,
    left_root: InstanceId,
    right: &Graph,
    right_root: InstanceId,
) -> Option<GraphDiff> {
    Matcher {
        left,
        right,
        forward: HashMap::new(),
        backward: HashMap::new(),
        queue: VecDeque::new(),
    }
    .run(left_root, right_root)
    .err()
}

/// True if the graphs are isomorphic from their roots
#[must_use]
pub fn is_isomorphic(
    left: &Graph,
    left_root: InstanceId,
    right: &Graph,
    right_root: InstanceId,
) -> bool {
    diff_graphs(left, left_root, right, right_root).is_none()
}

struct Matcher<'g> {
    left: &'g Graph,
    right: &'g Graph,
    forward: HashMap<InstanceId, InstanceId>,
    backward: HashMap<InstanceId, InstanceId>,
    queue: VecDeque<(InstanceId, InstanceId)>,
}

impl Matcher<'_> {
    fn run(mut self, left_root: InstanceId, right_root: InstanceId) -> Result<(), GraphDiff> {
        let (left, right) = (self.left, self.right);
        let at = (left_root, right_root);
        self.pair(at, None, left_root, right_root)?;

        while let Some((l, r)) = self.queue.pop_front() {
            let diff = |field: Option<&str>, reason: String| GraphDiff {
                left: l,
                right: r,
                field: field.map(str::to_string),
                reason,
            };
            let (Some(li), Some(ri)) = (left.get(l), right.get(r)) else {
                return Err(diff(None, "instance missing".into()));
            };
            if li.class() != ri.class() {
                return Err(diff(None, format!("class {} vs {}", li.class(), ri.class())));
            }
            if li.uuid() != ri.uuid() {
                return Err(diff(None, "uuid differs".into()));
            }
            if li.fields().len() != ri.fields().len()
                || li.fields().keys().ne(ri.fields().keys())
            {
                return Err(diff(None, "field sets differ".into()));
            }
            for (name, lv) in li.fields() {
                let rv = ri.field(name).unwrap_or(&Value::Null);
                self.values((l, r), name, lv, rv)?;
            }
        }
        Ok(())
    }

    fn pair(
        &mut self,
        at: (InstanceId, InstanceId),
        field: Option<&str>,
        l: InstanceId,
        r: InstanceId,
    ) -> Result<(), GraphDiff> {
        match (self.forward.get(&l), self.backward.get(&r)) {
            (Some(&fr), _) if fr == r => Ok(()),
            (None, None) => {
                self.forward.insert(l, r);
                self.backward.insert(r, l);
                self.queue.push_back((l, r));
                Ok(())
            }
            _ => Err(GraphDiff {
                left: at.0,
                right: at.1,
                field: field.map(str::to_string),
                reason: format!("reference sharing differs ({l} vs {r})"),
            }),
        }
    }

    fn values(
        &mut self,
        at: (InstanceId, InstanceId),
        field: &str,
        lv: &Value,
        rv: &Value,
    ) -> Result<(), GraphDiff> {
        let mismatch = |reason: String| GraphDiff {
            left: at.0,
            right: at.1,
            field: Some(field.to_string()),
            reason,
        };
        match (lv, rv) {
            (Value::Ref(l), Value::Ref(r)) => self.pair(at, Some(field), *l, *r),
            (Value::List(ls), Value::List(rs)) => {
                if ls.len() != rs.len() {
                    return Err(mismatch(format!("list length {} vs {}", ls.len(), rs.len())));
                }
                ls.iter()
                    .zip(rs)
                    .try_for_each(|(l, r)| self.values(at, field, l, r))
            }
            (Value::Map(lm), Value::Map(rm)) => {
                if lm.len() != rm.len() || lm.keys().ne(rm.keys()) {
                    return Err(mismatch("map keys differ".into()));
                }
                lm.values()
                    .zip(rm.values())
                    .try_for_each(|(l, r)| self.values(at, field, l, r))
            }
            (l, r) if l == r => Ok(()),
            (l, r) => Err(mismatch(format!("{l:?} vs {r:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundler_model::Instance;

    fn pair_graph(shared: bool) -> (Graph, InstanceId) {
        let mut graph = Graph::new();
        let root = graph.insert(Instance::new("Node"));
        let a = graph.insert(Instance::new("Leaf").with_field("n", 1i64));
        let b = if shared {
            a
        } else {
            graph.insert(Instance::new("Leaf").with_field("n", 1i64))
        };
        graph.set_field(root, "items", vec![a, b]);
        (graph, root)
    }

    #[test]
    fn identical_graphs_are_isomorphic() {
        let (g1, r1) = pair_graph(true);
        let (g2, r2) = pair_graph(true);
        assert!(is_isomorphic(&g1, r1, &g2, r2));
    }

    #[test]
    fn sharing_is_part_of_the_shape() {
        let (shared, r1) = pair_graph(true);
        let (copied, r2) = pair_graph(false);
        let diff = diff_graphs(&shared, r1, &copied, r2).unwrap();
        assert_eq!(diff.field.as_deref(), Some("items"));
        assert!(diff.reason.contains("reference sharing"));
        assert!(!is_isomorphic(&copied, r2, &shared, r1));
    }

    #[test]
    fn value_differences_are_reported() {
        let (g1, r1) = pair_graph(false);
        let (mut g2, r2) = pair_graph(false);
        let first = g2
            .field(r2, "items")
            .and_then(Value::as_list)
            .and_then(|items| items[0].as_ref_id())
            .unwrap();
        g2.set_field(first, "n", 2i64);
        let diff = diff_graphs(&g1, r1, &g2, r2).unwrap();
        assert_eq!(diff.field.as_deref(), Some("n"));
        assert_eq!(diff.reason, "Int(1) vs Int(2)");
    }

    #[test]
    fn weak_cycles_are_compared_without_looping() {
        let build = || {
            let mut graph = Graph::new();
            let a = graph.insert(Instance::new("Node"));
            let b = graph.insert(Instance::new("Node").with_field("peer", a));
            graph.set_field(a, "peer", b);
            (graph, a)
        };
        let (g1, a1) = build();
        let (g2, a2) = build();
        assert!(is_isomorphic(&g1, a1, &g2, a2));
    }
}
