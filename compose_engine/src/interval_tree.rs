//! Static interval index over timestamped shapes.
//!
//! Answers "which annotations are visible at time t", in the document
//! order the annotations were given (their z-order), not in interval
//! order. That's the one property a plain sorted-by-begin scan loses and
//! the reason this exists instead of a linear `filter`.
//!
//! Built once from a backing sequence and never mutated afterward — no
//! insert, no remove, matching the "no back-pointers, no shared ownership"
//! design note.

/// Anything with a closed time interval can be indexed.
pub trait Interval {
    fn begin(&self) -> f64;
    fn end(&self) -> f64;
}

impl Interval for types::ShapeAnnotation {
    fn begin(&self) -> f64 {
        self.begin
    }
    fn end(&self) -> f64 {
        self.end
    }
}

struct Node {
    center: f64,
    left: Option<usize>,
    right: Option<usize>,
    /// Indices into `backing` of every interval covering `center`,
    /// ascending by `begin`.
    by_start: Vec<usize>,
    /// Same set, descending by `end`.
    by_end: Vec<usize>,
}

/// A centered interval tree. `query` returns results re-sorted into the
/// original backing order (document order / z-order), which corresponds to
/// building the equivalent JS interval-tree library with its "unique=false,
/// sort=false" result mode disabled: we never want the library's own
/// begin/end ordering, only the caller's insertion order.
pub struct IntervalTree<T> {
    backing: Vec<T>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl<T: Interval> IntervalTree<T> {
    /// Builds the tree. `O(n log n)`.
    #[must_use]
    pub fn build(backing: Vec<T>) -> Self {
        let mut nodes = Vec::new();
        let all_indices: Vec<usize> = (0..backing.len()).collect();
        let root = Self::build_node(&backing, &mut nodes, all_indices);
        Self { backing, nodes, root }
    }

    fn build_node(
        backing: &[T],
        nodes: &mut Vec<Node>,
        mut indices: Vec<usize>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        indices.sort_unstable_by(|&a, &b| {
            backing[a].begin().total_cmp(&backing[b].begin())
        });
        let center = backing[indices[indices.len() / 2]].begin();

        let mut left = Vec::new();
        let mut mid = Vec::new();
        let mut right = Vec::new();
        for idx in indices {
            let iv = &backing[idx];
            if iv.end() < center {
                left.push(idx);
            } else if iv.begin() > center {
                right.push(idx);
            } else {
                mid.push(idx);
            }
        }

        let mut by_start = mid.clone();
        by_start.sort_unstable_by(|&a, &b| {
            backing[a].begin().total_cmp(&backing[b].begin())
        });
        let mut by_end = mid;
        by_end.sort_unstable_by(|&a, &b| {
            backing[b].end().total_cmp(&backing[a].end())
        });

        let left_child = Self::build_node(backing, nodes, left);
        let right_child = Self::build_node(backing, nodes, right);

        nodes.push(Node {
            center,
            left: left_child,
            right: right_child,
            by_start,
            by_end,
        });
        Some(nodes.len() - 1)
    }

    /// Every interval whose closed `[begin, end]` contains `t`, in document
    /// order. `O(log n + k)` tree descent plus an `O(k log k)` sort to
    /// restore document order across the (at most `O(log n)`) nodes
    /// visited.
    #[must_use]
    pub fn query(&self, t: f64) -> Vec<&T> {
        let mut hits = Vec::new();
        self.query_node(self.root, t, &mut hits);
        hits.sort_unstable();
        hits.into_iter().map(|idx| &self.backing[idx]).collect()
    }

    fn query_node(&self, node: Option<usize>, t: f64, hits: &mut Vec<usize>) {
        let Some(node_idx) = node else { return };
        let node = &self.nodes[node_idx];

        match t.total_cmp(&node.center) {
            std::cmp::Ordering::Equal => {
                hits.extend_from_slice(&node.by_start);
            }
            std::cmp::Ordering::Less => {
                for &idx in &node.by_start {
                    if self.backing[idx].begin() <= t {
                        hits.push(idx);
                    } else {
                        break;
                    }
                }
                self.query_node(node.left, t, hits);
            }
            std::cmp::Ordering::Greater => {
                for &idx in &node.by_end {
                    if self.backing[idx].end() >= t {
                        hits.push(idx);
                    } else {
                        break;
                    }
                }
                self.query_node(node.right, t, hits);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backing.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ShapeAnnotation;

    fn shape(begin: f64, end: f64, id: &str) -> ShapeAnnotation {
        ShapeAnnotation::new(begin, end, format!("<g/>"), id.to_string())
    }

    #[test]
    fn query_preserves_document_order() {
        // Document order A, B, C; B and C overlap A's tail.
        let tree = IntervalTree::build(vec![
            shape(0.0, 10.0, "a"),
            shape(3.0, 8.0, "b"),
            shape(1.0, 5.0, "c"),
        ]);

        let hits: Vec<&str> =
            tree.query(4.0).into_iter().map(|s| s.id.as_str()).collect();
        assert_eq!(hits, vec!["a", "b", "c"]);
    }

    #[test]
    fn query_excludes_non_overlapping() {
        let tree = IntervalTree::build(vec![
            shape(1.0, 5.0, "a"),
            shape(3.0, 8.0, "b"),
        ]);

        let hits: Vec<&str> =
            tree.query(6.0).into_iter().map(|s| s.id.as_str()).collect();
        assert_eq!(hits, vec!["b"]);
    }

    #[test]
    fn query_at_exact_boundaries_is_inclusive() {
        let tree = IntervalTree::build(vec![shape(1.0, 5.0, "a")]);
        assert_eq!(tree.query(1.0).len(), 1);
        assert_eq!(tree.query(5.0).len(), 1);
        assert!(tree.query(0.999).is_empty());
        assert!(tree.query(5.001).is_empty());
    }

    #[test]
    fn larger_fixture_preserves_z_order_under_many_overlaps() {
        let shapes: Vec<_> = (0..50)
            .map(|i| shape(f64::from(i), f64::from(i + 20), &i.to_string()))
            .collect();
        let tree = IntervalTree::build(shapes);
        let hits = tree.query(30.0);
        let ids: Vec<i32> =
            hits.iter().map(|s| s.id.parse().unwrap()).collect();
        let mut sorted_ids = ids.clone();
        sorted_ids.sort_unstable();
        assert_eq!(ids, sorted_ids, "hits must come back in document order");
        assert!(ids.contains(&11));
        assert!(ids.contains(&30));
        assert!(!ids.contains(&10));
    }
}
