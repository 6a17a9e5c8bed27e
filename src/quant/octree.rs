//! Deterministic octree color quantizer. Builds an 8-level RGB octree over an
//! index arena, collapses the deepest, least-populated branches until the
//! leaf count fits the palette budget, then remaps pixels to leaf averages.
//! Alpha is averaged per leaf alongside the color channels.

use crate::frame::Frame;

const MAX_DEPTH: usize = 8;

#[derive(Default, Clone)]
struct Node {
    children: [Option<usize>; 8],
    count: u64,
    r: u64,
    g: u64,
    b: u64,
    a: u64,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

fn child_index(px: [u8; 4], depth: usize) -> usize {
    let bit = 7 - depth;
    (((px[0] >> bit) & 1) as usize) << 2
        | (((px[1] >> bit) & 1) as usize) << 1
        | ((px[2] >> bit) & 1) as usize
}

struct Octree {
    nodes: Vec<Node>,
    leaves: usize,
}

impl Octree {
    fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            leaves: 0,
        }
    }

    fn insert(&mut self, px: [u8; 4]) {
        let mut id = 0usize;
        for depth in 0..MAX_DEPTH {
            let idx = child_index(px, depth);
            id = match self.nodes[id].children[idx] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[id].children[idx] = Some(child);
                    child
                }
            };
        }
        let node = &mut self.nodes[id];
        if !node.is_leaf() {
            self.leaves += 1;
        }
        node.count += 1;
        node.r += px[0] as u64;
        node.g += px[1] as u64;
        node.b += px[2] as u64;
        node.a += px[3] as u64;
    }

    fn parents_at_depth(&self, target: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if depth == target {
                if self.nodes[id].children.iter().any(|c| c.is_some()) {
                    out.push(id);
                }
                continue;
            }
            for child in self.nodes[id].children.iter().flatten() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }

    fn subtree_count(&self, id: usize) -> u64 {
        let node = &self.nodes[id];
        node.count
            + node
                .children
                .iter()
                .flatten()
                .map(|&c| self.subtree_count(c))
                .sum::<u64>()
    }

    /// Merge leaves bottom-up until at most `max_colors` remain. Parents at
    /// the same depth are folded in ascending pixel-count order so rare
    /// colors merge first, keeping the result stable across runs.
    fn reduce(&mut self, max_colors: usize) {
        for depth in (0..MAX_DEPTH).rev() {
            if self.leaves <= max_colors {
                break;
            }
            let mut parents = self.parents_at_depth(depth);
            parents.sort_by_key(|&id| (self.subtree_count(id), id));

            for id in parents {
                if self.leaves <= max_colors {
                    break;
                }
                let mut folded = 0usize;
                let children = self.nodes[id].children;
                for (slot, child) in children.iter().enumerate() {
                    if let Some(&c) = child.as_ref() {
                        let (count, r, g, b, a, leaf) = {
                            let n = &self.nodes[c];
                            (n.count, n.r, n.g, n.b, n.a, n.is_leaf())
                        };
                        let node = &mut self.nodes[id];
                        node.children[slot] = None;
                        node.count += count;
                        node.r += r;
                        node.g += g;
                        node.b += b;
                        node.a += a;
                        if leaf {
                            folded += 1;
                        }
                    }
                }
                if folded > 0 {
                    self.leaves -= folded;
                    self.leaves += 1;
                }
            }
        }
    }

    fn lookup(&self, px: [u8; 4]) -> [u8; 4] {
        let mut id = 0usize;
        for depth in 0..MAX_DEPTH {
            if self.nodes[id].is_leaf() {
                break;
            }
            match self.nodes[id].children[child_index(px, depth)] {
                Some(child) => id = child,
                None => break,
            }
        }
        let node = &self.nodes[id];
        let n = node.count.max(1);
        [
            (node.r / n) as u8,
            (node.g / n) as u8,
            (node.b / n) as u8,
            (node.a / n) as u8,
        ]
    }
}

/// Remap `frame` to at most `colors` distinct values, in place.
pub(super) fn quantize_frame(frame: &mut Frame, colors: u32) {
    let mut tree = Octree::new();
    for px in frame.data.chunks_exact(4) {
        tree.insert([px[0], px[1], px[2], px[3]]);
    }
    tree.reduce(colors as usize);
    for px in frame.data.chunks_exact_mut(4) {
        let mapped = tree.lookup([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&mapped);
    }
}
