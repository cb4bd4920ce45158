//! 3D force-directed layout
//!
//! Seeded Fruchterman–Reingold spring embedding of the line graph. The
//! output is mean-centered and rescaled into the unit cube; the response
//! assembler scales it into the presentation cube. Seeded RNG makes the
//! embedding deterministic for identical graphs.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::CodeGraph;

/// Default layout parameters, mirroring the front end's expectations.
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_K: f64 = 0.5;
pub const DEFAULT_ITERATIONS: usize = 50;

/// Compute 3D positions for every node of `graph`.
///
/// `k` is the optimal pairwise distance of the spring model. Runtime is
/// O(iterations * n^2), fine for snippet-sized graphs.
pub fn spring_layout_3d(
    graph: &CodeGraph,
    seed: u64,
    k: f64,
    iterations: usize,
) -> HashMap<u32, [f64; 3]> {
    let n = graph.nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut pos: Vec<[f64; 3]> = (0..n)
        .map(|_| [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()])
        .collect();

    // Edges as index pairs; duplicates simply pull twice as hard.
    let springs: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .map(|e| (e.source as usize - 1, e.target as usize - 1))
        .collect();

    // Initial temperature is a tenth of the starting extent, cooled linearly.
    let mut t = 0.1;
    let dt = t / (iterations as f64 + 1.0);

    for _ in 0..iterations {
        let mut disp = vec![[0.0f64; 3]; n];

        // Pairwise repulsion: k^2 / d
        for i in 0..n {
            for j in (i + 1)..n {
                let delta = sub(pos[i], pos[j]);
                let d = norm(delta).max(0.01);
                let force = k * k / (d * d);
                for axis in 0..3 {
                    let push = delta[axis] * force;
                    disp[i][axis] += push;
                    disp[j][axis] -= push;
                }
            }
        }

        // Spring attraction along edges: d^2 / k
        for &(i, j) in &springs {
            if i == j {
                continue;
            }
            let delta = sub(pos[i], pos[j]);
            let d = norm(delta).max(0.01);
            let force = d / k;
            for axis in 0..3 {
                let pull = delta[axis] * force;
                disp[i][axis] -= pull;
                disp[j][axis] += pull;
            }
        }

        // Move each node along its displacement, capped by the temperature.
        for i in 0..n {
            let length = norm(disp[i]).max(0.01);
            let step = length.min(t) / length;
            for axis in 0..3 {
                pos[i][axis] += disp[i][axis] * step;
            }
        }
        t -= dt;
    }

    rescale_unit(&mut pos);

    graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id, pos[i]))
        .collect()
}

/// Mean-center the layout and scale the largest coordinate magnitude to 1.
fn rescale_unit(pos: &mut [[f64; 3]]) {
    let n = pos.len() as f64;
    let mut mean = [0.0f64; 3];
    for p in pos.iter() {
        for axis in 0..3 {
            mean[axis] += p[axis] / n;
        }
    }
    let mut lim = 0.0f64;
    for p in pos.iter_mut() {
        for axis in 0..3 {
            p[axis] -= mean[axis];
            lim = lim.max(p[axis].abs());
        }
    }
    if lim > 0.0 {
        for p in pos.iter_mut() {
            for axis in 0..3 {
                p[axis] /= lim;
            }
        }
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build;

    #[test]
    fn test_position_per_node() {
        let graph = build("x = 1\nprint(x)\ny = x + 1\n").unwrap();
        let pos = spring_layout_3d(&graph, DEFAULT_SEED, DEFAULT_K, DEFAULT_ITERATIONS);
        assert_eq!(pos.len(), graph.nodes.len());
        for p in pos.values() {
            assert!(p.iter().all(|c| c.is_finite()));
            assert!(p.iter().all(|c| c.abs() <= 1.0 + 1e-9));
        }
    }

    #[test]
    fn test_seeded_layout_is_deterministic() {
        let graph = build("for i in range(3):\n    print(i)\n").unwrap();
        let a = spring_layout_3d(&graph, DEFAULT_SEED, DEFAULT_K, DEFAULT_ITERATIONS);
        let b = spring_layout_3d(&graph, DEFAULT_SEED, DEFAULT_K, DEFAULT_ITERATIONS);
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_node_sits_at_origin() {
        let graph = build("x = 1\n").unwrap();
        let pos = spring_layout_3d(&graph, DEFAULT_SEED, DEFAULT_K, DEFAULT_ITERATIONS);
        assert_eq!(pos[&1], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_graph_has_no_positions() {
        let graph = build("").unwrap();
        let pos = spring_layout_3d(&graph, DEFAULT_SEED, DEFAULT_K, DEFAULT_ITERATIONS);
        assert!(pos.is_empty());
    }
}
