//! The mode labeler (§4.E): density-based clustering of mode positions into crown ids.
//!
//! Follows the conventional DBSCAN state machine (`Unvisited` / `Noise` / assigned to a
//! cluster) seen throughout this ecosystem's clustering code, backed by the same
//! [`UniformGridIndex`](crate::grid_index::UniformGridIndex) the mean-shift engine uses
//! for its neighbor scan, instead of a naive O(N^2) range scan or a second acceleration
//! structure: any two modes within `eps` of each other in 3D are necessarily within
//! `eps` of each other in XY too, so bucketing by XY with `cell_size = eps` and then
//! applying the exact 3D distance test on each candidate is sufficient.

use std::collections::VecDeque;

use crate::grid_index::UniformGridIndex;
use crate::point::Point;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Label {
    Unvisited,
    Noise,
    Cluster(u64),
}

/// Assigns a crown id to each mode in `modes`, per §4.E: two modes share an id iff they
/// are transitively ε-connected via core points (points with `>= min_pts` neighbors
/// within `eps`). Modes unreachable from any core point get id `0` ("noise").
///
/// Ids within the returned vector are already 1-based and dense (no id is skipped): the
/// result assembler (§4.F) only has to offset them to make them globally unique, not
/// compact them.
pub fn label_modes(modes: &[Point], eps: f64, min_pts: usize) -> Vec<u64> {
    let n = modes.len();
    if n == 0 {
        return Vec::new();
    }

    let grid = UniformGridIndex::build(modes.iter().map(|p| (p.x, p.y)), eps);

    let eps_sq = eps * eps;
    let neighbors_of = |i: usize| -> Vec<usize> {
        let q = modes[i];
        let mut found = Vec::new();
        grid.for_each_candidate(q.x, q.y, eps, |j| {
            let p = modes[j as usize];
            let dx = p.x - q.x;
            let dy = p.y - q.y;
            let dz = p.z - q.z;
            if dx * dx + dy * dy + dz * dz <= eps_sq {
                found.push(j as usize);
            }
        });
        found.sort_unstable();
        found
    };

    let mut labels = vec![Label::Unvisited; n];
    let mut next_id = 1u64;

    for i in 0..n {
        if labels[i] != Label::Unvisited {
            continue;
        }

        let seed_neighbors = neighbors_of(i);
        if seed_neighbors.len() < min_pts {
            labels[i] = Label::Noise;
            continue;
        }

        let cluster_id = next_id;
        next_id += 1;
        labels[i] = Label::Cluster(cluster_id);

        let mut queue: VecDeque<usize> = seed_neighbors.into_iter().collect();
        while let Some(q) = queue.pop_front() {
            match labels[q] {
                Label::Noise => labels[q] = Label::Cluster(cluster_id),
                Label::Cluster(_) => {}
                Label::Unvisited => {
                    labels[q] = Label::Cluster(cluster_id);
                    let q_neighbors = neighbors_of(q);
                    if q_neighbors.len() >= min_pts {
                        for r in q_neighbors {
                            if labels[r] == Label::Unvisited {
                                queue.push_back(r);
                            }
                        }
                    }
                }
            }
        }
    }

    log::debug!(
        "mode labeler: {} mode(s) grouped into {} crown(s), {} noise",
        n,
        next_id - 1,
        labels.iter().filter(|l| **l == Label::Noise).count()
    );

    labels
        .into_iter()
        .map(|l| match l {
            Label::Cluster(id) => id,
            _ => 0,
        })
        .collect()
}
