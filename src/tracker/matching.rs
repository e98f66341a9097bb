//! Assignment between last known identity positions and detected regions.

use ndarray::Array2;

use crate::tracker::region::Region;

/// Cost given to pairs beyond the distance gate and to padding cells.
const INFEASIBLE_COST: f64 = 1e6;

/// Up to this many rows the assignment is solved by exhaustive enumeration.
const EXHAUSTIVE_MAX_ROWS: usize = 4;

/// Distances closer than this are treated as equal when breaking ties.
const TIE_EPSILON: f32 = 1e-3;

/// Compute the center-distance matrix between identity regions and detections.
pub fn center_distance(identity_boxes: &[Region], det_boxes: &[Region]) -> Array2<f32> {
    let mut dists = Array2::zeros((identity_boxes.len(), det_boxes.len()));
    for (i, t) in identity_boxes.iter().enumerate() {
        for (j, d) in det_boxes.iter().enumerate() {
            dists[[i, j]] = t.center_distance(d);
        }
    }
    dists
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// A region two rows were equally close to, resolved in favour of `winner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contest {
    pub detection: usize,
    pub winner: usize,
    pub loser: usize,
}

/// Solve the gated assignment and apply the lowest-row tie-break.
///
/// Pairs whose cost exceeds `gate` are never matched. Small problems are
/// enumerated exhaustively; larger ones go through `lapjv`.
pub fn solve(cost_matrix: &Array2<f32>, gate: f32) -> (AssignmentResult, Vec<Contest>) {
    let mut result = if cost_matrix.nrows() <= EXHAUSTIVE_MAX_ROWS {
        exhaustive_assignment(cost_matrix, gate)
    } else {
        linear_assignment(cost_matrix, gate)
    };
    let contests = resolve_ties(cost_matrix, gate, &mut result);
    (result, contests)
}

/// Minimum-cost assignment with the Jonker-Volgenant solver on a padded square matrix.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return unmatched(num_rows, num_cols);
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), INFEASIBLE_COST);

    for i in 0..num_rows {
        for j in 0..num_cols {
            let cost = cost_matrix[[i, j]];
            if cost <= thresh {
                padded[[i, j]] = cost as f64;
            }
        }
    }

    let result = lapjv::lapjv(&padded);
    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match result {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate() {
                if row_idx >= num_rows {
                    continue;
                }
                if col_idx >= num_cols {
                    unmatched_tracks.push(row_idx);
                } else if cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections: collect_unmatched(&unmatched_detections_mask),
    }
}

/// Enumerate every partial one-to-one assignment and keep the cheapest.
///
/// Each unmatched row costs [`INFEASIBLE_COST`], so the winner maximises the
/// number of gated matches first and minimises total distance second. The
/// first optimum found wins, which makes lower rows prefer lower columns.
pub fn exhaustive_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return unmatched(num_rows, num_cols);
    }

    let mut search = Search {
        cost_matrix,
        thresh,
        used: vec![false; num_cols],
        current: vec![None; num_rows],
        best: vec![None; num_rows],
        best_cost: f64::INFINITY,
    };
    search.visit(0, 0.0);

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];
    for (row, col) in search.best.iter().enumerate() {
        match col {
            Some(col) => {
                matches.push((row, *col));
                unmatched_detections_mask[*col] = false;
            }
            None => unmatched_tracks.push(row),
        }
    }

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections: collect_unmatched(&unmatched_detections_mask),
    }
}

struct Search<'a> {
    cost_matrix: &'a Array2<f32>,
    thresh: f32,
    used: Vec<bool>,
    current: Vec<Option<usize>>,
    best: Vec<Option<usize>>,
    best_cost: f64,
}

impl Search<'_> {
    fn visit(&mut self, row: usize, cost: f64) {
        if cost >= self.best_cost {
            return;
        }
        if row == self.current.len() {
            self.best_cost = cost;
            self.best.clone_from(&self.current);
            return;
        }
        for col in 0..self.used.len() {
            let pair = self.cost_matrix[[row, col]];
            if self.used[col] || pair > self.thresh {
                continue;
            }
            self.used[col] = true;
            self.current[row] = Some(col);
            self.visit(row + 1, cost + pair as f64);
            self.used[col] = false;
        }
        self.current[row] = None;
        self.visit(row + 1, cost + INFEASIBLE_COST);
    }
}

/// Hand a contested column to the lowest row that is equally close to it.
///
/// Only unmatched rows can contest a column: swapping them in leaves the total
/// cost unchanged.
fn resolve_ties(cost_matrix: &Array2<f32>, gate: f32, result: &mut AssignmentResult) -> Vec<Contest> {
    let mut contests = Vec::new();
    for m in 0..result.matches.len() {
        let (row, col) = result.matches[m];
        let cost = cost_matrix[[row, col]];
        let rival = result
            .unmatched_tracks
            .iter()
            .copied()
            .filter(|&k| {
                let other = cost_matrix[[k, col]];
                other <= gate && (other - cost).abs() <= TIE_EPSILON
            })
            .min();
        let Some(rival) = rival else {
            continue;
        };
        if rival < row {
            result.matches[m] = (rival, col);
            result.unmatched_tracks.retain(|&k| k != rival);
            result.unmatched_tracks.push(row);
            result.unmatched_tracks.sort_unstable();
            contests.push(Contest {
                detection: col,
                winner: rival,
                loser: row,
            });
        } else {
            contests.push(Contest {
                detection: col,
                winner: row,
                loser: rival,
            });
        }
    }
    contests
}

fn unmatched(num_rows: usize, num_cols: usize) -> AssignmentResult {
    AssignmentResult {
        matches: vec![],
        unmatched_tracks: (0..num_rows).collect(),
        unmatched_detections: (0..num_cols).collect(),
    }
}

fn collect_unmatched(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect()
}
