//! The advancing front of a ball pivoting reconstruction
//!
//! The front records every directed edge the growing mesh has produced. An
//! edge starts out [`EdgeState::Active`] and ends either
//! [`EdgeState::Consumed`] (a second triangle closed it) or
//! [`EdgeState::Boundary`] (pivoting around it failed). Terminal states are
//! never reopened, which bounds the total work by the number of triangles.

use crate::geometry::Side;
use pivotcrate_core::Point3f;
use std::collections::HashMap;

/// A directed mesh edge together with the ball that created it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    /// Third vertex of the triangle this edge belongs to
    pub opposite: usize,
    /// Center of the ball resting on that triangle
    pub center: Point3f,
    pub side: Side,
}

impl Edge {
    pub fn new(source: usize, target: usize, opposite: usize, center: Point3f, side: Side) -> Self {
        Self {
            source,
            target,
            opposite,
            center,
            side,
        }
    }

    /// `(source, target)`
    pub fn key(&self) -> (usize, usize) {
        (self.source, self.target)
    }
}

/// Lifecycle of an edge in the front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeState {
    /// Eligible for pivoting
    Active,
    /// Shared by two triangles
    Consumed,
    /// Pivoting failed; the edge borders a hole
    Boundary,
}

impl EdgeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EdgeState::Active)
    }
}

/// Outcome of [`Front::add_edge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsertion {
    /// Inserted as a new active edge
    Added,
    /// The reverse edge was active; both are now consumed
    Merged,
    /// The same directed edge is already recorded; nothing changed
    Duplicate,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    edge: Edge,
    state: EdgeState,
}

/// Registry of directed boundary edges
#[derive(Debug, Clone, Default)]
pub struct Front {
    records: HashMap<(usize, usize), EdgeRecord>,
    /// Active edges, newest last. Entries closed after being pushed are
    /// skipped when popped.
    stack: Vec<(usize, usize)>,
    active: usize,
}

impl Front {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new edge, merging it with its reverse when that one is active
    pub fn add_edge(&mut self, edge: Edge) -> EdgeInsertion {
        let key = edge.key();
        if self.records.contains_key(&key) {
            return EdgeInsertion::Duplicate;
        }

        let reverse = (edge.target, edge.source);
        if let Some(record) = self.records.get_mut(&reverse) {
            debug_assert_eq!(
                record.state,
                EdgeState::Active,
                "edge {:?} glued onto terminal edge {:?}",
                key,
                reverse
            );
            if record.state == EdgeState::Active {
                record.state = EdgeState::Consumed;
                self.active -= 1;
                self.records.insert(
                    key,
                    EdgeRecord {
                        edge,
                        state: EdgeState::Consumed,
                    },
                );
                return EdgeInsertion::Merged;
            }
        }

        self.records.insert(
            key,
            EdgeRecord {
                edge,
                state: EdgeState::Active,
            },
        );
        self.stack.push(key);
        self.active += 1;
        EdgeInsertion::Added
    }

    /// Take the most recently added active edge
    ///
    /// The returned edge stays active until it is passed to
    /// [`Front::mark_consumed`] or [`Front::mark_boundary`].
    pub fn pop_active(&mut self) -> Option<Edge> {
        while let Some(key) = self.stack.pop() {
            if let Some(record) = self.records.get(&key) {
                if record.state == EdgeState::Active {
                    return Some(record.edge);
                }
            }
        }
        None
    }

    /// Close an edge that a pivot could not extend
    pub fn mark_boundary(&mut self, edge: &Edge) {
        self.finish(edge, EdgeState::Boundary);
    }

    /// Close an edge that a pivot extended with a second triangle
    pub fn mark_consumed(&mut self, edge: &Edge) {
        self.finish(edge, EdgeState::Consumed);
    }

    fn finish(&mut self, edge: &Edge, state: EdgeState) {
        match self.records.get_mut(&edge.key()) {
            Some(record) if record.state == EdgeState::Active => {
                record.state = state;
                self.active -= 1;
            }
            other => debug_assert!(
                false,
                "cannot move edge {:?} to {:?} from {:?}",
                edge.key(),
                state,
                other.map(|r| r.state)
            ),
        }
    }

    /// State of the directed edge `source -> target`, if recorded
    pub fn state(&self, source: usize, target: usize) -> Option<EdgeState> {
        self.records.get(&(source, target)).map(|r| r.state)
    }

    /// The recorded edge `source -> target`
    pub fn get(&self, source: usize, target: usize) -> Option<&Edge> {
        self.records.get(&(source, target)).map(|r| &r.edge)
    }

    pub fn contains(&self, source: usize, target: usize) -> bool {
        self.records.contains_key(&(source, target))
    }

    /// Whether a new triangle may introduce the directed edge `source -> target`
    ///
    /// Rejects a second copy of an existing directed edge and any edge whose
    /// reverse is already closed; both would leave an edge with more than
    /// two triangles.
    pub fn is_compatible(&self, source: usize, target: usize) -> bool {
        if self.contains(source, target) {
            return false;
        }
        !matches!(self.state(target, source), Some(state) if state.is_terminal())
    }

    /// Number of edges still eligible for pivoting
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of recorded edges in any state
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Directed edges in the given state, sorted
    pub fn edges_in_state(&self, state: EdgeState) -> Vec<(usize, usize)> {
        let mut edges: Vec<_> = self
            .records
            .iter()
            .filter(|(_, record)| record.state == state)
            .map(|(&key, _)| key)
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        self.edges_in_state(EdgeState::Boundary)
    }

    pub fn consumed_edges(&self) -> Vec<(usize, usize)> {
        self.edges_in_state(EdgeState::Consumed)
    }
}
