//! Target node selection strategies

use crate::node::ClusterNode;
use rand::seq::SliceRandom;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks the node a job runs on from a candidate set.
///
/// Implementations must return a member of `nodes`, and `None` only when
/// `nodes` is empty.
pub trait NodeSelector: Send + Sync + Debug {
    fn select<'a>(&self, nodes: &'a [ClusterNode]) -> Option<&'a ClusterNode>;
}

/// Uniform random choice, made independently on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl NodeSelector for RandomSelector {
    fn select<'a>(&self, nodes: &'a [ClusterNode]) -> Option<&'a ClusterNode> {
        nodes.choose(&mut rand::thread_rng())
    }
}

/// Always the first candidate
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstNodeSelector;

impl NodeSelector for FirstNodeSelector {
    fn select<'a>(&self, nodes: &'a [ClusterNode]) -> Option<&'a ClusterNode> {
        nodes.first()
    }
}

/// Cycles through the candidates by position
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    counter: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeSelector for RoundRobinSelector {
    fn select<'a>(&self, nodes: &'a [ClusterNode]) -> Option<&'a ClusterNode> {
        if nodes.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % nodes.len();
        nodes.get(index)
    }
}
