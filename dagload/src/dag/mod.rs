// src/dag/mod.rs

//! Internal dependency-graph bookkeeping and the priority-ordered ready set.

pub(crate) mod graph;
pub(crate) mod queue;

pub(crate) use graph::{validate_acyclic, JobEntry, JobGraph};
pub(crate) use queue::ReadyQueue;
