//! Arena-style knowledge graph.
//!
//! Nodes and edges live in indexed vectors and reference each other by
//! index, never by direct object links, so entity/relation structures
//! stay cycle-safe under ownership. Chunk back-references are plain
//! chunk-id strings (non-owning lookup only).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Institution,
    Program,
    Indicator,
    Population,
    Place,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
    pub kind: EntityKind,
    /// Offset of the first mention in the normalized document.
    pub first_offset: usize,
    pub mention_count: usize,
    /// Weight contributed by signal vocabulary matches.
    pub salience: f32,
    /// Chunks whose span contains a mention; filled during chunk
    /// generation, lookup only.
    pub chunk_refs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: usize,
    pub from: usize,
    pub to: usize,
    pub relation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Lowercased label → node index, for dedup during construction.
    #[serde(skip)]
    label_index: BTreeMap<String, usize>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node or bump the mention count of an existing one.
    /// Returns the node index either way.
    pub fn upsert_node(
        &mut self,
        label: &str,
        kind: EntityKind,
        offset: usize,
        salience: f32,
    ) -> usize {
        let key = label.to_lowercase();
        if let Some(&id) = self.label_index.get(&key) {
            let node = &mut self.nodes[id];
            node.mention_count += 1;
            node.salience += salience;
            if offset < node.first_offset {
                node.first_offset = offset;
            }
            return id;
        }

        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            id,
            label: label.to_string(),
            kind,
            first_offset: offset,
            mention_count: 1,
            salience,
            chunk_refs: Vec::new(),
        });
        self.label_index.insert(key, id);
        id
    }

    pub fn add_edge(&mut self, from: usize, to: usize, relation: &str) -> Option<usize> {
        if from >= self.nodes.len() || to >= self.nodes.len() {
            return None;
        }
        let id = self.edges.len();
        self.edges.push(GraphEdge {
            id,
            from,
            to,
            relation: relation.to_string(),
        });
        Some(id)
    }

    pub fn node(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [GraphNode] {
        &mut self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes whose first mention lies inside `[start, end)`.
    pub fn nodes_in_span(&self, start: usize, end: usize) -> Vec<&GraphNode> {
        self.nodes
            .iter()
            .filter(|n| n.first_offset >= start && n.first_offset < end)
            .collect()
    }
}
