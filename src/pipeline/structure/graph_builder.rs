//! Stage 5: lightweight knowledge graph construction.
//!
//! Regex-driven extraction of the entities municipal plans actually name
//! (institutions, programs, indicators, populations, places) into the
//! arena graph, with co-mention edges inside each section. Entity
//! salience is boosted by signal-pack vocabulary when the capability is
//! available; otherwise the built-in vocabulary substitutes and the
//! stage reports itself degraded.

use regex::Regex;

use crate::capability::CapabilitySet;
use crate::graph::EntityKind;
use crate::grid::GridCell;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

struct EntityPattern {
    kind: EntityKind,
    regex: Regex,
}

fn entity_patterns() -> Vec<EntityPattern> {
    // Patterns are static; compilation cannot fail.
    let build = |kind, pattern: &str| EntityPattern {
        kind,
        regex: Regex::new(pattern).unwrap_or_else(|e| unreachable!("static pattern: {e}")),
    };

    vec![
        // Proper-noun tails are matched case-sensitively so entity labels
        // stop at the name instead of swallowing the rest of the sentence.
        build(
            EntityKind::Institution,
            r"\b(?:Secretar[ií]a de(?: [A-ZÁÉÍÓÚÑ][a-záéíóúñü]+)+|Alcald[ií]a [Mm]unicipal|Ministerio de(?: [A-ZÁÉÍÓÚÑ][a-záéíóúñü]+)+|Personer[ií]a [Mm]unicipal|Concejo [Mm]unicipal)",
        ),
        build(
            EntityKind::Program,
            r"(?i)\b(?:programa|proyecto)(?: [a-záéíóúñü0-9]+){1,3}",
        ),
        build(
            EntityKind::Indicator,
            r"(?i)\b(?:tasa|índice|cobertura) de(?: [a-záéíóúñü]+){1,2}|\b\d{1,3}(?:[.,]\d+)?\s*%",
        ),
        build(
            EntityKind::Population,
            r"(?i)\b(?:primera infancia|adultos mayores|población víctima|población rural|mujeres cabeza de hogar|niños, niñas y adolescentes|comunidades indígenas)\b",
        ),
        build(
            EntityKind::Place,
            r"(?i)\b(?:vereda|corregimiento|barrio)(?: [a-záéíóúñü]+){1,2}|\bzona rural\b|\bzona urbana\b",
        ),
    ]
}

/// Trim trailing connector words that greedy patterns drag in.
fn clean_label(raw: &str) -> String {
    let mut label = raw.trim().trim_end_matches([',', ';', ':']).to_string();
    for tail in [" y", " de", " la", " el", " en", " del"] {
        if let Some(stripped) = label.strip_suffix(tail) {
            label = stripped.to_string();
        }
    }
    label.trim().to_string()
}

pub struct KnowledgeGraphBuilder;

impl Stage for KnowledgeGraphBuilder {
    fn name(&self) -> &'static str {
        "knowledge_graph_builder"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        if ctx.sections.is_empty() && ctx.normalized.as_deref().map_or(true, |t| t.is_empty()) {
            // Empty document: an empty graph is a valid outcome.
            tracing::info!("No sections, leaving the knowledge graph empty");
            return Ok(StageStatus::Completed);
        }

        let (pack, degraded) = caps.effective_signals();

        // Union of all cell vocabularies, used for salience weighting.
        let mut vocabulary: Vec<(String, f32)> = Vec::new();
        for cell in GridCell::all() {
            for entry in pack.entries(&cell) {
                vocabulary.push((entry.keyword.to_lowercase(), entry.weight));
            }
        }

        let patterns = entity_patterns();

        for section in &ctx.sections {
            let mut section_nodes: Vec<usize> = Vec::new();

            for pattern in &patterns {
                for m in pattern.regex.find_iter(&section.text) {
                    let label = clean_label(m.as_str());
                    if label.len() < 3 {
                        continue;
                    }

                    let lower = label.to_lowercase();
                    let salience: f32 = vocabulary
                        .iter()
                        .filter(|(kw, _)| lower.contains(kw.as_str()))
                        .map(|(_, w)| *w)
                        .sum();

                    let id = ctx.graph.upsert_node(
                        &label,
                        pattern.kind,
                        section.offset + m.start(),
                        salience,
                    );
                    if !section_nodes.contains(&id) {
                        section_nodes.push(id);
                    }
                }
            }

            // Co-mention edges: chain entities in document order within
            // the section rather than a full pairwise clique.
            for pair in section_nodes.windows(2) {
                let _ = ctx.graph.add_edge(pair[0], pair[1], "co_mentioned");
            }
        }

        tracing::info!(
            nodes = ctx.graph.node_count(),
            edges = ctx.graph.edge_count(),
            degraded,
            "Knowledge graph built"
        );

        if degraded {
            ctx.record_degraded(self.name());
            Ok(StageStatus::Degraded {
                reason: "signal pack unavailable, builtin vocabulary used for salience".into(),
            })
        } else {
            Ok(StageStatus::Completed)
        }
    }
}
