//! Optional analysis capabilities, probed once per run.
//!
//! The signal pack supplies weighted domain vocabulary per grid cell.
//! Its absence is a normal, non-fatal state: stages fall back to the
//! built-in vocabulary and mark the affected chunks as degraded.
//! Availability is modeled explicitly as an `Unavailable` variant carrying
//! a human-readable reason, never a sentinel or a null.

use serde::Serialize;

use crate::grid::{Dimension, GridCell, PolicyArea};

/// Explicit availability of an optional capability.
#[derive(Debug)]
pub enum Capability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn as_available(&self) -> Option<&T> {
        match self {
            Capability::Available(v) => Some(v),
            Capability::Unavailable { .. } => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Capability::Available(_) => None,
            Capability::Unavailable { reason } => Some(reason),
        }
    }
}

/// One weighted vocabulary entry for a grid cell.
#[derive(Debug, Clone, Serialize)]
pub struct SignalEntry {
    pub keyword: String,
    pub weight: f32,
}

impl SignalEntry {
    pub fn new(keyword: &str, weight: f32) -> Self {
        Self {
            keyword: keyword.to_string(),
            weight,
        }
    }
}

/// Contract for an injected signal pack: lookup from grid cell to
/// weighted keyword entries. Implementations must be read-only for the
/// duration of a run.
pub trait SignalPack {
    /// Human-readable pack name, recorded in package provenance.
    fn name(&self) -> &str;

    /// Weighted entries for one cell. An empty vector is a valid answer
    /// (the cell simply has no dedicated vocabulary in this pack).
    fn entries(&self, cell: &GridCell) -> Vec<SignalEntry>;
}

// ---------------------------------------------------------------------------
// Built-in fallback vocabulary
// ---------------------------------------------------------------------------

/// Compact built-in vocabulary used when no signal pack is injected.
/// Municipal-plan terms, Spanish-first with English equivalents.
pub struct BuiltinSignals;

/// Per-area keywords. Deliberately smaller than a real signal pack:
/// enough to segment, not enough for full coverage scoring.
fn area_keywords(area: PolicyArea) -> &'static [&'static str] {
    match area {
        PolicyArea::SocialProtection => &[
            "pobreza", "vulnerable", "subsidio", "transferencia", "poverty", "welfare",
        ],
        PolicyArea::Health => &[
            "salud", "hospital", "vacunación", "mortalidad", "health", "clinic",
        ],
        PolicyArea::Education => &[
            "educación", "escuela", "docente", "matrícula", "education", "school",
        ],
        PolicyArea::EconomicDevelopment => &[
            "empleo", "emprendimiento", "productividad", "turismo", "employment", "economic",
        ],
        PolicyArea::Infrastructure => &[
            "vía", "acueducto", "alcantarillado", "movilidad", "infraestructura", "road",
        ],
        PolicyArea::Environment => &[
            "ambiente", "ambiental", "clima", "residuos", "reforestación", "environment",
        ],
        PolicyArea::CitizenSecurity => &[
            "seguridad", "convivencia", "delito", "policía", "security", "crime",
        ],
        PolicyArea::Governance => &[
            "gobernanza", "transparencia", "participación", "institucional", "governance",
            "transparency",
        ],
        PolicyArea::GenderEquality => &[
            "mujer", "género", "equidad", "inclusión", "gender", "equality",
        ],
        PolicyArea::Culture => &[
            "cultura", "deporte", "recreación", "patrimonio", "culture", "sport",
        ],
    }
}

/// Per-dimension cue words, shared across areas.
fn dimension_keywords(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::Diagnostic => &[
            "diagnóstico", "línea base", "situación actual", "tasa", "baseline", "current",
        ],
        Dimension::Activities => &[
            "implementar", "ejecutar", "realizar", "construir", "implement", "activities",
        ],
        Dimension::Outputs => &[
            "producto", "entrega", "cobertura", "meta de producto", "output", "delivered",
        ],
        Dimension::Outcomes => &[
            "resultado", "reducción", "aumento", "mejora", "outcome", "improvement",
        ],
        Dimension::Impact => &[
            "impacto", "largo plazo", "transformación", "bienestar", "impact", "long-term",
        ],
        Dimension::CausalTheory => &[
            "porque", "debido a", "con el fin de", "teoría de cambio", "cadena causal",
            "causal",
        ],
    }
}

impl SignalPack for BuiltinSignals {
    fn name(&self) -> &str {
        "builtin-defaults"
    }

    fn entries(&self, cell: &GridCell) -> Vec<SignalEntry> {
        let mut entries: Vec<SignalEntry> = area_keywords(cell.area)
            .iter()
            .map(|k| SignalEntry::new(k, 1.0))
            .collect();
        entries.extend(
            dimension_keywords(cell.dimension)
                .iter()
                .map(|k| SignalEntry::new(k, 0.6)),
        );
        entries
    }
}

// ---------------------------------------------------------------------------
// Capability set
// ---------------------------------------------------------------------------

/// Read-only set of optional capabilities, probed once at run start and
/// shared by all stages. No stage may mutate it.
pub struct CapabilitySet {
    pub signal_pack: Capability<Box<dyn SignalPack + Send + Sync>>,
}

impl CapabilitySet {
    /// Probe capabilities from an optional provider. Logged once; stages
    /// read the result instead of re-probing mid-run.
    pub fn probe(provider: Option<Box<dyn SignalPack + Send + Sync>>) -> Self {
        let signal_pack = match provider {
            Some(pack) => {
                tracing::info!(pack = pack.name(), "Signal pack capability available");
                Capability::Available(pack)
            }
            None => {
                tracing::info!("No signal pack injected, built-in vocabulary will be used");
                Capability::Unavailable {
                    reason: "no signal pack provider injected".to_string(),
                }
            }
        };

        Self { signal_pack }
    }

    /// The signals a stage should use, plus whether it is running degraded.
    /// `degraded == true` means the built-in fallback is substituting for
    /// an absent pack.
    pub fn effective_signals(&self) -> (&dyn SignalPack, bool) {
        match &self.signal_pack {
            Capability::Available(pack) => (pack.as_ref(), false),
            Capability::Unavailable { .. } => (&BuiltinSignals, true),
        }
    }

    /// Short flags describing availability, recorded on checkpoints.
    pub fn flags(&self) -> Vec<String> {
        let flag = if self.signal_pack.is_available() {
            "signal_pack=available"
        } else {
            "signal_pack=unavailable"
        };
        vec![flag.to_string()]
    }

    /// Pack name for provenance metadata.
    pub fn provenance_name(&self) -> String {
        match &self.signal_pack {
            Capability::Available(pack) => pack.name().to_string(),
            Capability::Unavailable { .. } => BuiltinSignals.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCell;

    struct TinyPack;

    impl SignalPack for TinyPack {
        fn name(&self) -> &str {
            "tiny"
        }

        fn entries(&self, _cell: &GridCell) -> Vec<SignalEntry> {
            vec![SignalEntry::new("agua potable", 2.0)]
        }
    }

    #[test]
    fn probe_with_provider_is_available() {
        let caps = CapabilitySet::probe(Some(Box::new(TinyPack)));
        assert!(caps.signal_pack.is_available());
        let (pack, degraded) = caps.effective_signals();
        assert!(!degraded);
        assert_eq!(pack.name(), "tiny");
        assert_eq!(caps.flags(), vec!["signal_pack=available".to_string()]);
    }

    #[test]
    fn probe_without_provider_falls_back() {
        let caps = CapabilitySet::probe(None);
        assert!(!caps.signal_pack.is_available());
        assert!(caps
            .signal_pack
            .unavailable_reason()
            .unwrap()
            .contains("no signal pack"));
        let (pack, degraded) = caps.effective_signals();
        assert!(degraded);
        assert_eq!(pack.name(), "builtin-defaults");
    }

    #[test]
    fn builtin_covers_every_cell() {
        for cell in GridCell::all() {
            let entries = BuiltinSignals.entries(&cell);
            assert!(!entries.is_empty(), "no builtin entries for {}", cell.chunk_id());
            assert!(entries.iter().all(|e| e.weight > 0.0));
        }
    }

    #[test]
    fn builtin_mixes_area_and_dimension_terms() {
        let cell = GridCell::new(PolicyArea::Health, Dimension::Diagnostic);
        let entries = BuiltinSignals.entries(&cell);
        let keywords: Vec<&str> = entries.iter().map(|e| e.keyword.as_str()).collect();
        assert!(keywords.contains(&"salud"));
        assert!(keywords.contains(&"diagnóstico"));
    }
}
