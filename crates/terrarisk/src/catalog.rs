//! Static registries for the workshop: purchasable information layers,
//! PEARC intervention actions, and the ten pre-selected municipalities.
//!
//! Everything here is process-immutable. Catalog order is the deterministic
//! tie-break order used by the ranking and relevance engines.

use serde::{Deserialize, Serialize};

/// Thematic grouping shared by layers and actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerCategory {
    Governance,
    Biodiversity,
    Climate,
    Health,
    Social,
}

impl LayerCategory {
    pub const ALL: [LayerCategory; 5] = [
        LayerCategory::Governance,
        LayerCategory::Biodiversity,
        LayerCategory::Climate,
        LayerCategory::Health,
        LayerCategory::Social,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LayerCategory::Governance => "governance",
            LayerCategory::Biodiversity => "biodiversity",
            LayerCategory::Climate => "climate",
            LayerCategory::Health => "health",
            LayerCategory::Social => "social",
        }
    }
}

/// How a raw indicator value reads: `Protective` means higher is better
/// (governance, biodiversity), `Risk` means higher is worse, `Neutral` is
/// context-only and never enters scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Protective,
    Risk,
    Neutral,
}

/// A purchasable information layer backed by one dataset indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Layer {
    pub id: &'static str,
    pub name: &'static str,
    pub category: LayerCategory,
    pub description: &'static str,
    pub cost: u32,
    /// Canonical dataset column holding this layer's values.
    pub indicator: &'static str,
    pub polarity: Polarity,
    pub is_free: bool,
    /// Whether the layer participates in the platform ranking composite.
    pub in_ranking: bool,
}

pub const LAYERS: [Layer; 16] = [
    Layer {
        id: "governance_climatic",
        name: "Gobernanza Riesgo Climatico",
        category: LayerCategory::Governance,
        description: "Indice UAI de capacidad adaptativa frente al cambio climatico",
        cost: 1,
        indicator: "UAI_Crisk",
        polarity: Polarity::Protective,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "governance_general",
        name: "Gobernanza General",
        category: LayerCategory::Governance,
        description: "Indice UAI general de capacidad institucional",
        cost: 0,
        indicator: "idx_gobernanza_100",
        polarity: Polarity::Protective,
        is_free: true,
        in_ranking: true,
    },
    Layer {
        id: "biodiversity",
        name: "Riqueza de Especies",
        category: LayerCategory::Biodiversity,
        description: "Indice de biodiversidad basado en riqueza de especies",
        cost: 1,
        indicator: "idx_biodiv",
        polarity: Polarity::Protective,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "natural_habitat",
        name: "Habitat Natural",
        category: LayerCategory::Biodiversity,
        description: "Porcentaje de vegetacion natural remanente",
        cost: 1,
        indicator: "forest_cover",
        polarity: Polarity::Protective,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "pollination",
        name: "Deficit de Polinizacion",
        category: LayerCategory::Biodiversity,
        description: "Deficit de servicios de polinizacion agricola",
        cost: 1,
        indicator: "pol_deficit",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: false,
    },
    Layer {
        id: "flooding",
        name: "Riesgo de Inundacion",
        category: LayerCategory::Climate,
        description: "Indice de riesgo de inundaciones",
        cost: 1,
        indicator: "flooding_risks",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "fire_risk",
        name: "Riesgo de Incendio",
        category: LayerCategory::Climate,
        description: "Indice de riesgo de incendios forestales",
        cost: 1,
        indicator: "fire_risk_index",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "hydric_stress",
        name: "Estres Hidrico",
        category: LayerCategory::Climate,
        description: "Indice de estres hidrico por sequia",
        cost: 1,
        indicator: "hydric_stress_risk",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "dengue",
        name: "Incidencia de Dengue",
        category: LayerCategory::Health,
        description: "Tasa de incidencia de dengue por 100,000 hab",
        cost: 1,
        indicator: "incidence_mean_dengue",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "diarrhea",
        name: "Incidencia de Diarrea",
        category: LayerCategory::Health,
        description: "Tasa de hospitalizacion por enfermedades diarreicas",
        cost: 1,
        indicator: "incidence_diarrhea_mean",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "cv_mortality",
        name: "Mortalidad Cardiovascular",
        category: LayerCategory::Health,
        description: "Tasa de mortalidad por enfermedades cardiovasculares",
        cost: 1,
        indicator: "health_death_circ_mean",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "resp_hosp",
        name: "Hospitalizacion Respiratoria",
        category: LayerCategory::Health,
        description: "Tasa de hospitalizacion por enfermedades respiratorias",
        cost: 1,
        indicator: "health_hosp_resp_mean",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "poverty",
        name: "Porcentaje de Pobreza",
        category: LayerCategory::Social,
        description: "Porcentaje de poblacion en situacion de pobreza",
        cost: 1,
        indicator: "pct_pobreza",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
    Layer {
        id: "vulnerability",
        name: "Indice de Vulnerabilidad",
        category: LayerCategory::Social,
        description: "Indice compuesto de vulnerabilidad socioeconomica",
        cost: 0,
        indicator: "idx_vulnerabilidad",
        polarity: Polarity::Risk,
        is_free: true,
        in_ranking: true,
    },
    Layer {
        id: "rural",
        name: "Poblacion Rural",
        category: LayerCategory::Social,
        description: "Porcentaje de poblacion en areas rurales",
        cost: 1,
        indicator: "pct_rural",
        polarity: Polarity::Neutral,
        is_free: false,
        in_ranking: false,
    },
    Layer {
        id: "leishmaniasis",
        name: "Incidencia de Leishmaniasis",
        category: LayerCategory::Health,
        description: "Tasa de incidencia de leishmaniasis visceral",
        cost: 1,
        indicator: "incidence_mean_leishmaniose",
        polarity: Polarity::Risk,
        is_free: false,
        in_ranking: true,
    },
];

/// A PEARC intervention action with weighted evidence links to layers.
/// Weights are 1 (weak) to 3 (strong).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub id: &'static str,
    pub category: LayerCategory,
    pub links: &'static [(&'static str, u8)],
}

impl Action {
    /// Sum of all link weights, the action's maximum possible weighted sum.
    pub fn total_evidence(&self) -> u32 {
        self.links.iter().map(|&(_, w)| u32::from(w)).sum()
    }
}

pub const ACTIONS: [Action; 15] = [
    Action {
        id: "reforestation",
        category: LayerCategory::Biodiversity,
        links: &[
            ("natural_habitat", 3),
            ("biodiversity", 3),
            ("pollination", 3),
            ("fire_risk", 2),
            ("flooding", 2),
            ("resp_hosp", 2),
            ("hydric_stress", 1),
        ],
    },
    Action {
        id: "urban_drainage",
        category: LayerCategory::Climate,
        links: &[("flooding", 3), ("diarrhea", 2), ("cv_mortality", 1)],
    },
    Action {
        id: "vector_surveillance",
        category: LayerCategory::Health,
        links: &[("dengue", 3), ("leishmaniasis", 3)],
    },
    Action {
        id: "water_management",
        category: LayerCategory::Climate,
        links: &[("hydric_stress", 3), ("diarrhea", 2), ("flooding", 1)],
    },
    Action {
        id: "protected_areas",
        category: LayerCategory::Biodiversity,
        links: &[
            ("biodiversity", 3),
            ("natural_habitat", 3),
            ("pollination", 2),
            ("fire_risk", 1),
        ],
    },
    Action {
        id: "climate_agriculture",
        category: LayerCategory::Climate,
        links: &[
            ("fire_risk", 2),
            ("pollination", 2),
            ("hydric_stress", 2),
            ("poverty", 1),
        ],
    },
    Action {
        id: "community_health",
        category: LayerCategory::Health,
        links: &[
            ("cv_mortality", 3),
            ("resp_hosp", 3),
            ("diarrhea", 2),
            ("dengue", 1),
        ],
    },
    Action {
        id: "green_infrastructure",
        category: LayerCategory::Climate,
        links: &[
            ("cv_mortality", 2),
            ("resp_hosp", 2),
            ("flooding", 2),
            ("biodiversity", 1),
        ],
    },
    Action {
        id: "environmental_monitoring",
        category: LayerCategory::Governance,
        links: &[("fire_risk", 2), ("flooding", 2), ("hydric_stress", 2)],
    },
    Action {
        id: "land_use_zoning",
        category: LayerCategory::Governance,
        links: &[
            ("natural_habitat", 3),
            ("fire_risk", 2),
            ("flooding", 2),
            ("biodiversity", 1),
        ],
    },
    Action {
        id: "social_protection",
        category: LayerCategory::Social,
        links: &[
            ("poverty", 3),
            ("vulnerability", 3),
            ("cv_mortality", 1),
            ("diarrhea", 1),
        ],
    },
    Action {
        id: "emergency_response",
        category: LayerCategory::Climate,
        links: &[("flooding", 3), ("fire_risk", 3), ("cv_mortality", 2)],
    },
    Action {
        id: "biodiversity_corridors",
        category: LayerCategory::Biodiversity,
        links: &[
            ("biodiversity", 3),
            ("natural_habitat", 2),
            ("pollination", 2),
            ("leishmaniasis", 1),
        ],
    },
    Action {
        id: "pollution_control",
        category: LayerCategory::Health,
        links: &[("resp_hosp", 3), ("cv_mortality", 2), ("diarrhea", 2)],
    },
    Action {
        id: "climate_education",
        category: LayerCategory::Governance,
        links: &[
            ("governance_general", 2),
            ("governance_climatic", 2),
            ("vulnerability", 1),
        ],
    },
];

/// Governance/biodiversity quadrant a workshop municipality was selected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    pub fn description(self) -> &'static str {
        match self {
            Quadrant::Q1 => "Alta gobernanza, alta biodiversidad",
            Quadrant::Q2 => "Alta gobernanza, baja biodiversidad",
            Quadrant::Q3 => "Baja gobernanza, alta biodiversidad",
            Quadrant::Q4 => "Baja gobernanza, baja biodiversidad",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkshopMunicipality {
    pub name: &'static str,
    pub quadrant: Quadrant,
}

/// The ten municipalities ranked during the workshop, in selection order.
pub const WORKSHOP_MUNICIPALITIES: [WorkshopMunicipality; 10] = [
    WorkshopMunicipality { name: "Iporanga", quadrant: Quadrant::Q3 },
    WorkshopMunicipality { name: "Campinas", quadrant: Quadrant::Q1 },
    WorkshopMunicipality { name: "Santos", quadrant: Quadrant::Q1 },
    WorkshopMunicipality { name: "São Joaquim da Barra", quadrant: Quadrant::Q3 },
    WorkshopMunicipality { name: "Miracatu", quadrant: Quadrant::Q3 },
    WorkshopMunicipality { name: "Eldorado", quadrant: Quadrant::Q4 },
    WorkshopMunicipality { name: "Francisco Morato", quadrant: Quadrant::Q4 },
    WorkshopMunicipality { name: "São Paulo", quadrant: Quadrant::Q1 },
    WorkshopMunicipality { name: "Arujá", quadrant: Quadrant::Q2 },
    WorkshopMunicipality { name: "Cerquilho", quadrant: Quadrant::Q2 },
];

/// Layer id whose raw values drive the high/low vulnerability split.
pub const VULNERABILITY_LAYER: &str = "vulnerability";

pub fn layers() -> &'static [Layer] {
    &LAYERS
}

pub fn layer(id: &str) -> Option<&'static Layer> {
    LAYERS.iter().find(|layer| layer.id == id)
}

pub fn actions() -> &'static [Action] {
    &ACTIONS
}

pub fn action(id: &str) -> Option<&'static Action> {
    ACTIONS.iter().find(|action| action.id == id)
}

pub fn free_layer_ids() -> impl Iterator<Item = &'static str> {
    LAYERS.iter().filter(|layer| layer.is_free).map(|layer| layer.id)
}

/// Layers feeding the risk component of the composite priority score.
pub fn risk_dimensions() -> impl Iterator<Item = &'static Layer> {
    LAYERS
        .iter()
        .filter(|layer| layer.in_ranking && layer.polarity == Polarity::Risk)
}

/// Layers feeding the protective-deficit component.
pub fn protective_dimensions() -> impl Iterator<Item = &'static Layer> {
    LAYERS
        .iter()
        .filter(|layer| layer.in_ranking && layer.polarity == Polarity::Protective)
}

pub fn workshop_municipalities() -> &'static [WorkshopMunicipality] {
    &WORKSHOP_MUNICIPALITIES
}
