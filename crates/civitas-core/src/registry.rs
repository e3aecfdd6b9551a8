//! Building templates.
//!
//! The registry is assembled once through a [`RegistryBuilder`], validated,
//! frozen into a [`Registry`], and handed to the city that uses it. It is
//! never global: two cities may run with different registries.

use crate::fixed::f64_to_fixed64;
use crate::good::Good;
use crate::production::ProductionSpec;
use crate::storage::StorageKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every kind of building the logistics core knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    WheatFarm,
    VegetableFarm,
    FruitFarm,
    OliveFarm,
    GrapeFarm,
    PigFarm,
    ClayPit,
    IronMine,
    TimberLogger,
    MarbleQuarry,
    Pottery,
    Winery,
    Creamery,
    WeaponsWorkshop,
    FurnitureWorkshop,
    Warehouse,
    Granary,
    Market,
}

/// Terrain a building must have within one tile of its footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NearbyTerrain {
    Forest,
    Rock,
    Water,
}

/// What a building does once placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoleSpec {
    Production(ProductionSpec),
    Storage(StorageKind),
    Market,
}

/// A building template definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingTemplate {
    pub kind: BuildingKind,
    pub name: String,
    /// Square footprint edge length in tiles.
    pub size: u32,
    pub max_workers: u32,
    pub role: RoleSpec,
    /// Placing this building without one of these in the city only warns.
    #[serde(default)]
    pub supplier: Option<BuildingKind>,
    #[serde(default)]
    pub needs_nearby: Option<NearbyTerrain>,
}

impl BuildingTemplate {
    pub fn production(&self) -> Option<&ProductionSpec> {
        match &self.role {
            RoleSpec::Production(spec) => Some(spec),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0:?}")]
    NotFound(BuildingKind),
    #[error("building kind registered twice: {0:?}")]
    Duplicate(BuildingKind),
    #[error("{0:?} has an empty footprint")]
    EmptyFootprint(BuildingKind),
    #[error("{kind:?} names unregistered supplier {supplier:?}")]
    UnknownSupplier {
        kind: BuildingKind,
        supplier: BuildingKind,
    },
    #[error("{0:?} consumes the good it produces")]
    SelfConsuming(BuildingKind),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable Registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    templates: Vec<BuildingTemplate>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a list of templates, e.g. loaded from a data file.
    pub fn from_templates(templates: Vec<BuildingTemplate>) -> Self {
        Self { templates }
    }

    /// A builder preloaded with the standard set of buildings.
    pub fn standard() -> Self {
        Self::from_templates(standard_templates())
    }

    pub fn register(&mut self, template: BuildingTemplate) -> &mut Self {
        self.templates.push(template);
        self
    }

    /// Mutate an existing template by kind.
    pub fn mutate<F>(&mut self, kind: BuildingKind, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut BuildingTemplate),
    {
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.kind == kind)
            .ok_or(RegistryError::NotFound(kind))?;
        f(template);
        Ok(())
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut index = HashMap::new();
        for (i, template) in self.templates.iter().enumerate() {
            if index.insert(template.kind, i).is_some() {
                return Err(RegistryError::Duplicate(template.kind));
            }
            if template.size == 0 {
                return Err(RegistryError::EmptyFootprint(template.kind));
            }
            if let Some(spec) = template.production()
                && spec.input == Some(spec.output)
            {
                return Err(RegistryError::SelfConsuming(template.kind));
            }
        }
        for template in &self.templates {
            if let Some(supplier) = template.supplier
                && !index.contains_key(&supplier)
            {
                return Err(RegistryError::UnknownSupplier {
                    kind: template.kind,
                    supplier,
                });
            }
        }

        Ok(Registry {
            templates: self.templates,
            index,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable registry. Frozen after build().
#[derive(Debug, Clone)]
pub struct Registry {
    templates: Vec<BuildingTemplate>,
    index: HashMap<BuildingKind, usize>,
}

impl Registry {
    /// The standard building set.
    pub fn standard() -> Self {
        let templates = standard_templates();
        let index = templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.kind, i))
            .collect();
        Self { templates, index }
    }

    pub fn get(&self, kind: BuildingKind) -> Option<&BuildingTemplate> {
        self.index.get(&kind).map(|&i| &self.templates[i])
    }

    pub fn templates(&self) -> impl Iterator<Item = &BuildingTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The first registered factory kind that consumes `good`.
    pub fn consumer_of(&self, good: Good) -> Option<BuildingKind> {
        self.templates
            .iter()
            .find(|t| t.production().is_some_and(|p| p.input == Some(good)))
            .map(|t| t.kind)
    }
}

// ---------------------------------------------------------------------------
// Standard set
// ---------------------------------------------------------------------------

const DEFAULT_RATE: f64 = 9.6;

/// Collapse check for pits, mines and quarries.
const MINE_UNWORKING_WEEKS: u32 = 12;

fn raw(
    kind: BuildingKind,
    name: &str,
    size: u32,
    output: Good,
    needs_nearby: Option<NearbyTerrain>,
    max_unworking_weeks: u32,
) -> BuildingTemplate {
    let mut spec = ProductionSpec::new(None, output, f64_to_fixed64(DEFAULT_RATE));
    spec.max_unworking_weeks = max_unworking_weeks;
    BuildingTemplate {
        kind,
        name: name.to_string(),
        size,
        max_workers: 10,
        role: RoleSpec::Production(spec),
        supplier: None,
        needs_nearby,
    }
}

fn workshop(
    kind: BuildingKind,
    name: &str,
    input: Good,
    output: Good,
    supplier: BuildingKind,
) -> BuildingTemplate {
    BuildingTemplate {
        kind,
        name: name.to_string(),
        size: 2,
        max_workers: 10,
        role: RoleSpec::Production(ProductionSpec::new(
            Some(input),
            output,
            f64_to_fixed64(DEFAULT_RATE),
        )),
        supplier: Some(supplier),
        needs_nearby: None,
    }
}

fn standard_templates() -> Vec<BuildingTemplate> {
    use BuildingKind as K;

    let mut pig_farm = raw(K::PigFarm, "pig_farm", 3, Good::Meat, None, 0);
    if let RoleSpec::Production(spec) = &mut pig_farm.role {
        spec.shelf_life_days = Some(365);
    }

    vec![
        raw(K::WheatFarm, "wheat_farm", 3, Good::Wheat, None, 0),
        raw(K::VegetableFarm, "vegetable_farm", 3, Good::Vegetable, None, 0),
        raw(K::FruitFarm, "fruit_farm", 3, Good::Fruit, None, 0),
        raw(K::OliveFarm, "olive_farm", 3, Good::Olive, None, 0),
        raw(K::GrapeFarm, "grape_farm", 3, Good::Grape, None, 0),
        pig_farm,
        raw(
            K::ClayPit,
            "clay_pit",
            2,
            Good::Clay,
            Some(NearbyTerrain::Water),
            MINE_UNWORKING_WEEKS,
        ),
        raw(
            K::IronMine,
            "iron_mine",
            2,
            Good::Iron,
            Some(NearbyTerrain::Rock),
            MINE_UNWORKING_WEEKS,
        ),
        raw(
            K::TimberLogger,
            "timber_logger",
            2,
            Good::Timber,
            Some(NearbyTerrain::Forest),
            0,
        ),
        raw(
            K::MarbleQuarry,
            "marble_quarry",
            2,
            Good::Marble,
            Some(NearbyTerrain::Rock),
            MINE_UNWORKING_WEEKS,
        ),
        workshop(K::Pottery, "pottery", Good::Clay, Good::Pottery, K::ClayPit),
        workshop(K::Winery, "winery", Good::Grape, Good::Wine, K::GrapeFarm),
        workshop(K::Creamery, "creamery", Good::Olive, Good::Oil, K::OliveFarm),
        workshop(
            K::WeaponsWorkshop,
            "weapons_workshop",
            Good::Iron,
            Good::Weapon,
            K::IronMine,
        ),
        workshop(
            K::FurnitureWorkshop,
            "furniture_workshop",
            Good::Timber,
            Good::Furniture,
            K::TimberLogger,
        ),
        BuildingTemplate {
            kind: K::Warehouse,
            name: "warehouse".to_string(),
            size: 3,
            max_workers: 6,
            role: RoleSpec::Storage(StorageKind::Warehouse),
            supplier: None,
            needs_nearby: None,
        },
        BuildingTemplate {
            kind: K::Granary,
            name: "granary".to_string(),
            size: 3,
            max_workers: 6,
            role: RoleSpec::Storage(StorageKind::Granary),
            supplier: None,
            needs_nearby: None,
        },
        BuildingTemplate {
            kind: K::Market,
            name: "market".to_string(),
            size: 2,
            max_workers: 5,
            role: RoleSpec::Market,
            supplier: None,
            needs_nearby: None,
        },
    ]
}
