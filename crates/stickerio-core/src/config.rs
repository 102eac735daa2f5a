//! Game Balance Configuration
//!
//! Per-resource trickle rates, per-unit stats and per-building level tables,
//! loaded once from TOML and shared read-only for the process lifetime.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use stickerio_events::{
    BuildingName, Count, Epoch, Level, ResourceCounts, ResourceName, StatName, UnitName,
};

/// Errors that can occur while loading or validating a game config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read game config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse game config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize game config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(
        "building {building} has {multipliers} multipliers, {costs} upgrade costs and \
         {durations} upgrade durations for max level {max_level}"
    )]
    LevelTables {
        building: BuildingName,
        max_level: Level,
        multipliers: usize,
        costs: usize,
        durations: usize,
    },
    #[error("unit {unit} must have a positive speed, got {speed}")]
    NonPositiveSpeed { unit: UnitName, speed: f64 },
    #[error("{owner} references unknown {kind} `{name}`")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        name: String,
    },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: f64 },
}

/// Resource production settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Base production per second before building multipliers
    pub trickle_per_sec: f64,
}

/// Unit stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Grid cells per second
    pub speed: f64,
    /// Training time per unit before multipliers
    pub production_sec: Epoch,
    /// Resources one unit can carry
    pub carry_capacity: Count,
    #[serde(default)]
    pub cost: ResourceCounts,
    /// Combat power per stat
    #[serde(default)]
    pub combat: BTreeMap<StatName, Count>,
}

/// Building level tables.
///
/// `multiplier` is indexed by level (level 0 included); `upgrade_cost` and
/// `upgrade_sec` are indexed by `target_level - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    pub max_level: Level,
    pub multiplier: Vec<f64>,
    pub upgrade_cost: Vec<ResourceCounts>,
    pub upgrade_sec: Vec<Epoch>,
    #[serde(default)]
    pub boosts_resources: BTreeSet<ResourceName>,
    #[serde(default)]
    pub trains_units: BTreeSet<UnitName>,
    #[serde(default)]
    pub speeds_construction: BTreeSet<BuildingName>,
}

impl BuildingSpec {
    /// Multiplier at a level; levels past the table use the last entry.
    pub fn multiplier_at(&self, level: Level) -> f64 {
        if self.multiplier.is_empty() {
            return 1.0;
        }
        let index = usize::try_from(level.max(0)).unwrap_or(usize::MAX);
        self.multiplier
            .get(index)
            .or_else(|| self.multiplier.last())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn upgrade_cost_for(&self, target_level: Level) -> Option<&ResourceCounts> {
        let index = usize::try_from(target_level - 1).ok()?;
        self.upgrade_cost.get(index)
    }

    pub fn upgrade_sec_for(&self, target_level: Level) -> Option<Epoch> {
        let index = usize::try_from(target_level - 1).ok()?;
        self.upgrade_sec.get(index).copied()
    }
}

/// Precomputed lookups derived from the balance tables
#[derive(Debug, Clone, Default, PartialEq)]
struct LookupTables {
    units_by_speed: Vec<UnitName>,
    resource_boosters: BTreeMap<ResourceName, Vec<BuildingName>>,
    training_boosters: BTreeMap<UnitName, Vec<BuildingName>>,
    construction_boosters: BTreeMap<BuildingName, Vec<BuildingName>>,
}

/// Complete game-balance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Fraction of free carry capacity a forage can fill at most
    pub foraging_coefficient: f64,
    /// Lower bound of the random efficiency applied to each combat term
    pub combat_efficiency: f64,
    pub resources: BTreeMap<ResourceName, ResourceSpec>,
    pub units: BTreeMap<UnitName, UnitSpec>,
    pub buildings: BTreeMap<BuildingName, BuildingSpec>,
    #[serde(skip)]
    tables: LookupTables,
}

impl Default for GameConfig {
    fn default() -> Self {
        let resources = BTreeMap::from([
            resource("sticks", 1.0),
            resource("circles", 0.25),
        ]);

        let units = BTreeMap::from([
            (
                "stickmen".to_string(),
                UnitSpec {
                    speed: 2.0,
                    production_sec: 30,
                    carry_capacity: 10,
                    cost: counts(&[("sticks", 10)]),
                    combat: counts(&[("melee", 1)]),
                },
            ),
            (
                "swordsmen".to_string(),
                UnitSpec {
                    speed: 1.0,
                    production_sec: 90,
                    carry_capacity: 5,
                    cost: counts(&[("sticks", 20), ("circles", 10)]),
                    combat: counts(&[("armor", 1), ("melee", 3)]),
                },
            ),
        ]);

        let buildings = BTreeMap::from([
            (
                "mines".to_string(),
                BuildingSpec {
                    max_level: 3,
                    multiplier: vec![1.0, 1.5, 2.0, 3.0],
                    upgrade_cost: vec![
                        counts(&[("sticks", 50)]),
                        counts(&[("circles", 20), ("sticks", 150)]),
                        counts(&[("circles", 100), ("sticks", 400)]),
                    ],
                    upgrade_sec: vec![60, 300, 900],
                    boosts_resources: names(&["circles", "sticks"]),
                    trains_units: BTreeSet::new(),
                    speeds_construction: BTreeSet::new(),
                },
            ),
            (
                "barracks".to_string(),
                BuildingSpec {
                    max_level: 3,
                    multiplier: vec![1.0, 0.9, 0.8, 0.75],
                    upgrade_cost: vec![
                        counts(&[("sticks", 80)]),
                        counts(&[("circles", 40), ("sticks", 200)]),
                        counts(&[("circles", 150), ("sticks", 500)]),
                    ],
                    upgrade_sec: vec![120, 480, 1200],
                    boosts_resources: BTreeSet::new(),
                    trains_units: names(&["stickmen", "swordsmen"]),
                    speeds_construction: BTreeSet::new(),
                },
            ),
            (
                "workshop".to_string(),
                BuildingSpec {
                    max_level: 2,
                    multiplier: vec![1.0, 0.8, 0.6],
                    upgrade_cost: vec![
                        counts(&[("sticks", 60)]),
                        counts(&[("circles", 30), ("sticks", 180)]),
                    ],
                    upgrade_sec: vec![90, 600],
                    boosts_resources: BTreeSet::new(),
                    trains_units: BTreeSet::new(),
                    speeds_construction: names(&["barracks", "mines", "workshop"]),
                },
            ),
        ]);

        Self {
            foraging_coefficient: 0.5,
            combat_efficiency: 0.8,
            resources,
            units,
            buildings,
            tables: LookupTables::default(),
        }
        .with_tables()
    }
}

impl GameConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config.with_tables())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks table lengths, ranges and cross references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("combat_efficiency", self.combat_efficiency, 0.0, 1.0)?;
        check_range("foraging_coefficient", self.foraging_coefficient, 0.0, f64::MAX)?;

        for (name, spec) in &self.resources {
            check_range(
                &format!("resources.{name}.trickle_per_sec"),
                spec.trickle_per_sec,
                0.0,
                f64::MAX,
            )?;
        }

        for (name, spec) in &self.units {
            if !(spec.speed.is_finite() && spec.speed > 0.0) {
                return Err(ConfigError::NonPositiveSpeed {
                    unit: name.clone(),
                    speed: spec.speed,
                });
            }
            self.check_resources(&format!("unit {name}"), spec.cost.keys())?;
            check_non_negative(&format!("units.{name}.production_sec"), spec.production_sec)?;
            check_non_negative(&format!("units.{name}.carry_capacity"), spec.carry_capacity)?;
            for (resource, amount) in &spec.cost {
                check_non_negative(&format!("units.{name}.cost.{resource}"), *amount)?;
            }
            for (stat, power) in &spec.combat {
                check_non_negative(&format!("units.{name}.combat.{stat}"), *power)?;
            }
        }

        for (name, spec) in &self.buildings {
            let levels = usize::try_from(spec.max_level).unwrap_or(usize::MAX);
            if spec.multiplier.len() != levels.saturating_add(1)
                || spec.upgrade_cost.len() != levels
                || spec.upgrade_sec.len() != levels
            {
                return Err(ConfigError::LevelTables {
                    building: name.clone(),
                    max_level: spec.max_level,
                    multipliers: spec.multiplier.len(),
                    costs: spec.upgrade_cost.len(),
                    durations: spec.upgrade_sec.len(),
                });
            }
            let owner = format!("building {name}");
            for (index, multiplier) in spec.multiplier.iter().enumerate() {
                check_range(
                    &format!("buildings.{name}.multiplier[{index}]"),
                    *multiplier,
                    0.0,
                    f64::MAX,
                )?;
            }
            for (index, cost) in spec.upgrade_cost.iter().enumerate() {
                self.check_resources(&owner, cost.keys())?;
                for (resource, amount) in cost {
                    check_non_negative(
                        &format!("buildings.{name}.upgrade_cost[{index}].{resource}"),
                        *amount,
                    )?;
                }
            }
            for (index, seconds) in spec.upgrade_sec.iter().enumerate() {
                check_non_negative(&format!("buildings.{name}.upgrade_sec[{index}]"), *seconds)?;
            }
            self.check_resources(&owner, spec.boosts_resources.iter())?;
            for unit in &spec.trains_units {
                if !self.units.contains_key(unit) {
                    return Err(unknown(&owner, "unit", unit));
                }
            }
            for building in &spec.speeds_construction {
                if !self.buildings.contains_key(building) {
                    return Err(unknown(&owner, "building", building));
                }
            }
        }
        Ok(())
    }

    fn check_resources<'a>(
        &self,
        owner: &str,
        names: impl Iterator<Item = &'a ResourceName>,
    ) -> Result<(), ConfigError> {
        for name in names {
            if !self.resources.contains_key(name) {
                return Err(unknown(owner, "resource", name));
            }
        }
        Ok(())
    }

    /// Rebuilds the derived lookup tables.
    fn with_tables(mut self) -> Self {
        let mut units_by_speed: Vec<UnitName> = self.units.keys().cloned().collect();
        units_by_speed.sort_by(|a, b| {
            self.units[a]
                .speed
                .total_cmp(&self.units[b].speed)
                .then_with(|| a.cmp(b))
        });

        let mut tables = LookupTables {
            units_by_speed,
            ..LookupTables::default()
        };
        for resource in self.resources.keys() {
            tables.resource_boosters.insert(
                resource.clone(),
                self.buildings
                    .iter()
                    .filter(|(_, spec)| spec.boosts_resources.contains(resource))
                    .map(|(name, _)| name.clone())
                    .collect(),
            );
        }
        for unit in self.units.keys() {
            tables.training_boosters.insert(
                unit.clone(),
                self.buildings
                    .iter()
                    .filter(|(_, spec)| spec.trains_units.contains(unit))
                    .map(|(name, _)| name.clone())
                    .collect(),
            );
        }
        for target in self.buildings.keys() {
            tables.construction_boosters.insert(
                target.clone(),
                self.buildings
                    .iter()
                    .filter(|(_, spec)| spec.speeds_construction.contains(target))
                    .map(|(name, _)| name.clone())
                    .collect(),
            );
        }
        self.tables = tables;
        self
    }

    pub fn unit(&self, name: &str) -> Option<&UnitSpec> {
        self.units.get(name)
    }

    pub fn building(&self, name: &str) -> Option<&BuildingSpec> {
        self.buildings.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.get(name)
    }

    /// Unit types from slowest to fastest
    pub fn units_by_speed(&self) -> &[UnitName] {
        &self.tables.units_by_speed
    }

    /// Buildings whose multiplier boosts a resource's trickle
    pub fn resource_boosters(&self, resource: &str) -> &[BuildingName] {
        lookup(&self.tables.resource_boosters, resource)
    }

    /// Buildings whose multiplier scales a unit's training time
    pub fn training_boosters(&self, unit: &str) -> &[BuildingName] {
        lookup(&self.tables.training_boosters, unit)
    }

    /// Buildings whose multiplier scales a building's upgrade time
    pub fn construction_boosters(&self, building: &str) -> &[BuildingName] {
        lookup(&self.tables.construction_boosters, building)
    }

    /// Multiplier of a building at a level (1.0 for unknown buildings)
    pub fn building_multiplier(&self, building: &str, level: Level) -> f64 {
        self.building(building)
            .map(|spec| spec.multiplier_at(level))
            .unwrap_or(1.0)
    }
}

fn lookup<'a>(table: &'a BTreeMap<String, Vec<BuildingName>>, key: &str) -> &'a [BuildingName] {
    table.get(key).map(Vec::as_slice).unwrap_or(&[])
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

fn check_non_negative(field: &str, value: i64) -> Result<(), ConfigError> {
    if value >= 0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value: value as f64,
        })
    }
}

fn unknown(owner: &str, kind: &'static str, name: &str) -> ConfigError {
    ConfigError::UnknownReference {
        owner: owner.to_string(),
        kind,
        name: name.to_string(),
    }
}

fn resource(name: &str, trickle_per_sec: f64) -> (ResourceName, ResourceSpec) {
    (name.to_string(), ResourceSpec { trickle_per_sec })
}

fn counts(entries: &[(&str, Count)]) -> BTreeMap<String, Count> {
    entries
        .iter()
        .map(|(name, count)| (name.to_string(), *count))
        .collect()
}

fn names(entries: &[&str]) -> BTreeSet<String> {
    entries.iter().map(|name| name.to_string()).collect()
}
