//! The solution table: every instance's placements, read from and written to
//! CSV.
//!
//! Format: header `id,x,y,deg`; one row per placement, id `"<NNN>_<index>"`
//! with the instance id zero-padded to three digits; values carry an `s`
//! prefix, which is optional on read. Values are written in the shortest
//! form that parses back to the same `f64`.

use crate::error::SolutionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tree_packing_d2::{Instance, Placement};

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    id: String,
    x: String,
    y: String,
    deg: String,
}

/// Process-wide map from instance id to its current placements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    instances: BTreeMap<usize, Instance>,
}

impl Solution {
    /// Creates an empty solution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a solution from instances. Later duplicates replace earlier ones.
    pub fn from_instances<I: IntoIterator<Item = Instance>>(instances: I) -> Self {
        let mut solution = Self::new();
        for instance in instances {
            solution.insert(instance);
        }
        solution
    }

    /// Inserts an instance, returning the one it replaced.
    pub fn insert(&mut self, instance: Instance) -> Option<Instance> {
        self.instances.insert(instance.id(), instance)
    }

    /// Instance with the given id.
    pub fn get(&self, id: usize) -> Option<&Instance> {
        self.instances.get(&id)
    }

    /// Instance ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.instances.keys().copied()
    }

    /// Instances in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if there are no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Replaces the placements of instance `id`.
    pub fn replace(&mut self, id: usize, placements: Vec<Placement>) -> Result<(), SolutionError> {
        match self.instances.get_mut(&id) {
            Some(instance) => Ok(instance.replace_placements(placements)?),
            None => {
                self.instances.insert(id, Instance::new(id, placements)?);
                Ok(())
            }
        }
    }

    /// Sum of `side^2 / n` over all instances. Lower is better.
    pub fn total_score(&self) -> f64 {
        self.instances.values().map(Instance::score_contribution).sum()
    }

    /// Parses a solution table.
    pub fn read_csv<R: io::Read>(reader: R) -> Result<Self, SolutionError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut groups: BTreeMap<usize, Vec<(usize, Placement)>> = BTreeMap::new();

        for (i, record) in rdr.deserialize::<Row>().enumerate() {
            let row = i + 1;
            let record = record?;
            let (instance_id, index) = parse_id(&record.id).ok_or_else(|| {
                SolutionError::MalformedId {
                    row,
                    id: record.id.clone(),
                }
            })?;
            let x = parse_value(row, "x", &record.x)?;
            let y = parse_value(row, "y", &record.y)?;
            let deg = parse_value(row, "deg", &record.deg)?;
            let placement = Placement::try_new(x, y, deg)?;
            groups.entry(instance_id).or_default().push((index, placement));
        }

        let mut solution = Self::new();
        for (id, mut rows) in groups {
            rows.sort_by_key(|(index, _)| *index);
            if rows.iter().enumerate().any(|(k, (index, _))| k != *index) {
                return Err(SolutionError::IndexMismatch {
                    id,
                    found: rows.len(),
                });
            }
            let placements = rows.into_iter().map(|(_, p)| p).collect();
            solution.insert(Instance::new(id, placements)?);
        }
        Ok(solution)
    }

    /// Loads a solution file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SolutionError> {
        let file = File::open(path)?;
        Self::read_csv(io::BufReader::new(file))
    }

    /// Writes the full table, instances ascending, placements by index.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), SolutionError> {
        let mut wtr = csv::Writer::from_writer(writer);
        for instance in self.instances.values() {
            for (index, placement) in instance.placements().iter().enumerate() {
                let (x, y) = placement.center();
                wtr.serialize(Row {
                    id: format!("{:03}_{}", instance.id(), index),
                    x: format_value(x),
                    y: format_value(y),
                    deg: format_value(placement.angle_deg()),
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Serializes to a sibling temporary file and renames it over `path`,
    /// so readers never observe a partial table.
    pub fn save_atomic(&self, path: impl AsRef<Path>) -> Result<(), SolutionError> {
        let path = path.as_ref();
        let tmp = temp_path(path);

        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;

        let mut file = File::create(&tmp)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, path).map_err(|source| SolutionError::Persist {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "solution.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_id(id: &str) -> Option<(usize, usize)> {
    let (instance, index) = id.split_once('_')?;
    Some((instance.parse().ok()?, index.parse().ok()?))
}

fn parse_value(row: usize, column: &'static str, raw: &str) -> Result<f64, SolutionError> {
    let trimmed = raw.strip_prefix('s').unwrap_or(raw);
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SolutionError::InvalidValue {
            row,
            column,
            value: raw.to_string(),
        }),
    }
}

fn format_value(v: f64) -> String {
    format!("s{}", v)
}
