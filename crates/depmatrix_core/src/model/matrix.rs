//! Dependency matrix model.
//!
//! # Responsibility
//! - Hold the triangular dependency structure between named attributes.
//! - Compute row, column and category totals from scratch on demand.
//! - Apply the four in-place mutations: toggle, add, remove, rename.
//!
//! # Invariants
//! - Row ids are unique and positive.
//! - Every row has a mirrored column with the same id (and vice versa).
//! - Only upper-triangle cells (`row < column`) are editable or counted.
//! - Dependency keys reference only ids currently present in the matrix.
//! - Rows and columns stay sorted ascending by id after every insertion.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Identifier of one matrix axis element (row and mirrored column).
pub type AttributeId = u32;

/// Category used when the seed rows are generated.
pub const DEFAULT_CATEGORY: &str = "Technical/Ops";

const SEED_ATTRIBUTES: &[(AttributeId, &str)] = &[
    (1, "Availability"),
    (2, "Preference for long term strategy"),
    (3, "Logistic"),
];

/// Errors raised by matrix mutations and invariant checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// Explicitly requested attribute id collides with an existing row.
    #[error("attribute id {0} is already in use")]
    DuplicateId(AttributeId),
    /// Attribute ids must be positive.
    #[error("attribute id must be positive, got {0}")]
    InvalidAttributeId(AttributeId),
    /// Referenced attribute is not a row of this matrix.
    #[error("attribute not found: {0}")]
    AttributeNotFound(AttributeId),
    /// Diagonal and lower-triangle cells are fixed.
    #[error("cell {0} is outside the editable upper triangle")]
    CellNotEditable(CellKey),
    /// No id above the current maximum is representable.
    #[error("attribute id space exhausted after {0}")]
    IdSpaceExhausted(AttributeId),
    /// Structural invariant violated (mirroring, dangling dependency keys).
    #[error("inconsistent matrix: {0}")]
    Inconsistent(String),
}

/// One matrix row: a named attribute and its grouping category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub category: String,
}

impl Attribute {
    pub fn new(id: AttributeId, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category: category.into(),
        }
    }
}

/// One matrix column. Name is always the decimal form of the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: AttributeId,
    pub name: String,
}

impl Column {
    /// Builds the column mirroring the row with `id`.
    pub fn mirror(id: AttributeId) -> Self {
        Self {
            id,
            name: id.to_string(),
        }
    }
}

/// Composite cell address, serialized as `"{row}_{column}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub row: AttributeId,
    pub column: AttributeId,
}

impl CellKey {
    pub fn new(row: AttributeId, column: AttributeId) -> Self {
        Self { row, column }
    }

    /// Returns whether this cell lies in the editable, countable region.
    pub fn is_upper_triangle(self) -> bool {
        self.row < self.column
    }

    /// Returns whether `id` appears on either side of the key.
    pub fn references(self, id: AttributeId) -> bool {
        self.row == id || self.column == id
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.row, self.column)
    }
}

/// Cell key parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cell key `{0}`; expected `<rowId>_<colId>`")]
pub struct CellKeyParseError(pub String);

impl FromStr for CellKey {
    type Err = CellKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || CellKeyParseError(value.to_string());
        let (row, column) = value.split_once('_').ok_or_else(invalid)?;
        Ok(Self {
            row: parse_key_component(row).ok_or_else(invalid)?,
            column: parse_key_component(column).ok_or_else(invalid)?,
        })
    }
}

// Decimal, positive, no sign and no leading zeros.
fn parse_key_component(value: &str) -> Option<AttributeId> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    if value.starts_with('0') {
        return None;
    }
    value.parse().ok()
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Sparse dependency map. Only cells marked `true` are stored.
///
/// Wire shape is an object of `"{row}_{column}": true` entries. Entries
/// decoded as `false` are dropped since absence already means "no
/// dependency". Lower-triangle keys survive decoding but are never read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    marked: BTreeSet<CellKey>,
}

impl Dependencies {
    pub fn contains(&self, key: CellKey) -> bool {
        self.marked.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    /// Iterates marked keys in ascending `(row, column)` order.
    pub fn iter(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.marked.iter().copied()
    }
}

impl FromIterator<CellKey> for Dependencies {
    fn from_iter<I: IntoIterator<Item = CellKey>>(iter: I) -> Self {
        Self {
            marked: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Dependencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.marked.iter().map(|key| (key, true)))
    }
}

impl<'de> Deserialize<'de> for Dependencies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<CellKey, bool>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(key, marked)| marked.then_some(key))
            .collect())
    }
}

/// Derived aggregates. Every known row, column and category has an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixTotals {
    pub row_totals: BTreeMap<AttributeId, u32>,
    pub column_totals: BTreeMap<AttributeId, u32>,
    pub category_totals: BTreeMap<String, u32>,
}

impl MatrixTotals {
    pub fn row(&self, id: AttributeId) -> u32 {
        self.row_totals.get(&id).copied().unwrap_or(0)
    }

    pub fn column(&self, id: AttributeId) -> u32 {
        self.column_totals.get(&id).copied().unwrap_or(0)
    }

    pub fn category(&self, category: &str) -> u32 {
        self.category_totals.get(category).copied().unwrap_or(0)
    }

    /// Number of counted dependencies across the whole matrix.
    pub fn grand_total(&self) -> u32 {
        self.row_totals.values().sum()
    }
}

/// Rows sharing one category, in matrix order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup<'a> {
    pub category: &'a str,
    pub rows: Vec<&'a Attribute>,
}

/// Triangular dependency matrix over a mirrored attribute axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    rows: Vec<Attribute>,
    columns: Vec<Column>,
    #[serde(default)]
    dependencies: Dependencies,
}

impl Matrix {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matrix from rows, mirroring columns and sorting by id.
    ///
    /// # Errors
    /// - `InvalidAttributeId` for id `0`.
    /// - `DuplicateId` when two attributes share an id.
    pub fn from_attributes(
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Result<Self, MatrixError> {
        let mut matrix = Self::new();
        for attribute in attributes {
            if attribute.id == 0 {
                return Err(MatrixError::InvalidAttributeId(0));
            }
            if matrix.contains_attribute(attribute.id) {
                return Err(MatrixError::DuplicateId(attribute.id));
            }
            matrix.columns.push(Column::mirror(attribute.id));
            matrix.rows.push(attribute);
        }
        matrix.sort_axes();
        Ok(matrix)
    }

    /// Seed used for freshly created matrices.
    pub fn default_seed() -> Self {
        Self {
            rows: SEED_ATTRIBUTES
                .iter()
                .map(|(id, name)| Attribute::new(*id, *name, DEFAULT_CATEGORY))
                .collect(),
            columns: SEED_ATTRIBUTES
                .iter()
                .map(|(id, _)| Column::mirror(*id))
                .collect(),
            dependencies: Dependencies::default(),
        }
    }

    pub fn rows(&self) -> &[Attribute] {
        &self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn column(&self, id: AttributeId) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == id)
    }

    pub fn contains_attribute(&self, id: AttributeId) -> bool {
        self.attribute(id).is_some()
    }

    /// Reads one cell. Cells outside the upper triangle always read `false`.
    pub fn get_dependency(&self, row: AttributeId, column: AttributeId) -> bool {
        let key = CellKey::new(row, column);
        key.is_upper_triangle() && self.dependencies.contains(key)
    }

    /// Writes one upper-triangle cell.
    ///
    /// # Errors
    /// - `CellNotEditable` when `row >= column`.
    /// - `AttributeNotFound` when either id is not a row of this matrix.
    pub fn set_dependency(
        &mut self,
        row: AttributeId,
        column: AttributeId,
        value: bool,
    ) -> Result<(), MatrixError> {
        let key = self.editable_key(row, column)?;
        if value {
            self.dependencies.marked.insert(key);
        } else {
            self.dependencies.marked.remove(&key);
        }
        Ok(())
    }

    /// Flips one upper-triangle cell and returns its new value.
    ///
    /// On error the matrix is left untouched.
    pub fn toggle_dependency(
        &mut self,
        row: AttributeId,
        column: AttributeId,
    ) -> Result<bool, MatrixError> {
        let next = !self.get_dependency(row, column);
        self.set_dependency(row, column, next)?;
        Ok(next)
    }

    /// Recomputes row, column and category totals from the dependency map.
    ///
    /// Only upper-triangle keys whose row and column both exist are counted.
    pub fn compute_totals(&self) -> MatrixTotals {
        let mut totals = MatrixTotals::default();
        for row in &self.rows {
            totals.row_totals.insert(row.id, 0);
            totals
                .category_totals
                .entry(row.category.clone())
                .or_insert(0);
        }
        for column in &self.columns {
            totals.column_totals.insert(column.id, 0);
        }

        let categories: HashMap<AttributeId, &str> = self
            .rows
            .iter()
            .map(|row| (row.id, row.category.as_str()))
            .collect();

        for key in self.dependencies.iter() {
            if !key.is_upper_triangle() {
                continue;
            }
            let Some(category) = categories.get(&key.row) else {
                continue;
            };
            let Some(column_total) = totals.column_totals.get_mut(&key.column) else {
                continue;
            };
            *column_total += 1;
            if let Some(row_total) = totals.row_totals.get_mut(&key.row) {
                *row_total += 1;
            }
            if let Some(category_total) = totals.category_totals.get_mut(*category) {
                *category_total += 1;
            }
        }

        totals
    }

    /// Id assigned when no explicit id is requested: `max + 1`, or `1` when empty.
    ///
    /// # Errors
    /// - `IdSpaceExhausted` when the current maximum is `AttributeId::MAX`.
    pub fn next_attribute_id(&self) -> Result<AttributeId, MatrixError> {
        match self.rows.iter().map(|row| row.id).max() {
            None => Ok(1),
            Some(max) => max.checked_add(1).ok_or(MatrixError::IdSpaceExhausted(max)),
        }
    }

    /// Appends a row and its mirrored column, keeping both axes sorted.
    ///
    /// New rows start with no dependencies in either direction.
    ///
    /// # Errors
    /// - `InvalidAttributeId` when `requested_id` is `0`.
    /// - `DuplicateId` when the requested id is already used.
    /// - `IdSpaceExhausted` when no id is requested and none is left.
    ///
    /// The matrix is unchanged on error.
    pub fn add_attribute(
        &mut self,
        name: impl Into<String>,
        category: impl Into<String>,
        requested_id: Option<AttributeId>,
    ) -> Result<AttributeId, MatrixError> {
        let id = match requested_id {
            Some(id) => id,
            None => self.next_attribute_id()?,
        };
        if id == 0 {
            return Err(MatrixError::InvalidAttributeId(id));
        }
        if self.contains_attribute(id) {
            return Err(MatrixError::DuplicateId(id));
        }

        self.rows.push(Attribute::new(id, name, category));
        self.columns.push(Column::mirror(id));
        self.sort_axes();
        Ok(id)
    }

    /// Removes a row, its column and every dependency referencing it.
    ///
    /// Returns whether a row was removed. Missing ids are a no-op.
    pub fn remove_attribute(&mut self, id: AttributeId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        self.columns.retain(|column| column.id != id);
        self.dependencies.marked.retain(|key| !key.references(id));
        self.rows.len() != before
    }

    /// Renames one row. Returns whether a row matched `id`.
    pub fn rename_attribute(&mut self, id: AttributeId, name: impl Into<String>) -> bool {
        match self.rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                row.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Groups rows by category in order of first appearance.
    pub fn category_groups(&self) -> Vec<CategoryGroup<'_>> {
        let mut groups: Vec<CategoryGroup<'_>> = Vec::new();
        for row in &self.rows {
            match groups
                .iter_mut()
                .find(|group| group.category == row.category)
            {
                Some(group) => group.rows.push(row),
                None => groups.push(CategoryGroup {
                    category: row.category.as_str(),
                    rows: vec![row],
                }),
            }
        }
        groups
    }

    /// Checks structural invariants of decoded or caller-built matrices.
    pub fn validate(&self) -> Result<(), MatrixError> {
        let mut row_ids = HashSet::with_capacity(self.rows.len());
        for row in &self.rows {
            if row.id == 0 {
                return Err(MatrixError::InvalidAttributeId(0));
            }
            if !row_ids.insert(row.id) {
                return Err(MatrixError::DuplicateId(row.id));
            }
        }

        let mut column_ids = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !column_ids.insert(column.id) {
                return Err(MatrixError::Inconsistent(format!(
                    "column {} appears more than once",
                    column.id
                )));
            }
            if !row_ids.contains(&column.id) {
                return Err(MatrixError::Inconsistent(format!(
                    "column {} has no matching row",
                    column.id
                )));
            }
        }
        if let Some(row) = self.rows.iter().find(|row| !column_ids.contains(&row.id)) {
            return Err(MatrixError::Inconsistent(format!(
                "row {} has no matching column",
                row.id
            )));
        }

        if let Some(key) = self
            .dependencies
            .iter()
            .find(|key| !row_ids.contains(&key.row) || !row_ids.contains(&key.column))
        {
            return Err(MatrixError::Inconsistent(format!(
                "dependency {key} references a missing attribute"
            )));
        }

        Ok(())
    }

    fn editable_key(&self, row: AttributeId, column: AttributeId) -> Result<CellKey, MatrixError> {
        let key = CellKey::new(row, column);
        if !key.is_upper_triangle() {
            return Err(MatrixError::CellNotEditable(key));
        }
        for id in [row, column] {
            if !self.contains_attribute(id) {
                return Err(MatrixError::AttributeNotFound(id));
            }
        }
        Ok(key)
    }

    fn sort_axes(&mut self) {
        self.rows.sort_by_key(|row| row.id);
        self.columns.sort_by_key(|column| column.id);
    }
}
