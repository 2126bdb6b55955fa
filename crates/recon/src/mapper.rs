//! Header → canonical field binding.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    BusinessId,
    OccurredAt,
    SourceAccount,
    DestinationAccount,
    Amount,
    Status,
}

impl CanonicalField {
    /// Declaration order; fields bind in this order.
    pub const ALL: [CanonicalField; 6] = [
        Self::BusinessId,
        Self::OccurredAt,
        Self::SourceAccount,
        Self::DestinationAccount,
        Self::Amount,
        Self::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessId => "business_id",
            Self::OccurredAt => "occurred_at",
            Self::SourceAccount => "source_account",
            Self::DestinationAccount => "destination_account",
            Self::Amount => "amount",
            Self::Status => "status",
        }
    }

    /// Built-in aliases in priority order.
    pub fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::BusinessId => &[
                "id_transaccion",
                "id",
                "identificador",
                "codigo",
                "transaction_id",
                "business_id",
            ],
            Self::OccurredAt => &["fecha", "date", "fecha_transaccion", "occurred_at"],
            Self::SourceAccount => &["cuenta_origen", "origen", "source", "from", "source_account"],
            Self::DestinationAccount => &[
                "cuenta_destino",
                "destino",
                "destination",
                "to",
                "destination_account",
            ],
            Self::Amount => &["monto", "amount", "valor", "value"],
            Self::Status => &["estado", "status", "state"],
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for CanonicalField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_header(s);
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Lowercase and trim, the single normalization applied to headers and
/// aliases alike.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Alias table with optional per-field overrides. An override replaces the
/// built-in list for that field entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnAliases {
    overrides: BTreeMap<CanonicalField, Vec<String>>,
}

impl ColumnAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, field: CanonicalField, aliases: Vec<String>) -> Self {
        let aliases = aliases.iter().map(|a| normalize_header(a)).collect();
        self.overrides.insert(field, aliases);
        self
    }

    pub fn aliases(&self, field: CanonicalField) -> Vec<String> {
        match self.overrides.get(&field) {
            Some(list) => list.clone(),
            None => field.default_aliases().iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Column index bound to each canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: BTreeMap<CanonicalField, usize>,
}

impl ColumnMap {
    pub fn index(&self, field: CanonicalField) -> usize {
        // map_columns binds every field before a ColumnMap exists
        self.indices[&field]
    }

    pub fn field_at(&self, col: usize) -> Option<CanonicalField> {
        self.indices.iter().find(|(_, &i)| i == col).map(|(f, _)| *f)
    }
}

/// Bind every canonical field to a header. Per field, the first alias (in
/// priority order) present among the normalized headers wins.
pub fn map_columns(headers: &[String], aliases: &ColumnAliases) -> Result<ColumnMap, MappingError> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut indices = BTreeMap::new();

    for field in CanonicalField::ALL {
        let tried = aliases.aliases(field);
        let found = tried
            .iter()
            .find_map(|alias| normalized.iter().position(|h| h == alias));

        match found {
            Some(idx) => {
                tracing::debug!(field = %field, column = %normalized[idx], "bound column");
                indices.insert(field, idx);
            }
            None => return Err(MappingError::MissingField { field, tried }),
        }
    }

    Ok(ColumnMap { indices })
}
