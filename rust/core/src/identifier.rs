// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table identifiers.
//!
//! Table names arrive from user configuration and end up in DDL statements,
//! where most engines do not accept bound parameters. Every name therefore
//! goes through [`TableName::parse`] once, and only validated names reach the
//! database facade.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_IDENTIFIER_LEN: usize = 128;

/// A validated, optionally schema-qualified table name.
///
/// Names are case-insensitive and stored upper-cased, the way H2/H2GIS
/// folds unquoted identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    /// Validate `raw` as `[schema.]name`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split('.');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(Error::InvalidIdentifier(raw.to_string()));
        }

        let (schema, name) = match second {
            Some(name) => (Some(first), name),
            None => (None, first),
        };

        if !is_identifier(name) || schema.is_some_and(|s| !is_identifier(s)) {
            return Err(Error::InvalidIdentifier(raw.to_string()));
        }

        Ok(Self {
            schema: schema.map(|s| s.to_ascii_uppercase()),
            name: name.to_ascii_uppercase(),
        })
    }

    /// Built-in default names, already upper-case identifiers.
    pub(crate) fn builtin(name: &'static str) -> Self {
        Self {
            schema: None,
            name: name.to_string(),
        }
    }

    /// Unqualified table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl TryFrom<String> for TableName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for TableName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_upper_cased() {
        let table = TableName::parse("receivers").unwrap();
        assert_eq!(table.name(), "RECEIVERS");
        assert_eq!(table.schema(), None);
        assert_eq!(table.to_string(), "RECEIVERS");
    }

    #[test]
    fn schema_qualified_names() {
        let table = TableName::parse("public.tmp_lines_2").unwrap();
        assert_eq!(table.schema(), Some("PUBLIC"));
        assert_eq!(table.to_string(), "PUBLIC.TMP_LINES_2");
    }

    #[test]
    fn rejects_injection_attempts() {
        for raw in [
            "",
            "1abc",
            "RECEIVERS; DROP TABLE BUILDINGS",
            "a.b.c",
            "name with space",
            "quote\"d",
            "x--",
        ] {
            assert!(
                matches!(TableName::parse(raw), Err(Error::InvalidIdentifier(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: TableName = serde_json::from_str("\"Buildings\"").unwrap();
        assert_eq!(ok.name(), "BUILDINGS");
        assert!(serde_json::from_str::<TableName>("\"bad name\"").is_err());
    }
}
