//! Declared input and table metadata.
//!
//! Hosts parse type declarations out of the document; the engine only reads these shapes (for
//! type inference) and never interprets the declaration syntax beyond [`DeclaredType`]'s
//! `FromStr` convenience.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::infer::{Dimension, InferredType};
use crate::lexer::{is_ident_part, is_ident_start};

/// A declared type such as `currency(USD)`: a dimension name plus optional arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredType {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl DeclaredType {
    pub fn new(dimension: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The display type this declaration implies, if it has one. Dates and unknown dimensions
    /// carry no display dimension.
    pub fn inferred(&self) -> Option<InferredType> {
        let dimension = match self.dimension.to_ascii_lowercase().as_str() {
            "currency" => {
                return Some(InferredType::currency(self.args.first().cloned()));
            }
            "percent" => Dimension::Percent,
            "number" | "integer" | "decimal" => Dimension::Number,
            "string" | "text" => Dimension::String,
            "boolean" | "bool" => Dimension::Boolean,
            _ => return None,
        };
        Some(InferredType::of(dimension))
    }
}

impl FromStr for DeclaredType {
    type Err = ModelError;

    /// Parse `name` or `name(arg, ...)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidType(s.to_string());
        let text = s.trim();
        let (name, rest) = match text.find('(') {
            Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
            None => (text, None),
        };
        let name = name.trim();
        let mut chars = name.chars();
        if !chars.next().is_some_and(is_ident_start) || !chars.all(is_ident_part) {
            return Err(invalid());
        }
        let args = match rest {
            None => Vec::new(),
            Some(rest) => {
                let inner = rest.strip_suffix(')').ok_or_else(invalid)?;
                let args: Vec<String> = inner
                    .split(',')
                    .map(|arg| arg.trim().to_string())
                    .filter(|arg| !arg.is_empty())
                    .collect();
                if args.is_empty() {
                    return Err(invalid());
                }
                args
            }
        };
        Ok(Self {
            dimension: name.to_string(),
            args,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DeclaredType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    pub columns: BTreeMap<String, DeclaredType>,
}
