//! Type classification
//!
//! Maps a signal's runtime value onto a native storage type. Bit widths are
//! carried through so stores can be truncated; records become `struct`
//! declarations held in a per-build [`TypeCache`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::{Field, SignalValue};

/// Native storage type of a net (or of a record field)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    /// Host integer, stored as a signed 64-bit value
    Int,
    /// Fixed-width bit vector, 1..=64 bits
    Bits { width: u32 },
    /// Flat record declared in the type section
    Record { name: String },
}

impl CType {
    pub fn c_name(&self) -> &str {
        match self {
            CType::Int => "long long",
            CType::Bits { width } if *width <= 8 => "unsigned char",
            CType::Bits { width } if *width <= 16 => "unsigned short",
            CType::Bits { width } if *width <= 32 => "unsigned int",
            CType::Bits { .. } => "unsigned long long",
            CType::Record { name } => name.as_str(),
        }
    }

    /// Storage size in bytes for scalar types
    pub fn scalar_size(&self) -> Option<usize> {
        match self {
            CType::Int => Some(8),
            CType::Bits { width } if *width <= 8 => Some(1),
            CType::Bits { width } if *width <= 16 => Some(2),
            CType::Bits { width } if *width <= 32 => Some(4),
            CType::Bits { .. } => Some(8),
            CType::Record { .. } => None,
        }
    }

    pub fn width(&self) -> Option<u32> {
        match self {
            CType::Int => Some(64),
            CType::Bits { width } => Some(*width),
            CType::Record { .. } => None,
        }
    }

    /// Mask applied on store when the width does not fill the container
    pub fn store_mask(&self) -> Option<u64> {
        match self {
            CType::Bits { width } if !matches!(width, 8 | 16 | 32 | 64) => Some((1u64 << width) - 1),
            _ => None,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, CType::Record { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordDecl {
    pub name: String,
    /// Scalar fields in declaration order
    pub fields: Vec<(String, CType)>,
}

impl RecordDecl {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.fields.hash(&mut hasher);
        hasher.finish()
    }

    pub fn field(&self, name: &str) -> Option<(usize, &CType)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, (field, _))| field == name)
            .map(|(idx, (_, ty))| (idx, ty))
    }

    pub fn declaration(&self) -> String {
        let mut code = format!("struct {} {{\n", self.name);
        for (name, ty) in &self.fields {
            code.push_str(&format!("  {} {};\n", ty.c_name(), name));
        }
        code.push_str("};\n");
        code
    }
}

/// Record declarations emitted during one build
#[derive(Debug, Default)]
pub struct TypeCache {
    records: IndexMap<String, (u64, RecordDecl)>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the value carried by `signal`, declaring record types as needed
    pub fn classify(&mut self, signal: &str, value: &SignalValue) -> Result<CType> {
        match value {
            SignalValue::Record { type_name, fields } => self.declare(signal, type_name, fields),
            other => scalar_type(signal, other),
        }
    }

    fn declare(&mut self, signal: &str, type_name: &str, fields: &[Field]) -> Result<CType> {
        let fields = fields
            .iter()
            .map(|field| {
                let qualified = format!("{}.{}", signal, field.name);
                scalar_type(&qualified, &field.value).map(|ty| (field.name.clone(), ty))
            })
            .collect::<Result<Vec<_>>>()?;
        let decl = RecordDecl { name: type_name.to_string(), fields };
        let fingerprint = decl.fingerprint();

        match self.records.get(type_name) {
            Some((existing, _)) if *existing == fingerprint => {}
            Some(_) => return Err(Error::TypeConflict { name: type_name.to_string() }),
            None => {
                tracing::debug!("declaring record type {}", type_name);
                self.records.insert(type_name.to_string(), (fingerprint, decl));
            }
        }
        Ok(CType::Record { name: type_name.to_string() })
    }

    pub fn record(&self, name: &str) -> Option<&RecordDecl> {
        self.records.get(name).map(|(_, decl)| decl)
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordDecl> {
        self.records.values().map(|(_, decl)| decl)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Type declaration section, in first-use order
    pub fn declarations(&self) -> String {
        self.records().map(RecordDecl::declaration).collect()
    }
}

fn scalar_type(signal: &str, value: &SignalValue) -> Result<CType> {
    match value {
        SignalValue::Int { .. } => Ok(CType::Int),
        SignalValue::Bits { width, .. } if (1..=64).contains(width) => Ok(CType::Bits { width: *width }),
        SignalValue::BitStruct { type_name, .. } => Err(Error::NestedTypeNotAllowed(format!(
            "{} is a bit struct ({})",
            signal, type_name
        ))),
        SignalValue::Record { type_name, .. } => Err(Error::NestedTypeNotAllowed(format!(
            "{} nests record {}",
            signal, type_name
        ))),
        other => Err(Error::UntranslatableType {
            signal: signal.to_string(),
            shape: other.shape(),
        }),
    }
}
