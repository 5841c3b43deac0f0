//! Elaborated model view
//!
//! The elaborator (external) hands over the partition of signals into nets
//! and the ordered list of update blocks. The JSON shape matches what the
//! host-side elaborator dumps; [`ModelBuilder`] assembles the same view in
//! Rust for structural models.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::ast::Stmt;
use crate::error::{Error, Result};
use crate::names::mangle;

// ============================================================================
// Signal Values
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: SignalValue,
}

/// Runtime value carried by a signal at elaboration time
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalValue {
    Int {
        #[serde(default)]
        value: i64,
    },
    Bits {
        width: u32,
        #[serde(default)]
        value: u64,
    },
    Record { type_name: String, fields: Vec<Field> },
    BitStruct { type_name: String, width: u32, fields: Vec<Field> },
    Float { value: f64 },
    Str { value: String },
    List { items: Vec<SignalValue> },
    #[serde(other)]
    Opaque,
}

impl SignalValue {
    pub fn int(value: i64) -> Self {
        SignalValue::Int { value }
    }

    pub fn bits(width: u32) -> Self {
        SignalValue::Bits { width, value: 0 }
    }

    pub fn record(type_name: &str, fields: Vec<(&str, SignalValue)>) -> Self {
        SignalValue::Record {
            type_name: type_name.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| Field { name: name.to_string(), value })
                .collect(),
        }
    }

    /// Shape name used in diagnostics
    pub fn shape(&self) -> String {
        match self {
            SignalValue::Int { .. } => "int".to_string(),
            SignalValue::Bits { width, .. } => format!("bits({})", width),
            SignalValue::Record { type_name, .. } => format!("record {}", type_name),
            SignalValue::BitStruct { type_name, .. } => format!("bit struct {}", type_name),
            SignalValue::Float { .. } => "float".to_string(),
            SignalValue::Str { .. } => "str".to_string(),
            SignalValue::List { .. } => "list".to_string(),
            SignalValue::Opaque => "opaque object".to_string(),
        }
    }
}

// ============================================================================
// Nets and Blocks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Signal {
    /// Qualified dotted path, e.g. `Splitter.reg0.out`
    pub name: String,
    pub value: SignalValue,
}

/// Signals wired together; identity is the position in [`ElaboratedModel::nets`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Net {
    pub members: Vec<Signal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    #[default]
    Clocked,
    Combinational,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateBlock {
    /// Qualified name of the owning component instance
    pub component: String,
    pub name: String,
    #[serde(default)]
    pub kind: BlockKind,
    /// Original source text, embedded in the generated code as a comment
    #[serde(default)]
    pub source: String,
    pub body: Vec<Stmt>,
}

impl UpdateBlock {
    pub fn function_name(&self) -> String {
        format!("{}_{}", mangle(&self.component), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElaboratedModel {
    /// Top component instance name
    pub name: String,
    /// Class identity, used to name build artifacts
    #[serde(default)]
    pub class_name: String,
    pub nets: Vec<Net>,
    #[serde(default)]
    pub blocks: Vec<UpdateBlock>,
}

impl ElaboratedModel {
    pub fn from_json(json: &str) -> Result<Self> {
        // Block bodies nest deeply for long elif chains
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let model: ElaboratedModel = serde::Deserialize::deserialize(&mut deserializer)
            .map_err(|e| Error::InvalidModel(format!("Failed to parse model JSON: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    pub fn class_identity(&self) -> &str {
        if self.class_name.is_empty() {
            &self.name
        } else {
            &self.class_name
        }
    }

    /// Every net has members and every signal belongs to exactly one net
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (id, net) in self.nets.iter().enumerate() {
            if net.members.is_empty() {
                return Err(Error::InvalidModel(format!("net {} has no members", id)));
            }
            for signal in &net.members {
                if let Some(other) = seen.insert(signal.name.as_str(), id) {
                    return Err(Error::InvalidModel(format!(
                        "signal {} appears in nets {} and {}",
                        signal.name, other, id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn signal_count(&self) -> usize {
        self.nets.iter().map(|n| n.members.len()).sum()
    }
}

// ============================================================================
// Model Builder
// ============================================================================

/// Assembles an elaborated model from declared signals and connections.
///
/// Signal names are given relative to the top instance (`reg0.out`) and
/// qualified on insertion. Net identities follow the declaration order of
/// each net's first signal.
pub struct ModelBuilder {
    name: String,
    class_name: String,
    signals: IndexMap<String, SignalValue>,
    connections: Vec<(String, String)>,
    blocks: Vec<UpdateBlock>,
}

impl ModelBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            class_name: name.to_string(),
            signals: IndexMap::new(),
            connections: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn class_name(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    fn qualify(&self, relative: &str) -> String {
        if relative.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, relative)
        }
    }

    pub fn signal(mut self, relative: &str, value: SignalValue) -> Self {
        let name = self.qualify(relative);
        self.signals.insert(name, value);
        self
    }

    pub fn connect(mut self, a: &str, b: &str) -> Self {
        let pair = (self.qualify(a), self.qualify(b));
        self.connections.push(pair);
        self
    }

    /// Register an update block owned by `component` ("" for the top instance)
    pub fn block(mut self, component: &str, name: &str, kind: BlockKind, source: &str, body: Vec<Stmt>) -> Self {
        let component = self.qualify(component);
        self.blocks.push(UpdateBlock {
            component,
            name: name.to_string(),
            kind,
            source: source.to_string(),
            body,
        });
        self
    }

    pub fn build(self) -> Result<ElaboratedModel> {
        let mut parent: Vec<usize> = (0..self.signals.len()).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (a, b) in &self.connections {
            let ia = self
                .signals
                .get_index_of(a)
                .ok_or_else(|| Error::InvalidModel(format!("connect: unknown signal {}", a)))?;
            let ib = self
                .signals
                .get_index_of(b)
                .ok_or_else(|| Error::InvalidModel(format!("connect: unknown signal {}", b)))?;
            let (ra, rb) = (find(&mut parent, ia), find(&mut parent, ib));
            if ra != rb {
                // Keep the earlier-declared signal as root
                let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
                parent[hi] = lo;
            }
        }

        let mut net_of_root: HashMap<usize, usize> = HashMap::new();
        let mut nets: Vec<Net> = Vec::new();
        for (idx, (name, value)) in self.signals.iter().enumerate() {
            let root = find(&mut parent, idx);
            let id = *net_of_root.entry(root).or_insert_with(|| {
                nets.push(Net { members: Vec::new() });
                nets.len() - 1
            });
            nets[id].members.push(Signal { name: name.clone(), value: value.clone() });
        }

        let model = ElaboratedModel {
            name: self.name,
            class_name: self.class_name,
            nets,
            blocks: self.blocks,
        };
        model.validate()?;
        Ok(model)
    }
}
