//! Net and declaration emission
//!
//! Every net gets one storage cell and one shadow ("next") cell with C
//! linkage, so the binder can find them by symbol. Every member signal gets
//! two reference aliases under its flattened name, which is what makes
//! wired-together signals share a single value in the generated code.

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::model::{ElaboratedModel, SignalValue};
use crate::names::mangle;
use crate::types::{CType, TypeCache};

/// Declaration section of a generated unit
#[derive(Debug, Clone)]
pub struct Declarations {
    /// Record type declarations
    pub types: String,
    /// Net storage, shadows, aliases and layout tables
    pub nets: String,
    pub layout: Layout,
}

/// Classify every net and emit its declarations.
///
/// Classification of all nets completes before anything is returned, so an
/// untranslatable signal anywhere in the model fails the whole request.
pub fn emit_declarations(model: &ElaboratedModel, cache: &mut TypeCache) -> Result<Declarations> {
    model.validate()?;
    let mut types = Vec::with_capacity(model.nets.len());
    for net in &model.nets {
        let first = &net.members[0];
        types.push(cache.classify(&first.name, &first.value)?);
    }

    let mut layout = Layout::new(&model.name);
    for decl in cache.records() {
        layout.add_record(decl);
    }

    let mut code = String::new();
    for (net, ctype) in model.nets.iter().zip(types) {
        let id = layout.add_net(ctype.clone());
        let slot = layout.net(id).clone();
        let c_name = ctype.c_name().to_string();
        let first = &net.members[0];
        let init = initializer(&first.name, &first.value)?;

        code.push_str(&format!("extern \"C\" {} {} = {};\n", c_name, slot.symbol(), init));
        code.push_str(&format!("extern \"C\" {} {} = {};\n", c_name, slot.shadow_symbol(), init));
        for signal in &net.members {
            let alias = mangle(&signal.name);
            code.push_str(&format!("{} &{} = {};\n", c_name, alias, slot.symbol()));
            code.push_str(&format!("{} &{}_next = {};\n", c_name, alias, slot.shadow_symbol()));
            layout.add_member(&signal.name, id);
        }
    }
    code.push_str(&layout.table_declarations());

    Ok(Declarations { types: cache.declarations(), nets: code, layout })
}

fn int_literal(value: i64) -> String {
    if i32::try_from(value).is_ok() {
        value.to_string()
    } else {
        format!("{}LL", value)
    }
}

fn bits_literal(value: u64, ctype: &CType) -> String {
    let value = ctype.store_mask().map_or(value, |m| value & m);
    if value <= i32::MAX as u64 {
        value.to_string()
    } else {
        format!("{}ULL", value)
    }
}

/// Initializer for a classified value; record fields are one level deep
fn initializer(signal: &str, value: &SignalValue) -> Result<String> {
    match value {
        SignalValue::Int { value } => Ok(int_literal(*value)),
        SignalValue::Bits { width, value } => Ok(bits_literal(*value, &CType::Bits { width: *width })),
        SignalValue::Record { fields, .. } => {
            let values = fields
                .iter()
                .map(|f| match &f.value {
                    SignalValue::Record { .. } => Err(Error::NestedTypeNotAllowed(format!("{}.{}", signal, f.name))),
                    scalar => initializer(signal, scalar),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{{ {} }}", values.join(", ")))
        }
        other => Err(Error::UntranslatableType { signal: signal.to_string(), shape: other.shape() }),
    }
}
