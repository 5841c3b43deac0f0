//! Unit assembly
//!
//! Orders the sections of a generated unit: prelude, record types, nets,
//! one function per update block, the `cycle` driver and a `main` entry
//! point. Generation is deterministic, so identical models produce
//! byte-identical units (and hit the same cached artifact).

use crate::decls::{emit_declarations, Declarations};
use crate::error::Result;
use crate::layout::Layout;
use crate::model::ElaboratedModel;
use crate::translate::{translate_block, TRACE_SYMBOL};
use crate::types::TypeCache;

pub const PRELUDE: &str = "#include <cstdio>\n";

/// Name of the exported driver function
pub const CYCLE_SYMBOL: &str = "cycle";

/// A generated translation unit and the layout it was generated against
#[derive(Debug, Clone)]
pub struct GeneratedUnit {
    pub source: String,
    pub layout: Layout,
    /// Class identity of the top component, used to name the artifact
    pub class_identity: String,
}

/// Generate the complete unit for `model`.
///
/// Every net is classified before any block is translated, and every block
/// is translated before the unit is assembled. `trace` is the initial value
/// of the runtime trace switch.
pub fn generate_unit(model: &ElaboratedModel, trace: bool) -> Result<GeneratedUnit> {
    let decls = emit_declarations(model, &mut TypeCache::new())?;
    assemble(model, decls, trace)
}

/// Translate every block against already emitted declarations
pub fn assemble(model: &ElaboratedModel, decls: Declarations, trace: bool) -> Result<GeneratedUnit> {
    let mut functions = Vec::with_capacity(model.blocks.len());
    for block in &model.blocks {
        functions.push(translate_block(block, &decls.layout)?);
    }

    let mut code = String::new();
    code.push_str(PRELUDE);
    code.push_str(&decls.types);
    code.push_str(&decls.nets);
    code.push_str(&format!("extern \"C\" int {} = {};\n", TRACE_SYMBOL, trace as i32));
    for function in &functions {
        code.push_str(function);
    }
    code.push_str(&driver(model, &decls.layout));
    code.push_str("// main\nint main() { cycle(); return 0; }\n");

    Ok(GeneratedUnit {
        source: code,
        layout: decls.layout,
        class_identity: model.class_identity().to_string(),
    })
}

/// Run every block in registration order, then commit every net
fn driver(model: &ElaboratedModel, layout: &Layout) -> String {
    let mut code = format!("// cycle\nextern \"C\" void {}() {{\n", CYCLE_SYMBOL);
    for block in &model.blocks {
        code.push_str(&format!("  {}();\n", block.function_name()));
    }
    for net in &layout.nets {
        code.push_str(&format!("  {} = {};\n", net.symbol(), net.shadow_symbol()));
    }
    code.push_str("}\n");
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Stmt};
    use crate::error::Error;
    use crate::model::{BlockKind, ModelBuilder, SignalValue};

    fn register() -> ElaboratedModel {
        ModelBuilder::new("Register")
            .signal("in_", SignalValue::bits(8))
            .signal("out", SignalValue::bits(8))
            .block(
                "",
                "logic",
                BlockKind::Clocked,
                "",
                vec![Stmt::assign(Expr::path("s.out.next"), Expr::path("s.in_"))],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_unit() {
        let unit = generate_unit(&register(), false).unwrap();
        assert_eq!(unit.class_identity, "Register");
        assert_eq!(
            unit.source,
            "#include <cstdio>\n\
             extern \"C\" unsigned char net_00000 = 0;\n\
             extern \"C\" unsigned char net_00000_next = 0;\n\
             unsigned char &Register_in_ = net_00000;\n\
             unsigned char &Register_in__next = net_00000_next;\n\
             extern \"C\" unsigned char net_00001 = 0;\n\
             extern \"C\" unsigned char net_00001_next = 0;\n\
             unsigned char &Register_out = net_00001;\n\
             unsigned char &Register_out_next = net_00001_next;\n\
             extern \"C\" const unsigned long long sim_layout[] = { 2, sizeof(net_00000), sizeof(net_00001) };\n\
             extern \"C\" int sim_trace = 0;\n\
             // logic for Register.logic()\n\
             void Register_logic() {\n\
             \x20 if (sim_trace) std::printf(\"EXECUTING Register_logic\\n\");\n\
             \x20 Register_out_next = Register_in_;\n\
             }\n\
             // cycle\n\
             extern \"C\" void cycle() {\n\
             \x20 Register_logic();\n\
             \x20 net_00000 = net_00000_next;\n\
             \x20 net_00001 = net_00001_next;\n\
             }\n\
             // main\n\
             int main() { cycle(); return 0; }\n"
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate_unit(&register(), true).unwrap();
        let b = generate_unit(&register(), true).unwrap();
        assert_eq!(a.source, b.source);
    }

    #[test]
    fn test_blocks_run_in_registration_order() {
        let model = ModelBuilder::new("Top")
            .signal("a", SignalValue::int(0))
            .signal("b", SignalValue::int(0))
            .block("", "second", BlockKind::Clocked, "", vec![Stmt::Pass])
            .block("", "first", BlockKind::Clocked, "", vec![Stmt::Pass])
            .build()
            .unwrap();
        let source = generate_unit(&model, false).unwrap().source;
        let second = source.find("  Top_second();").unwrap();
        let first = source.find("  Top_first();").unwrap();
        assert!(second < first);
    }

    #[test]
    fn test_classification_precedes_translation() {
        // The block would fail too, but the bad signal is reported first
        let model = ModelBuilder::new("Top")
            .signal("a", SignalValue::Float { value: 0.0 })
            .block("", "logic", BlockKind::Clocked, "", vec![Stmt::Unknown])
            .build()
            .unwrap();
        let err = generate_unit(&model, false).unwrap_err();
        assert!(matches!(err, Error::UntranslatableType { .. }));
    }
}
