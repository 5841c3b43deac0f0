//! Statement and expression translation
//!
//! Lowers one update block body to a native function. Translation is a
//! straight recursive walk that appends lines to a buffer; the only state is
//! the indentation depth and the pending `else if` flag used to render
//! `elif` chains as a flat cascade.

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, UnaryOp};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::model::{BlockKind, UpdateBlock};
use crate::names::{Access, Resolved, Resolver, Role};

// ============================================================================
// Operator Table
// ============================================================================

pub fn binop_symbol(op: BinOp) -> Result<&'static str> {
    Ok(match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mult => "*",
        BinOp::Div | BinOp::FloorDiv => "/",
        BinOp::Mod => "%",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::BitOr => "|",
        BinOp::BitAnd => "&",
        BinOp::BitXor => "^",
        BinOp::Pow | BinOp::MatMult => return Err(Error::UnsupportedOperator(op.to_string())),
    })
}

pub fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Invert => "~",
        UnaryOp::Not => "!",
        UnaryOp::UAdd => "+",
        UnaryOp::USub => "-",
    }
}

pub fn boolop_symbol(op: BoolOp) -> &'static str {
    match op {
        BoolOp::And => "&&",
        BoolOp::Or => "||",
    }
}

pub fn cmp_symbol(op: CmpOp) -> Result<&'static str> {
    Ok(match op {
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
        CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn => {
            return Err(Error::UnsupportedOperator(op.to_string()))
        }
    })
}

// ============================================================================
// Translator
// ============================================================================

struct Translator<'a> {
    resolver: Resolver<'a>,
    kind: BlockKind,
    block: String,
    out: String,
    indent: usize,
    else_if: bool,
}

impl<'a> Translator<'a> {
    fn new(layout: &'a Layout, block: &'a UpdateBlock) -> Self {
        let name = block.function_name();
        Self {
            resolver: Resolver::new(layout, &block.component, name.clone()),
            kind: block.kind,
            block: name,
            out: String::new(),
            indent: 1,
            else_if: false,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn unsupported(&self, what: &str) -> Error {
        Error::UnsupportedConstruct(format!("{} in {}", what, self.block))
    }

    fn stmts(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { targets, value } => {
                if targets.len() != 1 {
                    return Err(Error::MultiTargetAssignment { block: self.block.clone(), count: targets.len() });
                }
                let target = self.store_target(&targets[0])?;
                let value = self.expr(value)?;
                self.store(&target, &value);
                Ok(())
            }
            Stmt::AugAssign { target, op, value } => {
                let target = self.store_target(target)?;
                let symbol = binop_symbol(*op)?;
                let value = self.expr(value)?;
                let combined = format!("({} {} {})", target.identifier(), symbol, value);
                self.store(&target, &combined);
                Ok(())
            }
            Stmt::If { test, body, orelse } => self.if_stmt(test, body, orelse),
            Stmt::Pass => Ok(()),
            other => Err(self.unsupported(other.kind())),
        }
    }

    fn store_target(&self, target: &Expr) -> Result<Resolved> {
        self.resolver.resolve(target, Access::select(self.kind, Role::Store))
    }

    fn store(&mut self, target: &Resolved, value: &str) {
        let ident = target.identifier();
        let line = match target.ctype.store_mask() {
            Some(mask) => format!("{} = ({}) & 0x{:X};", ident, value, mask),
            None => format!("{} = {};", ident, value),
        };
        self.line(&line);
        if self.kind == BlockKind::Combinational {
            let shadow = target.with_access(Access::Next).identifier();
            self.line(&format!("{} = {};", shadow, ident));
        }
    }

    fn if_stmt(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<()> {
        let keyword = if self.else_if { "else if" } else { "if" };
        self.else_if = false;
        let cond = self.expr(test)?;
        self.line(&format!("{} ({}) {{", keyword, cond));
        self.indent += 1;
        self.stmts(body)?;
        self.indent -= 1;
        self.line("}");

        match orelse {
            [] => Ok(()),
            [nested @ Stmt::If { .. }] => {
                self.else_if = true;
                self.stmt(nested)
            }
            _ => {
                self.line("else {");
                self.indent += 1;
                self.stmts(orelse)?;
                self.indent -= 1;
                self.line("}");
                Ok(())
            }
        }
    }

    fn expr(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => {
                Ok(self.resolver.resolve(expr, Access::Current)?.identifier())
            }
            Expr::Num { value } => Ok(value.to_string()),
            Expr::BinOp { left, op, right } => {
                let symbol = binop_symbol(*op)?;
                Ok(format!("({} {} {})", self.expr(left)?, symbol, self.expr(right)?))
            }
            Expr::UnaryOp { op, operand } => Ok(format!("({}{})", unary_symbol(*op), self.expr(operand)?)),
            Expr::BoolOp { op, values } => {
                let parts = values.iter().map(|v| self.expr(v)).collect::<Result<Vec<_>>>()?;
                let sep = format!(" {} ", boolop_symbol(*op));
                Ok(format!("({})", parts.join(&sep)))
            }
            Expr::Compare { left, ops, comparators } => {
                if ops.len() != 1 || comparators.len() != 1 {
                    return Err(self.unsupported("chained comparison"));
                }
                let symbol = cmp_symbol(ops[0])?;
                Ok(format!("({} {} {})", self.expr(left)?, symbol, self.expr(&comparators[0])?))
            }
            Expr::IfExp { test, body, orelse } => Ok(format!(
                "({} ? {} : {})",
                self.expr(test)?,
                self.expr(body)?,
                self.expr(orelse)?
            )),
            other => Err(self.unsupported(other.kind())),
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Runtime switch read by every trace statement
pub const TRACE_SYMBOL: &str = "sim_trace";

/// Translate one update block into a native function definition.
///
/// The function opens with a trace statement naming it, gated on
/// [`TRACE_SYMBOL`] so tracing can be toggled without a rebuild.
pub fn translate_block(block: &UpdateBlock, layout: &Layout) -> Result<String> {
    let name = block.function_name();
    let mut translator = Translator::new(layout, block);
    translator.stmts(&block.body)?;
    let body = translator.finish();

    let mut code = format!("// logic for {}.{}()\n", block.component, block.name);
    for line in block.source.lines() {
        code.push_str(&format!("//   {}\n", line));
    }
    code.push_str(&format!("void {}() {{\n", name));
    code.push_str(&format!("  if ({}) std::printf(\"EXECUTING {}\\n\");\n", TRACE_SYMBOL, name));
    code.push_str(&body);
    code.push_str("}\n");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decls::emit_declarations;
    use crate::model::{ModelBuilder, SignalValue};
    use crate::types::TypeCache;

    fn layout() -> Layout {
        let model = ModelBuilder::new("Top")
            .signal("a", SignalValue::bits(8))
            .signal("b", SignalValue::bits(8))
            .signal("c", SignalValue::bits(5))
            .signal("n", SignalValue::int(0))
            .signal("out[0]", SignalValue::bits(8))
            .signal("out[1]", SignalValue::bits(8))
            .signal("msg", SignalValue::record("Msg", vec![("dest", SignalValue::bits(8))]))
            .build()
            .unwrap();
        emit_declarations(&model, &mut TypeCache::new()).unwrap().layout
    }

    fn block(kind: BlockKind, body: Vec<Stmt>) -> UpdateBlock {
        UpdateBlock {
            component: "Top".to_string(),
            name: "logic".to_string(),
            kind,
            source: String::new(),
            body,
        }
    }

    fn body(kind: BlockKind, stmts: Vec<Stmt>) -> Result<String> {
        let layout = layout();
        let block = block(kind, stmts);
        let mut translator = Translator::new(&layout, &block);
        translator.stmts(&block.body)?;
        Ok(translator.finish())
    }

    fn expr(e: Expr) -> Result<String> {
        let layout = layout();
        let block = block(BlockKind::Clocked, vec![]);
        let translator = Translator::new(&layout, &block);
        translator.expr(&e)
    }

    #[test]
    fn test_register_function() {
        let layout = layout();
        let mut block = block(BlockKind::Clocked, vec![Stmt::assign(Expr::path("s.b.next"), Expr::path("s.a"))]);
        block.source = "def logic():\n  s.b.next = s.a".to_string();
        let code = translate_block(&block, &layout).unwrap();
        assert_eq!(
            code,
            "// logic for Top.logic()\n\
             //   def logic():\n\
             //     s.b.next = s.a\n\
             void Top_logic() {\n\
             \x20 if (sim_trace) std::printf(\"EXECUTING Top_logic\\n\");\n\
             \x20 Top_b_next = Top_a;\n\
             }\n"
        );
    }

    #[test]
    fn test_trace_statement() {
        let layout = layout();
        let block = block(BlockKind::Clocked, vec![Stmt::Pass]);
        let code = translate_block(&block, &layout).unwrap();
        assert!(code.contains("void Top_logic() {\n  if (sim_trace) std::printf(\"EXECUTING Top_logic\\n\");\n}\n"));
    }

    #[test]
    fn test_binary_operators() {
        let cases = [
            (BinOp::Add, "+"),
            (BinOp::Sub, "-"),
            (BinOp::Mult, "*"),
            (BinOp::Div, "/"),
            (BinOp::FloorDiv, "/"),
            (BinOp::Mod, "%"),
            (BinOp::Shl, "<<"),
            (BinOp::Shr, ">>"),
            (BinOp::BitOr, "|"),
            (BinOp::BitAnd, "&"),
            (BinOp::BitXor, "^"),
        ];
        for (op, symbol) in cases {
            let out = expr(Expr::binop(Expr::path("s.a"), op, Expr::num(3))).unwrap();
            assert_eq!(out, format!("(Top_a {} 3)", symbol));
        }
    }

    #[test]
    fn test_unary_boolean_and_ternary() {
        assert_eq!(expr(Expr::unary(UnaryOp::USub, Expr::path("s.a"))).unwrap(), "(-Top_a)");
        assert_eq!(expr(Expr::unary(UnaryOp::Not, Expr::path("s.a"))).unwrap(), "(!Top_a)");
        assert_eq!(expr(Expr::unary(UnaryOp::Invert, Expr::path("s.a"))).unwrap(), "(~Top_a)");
        assert_eq!(expr(Expr::unary(UnaryOp::UAdd, Expr::num(1))).unwrap(), "(+1)");

        let chain = Expr::boolop(BoolOp::And, vec![Expr::path("s.a"), Expr::path("s.b"), Expr::path("s.c")]);
        assert_eq!(expr(chain).unwrap(), "(Top_a && Top_b && Top_c)");
        let either = Expr::boolop(BoolOp::Or, vec![Expr::path("s.a"), Expr::num(0)]);
        assert_eq!(expr(either).unwrap(), "(Top_a || 0)");

        let ternary = Expr::ifexp(Expr::path("s.a"), Expr::num(1), Expr::path("s.msg.dest"));
        assert_eq!(expr(ternary).unwrap(), "(Top_a ? 1 : Top_msg.dest)");
    }

    #[test]
    fn test_comparisons() {
        let cases = [
            (CmpOp::Eq, "=="),
            (CmpOp::NotEq, "!="),
            (CmpOp::Lt, "<"),
            (CmpOp::LtE, "<="),
            (CmpOp::Gt, ">"),
            (CmpOp::GtE, ">="),
        ];
        for (op, symbol) in cases {
            let out = expr(Expr::compare(Expr::path("s.a"), op, Expr::path("s.out[1]"))).unwrap();
            assert_eq!(out, format!("(Top_a {} Top_out_1)", symbol));
        }
    }

    #[test]
    fn test_unsupported_operators() {
        for op in [BinOp::Pow, BinOp::MatMult] {
            let err = expr(Expr::binop(Expr::num(2), op, Expr::num(3))).unwrap_err();
            assert!(matches!(err, Error::UnsupportedOperator(s) if s == op.to_string()));
        }
        for op in [CmpOp::Is, CmpOp::IsNot, CmpOp::In, CmpOp::NotIn] {
            let err = expr(Expr::compare(Expr::path("s.a"), op, Expr::num(3))).unwrap_err();
            assert!(matches!(err, Error::UnsupportedOperator(s) if s == op.to_string()));
        }
        let err = body(
            BlockKind::Clocked,
            vec![Stmt::aug_assign(Expr::path("s.a.next"), BinOp::Pow, Expr::num(2))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperator(s) if s == "**"));
    }

    #[test]
    fn test_chained_comparison_rejected() {
        let chained = Expr::Compare {
            left: Box::new(Expr::num(0)),
            ops: vec![CmpOp::Lt, CmpOp::Lt],
            comparators: vec![Expr::path("s.a"), Expr::num(10)],
        };
        let err = expr(chained).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct(msg) if msg.contains("chained comparison")));
    }

    #[test]
    fn test_unsupported_constructs() {
        let call = Expr::Call { func: Box::new(Expr::name("len")), args: vec![] };
        assert!(matches!(expr(call.clone()), Err(Error::UnsupportedConstruct(_))));
        assert!(matches!(expr(Expr::Unknown), Err(Error::UnsupportedConstruct(_))));

        let stmts = [
            Stmt::For { target: Expr::name("i"), iter: Expr::name("r"), body: vec![] },
            Stmt::While { test: Expr::num(1), body: vec![] },
            Stmt::Expr { value: call },
            Stmt::Unknown,
        ];
        for stmt in stmts {
            let err = body(BlockKind::Clocked, vec![stmt]).unwrap_err();
            assert!(matches!(err, Error::UnsupportedConstruct(_)));
        }
    }

    #[test]
    fn test_multi_target_assignment() {
        let stmt = Stmt::Assign { targets: vec![Expr::path("s.a"), Expr::path("s.b")], value: Expr::num(0) };
        let err = body(BlockKind::Clocked, vec![stmt]).unwrap_err();
        assert!(matches!(err, Error::MultiTargetAssignment { block, count: 2 } if block == "Top_logic"));
    }

    #[test]
    fn test_augmented_assignment_uses_one_alias() {
        let out = body(BlockKind::Clocked, vec![Stmt::aug_assign(Expr::path("s.n.next"), BinOp::Add, Expr::num(1))]);
        assert_eq!(out.unwrap(), "  Top_n_next = (Top_n_next + 1);\n");
    }

    #[test]
    fn test_narrow_store_is_masked() {
        let out = body(BlockKind::Clocked, vec![Stmt::assign(Expr::path("s.c.next"), Expr::path("s.a"))]);
        assert_eq!(out.unwrap(), "  Top_c_next = (Top_a) & 0x1F;\n");
    }

    #[test]
    fn test_combinational_store_mirrors_shadow() {
        let stmts = vec![
            Stmt::assign(Expr::path("s.b"), Expr::path("s.a")),
            Stmt::assign(Expr::path("s.msg.dest"), Expr::num(4)),
        ];
        assert_eq!(
            body(BlockKind::Combinational, stmts).unwrap(),
            "  Top_b = Top_a;\n  Top_b_next = Top_b;\n  Top_msg.dest = 4;\n  Top_msg_next.dest = Top_msg.dest;\n"
        );
    }

    #[test]
    fn test_elif_cascade() {
        let assign = |v| vec![Stmt::assign(Expr::path("s.b.next"), Expr::num(v))];
        let stmt = Stmt::if_(
            Expr::compare(Expr::path("s.a"), CmpOp::Eq, Expr::num(0)),
            assign(1),
            vec![Stmt::if_(
                Expr::compare(Expr::path("s.a"), CmpOp::Eq, Expr::num(1)),
                assign(2),
                vec![Stmt::if_(Expr::path("s.c"), assign(3), assign(4))],
            )],
        );
        assert_eq!(
            body(BlockKind::Clocked, vec![stmt]).unwrap(),
            "  if ((Top_a == 0)) {\n    Top_b_next = 1;\n  }\n\
             \x20 else if ((Top_a == 1)) {\n    Top_b_next = 2;\n  }\n\
             \x20 else if (Top_c) {\n    Top_b_next = 3;\n  }\n\
             \x20 else {\n    Top_b_next = 4;\n  }\n"
        );
    }

    #[test]
    fn test_nested_if_inside_else_is_not_cascaded() {
        let stmt = Stmt::if_(
            Expr::path("s.a"),
            vec![Stmt::Pass],
            vec![Stmt::Pass, Stmt::if_(Expr::path("s.b"), vec![Stmt::Pass], vec![])],
        );
        assert_eq!(
            body(BlockKind::Clocked, vec![stmt]).unwrap(),
            "  if (Top_a) {\n  }\n  else {\n    if (Top_b) {\n    }\n  }\n"
        );
    }
}
