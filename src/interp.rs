//! Reference interpreter
//!
//! Executes an elaborated model directly, with the same storage model as
//! the generated code: one current and one next value per net, stores in
//! clocked blocks staged into next, a commit of every net after all blocks
//! have run.
//!
//! Expressions are evaluated in the C++ type the generated code would use:
//! loads are promoted from their storage type, binary operands meet in their
//! common type, and unsigned types wrap and compare as unsigned. Division or
//! remainder by zero yields 0 and shift amounts are taken modulo the width.
//!
//! Construction runs the full translation, so a model the interpreter
//! accepts is exactly a model the native pipeline accepts.

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, UnaryOp};
use crate::codegen::generate_unit;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::model::{BlockKind, ElaboratedModel, SignalValue, UpdateBlock};
use crate::names::{Access, Resolved, Resolver, Role};
use crate::types::CType;

/// Arithmetic types after integral promotion, ordered so that the common
/// type of two operands is the greater one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Native {
    Int,
    UInt,
    LongLong,
    ULongLong,
}

impl Native {
    /// Type an expression reading storage of `ctype` evaluates in
    fn of_storage(ctype: &CType) -> Native {
        match ctype {
            CType::Int => Native::LongLong,
            CType::Bits { width } if *width <= 16 => Native::Int,
            CType::Bits { width } if *width <= 32 => Native::UInt,
            _ => Native::ULongLong,
        }
    }

    fn of_literal(value: i64) -> Native {
        if i32::try_from(value).is_ok() {
            Native::Int
        } else {
            Native::LongLong
        }
    }

    fn bits(self) -> u32 {
        match self {
            Native::Int | Native::UInt => 32,
            Native::LongLong | Native::ULongLong => 64,
        }
    }

    fn is_signed(self) -> bool {
        matches!(self, Native::Int | Native::LongLong)
    }
}

/// A value in its native type. 32-bit values are kept sign or zero extended
/// to 64 bits, so `bits` compares correctly as `i64` or `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Value {
    bits: u64,
    ty: Native,
}

impl Value {
    fn new(bits: u64, ty: Native) -> Self {
        let bits = match ty {
            Native::Int => bits as i32 as i64 as u64,
            Native::UInt => bits as u32 as u64,
            Native::LongLong | Native::ULongLong => bits,
        };
        Self { bits, ty }
    }

    fn flag(on: bool) -> Self {
        Self::new(on as u64, Native::Int)
    }

    fn to(self, ty: Native) -> Self {
        Self::new(self.bits, ty)
    }

    fn is_true(self) -> bool {
        self.bits != 0
    }
}

fn truncate(value: u64, ctype: &CType) -> u64 {
    match ctype {
        CType::Bits { width } if *width < 64 => value & ((1u64 << width) - 1),
        _ => value,
    }
}

fn value_bits(value: &SignalValue) -> u64 {
    match value {
        SignalValue::Int { value } => *value as u64,
        SignalValue::Bits { width, value } => truncate(*value, &CType::Bits { width: *width }),
        _ => 0,
    }
}

fn initial_words(value: &SignalValue) -> Vec<u64> {
    match value {
        SignalValue::Record { fields, .. } => fields.iter().map(|f| value_bits(&f.value)).collect(),
        scalar => vec![value_bits(scalar)],
    }
}

/// Current and next words of every net; scalars hold one word, records one per field
#[derive(Debug, Clone, PartialEq)]
struct State {
    current: Vec<Vec<u64>>,
    next: Vec<Vec<u64>>,
}

impl State {
    fn storage(&self, access: Access) -> &Vec<Vec<u64>> {
        match access {
            Access::Current => &self.current,
            Access::Next => &self.next,
        }
    }

    fn storage_mut(&mut self, access: Access) -> &mut Vec<Vec<u64>> {
        match access {
            Access::Current => &mut self.current,
            Access::Next => &mut self.next,
        }
    }

    fn commit(&mut self) {
        self.current.clone_from(&self.next);
    }
}

pub struct Interpreter {
    name: String,
    layout: Layout,
    blocks: Vec<UpdateBlock>,
    state: State,
    cycles: u64,
}

impl Interpreter {
    pub fn new(model: &ElaboratedModel) -> Result<Self> {
        let layout = generate_unit(model, false)?.layout;
        let current: Vec<Vec<u64>> = model.nets.iter().map(|net| initial_words(&net.members[0].value)).collect();
        Ok(Self {
            name: model.name.clone(),
            layout,
            blocks: model.blocks.clone(),
            state: State { next: current.clone(), current },
            cycles: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn slot(&self, name: &str) -> Result<(usize, usize, CType)> {
        let location = self.layout.locate(name).ok_or_else(|| Error::UnknownSignal(name.to_string()))?;
        if location.ctype.is_record() {
            return Err(Error::UnknownSignal(format!("{} is a record; address one of its fields", name)));
        }
        Ok((location.net, location.field.unwrap_or(0), location.ctype))
    }

    pub fn peek(&self, name: &str) -> Result<u64> {
        let (net, word, _) = self.slot(name)?;
        Ok(self.state.current[net][word])
    }

    pub fn poke(&mut self, name: &str, value: u64) -> Result<()> {
        let (net, word, ctype) = self.slot(name)?;
        let value = truncate(value, &ctype);
        self.state.current[net][word] = value;
        self.state.next[net][word] = value;
        Ok(())
    }

    pub fn cycle(&mut self) -> Result<()> {
        for block in &self.blocks {
            let resolver = Resolver::new(&self.layout, &block.component, block.function_name());
            let mut exec = Exec { resolver, kind: block.kind, state: &mut self.state };
            exec.stmts(&block.body)?;
        }
        self.state.commit();
        self.cycles += 1;
        Ok(())
    }
}

struct Exec<'a, 'b> {
    resolver: Resolver<'a>,
    kind: BlockKind,
    state: &'b mut State,
}

impl Exec<'_, '_> {
    fn stmts(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { targets, value } => {
                let [target] = targets.as_slice() else {
                    return Err(Error::UnsupportedConstruct("multiple assignment targets".to_string()));
                };
                let target = self.store_target(target)?;
                if target.ctype.is_record() {
                    return self.copy_record(&target, value);
                }
                let value = self.eval(value)?;
                self.store(&target, value);
                Ok(())
            }
            Stmt::AugAssign { target, op, value } => {
                let target = self.store_target(target)?;
                let current = self.load(&target);
                let value = binop(*op, current, self.eval(value)?)?;
                self.store(&target, value);
                Ok(())
            }
            Stmt::If { test, body, orelse } => {
                if self.eval(test)?.is_true() {
                    self.stmts(body)
                } else {
                    self.stmts(orelse)
                }
            }
            Stmt::Pass => Ok(()),
            other => Err(Error::UnsupportedConstruct(other.kind().to_string())),
        }
    }

    fn store_target(&self, target: &Expr) -> Result<Resolved> {
        self.resolver.resolve(target, Access::select(self.kind, Role::Store))
    }

    fn load(&self, r: &Resolved) -> Value {
        let word = r.field.as_ref().map_or(0, |(idx, _)| *idx);
        Value::new(self.state.storage(r.access)[r.net][word], Native::of_storage(&r.ctype))
    }

    fn store(&mut self, r: &Resolved, value: Value) {
        let word = r.field.as_ref().map_or(0, |(idx, _)| *idx);
        let value = truncate(value.bits, &r.ctype);
        self.state.storage_mut(r.access)[r.net][word] = value;
        if self.kind == BlockKind::Combinational {
            self.state.next[r.net][word] = value;
        }
    }

    fn copy_record(&mut self, target: &Resolved, value: &Expr) -> Result<()> {
        let source = self.resolver.resolve(value, Access::Current)?;
        if !source.ctype.is_record() || source.ctype != target.ctype {
            return Err(Error::UnsupportedConstruct(format!("record {} assigned a non-record", target.signal)));
        }
        let words = self.state.current[source.net].clone();
        if self.kind == BlockKind::Combinational {
            self.state.next[target.net].clone_from(&words);
        }
        self.state.storage_mut(target.access)[target.net] = words;
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        Ok(match expr {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => {
                let r = self.resolver.resolve(expr, Access::Current)?;
                if r.ctype.is_record() {
                    return Err(Error::UnsupportedConstruct(format!("record {} used as a value", r.signal)));
                }
                self.load(&r)
            }
            Expr::Num { value } => Value::new(*value as u64, Native::of_literal(*value)),
            Expr::BinOp { left, op, right } => binop(*op, self.eval(left)?, self.eval(right)?)?,
            Expr::UnaryOp { op, operand } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Invert => Value::new(!v.bits, v.ty),
                    UnaryOp::Not => Value::flag(!v.is_true()),
                    UnaryOp::UAdd => v,
                    UnaryOp::USub => Value::new(v.bits.wrapping_neg(), v.ty),
                }
            }
            Expr::BoolOp { op, values } => {
                // Short-circuits like the native operators
                let mut result = matches!(op, BoolOp::And);
                for value in values {
                    let truthy = self.eval(value)?.is_true();
                    match op {
                        BoolOp::And if !truthy => {
                            result = false;
                            break;
                        }
                        BoolOp::Or if truthy => {
                            result = true;
                            break;
                        }
                        _ => {}
                    }
                }
                Value::flag(result)
            }
            Expr::Compare { left, ops, comparators } => {
                let ([op], [right]) = (ops.as_slice(), comparators.as_slice()) else {
                    return Err(Error::UnsupportedConstruct("chained comparison".to_string()));
                };
                compare(*op, self.eval(left)?, self.eval(right)?)?
            }
            Expr::IfExp { test, body, orelse } => {
                let test = self.eval(test)?;
                let (body, orelse) = (self.eval(body)?, self.eval(orelse)?);
                let ty = body.ty.max(orelse.ty);
                if test.is_true() {
                    body.to(ty)
                } else {
                    orelse.to(ty)
                }
            }
            other => return Err(Error::UnsupportedConstruct(other.kind().to_string())),
        })
    }
}

fn binop(op: BinOp, l: Value, r: Value) -> Result<Value> {
    if matches!(op, BinOp::Shl | BinOp::Shr) {
        let amount = (r.bits as u32) & (l.ty.bits() - 1);
        let bits = match op {
            BinOp::Shl => l.bits.wrapping_shl(amount),
            _ if l.ty.is_signed() => ((l.bits as i64) >> amount) as u64,
            _ => l.bits >> amount,
        };
        return Ok(Value::new(bits, l.ty));
    }

    let ty = l.ty.max(r.ty);
    let (a, b) = (l.to(ty).bits, r.to(ty).bits);
    let bits = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mult => a.wrapping_mul(b),
        BinOp::Div | BinOp::FloorDiv if ty.is_signed() => (a as i64).checked_div(b as i64).unwrap_or(0) as u64,
        BinOp::Div | BinOp::FloorDiv => a.checked_div(b).unwrap_or(0),
        BinOp::Mod if ty.is_signed() => (a as i64).checked_rem(b as i64).unwrap_or(0) as u64,
        BinOp::Mod => a.checked_rem(b).unwrap_or(0),
        BinOp::BitOr => a | b,
        BinOp::BitAnd => a & b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl | BinOp::Shr | BinOp::Pow | BinOp::MatMult => {
            return Err(Error::UnsupportedOperator(op.to_string()))
        }
    };
    Ok(Value::new(bits, ty))
}

fn compare(op: CmpOp, l: Value, r: Value) -> Result<Value> {
    let ty = l.ty.max(r.ty);
    let (a, b) = (l.to(ty).bits, r.to(ty).bits);
    let ordering = if ty.is_signed() { (a as i64).cmp(&(b as i64)) } else { a.cmp(&b) };
    let result = match op {
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::NotEq => ordering.is_ne(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::LtE => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::GtE => ordering.is_ge(),
        other => return Err(Error::UnsupportedOperator(other.to_string())),
    };
    Ok(Value::flag(result))
}
