//! Name flattening and resolution
//!
//! An access chain such as `s.out.next` or `s.msg.dest` is resolved against
//! the layout to a signal, an optional record field and an explicit
//! [`Access`]. Which storage an access targets (current or shadow) is decided
//! by the syntactic role of the access and the kind of block it appears in,
//! never by the spelling of the name.

use crate::ast::Expr;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::model::BlockKind;
use crate::types::CType;

/// Value accessors allowed directly after a signal (`s.out.next`, `s.in_.value`)
pub const VALUE_ACCESSORS: [&str; 4] = ["next", "n", "value", "v"];

/// Flatten a qualified path into one identifier: `a.b[2]` becomes `a_b_2`
pub fn mangle(qualified: &str) -> String {
    qualified
        .chars()
        .filter_map(|c| match c {
            '.' | '[' => Some('_'),
            ']' => None,
            c => Some(c),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Current,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Load,
    Store,
}

impl Access {
    /// Stores in clocked blocks stage the next value; everything else is current
    pub fn select(kind: BlockKind, role: Role) -> Access {
        match (kind, role) {
            (BlockKind::Clocked, Role::Store) => Access::Next,
            _ => Access::Current,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Qualified signal name
    pub signal: String,
    pub net: usize,
    /// Field index and name, when a record field is accessed
    pub field: Option<(usize, String)>,
    /// Type of the accessed value
    pub ctype: CType,
    pub access: Access,
}

impl Resolved {
    /// Identifier of the alias declared for this access
    pub fn identifier(&self) -> String {
        let mut ident = mangle(&self.signal);
        if self.access == Access::Next {
            ident.push_str("_next");
        }
        if let Some((_, field)) = &self.field {
            ident.push('.');
            ident.push_str(field);
        }
        ident
    }

    pub fn with_access(&self, access: Access) -> Resolved {
        Resolved { access, ..self.clone() }
    }
}

/// Resolves access chains inside one update block
pub struct Resolver<'a> {
    layout: &'a Layout,
    component: &'a str,
    block: String,
}

impl<'a> Resolver<'a> {
    pub fn new(layout: &'a Layout, component: &'a str, block: String) -> Self {
        Self { layout, component, block }
    }

    fn path(&self, expr: &Expr) -> Result<Vec<String>> {
        match expr {
            Expr::Name { id } if id == "s" || id == "self" => Ok(vec![self.component.to_string()]),
            Expr::Name { id } => Ok(vec![id.clone()]),
            Expr::Attribute { value, attr } => {
                let mut path = self.path(value)?;
                path.push(attr.clone());
                Ok(path)
            }
            Expr::Subscript { value, index } => {
                let mut path = self.path(value)?;
                match index.as_ref() {
                    Expr::Num { value: idx } if *idx >= 0 => {
                        if let Some(last) = path.last_mut() {
                            last.push_str(&format!("[{}]", idx));
                        }
                        Ok(path)
                    }
                    Expr::Slice { .. } => Err(Error::UnsupportedConstruct(format!("slice in {}", self.block))),
                    _ => Err(Error::UnsupportedConstruct(format!("dynamic subscript in {}", self.block))),
                }
            }
            other => Err(Error::UnsupportedConstruct(format!(
                "{} used as a signal in {}",
                other.kind(),
                self.block
            ))),
        }
    }

    pub fn resolve(&self, expr: &Expr, access: Access) -> Result<Resolved> {
        let path = self.path(expr)?;
        let unresolved = || Error::UnresolvedName { block: self.block.clone(), name: path.join(".") };

        // Longest prefix naming a signal
        let (split, net) = (1..=path.len())
            .rev()
            .find_map(|k| self.layout.member(&path[..k].join(".")).map(|net| (k, net)))
            .ok_or_else(unresolved)?;
        let signal = path[..split].join(".");
        let net_type = self.layout.net(net).ctype.clone();
        let record = match &net_type {
            CType::Record { name } => self.layout.record(name),
            _ => None,
        };

        let mut field: Option<(usize, String, CType)> = None;
        let mut accessor_seen = false;
        for segment in &path[split..] {
            let as_field = if field.is_none() { record.and_then(|r| r.field(segment)) } else { None };
            if let Some((idx, layout)) = as_field {
                field = Some((idx, segment.clone(), layout.ctype.clone()));
            } else if !accessor_seen && VALUE_ACCESSORS.contains(&segment.as_str()) {
                accessor_seen = true;
            } else {
                return Err(unresolved());
            }
        }

        Ok(match field {
            Some((idx, name, ctype)) => Resolved { signal, net, field: Some((idx, name)), ctype, access },
            None => Resolved { signal, net, field: None, ctype: net_type, access },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordDecl;

    fn layout() -> Layout {
        let mut layout = Layout::new("Top");
        layout.add_record(&RecordDecl {
            name: "Msg".into(),
            fields: vec![("v".into(), CType::Bits { width: 1 }), ("data".into(), CType::Bits { width: 8 })],
        });
        let a = layout.add_net(CType::Bits { width: 8 });
        let b = layout.add_net(CType::Record { name: "Msg".into() });
        let c = layout.add_net(CType::Int);
        layout.add_member("Top.in_", a);
        layout.add_member("Top.reg0.out", a);
        layout.add_member("Top.msg", b);
        layout.add_member("Top.out[2]", c);
        layout
    }

    #[test]
    fn test_mangle() {
        assert_eq!(mangle("Top.reg0.out"), "Top_reg0_out");
        assert_eq!(mangle("Top.out[2]"), "Top_out_2");
    }

    #[test]
    fn test_access_selection() {
        assert_eq!(Access::select(BlockKind::Clocked, Role::Store), Access::Next);
        assert_eq!(Access::select(BlockKind::Clocked, Role::Load), Access::Current);
        assert_eq!(Access::select(BlockKind::Combinational, Role::Store), Access::Current);
    }

    #[test]
    fn test_resolve_accessor_and_role() {
        let layout = layout();
        let resolver = Resolver::new(&layout, "Top", "Top_logic".into());
        let r = resolver.resolve(&Expr::path("s.in_.next"), Access::Current).unwrap();
        assert_eq!(r.identifier(), "Top_in_");
        let r = resolver.resolve(&Expr::path("s.in_"), Access::Next).unwrap();
        assert_eq!(r.identifier(), "Top_in__next");
        assert_eq!(r.ctype, CType::Bits { width: 8 });
    }

    #[test]
    fn test_resolve_submodule_and_subscript() {
        let layout = layout();
        let resolver = Resolver::new(&layout, "Top.reg0", "Top_reg0_logic".into());
        let r = resolver.resolve(&Expr::path("s.out.n"), Access::Next).unwrap();
        assert_eq!(r.identifier(), "Top_reg0_out_next");
        assert_eq!(r.net, 0);

        let resolver = Resolver::new(&layout, "Top", "Top_logic".into());
        let r = resolver.resolve(&Expr::path("s.out[2].value"), Access::Current).unwrap();
        assert_eq!(r.identifier(), "Top_out_2");
        assert_eq!(r.ctype, CType::Int);
    }

    #[test]
    fn test_record_field_named_like_accessor() {
        let layout = layout();
        let resolver = Resolver::new(&layout, "Top", "Top_logic".into());
        // `v` is a field of Msg, not a value accessor
        let r = resolver.resolve(&Expr::path("s.msg.v"), Access::Current).unwrap();
        assert_eq!(r.identifier(), "Top_msg.v");
        let r = resolver.resolve(&Expr::path("s.msg.next.data"), Access::Next).unwrap();
        assert_eq!(r.identifier(), "Top_msg_next.data");
        assert_eq!(r.field, Some((1, "data".to_string())));
    }

    #[test]
    fn test_unresolved_names() {
        let layout = layout();
        let resolver = Resolver::new(&layout, "Top", "Top_logic".into());
        for path in ["s.missing", "s.in_.next.next", "s.in_.data", "x"] {
            let err = resolver.resolve(&Expr::path(path), Access::Current).unwrap_err();
            assert!(matches!(err, Error::UnresolvedName { .. }), "{}", path);
        }
    }

    #[test]
    fn test_dynamic_subscript_and_slice() {
        let layout = layout();
        let resolver = Resolver::new(&layout, "Top", "Top_logic".into());
        let dynamic = Expr::Subscript {
            value: Box::new(Expr::path("s.out")),
            index: Box::new(Expr::name("i")),
        };
        assert!(matches!(resolver.resolve(&dynamic, Access::Current), Err(Error::UnsupportedConstruct(_))));
        let slice = Expr::Subscript {
            value: Box::new(Expr::path("s.in_")),
            index: Box::new(Expr::Slice { lower: None, upper: Some(Box::new(Expr::num(4))) }),
        };
        assert!(matches!(resolver.resolve(&slice, Access::Current), Err(Error::UnsupportedConstruct(_))));
    }
}
