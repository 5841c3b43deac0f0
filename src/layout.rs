//! Binary layout descriptor
//!
//! Mirrors the declaration section: one slot per net with its native type,
//! the member-name to net mapping, and the field offsets of every record
//! type. The declaration emitter builds it; the translator resolves names
//! against it; the binder checks it against the `sim_layout` tables that the
//! generated code exports.

use indexmap::IndexMap;

use crate::types::{CType, RecordDecl};

#[derive(Debug, Clone, PartialEq)]
pub struct NetSlot {
    pub id: usize,
    pub ctype: CType,
    pub size: usize,
}

impl NetSlot {
    pub fn symbol(&self) -> String {
        net_symbol(self.id)
    }

    pub fn shadow_symbol(&self) -> String {
        format!("{}_next", net_symbol(self.id))
    }
}

pub fn net_symbol(id: usize) -> String {
    format!("net_{:05}", id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub ctype: CType,
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<FieldLayout>,
}

impl RecordLayout {
    /// Natural alignment, as the C ABI lays out a struct of scalars
    pub fn from_decl(decl: &RecordDecl) -> Self {
        let mut offset = 0usize;
        let mut align = 1usize;
        let mut fields = Vec::with_capacity(decl.fields.len());
        for (name, ctype) in &decl.fields {
            let size = ctype.scalar_size().unwrap_or(8);
            offset = (offset + size - 1) & !(size - 1);
            align = align.max(size);
            fields.push(FieldLayout { name: name.clone(), ctype: ctype.clone(), offset, size });
            offset += size;
        }
        let size = ((offset + align - 1) & !(align - 1)).max(1);
        Self { name: decl.name.clone(), size, align, fields }
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldLayout)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn table_symbol(&self) -> String {
        format!("sim_layout_{}", self.name)
    }

    /// Expected contents of this record's native layout table
    pub fn table(&self) -> Vec<u64> {
        let mut table = vec![self.size as u64];
        table.extend(self.fields.iter().map(|f| f.size as u64));
        table
    }
}

/// Where a qualified name lives in native storage
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub net: usize,
    pub field: Option<usize>,
    pub offset: usize,
    pub ctype: CType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Top instance name, used to accept names relative to it
    pub top: String,
    pub nets: Vec<NetSlot>,
    pub members: IndexMap<String, usize>,
    pub records: IndexMap<String, RecordLayout>,
}

pub const NET_TABLE_SYMBOL: &str = "sim_layout";

impl Layout {
    pub fn new(top: &str) -> Self {
        Self { top: top.to_string(), ..Self::default() }
    }

    pub fn add_record(&mut self, decl: &RecordDecl) {
        self.records
            .entry(decl.name.clone())
            .or_insert_with(|| RecordLayout::from_decl(decl));
    }

    pub fn add_net(&mut self, ctype: CType) -> usize {
        let id = self.nets.len();
        let size = match &ctype {
            CType::Record { name } => self.records.get(name).map(|r| r.size).unwrap_or(0),
            scalar => scalar.scalar_size().unwrap_or(0),
        };
        self.nets.push(NetSlot { id, ctype, size });
        id
    }

    pub fn add_member(&mut self, qualified: &str, net: usize) {
        self.members.insert(qualified.to_string(), net);
    }

    pub fn member(&self, qualified: &str) -> Option<usize> {
        self.members.get(qualified).copied()
    }

    pub fn net(&self, id: usize) -> &NetSlot {
        &self.nets[id]
    }

    pub fn record(&self, name: &str) -> Option<&RecordLayout> {
        self.records.get(name)
    }

    /// Locate `name` (`sig` or `sig.field`), qualified or relative to the top instance
    pub fn locate(&self, name: &str) -> Option<Location> {
        self.locate_qualified(name)
            .or_else(|| self.locate_qualified(&format!("{}.{}", self.top, name)))
    }

    fn locate_qualified(&self, name: &str) -> Option<Location> {
        if let Some(net) = self.member(name) {
            let ctype = self.nets[net].ctype.clone();
            return Some(Location { net, field: None, offset: 0, ctype });
        }
        let (signal, field) = name.rsplit_once('.')?;
        let net = self.member(signal)?;
        let CType::Record { name: type_name } = &self.nets[net].ctype else {
            return None;
        };
        let (idx, field) = self.record(type_name)?.field(field)?;
        Some(Location { net, field: Some(idx), offset: field.offset, ctype: field.ctype.clone() })
    }

    /// Expected contents of `sim_layout`: net count, then each net's size
    pub fn net_table(&self) -> Vec<u64> {
        let mut table = vec![self.nets.len() as u64];
        table.extend(self.nets.iter().map(|n| n.size as u64));
        table
    }

    /// Declarations exporting the native layout tables
    pub fn table_declarations(&self) -> String {
        let mut code = String::new();
        let mut entries = vec![self.nets.len().to_string()];
        entries.extend(self.nets.iter().map(|n| format!("sizeof({})", n.symbol())));
        code.push_str(&format!(
            "extern \"C\" const unsigned long long {}[] = {{ {} }};\n",
            NET_TABLE_SYMBOL,
            entries.join(", ")
        ));
        for record in self.records.values() {
            let mut entries = vec![format!("sizeof({})", record.name)];
            entries.extend(record.fields.iter().map(|f| format!("sizeof({}::{})", record.name, f.name)));
            code.push_str(&format!(
                "extern \"C\" const unsigned long long {}[] = {{ {} }};\n",
                record.table_symbol(),
                entries.join(", ")
            ));
        }
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg_decl() -> RecordDecl {
        RecordDecl {
            name: "Msg".to_string(),
            fields: vec![
                ("valid".to_string(), CType::Bits { width: 1 }),
                ("data".to_string(), CType::Bits { width: 32 }),
                ("tag".to_string(), CType::Bits { width: 16 }),
            ],
        }
    }

    #[test]
    fn test_record_natural_alignment() {
        let layout = RecordLayout::from_decl(&msg_decl());
        let offsets: Vec<_> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(layout.align, 4);
        assert_eq!(layout.size, 12);
        assert_eq!(layout.table(), vec![12, 1, 4, 2]);
    }

    #[test]
    fn test_locate_fields_and_relative_names() {
        let mut layout = Layout::new("Top");
        layout.add_record(&msg_decl());
        let a = layout.add_net(CType::Bits { width: 8 });
        let b = layout.add_net(CType::Record { name: "Msg".into() });
        layout.add_member("Top.in_", a);
        layout.add_member("Top.msg", b);

        assert_eq!(layout.locate("in_").map(|l| l.net), Some(a));
        let data = layout.locate("Top.msg.data").unwrap();
        assert_eq!((data.net, data.field, data.offset), (b, Some(1), 4));
        assert_eq!(data.ctype, CType::Bits { width: 32 });
        assert!(layout.locate("msg.missing").is_none());
        assert!(layout.locate("in_.data").is_none());
        assert_eq!(layout.net_table(), vec![2, 1, 12]);
    }

    #[test]
    fn test_table_declarations() {
        let mut layout = Layout::new("Top");
        layout.add_record(&msg_decl());
        layout.add_net(CType::Int);
        let code = layout.table_declarations();
        assert_eq!(
            code,
            "extern \"C\" const unsigned long long sim_layout[] = { 1, sizeof(net_00000) };\n\
             extern \"C\" const unsigned long long sim_layout_Msg[] = { sizeof(Msg), sizeof(Msg::valid), sizeof(Msg::data), sizeof(Msg::tag) };\n"
        );
    }
}
