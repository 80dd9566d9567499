//! Object layout (spec §4.4.1): deterministic field order and offsets for
//! every class's record type, computed once from the symbol table before
//! any IR is emitted.

use dj_core::TypeId;

use crate::analyze::SymbolTable;

/// One instance field's position within a class's record, independent of
/// which class in the chain actually declares it.
#[derive(Debug, Clone, Copy)]
pub struct LayoutField {
    pub declaring_class: TypeId,
    /// Index of this field within `declaring_class`'s own `instance_vars`.
    pub local_index: u32,
    pub type_id: TypeId,
}

/// A class's full record layout: fields 0 and 1 (self-pointer, class-id) are
/// implicit and not listed here: `LayoutField`s start at struct field index
/// 2. Own fields come first in source order, then each ancestor's own
/// fields walking up to (but not including) `Object`, which never
/// contributes fields.
#[derive(Debug, Clone)]
pub struct ClassLayout {
    pub struct_name: String,
    pub fields: Vec<LayoutField>,
}

impl ClassLayout {
    /// The struct field index (0-based, already offset past the two header
    /// fields) holding the value of `declaring_class`'s `local_index`-th own
    /// instance field.
    pub fn field_index(&self, declaring_class: TypeId, local_index: u32) -> u32 {
        self.fields
            .iter()
            .position(|f| f.declaring_class == declaring_class && f.local_index == local_index)
            .expect("field_index called with a field absent from this class's layout") as u32
            + HEADER_FIELDS
    }
}

/// Struct field 0: self-pointer. Struct field 1: class-id. Every record's
/// own/inherited fields start at index 2.
pub const SELF_FIELD: u32 = 0;
pub const CLASS_ID_FIELD: u32 = 1;
pub const HEADER_FIELDS: u32 = 2;

pub fn build_layouts(table: &SymbolTable) -> Vec<ClassLayout> {
    (0..table.class_count())
        .map(|i| build_layout(table, TypeId::class(i)))
        .collect()
}

fn build_layout(table: &SymbolTable, class: TypeId) -> ClassLayout {
    let mut fields = Vec::new();
    let mut cur = class;
    loop {
        let entry = table.class(cur);
        for (index, var) in entry.instance_vars.iter().enumerate() {
            fields.push(LayoutField {
                declaring_class: cur,
                local_index: index as u32,
                type_id: table.type_of(&var.type_name),
            });
        }
        if cur == TypeId::OBJECT {
            break;
        }
        cur = entry.superclass;
    }
    ClassLayout {
        struct_name: table.class(class).name.clone(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::symbol_table;
    use crate::parser::parse;

    fn layouts_for(src: &str) -> (SymbolTable, Vec<ClassLayout>) {
        let program = parse(src).expect("parse");
        let table = symbol_table::build(&program).expect("symbol table");
        let layouts = build_layouts(&table);
        (table, layouts)
    }

    #[test]
    fn own_fields_precede_inherited_fields() {
        let (table, layouts) = layouts_for(
            "class A { nat a; }\nclass B extends A { nat b; }\nmain { }",
        );
        let b = table.resolve_class_name("B").unwrap();
        let a = table.resolve_class_name("A").unwrap();
        let layout = &layouts[b.class_index().unwrap() as usize];
        assert_eq!(layout.fields.len(), 2);
        assert_eq!(layout.fields[0].declaring_class, b);
        assert_eq!(layout.fields[1].declaring_class, a);
        assert_eq!(layout.field_index(b, 0), HEADER_FIELDS);
        assert_eq!(layout.field_index(a, 0), HEADER_FIELDS + 1);
    }

    #[test]
    fn object_has_no_fields() {
        let (_, layouts) = layouts_for("main { }");
        assert!(layouts[0].fields.is_empty());
    }

    #[test]
    fn three_level_chain_walks_to_object() {
        let (table, layouts) = layouts_for(
            "class A { nat a; }\nclass B extends A { nat b; }\nclass C extends B { nat c; }\nmain { }",
        );
        let c = table.resolve_class_name("C").unwrap();
        let layout = &layouts[c.class_index().unwrap() as usize];
        let names: Vec<_> = layout.fields.iter().map(|f| f.declaring_class).collect();
        assert_eq!(names, vec![c, table.resolve_class_name("B").unwrap(), table.resolve_class_name("A").unwrap()]);
    }
}
