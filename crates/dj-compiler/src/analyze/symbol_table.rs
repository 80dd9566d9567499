//! Symbol-table construction (spec §4.1).
//!
//! Builds the class table from the parsed `Program` in two passes, class 0
//! always `Object`, user classes following in source order. The first pass
//! registers every class's name (and resolves its `extends` clause, which
//! may only name a class already registered by that point - forward
//! references to a superclass are rejected, which is what makes the
//! inheritance graph a forward-only DAG by construction rather than
//! something that needs a separate cycle search). The second pass resolves
//! every field/parameter/return type against the now-complete name table,
//! so a field or method signature may name *any* class in the program
//! regardless of declaration order (`class A { B b; }` before `class B {}`
//! is fine; only `extends` itself is forward-only).

use indexmap::IndexMap;

use dj_core::TypeId;

use crate::ast::{ClassDecl, Expr, MethodDecl, Program, TypeName, VarDecl};
use crate::diagnostics::Diagnostics;
use crate::error::StaticError;

#[derive(Debug)]
pub struct ClassEntry {
    pub name: String,
    pub superclass: TypeId,
    pub static_vars: Vec<VarDecl>,
    pub static_index: IndexMap<String, u32>,
    pub instance_vars: Vec<VarDecl>,
    pub instance_index: IndexMap<String, u32>,
    pub methods: Vec<MethodDecl>,
    pub method_index: IndexMap<String, u32>,
}

impl ClassEntry {
    fn object_root() -> Self {
        Self {
            name: "Object".to_owned(),
            superclass: TypeId::NO_OBJECT,
            static_vars: Vec::new(),
            static_index: IndexMap::new(),
            instance_vars: Vec::new(),
            instance_index: IndexMap::new(),
            methods: Vec::new(),
            method_index: IndexMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    pub classes: Vec<ClassEntry>,
    pub class_index: IndexMap<String, u32>,
    pub main_locals: Vec<VarDecl>,
    pub has_instanceof: bool,
    pub has_print_nat: bool,
    pub has_read_nat: bool,
}

impl SymbolTable {
    pub fn class_count(&self) -> u32 {
        self.classes.len() as u32
    }

    pub fn class(&self, id: TypeId) -> &ClassEntry {
        &self.classes[id.class_index().expect("class() called with a non-class TypeId") as usize]
    }

    pub fn resolve_class_name(&self, name: &str) -> Option<TypeId> {
        if name == "Object" {
            return Some(TypeId::OBJECT);
        }
        self.class_index.get(name).map(|&i| TypeId::class(i))
    }

    /// Resolves a declared `TypeName` to its `TypeId`. Panics if the name
    /// does not resolve - callers only use this after a successful symbol
    /// table build, which already validated every declared type.
    pub fn type_of(&self, tn: &TypeName) -> TypeId {
        match tn {
            TypeName::Nat => TypeId::NAT,
            TypeName::Bool => TypeId::BOOL,
            TypeName::Class(name) => self
                .resolve_class_name(name)
                .expect("declared types are validated by the symbol table builder"),
        }
    }

    /// `sub`'s superclass chain, starting with `sub` itself and ending at
    /// `Object`.
    pub fn chain(&self, sub: TypeId) -> Vec<TypeId> {
        let mut out = vec![sub];
        let mut cur = sub;
        while cur != TypeId::OBJECT {
            cur = self.class(cur).superclass;
            out.push(cur);
        }
        out
    }

    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        if sup == TypeId::ANY_OBJECT {
            return sub == TypeId::ANY_OBJECT;
        }
        if sup == TypeId::OBJECT {
            return sub.class_index().is_some() || sub == TypeId::ANY_OBJECT;
        }
        if sub == TypeId::ANY_OBJECT {
            return sup.class_index().is_some();
        }
        let (Some(_), Some(_)) = (sub.class_index(), sup.class_index()) else {
            return false;
        };
        let mut cur = sub;
        loop {
            if cur == sup {
                return true;
            }
            if cur == TypeId::OBJECT {
                return false;
            }
            cur = self.class(cur).superclass;
        }
    }
}

fn resolve_type(
    class_index: &IndexMap<String, u32>,
    tn: &TypeName,
) -> Option<TypeId> {
    match tn {
        TypeName::Nat => Some(TypeId::NAT),
        TypeName::Bool => Some(TypeId::BOOL),
        TypeName::Class(name) if name == "Object" => Some(TypeId::OBJECT),
        TypeName::Class(name) => class_index.get(name).map(|&i| TypeId::class(i)),
    }
}

pub fn build(program: &Program) -> Result<SymbolTable, StaticError> {
    let mut diagnostics = Diagnostics::new();
    let mut classes = vec![ClassEntry::object_root()];
    let mut class_index = IndexMap::new();
    class_index.insert("Object".to_owned(), 0u32);

    // Pass 1: register every class's name and resolve its superclass. Each
    // `decl` gets a `Some(superclass)` entry here iff it isn't a duplicate
    // name, so pass 2 can skip duplicates identically and keep both passes'
    // indices in lockstep.
    let mut superclasses = Vec::with_capacity(program.classes.len());
    for decl in &program.classes {
        if class_index.contains_key(&decl.name) {
            diagnostics.error(decl.name_line, format!("duplicate class `{}`", decl.name));
            superclasses.push(None);
            continue;
        }

        let superclass = match &decl.superclass_name {
            None => TypeId::OBJECT,
            Some(name) => match resolve_type(&class_index, &TypeName::Class(name.clone())) {
                Some(id) => id,
                None => {
                    diagnostics.error(
                        decl.superclass_line,
                        format!("unknown superclass `{name}` (classes must be declared before they are extended)"),
                    );
                    TypeId::OBJECT
                }
            },
        };

        let own_index = class_index.len() as u32;
        class_index.insert(decl.name.clone(), own_index);
        superclasses.push(Some(superclass));
    }

    // Pass 2: resolve every field/parameter/return type against the
    // now-complete `class_index`, so member signatures may name any class in
    // the program regardless of declaration order.
    for (decl, superclass) in program.classes.iter().zip(&superclasses) {
        let Some(superclass) = *superclass else {
            continue;
        };
        build_class(decl, superclass, &mut classes, &class_index, &mut diagnostics);
    }

    if diagnostics.has_errors() {
        diagnostics.sort_by_line();
        return Err(StaticError::new(diagnostics));
    }

    let mut table = SymbolTable {
        classes,
        class_index,
        main_locals: program.main_locals.clone(),
        has_instanceof: false,
        has_print_nat: false,
        has_read_nat: false,
    };
    validate_acyclic(&table, &mut diagnostics);
    scan_usage_flags(program, &mut table);

    if diagnostics.has_errors() {
        diagnostics.sort_by_line();
        return Err(StaticError::new(diagnostics));
    }
    Ok(table)
}

fn build_class(
    decl: &ClassDecl,
    superclass: TypeId,
    classes: &mut Vec<ClassEntry>,
    class_index: &IndexMap<String, u32>,
    diagnostics: &mut Diagnostics,
) {
    let mut static_index = IndexMap::new();
    let mut static_vars = Vec::new();
    for var in &decl.static_vars {
        if static_index.contains_key(&var.name) {
            diagnostics.error(var.name_line, format!("duplicate static field `{}`", var.name));
            continue;
        }
        check_type(&var.type_name, var.type_line, class_index, diagnostics);
        static_index.insert(var.name.clone(), static_vars.len() as u32);
        static_vars.push(var.clone());
    }

    let mut instance_index = IndexMap::new();
    let mut instance_vars = Vec::new();
    for var in &decl.instance_vars {
        if instance_index.contains_key(&var.name) || static_index.contains_key(&var.name) {
            diagnostics.error(var.name_line, format!("duplicate field `{}`", var.name));
            continue;
        }
        check_type(&var.type_name, var.type_line, class_index, diagnostics);
        instance_index.insert(var.name.clone(), instance_vars.len() as u32);
        instance_vars.push(var.clone());
    }

    let mut method_index = IndexMap::new();
    let mut methods = Vec::new();
    for method in &decl.methods {
        if method_index.contains_key(&method.name) {
            diagnostics.error(method.name_line, format!("duplicate method `{}`", method.name));
            continue;
        }
        check_type(&method.return_type, method.return_type_line, class_index, diagnostics);
        check_type(&method.param_type, method.param_type_line, class_index, diagnostics);
        check_override(method, superclass, classes, class_index, diagnostics);
        method_index.insert(method.name.clone(), methods.len() as u32);
        methods.push(method.clone());
    }

    classes.push(ClassEntry {
        name: decl.name.clone(),
        superclass,
        static_vars,
        static_index,
        instance_vars,
        instance_index,
        methods,
        method_index,
    });
}

fn check_type(
    tn: &TypeName,
    line: u32,
    class_index: &IndexMap<String, u32>,
    diagnostics: &mut Diagnostics,
) {
    if resolve_type(class_index, tn).is_none() {
        let name = tn.class_name().unwrap_or("<unknown>");
        diagnostics.error(line, format!("undefined class `{name}`"));
    }
}

fn check_override(
    method: &MethodDecl,
    superclass: TypeId,
    classes: &[ClassEntry],
    class_index: &IndexMap<String, u32>,
    diagnostics: &mut Diagnostics,
) {
    let Some(ret) = resolve_type(class_index, &method.return_type) else {
        return;
    };
    let Some(param) = resolve_type(class_index, &method.param_type) else {
        return;
    };

    let mut cur = superclass;
    loop {
        let entry = &classes[cur.class_index().expect("superclass is always a class") as usize];
        if let Some(&idx) = entry.method_index.get(&method.name) {
            let base = &entry.methods[idx as usize];
            let base_ret = resolve_type(class_index, &base.return_type);
            let base_param = resolve_type(class_index, &base.param_type);
            if base_ret != Some(ret) || base_param != Some(param) {
                diagnostics.error(
                    method.name_line,
                    format!(
                        "method `{}` overrides `{}.{}` with an incompatible signature",
                        method.name, entry.name, method.name
                    ),
                );
            }
            return;
        }
        if cur == TypeId::OBJECT {
            return;
        }
        cur = entry.superclass;
    }
}

fn validate_acyclic(table: &SymbolTable, diagnostics: &mut Diagnostics) {
    let bound = table.class_count();
    for i in 1..bound {
        let mut cur = TypeId::class(i);
        let mut steps = 0u32;
        loop {
            if cur == TypeId::OBJECT {
                break;
            }
            steps += 1;
            if steps > bound {
                diagnostics.error(0, format!("inheritance cycle involving `{}`", table.class(TypeId::class(i)).name));
                break;
            }
            cur = table.class(cur).superclass;
        }
    }
}

fn scan_usage_flags(program: &Program, table: &mut SymbolTable) {
    for class in &program.classes {
        for method in &class.methods {
            scan_exprs(&method.body, table);
        }
    }
    scan_exprs(&program.main_body, table);
}

fn scan_exprs(exprs: &[Expr], table: &mut SymbolTable) {
    for e in exprs {
        scan_expr(e, table);
    }
}

fn scan_expr(e: &Expr, table: &mut SymbolTable) {
    match e {
        Expr::Read { .. } => table.has_read_nat = true,
        Expr::Print { operand, .. } => {
            table.has_print_nat = true;
            scan_expr(operand, table);
        }
        Expr::InstanceOf { object, .. } => {
            table.has_instanceof = true;
            scan_expr(object, table);
        }
        Expr::NatLiteral { .. }
        | Expr::True { .. }
        | Expr::False { .. }
        | Expr::Null { .. }
        | Expr::This { .. }
        | Expr::New { .. }
        | Expr::Id { .. } => {}
        Expr::Not { operand, .. } => scan_expr(operand, table),
        Expr::Plus { lhs, rhs, .. }
        | Expr::Minus { lhs, rhs, .. }
        | Expr::Times { lhs, rhs, .. }
        | Expr::Equality { lhs, rhs, .. }
        | Expr::GreaterThan { lhs, rhs, .. }
        | Expr::And { lhs, rhs, .. } => {
            scan_expr(lhs, table);
            scan_expr(rhs, table);
        }
        Expr::Assign { value, .. } => scan_expr(value, table),
        Expr::DotId { object, .. } => scan_expr(object, table),
        Expr::MethodCall { arg, .. } => scan_expr(arg, table),
        Expr::DotAssign { object, value, .. } => {
            scan_expr(object, table);
            scan_expr(value, table);
        }
        Expr::DotMethodCall { object, arg, .. } => {
            scan_expr(object, table);
            scan_expr(arg, table);
        }
        Expr::For { init, test, update, body, .. } => {
            scan_expr(init, table);
            scan_expr(test, table);
            scan_expr(update, table);
            scan_exprs(body, table);
        }
        Expr::If { cond, then_branch, else_branch, .. } => {
            scan_expr(cond, table);
            scan_exprs(then_branch, table);
            scan_exprs(else_branch, table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn build_src(src: &str) -> Result<SymbolTable, StaticError> {
        build(&parse(src).expect("parse"))
    }

    #[test]
    fn object_is_always_class_zero() {
        let table = build_src("main { }").unwrap();
        assert_eq!(table.class_count(), 1);
        assert_eq!(table.classes[0].name, "Object");
    }

    #[test]
    fn rejects_duplicate_class() {
        let err = build_src("class A { }\nclass A { }\nmain { }").unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn rejects_forward_referenced_superclass() {
        let err = build_src("class A extends B { }\nclass B { }\nmain { }").unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn allows_self_referential_field() {
        let table = build_src("class Node {\n nat value;\n Node next;\n }\nmain { }").unwrap();
        assert_eq!(table.classes[1].instance_vars.len(), 2);
    }

    #[test]
    fn allows_field_type_forward_referencing_a_later_class() {
        let table = build_src("class A {\n B b;\n }\nclass B { }\nmain { }").unwrap();
        let a = table.resolve_class_name("A").unwrap();
        let b = table.resolve_class_name("B").unwrap();
        assert_eq!(table.class(a).instance_vars[0].type_name, TypeName::Class("B".to_owned()));
        assert_eq!(b.class_index(), Some(2));
    }

    #[test]
    fn rejects_field_and_static_name_clash() {
        let err = build_src("class A {\n static nat x;\n nat x;\n }\nmain { }").unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn rejects_incompatible_override() {
        let err = build_src(
            "class A { nat f(nat x) { } }\nclass B extends A { bool f(nat x) { } }\nmain { }",
        )
        .unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn usage_flags_detect_print_and_instanceof() {
        let table = build_src("main { nat x; printNat(1); x = 1; }").unwrap();
        assert!(table.has_print_nat);
        assert!(!table.has_instanceof);
        assert!(!table.has_read_nat);
    }

    #[test]
    fn subtype_respects_inheritance_chain() {
        let table = build_src("class A { }\nclass B extends A { }\nmain { }").unwrap();
        let a = table.resolve_class_name("A").unwrap();
        let b = table.resolve_class_name("B").unwrap();
        assert!(table.is_subtype(b, a));
        assert!(table.is_subtype(b, TypeId::OBJECT));
        assert!(!table.is_subtype(a, b));
        assert!(table.is_subtype(TypeId::ANY_OBJECT, a));
    }
}
