//! Typechecking (spec §4.2).
//!
//! A recursive evaluator that returns a `TypeId` for every expression,
//! validates the rules in §4.2, and writes each node's mutable resolution
//! slots (`Decoration`, `NullContext`, `class_ref`) in the same pass - so
//! translation to the typed IR (§4.3) never repeats a name lookup.

use indexmap::IndexMap;

use dj_core::TypeId;

use crate::analyze::symbol_table::SymbolTable;
use crate::ast::{Decoration, Expr, MethodDecl, NullContext, Program};
use crate::diagnostics::Diagnostics;
use crate::error::StaticError;

struct Scope {
    enclosing_class: Option<TypeId>,
    locals: IndexMap<String, TypeId>,
}

pub fn check(program: &mut Program, table: &SymbolTable) -> Result<(), StaticError> {
    let mut diagnostics = Diagnostics::new();

    for class in &mut program.classes {
        let class_ty = table
            .resolve_class_name(&class.name)
            .expect("class was registered by the symbol table builder");
        for method in &mut class.methods {
            check_method(method, class_ty, table, &mut diagnostics);
        }
    }

    let scope = Scope {
        enclosing_class: None,
        locals: locals_of(&program.main_locals, table),
    };
    check_exprs(&mut program.main_body, table, &scope, &mut diagnostics);

    if diagnostics.has_errors() {
        diagnostics.sort_by_line();
        return Err(StaticError::new(diagnostics));
    }
    Ok(())
}

fn locals_of(decls: &[crate::ast::VarDecl], table: &SymbolTable) -> IndexMap<String, TypeId> {
    decls
        .iter()
        .map(|d| (d.name.clone(), table.type_of(&d.type_name)))
        .collect()
}

fn check_method(method: &mut MethodDecl, class_ty: TypeId, table: &SymbolTable, diagnostics: &mut Diagnostics) {
    let mut locals = IndexMap::new();
    locals.insert(method.param_name.clone(), table.type_of(&method.param_type));
    for l in &method.locals {
        locals.insert(l.name.clone(), table.type_of(&l.type_name));
    }
    let scope = Scope {
        enclosing_class: Some(class_ty),
        locals,
    };
    let body_ty = check_exprs(&mut method.body, table, &scope, diagnostics);
    if !method.body.is_empty() {
        let declared = table.type_of(&method.return_type);
        require_subtype(table, diagnostics, method.body.last().unwrap().line(), body_ty, declared, "method result");
    }
}

fn check_exprs(exprs: &mut [Expr], table: &SymbolTable, scope: &Scope, diagnostics: &mut Diagnostics) -> TypeId {
    let mut last = TypeId::NAT;
    for e in exprs.iter_mut() {
        last = check_expr(e, table, scope, diagnostics);
    }
    last
}

fn check_expr(expr: &mut Expr, table: &SymbolTable, scope: &Scope, diagnostics: &mut Diagnostics) -> TypeId {
    match expr {
        Expr::NatLiteral { .. } => TypeId::NAT,
        Expr::True { .. } | Expr::False { .. } => TypeId::BOOL,
        Expr::Null { .. } => TypeId::ANY_OBJECT,
        Expr::Read { .. } => TypeId::NAT,
        Expr::This { line } => match scope.enclosing_class {
            Some(c) => c,
            None => {
                diagnostics.error(*line, "`this` used outside of a method");
                TypeId::BAD
            }
        },
        Expr::Not { operand, line } => {
            let t = check_expr(operand, table, scope, diagnostics);
            require_exact(table, diagnostics, *line, t, TypeId::BOOL, "operand of `!`");
            TypeId::BOOL
        }
        Expr::Print { operand, line } => {
            let t = check_expr(operand, table, scope, diagnostics);
            require_exact(table, diagnostics, *line, t, TypeId::NAT, "argument of `printNat`");
            TypeId::NAT
        }
        Expr::Plus { lhs, rhs, line } | Expr::Minus { lhs, rhs, line } | Expr::Times { lhs, rhs, line } => {
            let tl = check_expr(lhs, table, scope, diagnostics);
            let tr = check_expr(rhs, table, scope, diagnostics);
            require_exact(table, diagnostics, *line, tl, TypeId::NAT, "left operand");
            require_exact(table, diagnostics, *line, tr, TypeId::NAT, "right operand");
            TypeId::NAT
        }
        Expr::GreaterThan { lhs, rhs, line } => {
            let tl = check_expr(lhs, table, scope, diagnostics);
            let tr = check_expr(rhs, table, scope, diagnostics);
            require_exact(table, diagnostics, *line, tl, TypeId::NAT, "left operand of `>`");
            require_exact(table, diagnostics, *line, tr, TypeId::NAT, "right operand of `>`");
            TypeId::BOOL
        }
        Expr::And { lhs, rhs, line } => {
            let tl = check_expr(lhs, table, scope, diagnostics);
            let tr = check_expr(rhs, table, scope, diagnostics);
            require_exact(table, diagnostics, *line, tl, TypeId::BOOL, "left operand of `&&`");
            require_exact(table, diagnostics, *line, tr, TypeId::BOOL, "right operand of `&&`");
            TypeId::BOOL
        }
        Expr::Equality { lhs, rhs, line, null_context } => {
            let tl = check_expr(lhs, table, scope, diagnostics);
            let tr = check_expr(rhs, table, scope, diagnostics);
            let ok = (tl.is_nat() && tr.is_nat())
                || (tl.is_bool() && tr.is_bool())
                || (tl.is_reference() && tr.is_reference());
            if !ok {
                diagnostics.error(
                    *line,
                    format!(
                        "cannot compare `{}` and `{}`",
                        type_name(table, tl),
                        type_name(table, tr)
                    ),
                );
            }
            let left_null = lhs.is_null_literal();
            let right_null = rhs.is_null_literal();
            let non_null_type = match (left_null, right_null) {
                (true, false) => Some(tr),
                (false, true) => Some(tl),
                _ => None,
            };
            *null_context = Some(NullContext { left_null, right_null, non_null_type });
            TypeId::BOOL
        }
        Expr::Id { name, line, decoration } => match resolve_name(scope, table, name) {
            Some((ty, dec)) => {
                *decoration = dec;
                ty
            }
            None => {
                diagnostics.error(*line, format!("cannot resolve `{name}`"));
                TypeId::BAD
            }
        },
        Expr::Assign { name, value, line, decoration, null_context } => {
            let tv = check_expr(value, table, scope, diagnostics);
            match resolve_name(scope, table, name) {
                Some((tx, dec)) => {
                    *decoration = dec;
                    require_subtype(table, diagnostics, *line, tv, tx, "assigned value");
                    let value_is_null = value.is_null_literal();
                    *null_context = Some(NullContext {
                        left_null: false,
                        right_null: value_is_null,
                        non_null_type: value_is_null.then_some(tx),
                    });
                    tx
                }
                None => {
                    diagnostics.error(*line, format!("cannot resolve `{name}`"));
                    TypeId::BAD
                }
            }
        }
        Expr::DotId { object, name, line, decoration } => {
            let tobj = check_expr(object, table, scope, diagnostics);
            match dot_target_class(table, diagnostics, *line, tobj) {
                Some(start) => match resolve_member(table, start, name, start) {
                    Some((ty, dec)) => {
                        *decoration = Some(dec);
                        ty
                    }
                    None => {
                        diagnostics.error(*line, format!("no field `{name}` on `{}`", type_name(table, tobj)));
                        TypeId::BAD
                    }
                },
                None => TypeId::BAD,
            }
        }
        Expr::DotAssign { object, name, value, line, decoration, null_context } => {
            let tobj = check_expr(object, table, scope, diagnostics);
            let tv = check_expr(value, table, scope, diagnostics);
            match dot_target_class(table, diagnostics, *line, tobj) {
                Some(start) => match resolve_member(table, start, name, start) {
                    Some((tx, dec)) => {
                        *decoration = Some(dec);
                        require_subtype(table, diagnostics, *line, tv, tx, "assigned value");
                        let value_is_null = value.is_null_literal();
                        *null_context = Some(NullContext {
                            left_null: false,
                            right_null: value_is_null,
                            non_null_type: value_is_null.then_some(tx),
                        });
                        tx
                    }
                    None => {
                        diagnostics.error(*line, format!("no field `{name}` on `{}`", type_name(table, tobj)));
                        TypeId::BAD
                    }
                },
                None => TypeId::BAD,
            }
        }
        Expr::InstanceOf { object, class_name, line, class_ref } => {
            let tobj = check_expr(object, table, scope, diagnostics);
            if !tobj.is_reference() {
                diagnostics.error(*line, format!("left side of `instanceof` must be a reference, found `{}`", type_name(table, tobj)));
            }
            match table.resolve_class_name(class_name) {
                Some(c) => {
                    *class_ref = Some(c);
                }
                None => {
                    diagnostics.error(*line, format!("unknown class `{class_name}`"));
                }
            }
            TypeId::BOOL
        }
        Expr::New { class_name, line, class_ref } => match table.resolve_class_name(class_name) {
            Some(c) => {
                *class_ref = Some(c);
                c
            }
            None => {
                diagnostics.error(*line, format!("unknown class `{class_name}`"));
                TypeId::BAD
            }
        },
        Expr::MethodCall { name, arg, line, decoration, null_context } => {
            let targ = check_expr(arg, table, scope, diagnostics);
            let Some(enclosing) = scope.enclosing_class else {
                diagnostics.error(*line, format!("call to `{name}` outside of a method"));
                return TypeId::BAD;
            };
            match find_method(table, enclosing, name) {
                Some((decl_class, idx, param_ty, ret_ty)) => {
                    *decoration = Some(Decoration {
                        class: decl_class.class_index().unwrap(),
                        is_static_var: false,
                        member: idx,
                        receiver_class: decl_class.class_index().unwrap(),
                    });
                    require_subtype(table, diagnostics, *line, targ, param_ty, "method argument");
                    let arg_is_null = arg.is_null_literal();
                    *null_context = Some(NullContext {
                        left_null: false,
                        right_null: arg_is_null,
                        non_null_type: arg_is_null.then_some(param_ty),
                    });
                    ret_ty
                }
                None => {
                    diagnostics.error(*line, format!("no method `{name}` in scope"));
                    TypeId::BAD
                }
            }
        }
        Expr::DotMethodCall { object, name, arg, line, decoration, null_context } => {
            let tobj = check_expr(object, table, scope, diagnostics);
            let targ = check_expr(arg, table, scope, diagnostics);
            match dot_target_class(table, diagnostics, *line, tobj) {
                Some(start) => match find_method(table, start, name) {
                    Some((decl_class, idx, param_ty, ret_ty)) => {
                        *decoration = Some(Decoration {
                            class: decl_class.class_index().unwrap(),
                            is_static_var: false,
                            member: idx,
                            receiver_class: decl_class.class_index().unwrap(),
                        });
                        require_subtype(table, diagnostics, *line, targ, param_ty, "method argument");
                        let arg_is_null = arg.is_null_literal();
                        *null_context = Some(NullContext {
                            left_null: false,
                            right_null: arg_is_null,
                            non_null_type: arg_is_null.then_some(param_ty),
                        });
                        ret_ty
                    }
                    None => {
                        diagnostics.error(*line, format!("no method `{name}` on `{}`", type_name(table, tobj)));
                        TypeId::BAD
                    }
                },
                None => TypeId::BAD,
            }
        }
        Expr::For { init, test, update, body, .. } => {
            check_expr(init, table, scope, diagnostics);
            let tt = check_expr(test, table, scope, diagnostics);
            require_exact(table, diagnostics, test.line(), tt, TypeId::BOOL, "`for` condition");
            check_expr(update, table, scope, diagnostics);
            check_exprs(body, table, scope, diagnostics);
            TypeId::NAT
        }
        Expr::If { cond, then_branch, else_branch, result_type, .. } => {
            let tc = check_expr(cond, table, scope, diagnostics);
            require_exact(table, diagnostics, cond.line(), tc, TypeId::BOOL, "`if` condition");
            let tt = check_exprs(then_branch, table, scope, diagnostics);
            let te = check_exprs(else_branch, table, scope, diagnostics);
            let joined = join(table, tt, te);
            *result_type = Some(joined);
            joined
        }
    }
}

/// `obj` must be an actual declared class (not bare `null`/`ANY_OBJECT`) to
/// be the left side of `.` - a field or method access needs a concrete
/// class to search from.
fn dot_target_class(table: &SymbolTable, diagnostics: &mut Diagnostics, line: u32, tobj: TypeId) -> Option<TypeId> {
    if tobj.class_index().is_some() {
        Some(tobj)
    } else {
        if !tobj.is_bad() {
            diagnostics.error(line, format!("left side of `.` must be an object, found `{}`", type_name(table, tobj)));
        }
        None
    }
}

fn resolve_name(scope: &Scope, table: &SymbolTable, name: &str) -> Option<(TypeId, Option<Decoration>)> {
    if let Some(&ty) = scope.locals.get(name) {
        return Some((ty, None));
    }
    let class = scope.enclosing_class?;
    resolve_member(table, class, name, class).map(|(ty, dec)| (ty, Some(dec)))
}

/// `start` is where the member lookup walk begins (may differ from
/// `receiver`, though today every caller passes the same class for both);
/// `receiver` is the static type code generation must use to pick the
/// record layout a field access GEPs through (spec's `objectLikeType`).
fn resolve_member(table: &SymbolTable, start: TypeId, name: &str, receiver: TypeId) -> Option<(TypeId, Decoration)> {
    let receiver_class = receiver.class_index().unwrap();
    if let Some((decl_class, idx, ty)) = find_instance_field(table, start, name) {
        return Some((
            ty,
            Decoration { class: decl_class.class_index().unwrap(), is_static_var: false, member: idx, receiver_class },
        ));
    }
    if let Some((decl_class, idx, ty)) = find_static_field(table, start, name) {
        return Some((
            ty,
            Decoration { class: decl_class.class_index().unwrap(), is_static_var: true, member: idx, receiver_class },
        ));
    }
    None
}

fn find_instance_field(table: &SymbolTable, start: TypeId, name: &str) -> Option<(TypeId, u32, TypeId)> {
    let mut cur = start;
    loop {
        let entry = table.class(cur);
        if let Some(&idx) = entry.instance_index.get(name) {
            return Some((cur, idx, table.type_of(&entry.instance_vars[idx as usize].type_name)));
        }
        if cur == TypeId::OBJECT {
            return None;
        }
        cur = entry.superclass;
    }
}

fn find_static_field(table: &SymbolTable, start: TypeId, name: &str) -> Option<(TypeId, u32, TypeId)> {
    let mut cur = start;
    loop {
        let entry = table.class(cur);
        if let Some(&idx) = entry.static_index.get(name) {
            return Some((cur, idx, table.type_of(&entry.static_vars[idx as usize].type_name)));
        }
        if cur == TypeId::OBJECT {
            return None;
        }
        cur = entry.superclass;
    }
}

fn find_method(table: &SymbolTable, start: TypeId, name: &str) -> Option<(TypeId, u32, TypeId, TypeId)> {
    let mut cur = start;
    loop {
        let entry = table.class(cur);
        if let Some(&idx) = entry.method_index.get(name) {
            let m = &entry.methods[idx as usize];
            return Some((cur, idx, table.type_of(&m.param_type), table.type_of(&m.return_type)));
        }
        if cur == TypeId::OBJECT {
            return None;
        }
        cur = entry.superclass;
    }
}

fn type_name(table: &SymbolTable, ty: TypeId) -> String {
    match ty.class_index() {
        Some(idx) => table.classes[idx as usize].name.clone(),
        None => ty.to_string(),
    }
}

/// The least common supertype of `a` and `b` (spec §4.2): equal primitives
/// join to themselves, mismatched primitives are incomparable (`BAD`), and
/// references join by walking up both chains to their first common class.
fn join(table: &SymbolTable, a: TypeId, b: TypeId) -> TypeId {
    if a == b {
        return a;
    }
    if a == TypeId::ANY_OBJECT && b.is_reference() {
        return b;
    }
    if b == TypeId::ANY_OBJECT && a.is_reference() {
        return a;
    }
    if !a.is_reference() || !b.is_reference() {
        return TypeId::BAD;
    }
    let a_chain: Vec<TypeId> = std::iter::successors(Some(a.class_index().map_or(TypeId::OBJECT, TypeId::class)), |&c| {
        (c != TypeId::OBJECT).then(|| table.class(c).superclass)
    })
    .collect();
    let mut cur = b.class_index().map_or(TypeId::OBJECT, TypeId::class);
    loop {
        if a_chain.contains(&cur) {
            return cur;
        }
        if cur == TypeId::OBJECT {
            return TypeId::OBJECT;
        }
        cur = table.class(cur).superclass;
    }
}

fn require_exact(table: &SymbolTable, diagnostics: &mut Diagnostics, line: u32, found: TypeId, expected: TypeId, what: &str) {
    if found.is_bad() || found == expected {
        return;
    }
    diagnostics.error(line, format!("expected {what} of type `{}`, found `{}`", type_name(table, expected), type_name(table, found)));
}

fn require_subtype(table: &SymbolTable, diagnostics: &mut Diagnostics, line: u32, found: TypeId, expected: TypeId, what: &str) {
    if found.is_bad() || table.is_subtype(found, expected) {
        return;
    }
    diagnostics.error(
        line,
        format!("expected {what} compatible with `{}`, found `{}`", type_name(table, expected), type_name(table, found)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::symbol_table;
    use crate::parser::parse;

    fn typecheck(src: &str) -> Result<Program, StaticError> {
        let mut program = parse(src).expect("parse");
        let table = symbol_table::build(&program).expect("symbol table");
        check(&mut program, &table)?;
        Ok(program)
    }

    #[test]
    fn decorates_instance_field_access() {
        let program = typecheck(
            "class Wallet { nat balance; nat get() { balance; } }\nmain { }",
        )
        .unwrap();
        match &program.classes[0].methods[0].body[0] {
            Expr::Id { decoration: Some(d), .. } => {
                assert_eq!(d.class, 1);
                assert!(!d.is_static_var);
                assert_eq!(d.member, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_nat_plus_bool() {
        let err = typecheck("main { nat x; x = 1 + true; }").unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn this_outside_method_is_an_error() {
        let err = typecheck("main { this; }").unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn allows_new_object() {
        typecheck("main { Object o; o = new Object(); }").unwrap();
    }

    #[test]
    fn null_comparison_records_non_null_type() {
        let program = typecheck("class A { }\nmain { A a; a = new A(); a == null; }").unwrap();
        match &program.main_body[2] {
            Expr::Equality { null_context: Some(ctx), .. } => {
                assert!(ctx.right_null);
                assert!(!ctx.left_null);
                assert_eq!(ctx.non_null_type, Some(TypeId::class(1)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_assigning_subclass_field_to_unrelated_class() {
        let err = typecheck(
            "class A { }\nclass B { }\nmain { A a; B b; a = b; }",
        )
        .unwrap_err();
        assert!(err.diagnostics.has_errors());
    }

    #[test]
    fn method_override_dispatch_decorates_declaring_class() {
        let program = typecheck(
            "class A { nat f(nat x) { x; } }\nclass B extends A { nat f(nat x) { x; } }\nmain { B b; b = new B(); b.f(1); }",
        )
        .unwrap();
        match &program.main_body[2] {
            Expr::DotMethodCall { decoration: Some(d), .. } => {
                assert_eq!(d.class, 2);
                assert_eq!(d.member, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
