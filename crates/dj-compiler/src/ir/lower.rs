//! Translation from the decorated AST to the typed IR (spec §4.3). Purely
//! mechanical: every fact this pass needs was already computed and written
//! onto the AST by the typechecker, so nothing here can fail.

use dj_core::TypeId;

use crate::analyze::SymbolTable;
use crate::ast::{self, Expr, NullContext, Program};

use super::{FieldRef, MethodRef, Place, TypedClass, TypedExpr, TypedMethod, TypedProgram};

pub fn lower(program: &Program, table: &SymbolTable) -> TypedProgram {
    let classes = program
        .classes
        .iter()
        .enumerate()
        .map(|(i, class)| {
            let id = TypeId::class(i as u32 + 1);
            TypedClass {
                id,
                name: class.name.clone(),
                methods: class.methods.iter().map(|m| lower_method(m, table)).collect(),
            }
        })
        .collect();

    TypedProgram {
        classes,
        main_locals: program
            .main_locals
            .iter()
            .map(|v| (v.name.clone(), table.type_of(&v.type_name)))
            .collect(),
        main_body: lower_exprs(&program.main_body),
    }
}

fn lower_method(method: &ast::MethodDecl, table: &SymbolTable) -> TypedMethod {
    TypedMethod {
        name: method.name.clone(),
        param_name: method.param_name.clone(),
        param_type: table.type_of(&method.param_type),
        return_type: table.type_of(&method.return_type),
        locals: method
            .locals
            .iter()
            .map(|v| (v.name.clone(), table.type_of(&v.type_name)))
            .collect(),
        body: lower_exprs(&method.body),
    }
}

fn lower_exprs(exprs: &[Expr]) -> Vec<TypedExpr> {
    exprs.iter().map(lower_expr).collect()
}

fn decoration_place(name: &str, decoration: Option<ast::Decoration>) -> Place {
    match decoration {
        None => Place::Local(name.to_owned()),
        Some(d) => Place::Field(FieldRef {
            declaring_class: TypeId::class(d.class),
            is_static: d.is_static_var,
            index: d.member,
            receiver_class: TypeId::class(d.receiver_class),
        }),
    }
}

fn field_ref(decoration: Option<ast::Decoration>) -> FieldRef {
    let d = decoration.expect("DOT_ID/DOT_ASSIGN are always decorated after a successful typecheck");
    FieldRef {
        declaring_class: TypeId::class(d.class),
        is_static: d.is_static_var,
        index: d.member,
        receiver_class: TypeId::class(d.receiver_class),
    }
}

fn method_ref(decoration: Option<ast::Decoration>) -> MethodRef {
    let d = decoration.expect("METHOD_CALL/DOT_METHOD_CALL are always decorated after a successful typecheck");
    MethodRef {
        declaring_class: TypeId::class(d.class),
        index: d.member,
    }
}

fn is_null(ctx: &Option<NullContext>) -> bool {
    ctx.as_ref().is_some_and(|c| c.right_null)
}

fn lower_expr(expr: &Expr) -> TypedExpr {
    match expr {
        Expr::NatLiteral { value, .. } => TypedExpr::Nat(*value),
        Expr::True { .. } => TypedExpr::True,
        Expr::False { .. } => TypedExpr::False,
        Expr::Null { .. } => TypedExpr::Null,
        Expr::This { .. } => TypedExpr::This,
        Expr::Read { .. } => TypedExpr::Read,
        Expr::Not { operand, .. } => TypedExpr::Not(Box::new(lower_expr(operand))),
        Expr::Print { operand, .. } => TypedExpr::Print(Box::new(lower_expr(operand))),
        Expr::Id { name, decoration, .. } => TypedExpr::Id(decoration_place(name, *decoration)),
        Expr::Plus { lhs, rhs, .. } => TypedExpr::Plus(Box::new(lower_expr(lhs)), Box::new(lower_expr(rhs))),
        Expr::Minus { lhs, rhs, .. } => TypedExpr::Minus(Box::new(lower_expr(lhs)), Box::new(lower_expr(rhs))),
        Expr::Times { lhs, rhs, .. } => TypedExpr::Times(Box::new(lower_expr(lhs)), Box::new(lower_expr(rhs))),
        Expr::GreaterThan { lhs, rhs, .. } => {
            TypedExpr::GreaterThan(Box::new(lower_expr(lhs)), Box::new(lower_expr(rhs)))
        }
        Expr::And { lhs, rhs, .. } => TypedExpr::And(Box::new(lower_expr(lhs)), Box::new(lower_expr(rhs))),
        Expr::Equality { lhs, rhs, null_context, .. } => {
            let ctx = null_context.expect("EQUALITY is always decorated after a successful typecheck");
            TypedExpr::Equality {
                lhs: Box::new(lower_expr(lhs)),
                rhs: Box::new(lower_expr(rhs)),
                left_null: ctx.left_null,
                right_null: ctx.right_null,
                non_null_type: ctx.non_null_type,
            }
        }
        Expr::Assign { name, value, decoration, null_context, .. } => TypedExpr::Assign {
            place: decoration_place(name, *decoration),
            value_is_null: is_null(null_context),
            value: Box::new(lower_expr(value)),
        },
        Expr::DotId { object, decoration, .. } => TypedExpr::DotId {
            object: Box::new(lower_expr(object)),
            field: field_ref(*decoration),
        },
        Expr::InstanceOf { object, class_ref, .. } => TypedExpr::InstanceOf {
            object: Box::new(lower_expr(object)),
            target: class_ref.expect("INSTANCEOF is always decorated after a successful typecheck"),
        },
        Expr::MethodCall { arg, decoration, null_context, .. } => TypedExpr::MethodCall {
            method: method_ref(*decoration),
            arg_is_null: is_null(null_context),
            arg: Box::new(lower_expr(arg)),
        },
        Expr::New { class_ref, .. } => TypedExpr::New {
            class: class_ref.expect("NEW is always decorated after a successful typecheck"),
        },
        Expr::DotAssign { object, value, decoration, null_context, .. } => TypedExpr::DotAssign {
            object: Box::new(lower_expr(object)),
            field: field_ref(*decoration),
            value_is_null: is_null(null_context),
            value: Box::new(lower_expr(value)),
        },
        Expr::DotMethodCall { object, arg, decoration, null_context, .. } => TypedExpr::DotMethodCall {
            object: Box::new(lower_expr(object)),
            method: method_ref(*decoration),
            arg_is_null: is_null(null_context),
            arg: Box::new(lower_expr(arg)),
        },
        Expr::For { init, test, update, body, .. } => TypedExpr::For {
            init: Box::new(lower_expr(init)),
            test: Box::new(lower_expr(test)),
            update: Box::new(lower_expr(update)),
            body: lower_exprs(body),
        },
        Expr::If { cond, then_branch, else_branch, result_type, .. } => TypedExpr::If {
            cond: Box::new(lower_expr(cond)),
            then_branch: lower_exprs(then_branch),
            else_branch: lower_exprs(else_branch),
            result_type: result_type.expect("IF is always decorated after a successful typecheck"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{symbol_table, type_check};
    use crate::parser::parse;

    fn lower_src(src: &str) -> TypedProgram {
        let mut program = parse(src).expect("parse");
        let table = symbol_table::build(&program).expect("symbol table");
        type_check::check(&mut program, &table).expect("typecheck");
        lower(&program, &table)
    }

    #[test]
    fn local_ids_stay_local_field_ids_become_field_refs() {
        let typed = lower_src("class Wallet { nat balance; nat get() { balance; } }\nmain { }");
        match &typed.classes[0].methods[0].body[0] {
            TypedExpr::Id(Place::Field(f)) => {
                assert_eq!(f.declaring_class, TypeId::class(1));
                assert!(!f.is_static);
                assert_eq!(f.index, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn assign_to_local_stays_a_local_place() {
        let typed = lower_src("main { nat x; x = 1; }");
        match &typed.main_body[1] {
            TypedExpr::Assign { place: Place::Local(name), .. } => assert_eq!(name, "x"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_assignment_flag_is_propagated() {
        let typed = lower_src("class A { }\nmain { A a; a = null; }");
        match &typed.main_body[1] {
            TypedExpr::Assign { value_is_null, .. } => assert!(value_is_null),
            other => panic!("unexpected {other:?}"),
        }
    }
}
