//! Expression code generation (spec §4.4.5-§4.4.8): the shared emitter used
//! for both method bodies and `main`. Every name was already resolved by
//! the typechecker (§4.4.6), so this module never looks one up by string -
//! it only ever indexes into a `Place`/`FieldRef`/`MethodRef`.

use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};
use inkwell::IntPredicate;
use std::collections::HashMap;

use dj_core::TypeId;

use crate::ir::{FieldRef, MethodRef, Place, TypedExpr, TypedMethod};

use super::{field_gep, zero_value, Codegen};

/// One method's or `main`'s local variable table: every slot is a stack
/// alloca, the way the original threads a per-call `symbolTable` of
/// `AllocaInst*` through expression codegen.
pub(crate) struct Locals<'ctx> {
    pub this_ptr: Option<PointerValue<'ctx>>,
    pub slots: HashMap<String, (PointerValue<'ctx>, TypeId)>,
}

pub(crate) fn emit_method_body(cg: &mut Codegen<'_>, f: FunctionValue<'_>, method: &TypedMethod) {
    let entry = cg.context.append_basic_block(f, "entry");
    cg.builder.position_at_end(entry);

    let this_ptr = f.get_nth_param(0).unwrap().into_pointer_value();
    let param_val = f.get_nth_param(1).unwrap();

    let mut slots = HashMap::new();
    let param_alloca = cg.builder.build_alloca(param_val.get_type(), &method.param_name).unwrap();
    cg.builder.build_store(param_alloca, param_val).unwrap();
    slots.insert(method.param_name.clone(), (param_alloca, method.param_type));

    for (name, ty) in &method.locals {
        let alloca = cg.builder.build_alloca(cg.basic_type(*ty), name).unwrap();
        cg.builder.build_store(alloca, zero_value(cg, *ty)).unwrap();
        slots.insert(name.clone(), (alloca, *ty));
    }

    let mut locals = Locals { this_ptr: Some(this_ptr), slots };
    let mut last = None;
    for e in &method.body {
        last = Some(emit_expr(cg, e, &mut locals, None));
    }
    let ret = last.unwrap_or_else(|| zero_value(cg, method.return_type));
    cg.builder.build_return(Some(&ret)).unwrap();
}


/// Emits `expr`, returning its value. `expected` is the reference type a
/// bare `null` literal must be materialized as (spec §4.4.7); every other
/// node ignores it, mirroring the original's dual-purpose `codeGen(ST,
/// type)` second parameter.
pub(crate) fn emit_expr<'ctx>(
    cg: &mut Codegen<'ctx>,
    expr: &TypedExpr,
    locals: &mut Locals<'ctx>,
    expected: Option<TypeId>,
) -> BasicValueEnum<'ctx> {
    match expr {
        TypedExpr::Nat(n) => cg.context.i32_type().const_int(*n as u64, false).into(),
        TypedExpr::True => cg.context.bool_type().const_int(1, false).into(),
        TypedExpr::False => cg.context.bool_type().const_int(0, false).into(),
        TypedExpr::Null => emit_null(cg, expected),
        TypedExpr::This => locals.this_ptr.expect("`this` only appears inside a method body").into(),
        TypedExpr::Read => emit_read(cg),
        TypedExpr::Not(e) => {
            let v = emit_expr(cg, e, locals, None).into_int_value();
            cg.builder.build_not(v, "nottmp").unwrap().into()
        }
        TypedExpr::Print(e) => emit_print(cg, e, locals),
        TypedExpr::Id(place) => emit_load_place(cg, place, locals),
        TypedExpr::Plus(l, r) => emit_arith(cg, l, r, locals, |b, l, r| b.build_int_add(l, r, "addtmp")),
        TypedExpr::Minus(l, r) => emit_arith(cg, l, r, locals, |b, l, r| b.build_int_sub(l, r, "subtmp")),
        TypedExpr::Times(l, r) => emit_arith(cg, l, r, locals, |b, l, r| b.build_int_mul(l, r, "multmp")),
        TypedExpr::GreaterThan(l, r) => {
            let lv = emit_expr(cg, l, locals, None).into_int_value();
            let rv = emit_expr(cg, r, locals, None).into_int_value();
            cg.builder.build_int_compare(IntPredicate::SGT, lv, rv, "gttmp").unwrap().into()
        }
        TypedExpr::And(l, r) => emit_and(cg, l, r, locals),
        TypedExpr::Equality { lhs, rhs, left_null, right_null, non_null_type } => {
            emit_equality(cg, lhs, rhs, *left_null, *right_null, *non_null_type, locals)
        }
        TypedExpr::Assign { place, value, value_is_null } => {
            emit_assign(cg, place, value, *value_is_null, locals)
        }
        TypedExpr::DotId { object, field } => {
            let obj = emit_expr(cg, object, locals, None).into_pointer_value();
            load_field(cg, obj, field)
        }
        TypedExpr::InstanceOf { object, target } => emit_instance_of(cg, object, *target, locals),
        TypedExpr::MethodCall { method, arg, arg_is_null } => {
            let this_ptr = locals.this_ptr.expect("bare METHOD_CALL only appears inside a method body");
            emit_call(cg, this_ptr, method, arg, *arg_is_null, locals)
        }
        TypedExpr::New { class } => emit_new(cg, *class),
        TypedExpr::DotAssign { object, field, value, value_is_null } => {
            emit_dot_assign(cg, object, field, value, *value_is_null, locals)
        }
        TypedExpr::DotMethodCall { object, method, arg, arg_is_null } => {
            let obj = emit_expr(cg, object, locals, None).into_pointer_value();
            emit_call(cg, obj, method, arg, *arg_is_null, locals)
        }
        TypedExpr::For { init, test, update, body } => emit_for(cg, init, test, update, body, locals),
        TypedExpr::If { cond, then_branch, else_branch, result_type } => {
            emit_if(cg, cond, then_branch, else_branch, *result_type, locals)
        }
    }
}

/// `NULL` (spec §4.4.7): an unresolved `null` (no expected reference type in
/// scope) is emitted as `i32 0`; otherwise a null pointer. Opaque pointers
/// mean every reference type shares one LLVM representation, so `expected`
/// only ever decides *which of these two* - never which struct type.
fn emit_null<'ctx>(cg: &Codegen<'ctx>, expected: Option<TypeId>) -> BasicValueEnum<'ctx> {
    match expected {
        None => cg.context.i32_type().const_zero().into(),
        Some(_) => cg.ptr_type().const_null().into(),
    }
}

fn emit_read<'ctx>(cg: &Codegen<'ctx>) -> BasicValueEnum<'ctx> {
    let prompt = cg.builder.build_global_string_ptr("Enter a natural number: ", "prompt").unwrap();
    let printf = cg.module.get_function("printf").expect("printf declared when hasReadNat is set");
    cg.builder.build_call(printf, &[prompt.as_pointer_value().into()], "").unwrap();

    let fmt = cg.builder.build_global_string_ptr("%u", "scanfmt").unwrap();
    let slot = cg.builder.build_alloca(cg.context.i32_type(), "readtmp").unwrap();
    let scanf = cg.module.get_function("scanf").expect("scanf declared when hasReadNat is set");
    cg.builder
        .build_call(scanf, &[fmt.as_pointer_value().into(), slot.into()], "")
        .unwrap();
    cg.builder.build_load(cg.context.i32_type(), slot, "readval").unwrap()
}

fn emit_print<'ctx>(cg: &mut Codegen<'ctx>, e: &TypedExpr, locals: &mut Locals<'ctx>) -> BasicValueEnum<'ctx> {
    let v = emit_expr(cg, e, locals, None);
    let fmt = cg.builder.build_global_string_ptr("%u\n", "printfmt").unwrap();
    let printf = cg.module.get_function("printf").expect("printf declared when hasPrintNat is set");
    cg.builder
        .build_call(printf, &[fmt.as_pointer_value().into(), v.into()], "")
        .unwrap();
    v
}

fn emit_arith<'ctx>(
    cg: &mut Codegen<'ctx>,
    l: &TypedExpr,
    r: &TypedExpr,
    locals: &mut Locals<'ctx>,
    f: impl FnOnce(&inkwell::builder::Builder<'ctx>, IntValue<'ctx>, IntValue<'ctx>) -> Result<IntValue<'ctx>, inkwell::builder::BuilderError>,
) -> BasicValueEnum<'ctx> {
    let lv = emit_expr(cg, l, locals, None).into_int_value();
    let rv = emit_expr(cg, r, locals, None).into_int_value();
    f(&cg.builder, lv, rv).unwrap().into()
}

/// Short-circuit `&&` (spec §4.4.5): the right side is only evaluated when
/// the left side is true; result joins via an `i1` phi.
fn emit_and<'ctx>(cg: &mut Codegen<'ctx>, l: &TypedExpr, r: &TypedExpr, locals: &mut Locals<'ctx>) -> BasicValueEnum<'ctx> {
    let lv = emit_expr(cg, l, locals, None).into_int_value();
    let f = cg.builder.get_insert_block().unwrap().get_parent().unwrap();
    let rhs_bb = cg.context.append_basic_block(f, "and.rhs");
    let merge_bb = cg.context.append_basic_block(f, "and.merge");
    let short_bb = cg.builder.get_insert_block().unwrap();
    cg.builder.build_conditional_branch(lv, rhs_bb, merge_bb).unwrap();

    cg.builder.position_at_end(rhs_bb);
    let rv = emit_expr(cg, r, locals, None).into_int_value();
    let rhs_end_bb = cg.builder.get_insert_block().unwrap();
    cg.builder.build_unconditional_branch(merge_bb).unwrap();

    cg.builder.position_at_end(merge_bb);
    let phi = cg.builder.build_phi(cg.context.bool_type(), "andtmp").unwrap();
    phi.add_incoming(&[(&cg.context.bool_type().const_zero(), short_bb), (&rv, rhs_end_bb)]);
    phi.as_basic_value()
}

fn emit_equality<'ctx>(
    cg: &mut Codegen<'ctx>,
    lhs: &TypedExpr,
    rhs: &TypedExpr,
    left_null: bool,
    right_null: bool,
    non_null_type: Option<TypeId>,
    locals: &mut Locals<'ctx>,
) -> BasicValueEnum<'ctx> {
    let (lv, rv) = if left_null && !right_null {
        (emit_expr(cg, lhs, locals, non_null_type), emit_expr(cg, rhs, locals, None))
    } else if right_null && !left_null {
        (emit_expr(cg, lhs, locals, None), emit_expr(cg, rhs, locals, non_null_type))
    } else {
        (emit_expr(cg, lhs, locals, None), emit_expr(cg, rhs, locals, None))
    };
    build_eq(cg, lv, rv)
}

fn build_eq<'ctx>(cg: &Codegen<'ctx>, l: BasicValueEnum<'ctx>, r: BasicValueEnum<'ctx>) -> BasicValueEnum<'ctx> {
    if l.is_pointer_value() || r.is_pointer_value() {
        let lp = ptr_to_int(cg, l);
        let rp = ptr_to_int(cg, r);
        cg.builder.build_int_compare(IntPredicate::EQ, lp, rp, "eqtmp").unwrap().into()
    } else {
        cg.builder
            .build_int_compare(IntPredicate::EQ, l.into_int_value(), r.into_int_value(), "eqtmp")
            .unwrap()
            .into()
    }
}

fn ptr_to_int<'ctx>(cg: &Codegen<'ctx>, v: BasicValueEnum<'ctx>) -> IntValue<'ctx> {
    match v {
        BasicValueEnum::PointerValue(p) => cg.builder.build_ptr_to_int(p, cg.context.i64_type(), "ptrcmp").unwrap(),
        BasicValueEnum::IntValue(i) => i,
        other => panic!("unexpected value kind in equality operand: {other:?}"),
    }
}

fn emit_assign<'ctx>(
    cg: &mut Codegen<'ctx>,
    place: &Place,
    value: &TypedExpr,
    value_is_null: bool,
    locals: &mut Locals<'ctx>,
) -> BasicValueEnum<'ctx> {
    let place_type = place_type(cg, place, locals);
    let expected = value_is_null.then_some(place_type);
    let v = emit_expr(cg, value, locals, expected);
    store_place(cg, place, v, locals);
    v
}

fn emit_dot_assign<'ctx>(
    cg: &mut Codegen<'ctx>,
    object: &TypedExpr,
    field: &FieldRef,
    value: &TypedExpr,
    value_is_null: bool,
    locals: &mut Locals<'ctx>,
) -> BasicValueEnum<'ctx> {
    let obj = emit_expr(cg, object, locals, None).into_pointer_value();
    let expected = value_is_null.then_some(field_type(cg, field));
    let v = emit_expr(cg, value, locals, expected);
    store_field(cg, obj, field, v);
    v
}

fn place_type(cg: &Codegen<'_>, place: &Place, locals: &Locals<'_>) -> TypeId {
    match place {
        Place::Local(name) => locals.slots[name].1,
        Place::Field(f) => field_type(cg, f),
    }
}

fn field_type(cg: &Codegen<'_>, field: &FieldRef) -> TypeId {
    let entry = cg.table.class(field.declaring_class);
    let decl = if field.is_static { &entry.static_vars[field.index as usize] } else { &entry.instance_vars[field.index as usize] };
    cg.table.type_of(&decl.type_name)
}

fn emit_load_place<'ctx>(cg: &Codegen<'ctx>, place: &Place, locals: &Locals<'ctx>) -> BasicValueEnum<'ctx> {
    match place {
        Place::Local(name) => {
            let (ptr, ty) = locals.slots[name];
            cg.builder.build_load(cg.basic_type(ty), ptr, name).unwrap()
        }
        Place::Field(f) if f.is_static => {
            let ty = field_type(cg, f);
            let global = cg.global_for(f.declaring_class, &field_name(cg, f));
            cg.builder.build_load(cg.basic_type(ty), global.as_pointer_value(), "staticload").unwrap()
        }
        Place::Field(f) => {
            let this_ptr = locals.this_ptr.expect("bare instance-field ID only appears inside a method body");
            load_field(cg, this_ptr, f)
        }
    }
}

fn store_place<'ctx>(cg: &Codegen<'ctx>, place: &Place, value: BasicValueEnum<'ctx>, locals: &Locals<'ctx>) {
    match place {
        Place::Local(name) => {
            let (ptr, _) = locals.slots[name];
            cg.builder.build_store(ptr, value).unwrap();
        }
        Place::Field(f) if f.is_static => {
            let global = cg.global_for(f.declaring_class, &field_name(cg, f));
            cg.builder.build_store(global.as_pointer_value(), value).unwrap();
        }
        Place::Field(f) => {
            let this_ptr = locals.this_ptr.expect("bare instance-field ASSIGN only appears inside a method body");
            store_field(cg, this_ptr, f, value);
        }
    }
}

fn field_name(cg: &Codegen<'_>, f: &FieldRef) -> String {
    let entry = cg.table.class(f.declaring_class);
    let decl = if f.is_static { &entry.static_vars[f.index as usize] } else { &entry.instance_vars[f.index as usize] };
    decl.name.clone()
}

fn load_field<'ctx>(cg: &Codegen<'ctx>, object: PointerValue<'ctx>, field: &FieldRef) -> BasicValueEnum<'ctx> {
    if field.is_static {
        let ty = field_type(cg, field);
        let global = cg.global_for(field.declaring_class, &field_name(cg, field));
        return cg.builder.build_load(cg.basic_type(ty), global.as_pointer_value(), "staticload").unwrap();
    }
    let ptr = field_gep(cg, object, field);
    let ty = field_type(cg, field);
    cg.builder.build_load(cg.basic_type(ty), ptr, "fieldload").unwrap()
}

fn store_field<'ctx>(cg: &Codegen<'ctx>, object: PointerValue<'ctx>, field: &FieldRef, value: BasicValueEnum<'ctx>) {
    if field.is_static {
        let global = cg.global_for(field.declaring_class, &field_name(cg, field));
        cg.builder.build_store(global.as_pointer_value(), value).unwrap();
        return;
    }
    let ptr = field_gep(cg, object, field);
    cg.builder.build_store(ptr, value).unwrap();
}

/// `NEW(C)` (spec §4.4.8): malloc storage sized for `C`'s record, then write
/// the allocation result into field 0 and `C`'s class-id into field 1.
fn emit_new<'ctx>(cg: &mut Codegen<'ctx>, class: TypeId) -> BasicValueEnum<'ctx> {
    let struct_ty = cg.struct_type(class);
    let size = struct_ty.size_of().expect("class record types are always sized");
    let malloc = cg.module.get_function("malloc").expect("malloc declared during codegen setup");
    let call = cg.builder.build_call(malloc, &[size.into()], "newtmp").unwrap();
    let raw = call.try_as_basic_value().left().unwrap().into_pointer_value();

    let self_ptr = cg.builder.build_struct_gep(struct_ty, raw, super::layout::SELF_FIELD, "selfptr").unwrap();
    cg.builder.build_store(self_ptr, raw).unwrap();

    let id_ptr = cg.builder.build_struct_gep(struct_ty, raw, super::layout::CLASS_ID_FIELD, "idptr").unwrap();
    let id = cg.context.i32_type().const_int(class.raw() as u64, false);
    cg.builder.build_store(id_ptr, id).unwrap();

    raw.into()
}

/// `INSTANCEOF` (spec §4.4.4): load the class-id header field (its offset
/// is the same - index 1 - in every record, so any class's struct type
/// works for this GEP) and call `ITable`.
fn emit_instance_of<'ctx>(cg: &mut Codegen<'ctx>, object: &TypedExpr, target: TypeId, locals: &mut Locals<'ctx>) -> BasicValueEnum<'ctx> {
    let testee = emit_expr(cg, object, locals, None).into_pointer_value();
    let any_struct = cg.struct_types[0];
    let id_ptr = cg.builder.build_struct_gep(any_struct, testee, super::layout::CLASS_ID_FIELD, "idptr").unwrap();
    let loaded = cg.builder.build_load(cg.context.i32_type(), id_ptr, "classid").unwrap();
    let itable = cg.module.get_function("ITable").expect("ITable declared when hasInstanceof is set");
    let target_lit = cg.context.i32_type().const_int(target.raw() as u64, false);
    cg.builder
        .build_call(itable, &[loaded.into(), target_lit.into()], "instanceof")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
}

/// A call site (spec §4.4.3): bucket the method's *declared* return/param
/// types into `{nat, bool, Object}`, bitcast the receiver to `Object*`, and
/// invoke the matching `"<R>VTable<P>"` dispatcher with the static literals.
fn emit_call<'ctx>(
    cg: &mut Codegen<'ctx>,
    receiver: PointerValue<'ctx>,
    method: &MethodRef,
    arg: &TypedExpr,
    arg_is_null: bool,
    locals: &mut Locals<'ctx>,
) -> BasicValueEnum<'ctx> {
    let decl = &cg.table.class(method.declaring_class).methods[method.index as usize];
    let param_ty = cg.table.type_of(&decl.param_type);
    let ret_ty = cg.table.type_of(&decl.return_type);

    let expected = arg_is_null.then_some(param_ty);
    let arg_val = emit_expr(cg, arg, locals, expected);

    let dispatcher = cg.module.get_function(&super::dispatch::vtable_name(ret_ty, param_ty)).expect("every (R,P) dispatcher is synthesized up front");
    let static_class = cg.context.i32_type().const_int(method.declaring_class.raw() as u64, false);
    let static_method = cg.context.i32_type().const_int(method.index as u64, false);
    cg.builder
        .build_call(dispatcher, &[receiver.into(), static_class.into(), static_method.into(), arg_val.into()], "calltmp")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
}

/// `IF` (spec §4.4.5): both branches run in their own block, joined by a
/// phi typed as `result_type` (the join of both branches, computed by the
/// typechecker) - `bool`/reference results are preserved through the merge
/// instead of being collapsed to a primitive, the way `main`'s own exit-code
/// coercion (`coerce_i32`, used only there) collapses its final value.
fn emit_if<'ctx>(
    cg: &mut Codegen<'ctx>,
    cond: &TypedExpr,
    then_branch: &[TypedExpr],
    else_branch: &[TypedExpr],
    result_type: TypeId,
    locals: &mut Locals<'ctx>,
) -> BasicValueEnum<'ctx> {
    let cv = emit_expr(cg, cond, locals, None).into_int_value();
    let f = cg.builder.get_insert_block().unwrap().get_parent().unwrap();
    let then_bb = cg.context.append_basic_block(f, "then");
    let else_bb = cg.context.append_basic_block(f, "else");
    let merge_bb = cg.context.append_basic_block(f, "ifcont");
    cg.builder.build_conditional_branch(cv, then_bb, else_bb).unwrap();

    let expected = Some(result_type);
    cg.builder.position_at_end(then_bb);
    let then_val = emit_branch(cg, then_branch, expected, locals).unwrap_or_else(|| zero_value(cg, result_type));
    let then_end = cg.builder.get_insert_block().unwrap();
    cg.builder.build_unconditional_branch(merge_bb).unwrap();

    cg.builder.position_at_end(else_bb);
    let else_val = emit_branch(cg, else_branch, expected, locals).unwrap_or_else(|| zero_value(cg, result_type));
    let else_end = cg.builder.get_insert_block().unwrap();
    cg.builder.build_unconditional_branch(merge_bb).unwrap();

    cg.builder.position_at_end(merge_bb);
    let phi = cg.builder.build_phi(cg.basic_type(result_type), "iftmp").unwrap();
    phi.add_incoming(&[(&then_val, then_end), (&else_val, else_end)]);
    phi.as_basic_value()
}

/// Emits a branch's statements, threading `expected` only into the trailing
/// expression (the one whose value feeds the merge phi) - every earlier
/// statement runs purely for its side effects.
fn emit_branch<'ctx>(
    cg: &mut Codegen<'ctx>,
    branch: &[TypedExpr],
    expected: Option<TypeId>,
    locals: &mut Locals<'ctx>,
) -> Option<BasicValueEnum<'ctx>> {
    let (last, init) = branch.split_last()?;
    for e in init {
        emit_expr(cg, e, locals, None);
    }
    Some(emit_expr(cg, last, locals, expected))
}

/// `FOR` (spec §4.4.5): always yields `i32 0`.
fn emit_for<'ctx>(
    cg: &mut Codegen<'ctx>,
    init: &TypedExpr,
    test: &TypedExpr,
    update: &TypedExpr,
    body: &[TypedExpr],
    locals: &mut Locals<'ctx>,
) -> BasicValueEnum<'ctx> {
    emit_expr(cg, init, locals, None);
    let f = cg.builder.get_insert_block().unwrap().get_parent().unwrap();
    let header_bb = cg.context.append_basic_block(f, "loop.header");
    let body_bb = cg.context.append_basic_block(f, "loop.body");
    let after_bb = cg.context.append_basic_block(f, "loop.after");
    cg.builder.build_unconditional_branch(header_bb).unwrap();

    cg.builder.position_at_end(header_bb);
    let cv = emit_expr(cg, test, locals, None).into_int_value();
    cg.builder.build_conditional_branch(cv, body_bb, after_bb).unwrap();

    cg.builder.position_at_end(body_bb);
    for e in body {
        emit_expr(cg, e, locals, None);
    }
    emit_expr(cg, update, locals, None);
    cg.builder.build_unconditional_branch(header_bb).unwrap();

    cg.builder.position_at_end(after_bb);
    cg.context.i32_type().const_zero().into()
}


