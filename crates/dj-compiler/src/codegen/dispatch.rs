//! Virtual dispatch (spec §4.4.3, §4.4.4).
//!
//! Every call site only knows the *static* receiver class/method index and
//! the *dynamic* class-id stamped into the object at `NEW` time; resolving
//! which method body actually runs is pushed into one generated dispatcher
//! function per `(return, param)` bucket, each a flat chain of guarded
//! branches over every `(staticClass, staticMethod, dynamicClass)` triple
//! that can reach it. `ITable` is the analogous table for `INSTANCEOF`.
//!
//! The three-type bucketing (`nat`/`bool`/every reference type sharing one
//! `Object` bucket) exists because `nat`/`bool` need their own LLVM
//! representation at the ABI boundary, while every reference type already
//! shares one opaque `ptr` representation - so a single `Object` bucket
//! covers all of them without per-class dispatcher duplication.

use inkwell::types::BasicType;
use inkwell::IntPredicate;

use dj_core::TypeId;

use super::Codegen;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Bucket {
    Nat,
    Bool,
    Object,
}

impl Bucket {
    fn of(t: TypeId) -> Bucket {
        if t.is_nat() {
            Bucket::Nat
        } else if t.is_bool() {
            Bucket::Bool
        } else {
            Bucket::Object
        }
    }

    fn name(self) -> &'static str {
        match self {
            Bucket::Nat => "Nat",
            Bucket::Bool => "Bool",
            Bucket::Object => "Object",
        }
    }
}

const BUCKETS: [Bucket; 3] = [Bucket::Nat, Bucket::Bool, Bucket::Object];

/// The name of the dispatcher generated for a given declared `(return,
/// param)` pair - e.g. `nat f(Foo x)` dispatches through `"NatVTableObject"`.
pub(crate) fn vtable_name(ret: TypeId, param: TypeId) -> String {
    format!("{}VTable{}", Bucket::of(ret).name(), Bucket::of(param).name())
}

fn basic_type_for_bucket<'ctx>(cg: &Codegen<'ctx>, b: Bucket) -> inkwell::types::BasicTypeEnum<'ctx> {
    match b {
        Bucket::Nat => cg.context.i32_type().into(),
        Bucket::Bool => cg.context.bool_type().into(),
        Bucket::Object => cg.ptr_type().into(),
    }
}

/// Walks `j`'s superclass chain (starting at `j` itself) for the first class
/// declaring a method named `name`: the most-derived override, which is the
/// body a virtual call through a receiver of dynamic class `j` actually runs.
fn resolve_override(cg: &Codegen<'_>, j: TypeId, name: &str) -> (TypeId, u32) {
    for class in cg.table.chain(j) {
        if let Some(&idx) = cg.table.class(class).method_index.get(name) {
            return (class, idx);
        }
    }
    unreachable!("every dispatchable method is declared at or above its static class, which is itself in `j`'s chain");
}

/// Every `(i, k, j)` triple a given bucket's dispatcher must branch on:
/// `i` a class declaring a method `k` whose signature falls in this bucket
/// pair, `j` ranging over every subtype of `i` (`i` included).
fn dispatch_triples(cg: &Codegen<'_>, ret: Bucket, param: Bucket) -> Vec<(TypeId, u32, TypeId)> {
    let mut out = Vec::new();
    for ci in 0..cg.table.class_count() {
        let i = TypeId::class(ci);
        for (k, method) in cg.table.class(i).methods.iter().enumerate() {
            let m_ret = Bucket::of(cg.table.type_of(&method.return_type));
            let m_param = Bucket::of(cg.table.type_of(&method.param_type));
            if m_ret != ret || m_param != param {
                continue;
            }
            for cj in 0..cg.table.class_count() {
                let j = TypeId::class(cj);
                if cg.table.is_subtype(j, i) {
                    out.push((i, k as u32, j));
                }
            }
        }
    }
    out
}

/// Synthesizes all nine `"<R>VTable<P>"` dispatchers (spec §4.4.3).
pub(crate) fn emit_vtables(cg: &mut Codegen<'_>) {
    for &ret in &BUCKETS {
        for &param in &BUCKETS {
            emit_vtable(cg, ret, param);
        }
    }
}

fn emit_vtable(cg: &mut Codegen<'_>, ret: Bucket, param: Bucket) {
    let name = format!("{}VTable{}", ret.name(), param.name());
    let ret_ty = basic_type_for_bucket(cg, ret);
    let param_ty = basic_type_for_bucket(cg, param);
    let fn_ty = ret_ty.fn_type(&[cg.ptr_type().into(), cg.context.i32_type().into(), cg.context.i32_type().into(), param_ty.into()], false);
    let f = cg.module.add_function(&name, fn_ty, None);

    let receiver = f.get_nth_param(0).unwrap().into_pointer_value();
    let static_class = f.get_nth_param(1).unwrap().into_int_value();
    let static_method = f.get_nth_param(2).unwrap().into_int_value();
    let arg = f.get_nth_param(3).unwrap();

    let entry = cg.context.append_basic_block(f, "entry");
    cg.builder.position_at_end(entry);

    let any_struct = cg.struct_types[0];
    let id_ptr = cg
        .builder
        .build_struct_gep(any_struct, receiver, super::layout::CLASS_ID_FIELD, "dynid.ptr")
        .unwrap();
    let dynamic_class = cg.builder.build_load(cg.context.i32_type(), id_ptr, "dynid").unwrap().into_int_value();

    let triples = dispatch_triples(cg, ret, param);
    let trap_bb = cg.context.append_basic_block(f, "novtable");
    cg.builder.position_at_end(trap_bb);
    cg.builder.build_unreachable().unwrap();

    let mut next_bb = trap_bb;
    for &(i, k, j) in triples.iter().rev() {
        let check_bb = cg.context.insert_basic_block_after(trap_bb, "vcheck");
        cg.builder.position_at_end(check_bb);

        let i_lit = cg.context.i32_type().const_int(i.raw() as u64, false);
        let k_lit = cg.context.i32_type().const_int(k as u64, false);
        let j_lit = cg.context.i32_type().const_int(j.raw() as u64, false);

        let class_eq = cg.builder.build_int_compare(IntPredicate::EQ, static_class, i_lit, "classeq").unwrap();
        let method_eq = cg.builder.build_int_compare(IntPredicate::EQ, static_method, k_lit, "methodeq").unwrap();
        let dyn_eq = cg.builder.build_int_compare(IntPredicate::EQ, dynamic_class, j_lit, "dyneq").unwrap();
        let class_and_method = cg.builder.build_and(class_eq, method_eq, "cm").unwrap();
        let matched = cg.builder.build_and(class_and_method, dyn_eq, "triplematch").unwrap();

        let call_bb = cg.context.insert_basic_block_after(check_bb, "vcall");
        cg.builder.build_conditional_branch(matched, call_bb, next_bb).unwrap();

        cg.builder.position_at_end(call_bb);
        let (dc, dm) = resolve_override(cg, j, &cg.table.class(i).methods[k as usize].name.clone());
        let callee = cg.functions[&(dc, dm)];
        let result = cg
            .builder
            .build_call(callee, &[receiver.into(), arg.into()], "dispatch")
            .unwrap()
            .try_as_basic_value()
            .left()
            .unwrap();
        cg.builder.build_return(Some(&result)).unwrap();

        next_bb = check_bb;
    }

    cg.builder.position_at_end(entry);
    cg.builder.build_unconditional_branch(next_bb).unwrap();
}

/// Synthesizes `ITable(i32, i32) -> i1` (spec §4.4.4): a chain of guarded
/// branches over every `(a, b)` class pair returning the precomputed
/// `isSubtype(a, b)`, default `false`.
pub(crate) fn emit_itable(cg: &mut Codegen<'_>) {
    let fn_ty = cg.context.bool_type().fn_type(&[cg.context.i32_type().into(), cg.context.i32_type().into()], false);
    let f = cg.module.add_function("ITable", fn_ty, None);
    let a = f.get_nth_param(0).unwrap().into_int_value();
    let b = f.get_nth_param(1).unwrap().into_int_value();

    let entry = cg.context.append_basic_block(f, "entry");
    cg.builder.position_at_end(entry);

    let default_bb = cg.context.append_basic_block(f, "default");
    cg.builder.position_at_end(default_bb);
    cg.builder.build_return(Some(&cg.context.bool_type().const_zero())).unwrap();

    let count = cg.table.class_count();
    let mut next_bb = default_bb;
    for ai in (0..count).rev() {
        for bi in (0..count).rev() {
            let check_bb = cg.context.insert_basic_block_after(default_bb, "icheck");
            cg.builder.position_at_end(check_bb);
            let a_lit = cg.context.i32_type().const_int(ai as u64, false);
            let b_lit = cg.context.i32_type().const_int(bi as u64, false);
            let a_eq = cg.builder.build_int_compare(IntPredicate::EQ, a, a_lit, "aeq").unwrap();
            let b_eq = cg.builder.build_int_compare(IntPredicate::EQ, b, b_lit, "beq").unwrap();
            let matched = cg.builder.build_and(a_eq, b_eq, "pairmatch").unwrap();

            let ret_bb = cg.context.insert_basic_block_after(check_bb, "iret");
            cg.builder.build_conditional_branch(matched, ret_bb, next_bb).unwrap();

            cg.builder.position_at_end(ret_bb);
            let is_sub = cg.table.is_subtype(TypeId::class(ai), TypeId::class(bi));
            let lit = if is_sub { cg.context.bool_type().const_int(1, false) } else { cg.context.bool_type().const_zero() };
            cg.builder.build_return(Some(&lit)).unwrap();

            next_bb = check_bb;
        }
    }

    cg.builder.position_at_end(entry);
    cg.builder.build_unconditional_branch(next_bb).unwrap();
}
