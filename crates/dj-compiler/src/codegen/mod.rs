//! LLVM code generation (spec §4.4). Wires the typed IR to `inkwell`: one
//! named record type per class (§4.4.1), one function per method (§4.4.2),
//! the VTable/ITable dispatch machinery (§4.4.3, §4.4.4), `main`, and object
//! file emission (§4.4.9, §4.4.10).
//!
//! Mirrors the original compiler's single `DJProgram::codeGen` entry point,
//! split across a handful of files the way that compiler's `codegen.cpp` /
//! `codeGenClass.cpp` split object-layout bookkeeping from expression
//! codegen.

mod dispatch;
mod expr;
pub mod layout;
mod runtime;

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicType, BasicTypeEnum, StructType};
use inkwell::values::{FunctionValue, GlobalValue, PointerValue};
use inkwell::AddressSpace;

use dj_core::TypeId;

use crate::analyze::SymbolTable;
use crate::error::{BackendError, CompileResult};
use crate::ir::TypedProgram;

use layout::{build_layouts, ClassLayout};

/// Translates a typechecked, lowered program into a native object file at
/// `output_path`. `run_optimizations`/`emit_llvm` mirror the `--run-optis`/
/// `--emit-llvm` CLI flags (spec §6); `emit_llvm`, when set, prints the
/// textual module to stderr before emission.
pub fn generate(
    program: &TypedProgram,
    table: &SymbolTable,
    output_path: &std::path::Path,
    run_optimizations: bool,
    emit_llvm: bool,
) -> CompileResult<()> {
    let context = Context::create();
    let module = context.create_module("dj");
    let builder = context.create_builder();

    let layouts = build_layouts(table);
    let mut cg = Codegen {
        context: &context,
        module,
        builder,
        table,
        layouts,
        struct_types: Vec::new(),
        globals: HashMap::new(),
        functions: HashMap::new(),
    };

    cg.declare_struct_types();
    cg.declare_globals();
    cg.declare_runtime_functions();
    if table.has_instanceof {
        dispatch::emit_itable(&mut cg);
    }
    cg.declare_methods();
    cg.emit_methods(program);
    dispatch::emit_vtables(&mut cg);
    let main_fn = runtime::emit_main(&mut cg, program);

    if emit_llvm {
        eprintln!("{}", cg.module.print_to_string());
    }

    cg.module
        .verify()
        .map_err(|e| BackendError::Verification(e.to_string()))?;

    if run_optimizations {
        runtime::optimize(&cg, main_fn);
    }

    runtime::emit_object_file(&cg, output_path)?;
    Ok(())
}

/// Header fields every record begins with, before any declared/inherited
/// field (spec §4.4.1): a self-pointer and a 32-bit class-id.
pub(crate) struct Codegen<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: inkwell::builder::Builder<'ctx>,
    pub table: &'ctx SymbolTable,
    pub layouts: Vec<ClassLayout>,
    pub struct_types: Vec<StructType<'ctx>>,
    pub globals: HashMap<String, GlobalValue<'ctx>>,
    pub functions: HashMap<(TypeId, u32), FunctionValue<'ctx>>,
}

impl<'ctx> Codegen<'ctx> {
    pub fn ptr_type(&self) -> inkwell::types::PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    /// The LLVM basic type a DJ type is represented as: `i32` for `nat`,
    /// `i1` for `bool`, an opaque `ptr` for every reference type.
    pub fn basic_type(&self, t: TypeId) -> BasicTypeEnum<'ctx> {
        if t.is_nat() {
            self.context.i32_type().into()
        } else if t.is_bool() {
            self.context.bool_type().into()
        } else {
            self.ptr_type().into()
        }
    }

    pub fn struct_type(&self, class: TypeId) -> StructType<'ctx> {
        self.struct_types[class.class_index().expect("struct_type called with a non-class TypeId") as usize]
    }

    fn declare_struct_types(&mut self) {
        self.struct_types = (0..self.table.class_count())
            .map(|i| self.context.opaque_struct_type(&self.table.class(TypeId::class(i)).name))
            .collect();
        for i in 0..self.table.class_count() {
            let class = TypeId::class(i);
            let mut fields: Vec<BasicTypeEnum> = vec![self.ptr_type().into(), self.context.i32_type().into()];
            fields.extend(self.layouts[i as usize].fields.iter().map(|f| self.basic_type(f.type_id)));
            self.struct_type(class).set_body(&fields, false);
        }
    }

    /// One zero/null-initialized global per static field, named
    /// `"<declaring-class>.<field>"` (spec §4.4.1).
    fn declare_globals(&mut self) {
        for i in 0..self.table.class_count() {
            let entry = self.table.class(TypeId::class(i));
            for var in &entry.static_vars {
                let name = format!("{}.{}", entry.name, var.name);
                let ty = self.table.type_of(&var.type_name);
                let global = self.module.add_global(self.basic_type(ty), None, &name);
                global.set_linkage(Linkage::Common);
                global.set_initializer(&zero_value(self, ty));
                self.globals.insert(name, global);
            }
        }
    }

    /// `malloc` (always, for `NEW`) and `printf`/`scanf` (only when the
    /// program uses `printNat`/`readNat` anywhere, not only in `main` - spec
    /// §4.4.9 gates these on whole-program usage).
    fn declare_runtime_functions(&mut self) {
        let malloc_ty = self.ptr_type().fn_type(&[self.context.i64_type().into()], false);
        self.module.add_function("malloc", malloc_ty, None);

        if self.table.has_print_nat || self.table.has_read_nat {
            let varargs_ty = self.context.i32_type().fn_type(&[self.ptr_type().into()], true);
            self.module.add_function("printf", varargs_ty, None);
            self.module.add_function("scanf", varargs_ty, None);
        }
    }

    /// Declares (but does not yet emit bodies for) every `"<class>_method_
    /// <name>"` function, so that calls between methods of different
    /// classes resolve regardless of declaration order.
    fn declare_methods(&mut self) {
        for i in 0..self.table.class_count() {
            let class = TypeId::class(i);
            let entry = self.table.class(class);
            for (idx, method) in entry.methods.iter().enumerate() {
                let param_ty = self.basic_type(self.table.type_of(&method.param_type));
                let ret_ty = self.table.type_of(&method.return_type);
                let fn_ty = if ret_ty.is_nat() {
                    self.context.i32_type().fn_type(&[self.ptr_type().into(), param_ty.into()], false)
                } else if ret_ty.is_bool() {
                    self.context.bool_type().fn_type(&[self.ptr_type().into(), param_ty.into()], false)
                } else {
                    self.ptr_type().fn_type(&[self.ptr_type().into(), param_ty.into()], false)
                };
                let name = format!("{}_method_{}", entry.name, method.name);
                let f = self.module.add_function(&name, fn_ty, None);
                self.functions.insert((class, idx as u32), f);
            }
        }
    }

    fn emit_methods(&mut self, program: &TypedProgram) {
        for class in &program.classes {
            for (idx, method) in class.methods.iter().enumerate() {
                let f = self.functions[&(class.id, idx as u32)];
                expr::emit_method_body(self, f, method);
            }
        }
    }

    pub fn global_for(&self, declaring_class: TypeId, name: &str) -> GlobalValue<'ctx> {
        let key = format!("{}.{}", self.table.class(declaring_class).name, name);
        self.globals[&key]
    }
}

/// The zero-initializer for a static field, a local variable, or a typed
/// `null` (spec §4.4.1): integer zero, boolean false, or a null pointer.
pub(crate) fn zero_value<'ctx>(cg: &Codegen<'ctx>, t: TypeId) -> inkwell::values::BasicValueEnum<'ctx> {
    if t.is_nat() {
        cg.context.i32_type().const_zero().into()
    } else if t.is_bool() {
        cg.context.bool_type().const_zero().into()
    } else {
        cg.ptr_type().const_null().into()
    }
}

/// Coerces a block's trailing value to `i32` for an `IF` merge phi or
/// `main`'s return: primitive values widen/pass through, reference values
/// collapse to `0` (their bit pattern carries no meaning as an exit code or
/// a uniformly-typed phi operand alongside a sibling primitive branch).
pub(crate) fn coerce_i32<'ctx>(cg: &Codegen<'ctx>, v: inkwell::values::BasicValueEnum<'ctx>) -> inkwell::values::IntValue<'ctx> {
    use inkwell::values::BasicValueEnum;
    match v {
        BasicValueEnum::IntValue(i) if i.get_type() == cg.context.i32_type() => i,
        BasicValueEnum::IntValue(i) => cg.builder.build_int_z_extend(i, cg.context.i32_type(), "i32ext").unwrap(),
        BasicValueEnum::PointerValue(_) => cg.context.i32_type().const_zero(),
        other => panic!("unexpected i32-coercion operand kind: {other:?}"),
    }
}

/// The struct field index (past the self-pointer/class-id header) and
/// record type for a resolved field access - shared by `DotId`/`DotAssign`
/// codegen in `expr.rs`.
pub(crate) fn field_gep<'ctx>(
    cg: &Codegen<'ctx>,
    object: PointerValue<'ctx>,
    field: &crate::ir::FieldRef,
) -> PointerValue<'ctx> {
    let struct_ty = cg.struct_type(field.receiver_class);
    let layout = &cg.layouts[field.receiver_class.class_index().unwrap() as usize];
    let idx = layout.field_index(field.declaring_class, field.index);
    cg.builder
        .build_struct_gep(struct_ty, object, idx, "fieldptr")
        .expect("field_gep index is in bounds for the receiver's own record type")
}
