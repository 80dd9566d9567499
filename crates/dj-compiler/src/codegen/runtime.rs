//! `main` assembly, the optimization pipeline, and object-file emission
//! (spec §4.4.9, §4.4.10).

use inkwell::passes::PassManager;
use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine};
use inkwell::values::FunctionValue;
use inkwell::OptimizationLevel;

use crate::error::{BackendError, CompileResult};
use crate::ir::TypedProgram;

use super::expr::{emit_expr, Locals};
use super::{coerce_i32, zero_value, Codegen};

/// Assembles `main`'s body from the program's main-block locals and
/// statements, and coerces whatever the final statement evaluates to into
/// the `i32` exit code `main` returns. `malloc`/`printf`/`scanf` are already
/// declared by `Codegen::declare_runtime_functions`.
pub(crate) fn emit_main<'ctx>(cg: &mut Codegen<'ctx>, program: &TypedProgram) -> FunctionValue<'ctx> {
    let main_ty = cg.context.i32_type().fn_type(&[], false);
    let main_fn = cg.module.add_function("main", main_ty, None);
    let entry = cg.context.append_basic_block(main_fn, "entry");
    cg.builder.position_at_end(entry);

    let mut slots = std::collections::HashMap::new();
    for (name, ty) in &program.main_locals {
        let alloca = cg.builder.build_alloca(cg.basic_type(*ty), name).unwrap();
        cg.builder.build_store(alloca, zero_value(cg, *ty)).unwrap();
        slots.insert(name.clone(), (alloca, *ty));
    }
    let mut locals = Locals { this_ptr: None, slots };

    let mut last = None;
    for e in &program.main_body {
        last = Some(emit_expr(cg, e, &mut locals, None));
    }

    let exit_code = match last {
        None => cg.context.i32_type().const_zero(),
        Some(v) => coerce_i32(cg, v),
    };
    cg.builder.build_return(Some(&exit_code)).unwrap();
    main_fn
}

/// The fixed scalar pipeline run only on `main` (spec §4.4.10): mem2reg,
/// instruction combining, reassociation, GVN, CFG simplification.
pub(crate) fn optimize(cg: &Codegen<'_>, main_fn: FunctionValue<'_>) {
    let fpm = PassManager::create(&cg.module);
    fpm.add_promote_memory_to_register_pass();
    fpm.add_instruction_combining_pass();
    fpm.add_reassociate_pass();
    fpm.add_gvn_pass();
    fpm.add_cfg_simplification_pass();
    fpm.initialize();
    fpm.run_on(&main_fn);
    fpm.finalize();
}

/// Targets the host triple/CPU/features (spec §4.4.10) and writes the
/// relocatable object file at `output_path`.
pub(crate) fn emit_object_file(cg: &Codegen<'_>, output_path: &std::path::Path) -> CompileResult<()> {
    Target::initialize_native(&InitializationConfig::default()).map_err(BackendError::TargetInit)?;

    let triple = TargetMachine::get_default_triple();
    let cpu = TargetMachine::get_host_cpu_name();
    let features = TargetMachine::get_host_cpu_features();

    let target = Target::from_triple(&triple).map_err(|e| BackendError::NoTargetMachine(e.to_string()))?;
    let machine = target
        .create_target_machine(
            &triple,
            cpu.to_str().unwrap_or(""),
            features.to_str().unwrap_or(""),
            OptimizationLevel::Default,
            RelocMode::DynamicNoPic,
            CodeModel::Default,
        )
        .ok_or_else(|| BackendError::NoTargetMachine(triple.as_str().to_string_lossy().into_owned()))?;

    cg.module.set_triple(&triple);
    cg.module.set_data_layout(&machine.get_target_data().get_data_layout());

    machine
        .write_to_file(&cg.module, FileType::Object, output_path)
        .map_err(|e| BackendError::ObjectEmit(e.to_string()))?;
    Ok(())
}
