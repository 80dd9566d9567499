//! End-to-end tests for each concrete scenario spec.md §8 names: write a
//! `.dj` file, run the `dj2ll` binary on it (compile, link), run the
//! resulting executable, and check its stdout. This is the one place in the
//! workspace that needs a real `cc` on `PATH`, the same dependency `dj2ll`
//! itself has at runtime.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use indoc::indoc;

/// Compiles `src` in a fresh temp directory, runs the produced executable
/// (feeding it `stdin`), and returns its stdout as a string.
fn compile_and_run(src: &str, stdin: &str) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("prog.dj");
    std::fs::write(&source_path, src).expect("write source");

    let dj2ll = env!("CARGO_BIN_EXE_dj2ll");
    let status = Command::new(dj2ll)
        .arg(&source_path)
        .current_dir(dir.path())
        .status()
        .expect("spawn dj2ll");
    assert!(status.success(), "dj2ll failed to compile {src}");

    let exe_path: &Path = &dir.path().join("prog");
    let mut child = Command::new(exe_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn compiled program");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("run compiled program");
    assert!(output.status.success(), "compiled program exited with {}", output.status);
    String::from_utf8(output.stdout).expect("utf8 stdout")
}

#[test]
fn s1_arithmetic() {
    let out = compile_and_run(indoc! {"
        main { printNat(2 + 3 * 4); }
    "}, "");
    assert_eq!(out, "14\n");
}

#[test]
fn s2_control_flow() {
    let out = compile_and_run(indoc! {"
        main {
            nat i;
            for (i = 0; i > 10 == false && i == i; i = i + 1) { printNat(i); }
        }
    "}, "");
    let expected: String = (0..10).map(|n| format!("{n}\n")).collect();
    assert_eq!(out, expected);
}

#[test]
fn s3_dispatch() {
    let out = compile_and_run(indoc! {"
        class A { nat f(nat x) { x + 1 } }
        class B extends A { nat f(nat x) { x + 100 } }
        main {
            A a;
            a = new B();
            printNat(a.f(5));
        }
    "}, "");
    assert_eq!(out, "105\n");
}

#[test]
fn s4_instanceof_and_null() {
    let out = compile_and_run(indoc! {"
        class A { }
        class B extends A { }
        main {
            A a;
            a = new B();
            printNat(if (a instanceof B) 1 else 0);
            a = null;
            printNat(if (a instanceof A) 1 else 0);
        }
    "}, "");
    assert_eq!(out, "1\n0\n");
}

#[test]
fn s5_static_field_as_global() {
    let out = compile_and_run(indoc! {"
        class A {
            static nat s;
            nat bump() { s = s + 1; s }
        }
        main {
            A x;
            x = new A();
            printNat(x.bump());
            printNat(x.bump());
            printNat(x.s);
        }
    "}, "");
    assert_eq!(out, "1\n2\n2\n");
}

/// `&&` must short-circuit: on input `0`, the right side (which would fault)
/// must never run, and the program must still print `0` instead of trapping.
#[test]
fn s6_short_circuit() {
    let out = compile_and_run(indoc! {"
        class A { nat f(nat x) { x } }
        main {
            nat n;
            A a;
            n = readNat();
            printNat(if (n == 0 && a.f(0) > 0) 1 else 0);
        }
    "}, "0\n");
    assert_eq!(out, "Enter a natural number: 0\n");
}
