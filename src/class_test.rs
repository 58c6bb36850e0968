// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;

fn names() -> [SymId; BUILTIN_CLASS_COUNT] {
    core::array::from_fn(|i| SymId::new(i as u16))
}

#[test]
fn method_lookup_walks_the_superclass_chain() {
    let mut registry = ClassRegistry::new(SymId::new(0), names());
    let object = registry.object_class();
    let child = registry.define_class(SymId::new(100), object).unwrap();
    let method_name = SymId::new(200);
    registry.define_method(object, method_name, Method::Bytecode(7));

    let found = registry.lookup(child, method_name).unwrap();
    match found {
        Method::Bytecode(irep) => assert_eq!(irep, 7),
        Method::Native(_) => panic!("expected bytecode method"),
    }
}

#[test]
fn lookup_of_undefined_method_is_no_method_error() {
    let registry = ClassRegistry::new(SymId::new(0), names());
    let result = registry.lookup(registry.object_class(), SymId::new(999));
    assert_eq!(result.unwrap_err(), RuntimeError::NoMethodError);
}

#[test]
fn is_a_reports_true_for_self_and_ancestors() {
    let mut registry = ClassRegistry::new(SymId::new(0), names());
    let object = registry.object_class();
    let child = registry.define_class(SymId::new(101), object).unwrap();
    assert!(registry.is_a(child, child));
    assert!(registry.is_a(child, object));
    assert!(!registry.is_a(object, child));
}

#[test]
fn redefining_a_method_replaces_it() {
    let mut registry = ClassRegistry::new(SymId::new(0), names());
    let object = registry.object_class();
    let name = SymId::new(50);
    registry.define_method(object, name, Method::Bytecode(1));
    registry.define_method(object, name, Method::Bytecode(2));
    match registry.lookup(object, name).unwrap() {
        Method::Bytecode(irep) => assert_eq!(irep, 2),
        Method::Native(_) => panic!("expected bytecode method"),
    }
}
