// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Class and method registry.
//!
//! Classes form a single-inheritance chain rooted at `Object`. Method
//! lookup walks the chain from the receiver's class upward, the same linear
//! search the upstream interpreter performs over `mrbc_class.method_link`.

use crate::config::MAX_SYMBOLS_COUNT;
use crate::error::RuntimeError;
use crate::intrinsics::IntrinsicFn;
use crate::types::{ClassId, SymId};

use alloc::vec::Vec;

/// Fixed ids for the classes the interpreter itself constructs instances
/// of, independent of anything a loaded program defines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum BuiltinClass {
    Object = 0,
    NilClass = 1,
    FalseClass = 2,
    TrueClass = 3,
    Integer = 4,
    Float = 5,
    Symbol = 6,
    String = 7,
    Array = 8,
    Hash = 9,
    Range = 10,
    Proc = 11,
    Class = 12,
    Exception = 13,
    Kernel = 14,
}

pub const BUILTIN_CLASS_COUNT: usize = 15;

/// Names of the fifteen built-in classes, in [`BuiltinClass`] id order, for
/// interning into the symbol table at process bootstrap.
pub const BUILTIN_CLASS_NAMES: [&str; BUILTIN_CLASS_COUNT] = [
    "Object",
    "NilClass",
    "FalseClass",
    "TrueClass",
    "Integer",
    "Float",
    "Symbol",
    "String",
    "Array",
    "Hash",
    "Range",
    "Proc",
    "Class",
    "Exception",
    "Kernel",
];

/// A method: either a native (Rust) implementation or an entry point into
/// loaded bytecode (an IREP index).
#[derive(Clone, Copy, Debug)]
pub enum Method {
    Native(IntrinsicFn),
    Bytecode(u32),
}

struct MethodEntry {
    name: SymId,
    method: Method,
}

/// A single class: name, superclass link, and its own method table.
/// Constants are out of scope for method dispatch (spec.md does not require
/// `class`-scoped constant tables beyond globals) and are not modeled here.
pub struct Class {
    pub name: SymId,
    pub superclass: Option<ClassId>,
    methods: Vec<MethodEntry>,
}

impl Class {
    fn new(name: SymId, superclass: Option<ClassId>) -> Self {
        Self {
            name,
            superclass,
            methods: Vec::new(),
        }
    }

    fn define(&mut self, name: SymId, method: Method) {
        if let Some(entry) = self.methods.iter_mut().find(|e| e.name == name) {
            entry.method = method;
        } else {
            self.methods.push(MethodEntry { name, method });
        }
    }

    fn find(&self, name: SymId) -> Option<Method> {
        self.methods.iter().find(|e| e.name == name).map(|e| e.method)
    }
}

/// Holds every class known to the VM: the built-ins plus any user classes
/// defined while running. Shared process-wide state, never cloned per task.
pub struct ClassRegistry {
    classes: Vec<Class>,
}

impl ClassRegistry {
    /// Builds the registry with the fifteen built-in classes registered at
    /// their fixed [`BuiltinClass`] ids, `Object` as the common ancestor of
    /// every value-bearing class.
    #[must_use]
    pub fn new(object_name: SymId, builtin_names: [SymId; BUILTIN_CLASS_COUNT]) -> Self {
        let mut classes = Vec::with_capacity(BUILTIN_CLASS_COUNT);
        for (i, name) in builtin_names.into_iter().enumerate() {
            let superclass = if i == BuiltinClass::Object as usize {
                None
            } else {
                Some(ClassId::new(BuiltinClass::Object as u16))
            };
            classes.push(Class::new(name, superclass));
        }
        let _ = object_name;
        Self { classes }
    }

    /// Registers a new user-defined class, returning its freshly assigned
    /// id. Capped by [`MAX_SYMBOLS_COUNT`] the same way the symbol table is,
    /// since every class also needs a name symbol.
    pub fn define_class(&mut self, name: SymId, superclass: ClassId) -> Result<ClassId, RuntimeError> {
        if self.classes.len() >= MAX_SYMBOLS_COUNT {
            return Err(RuntimeError::RuntimeError);
        }
        let id = ClassId::new(self.classes.len() as u16);
        self.classes.push(Class::new(name, Some(superclass)));
        Ok(id)
    }

    pub fn define_method(&mut self, class: ClassId, name: SymId, method: Method) {
        self.classes[class.as_usize()].define(name, method);
    }

    #[must_use]
    pub fn name_of(&self, class: ClassId) -> SymId {
        self.classes[class.as_usize()].name
    }

    #[must_use]
    pub fn superclass_of(&self, class: ClassId) -> Option<ClassId> {
        self.classes[class.as_usize()].superclass
    }

    /// Resolves a method by walking the superclass chain starting at
    /// `class`, returning [`RuntimeError::NoMethodError`] if no ancestor
    /// defines it.
    pub fn lookup(&self, class: ClassId, name: SymId) -> Result<Method, RuntimeError> {
        let mut current = Some(class);
        while let Some(id) = current {
            if let Some(method) = self.classes[id.as_usize()].find(name) {
                return Ok(method);
            }
            current = self.classes[id.as_usize()].superclass;
        }
        Err(RuntimeError::NoMethodError)
    }

    /// Whether `class` is `other` or inherits from it, implementing
    /// `Object#is_a?`.
    #[must_use]
    pub fn is_a(&self, class: ClassId, other: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == other {
                return true;
            }
            current = self.classes[id.as_usize()].superclass;
        }
        false
    }

    #[must_use]
    pub fn string_class(&self) -> ClassId {
        ClassId::new(BuiltinClass::String as u16)
    }

    #[must_use]
    pub fn array_class(&self) -> ClassId {
        ClassId::new(BuiltinClass::Array as u16)
    }

    #[must_use]
    pub fn hash_class(&self) -> ClassId {
        ClassId::new(BuiltinClass::Hash as u16)
    }

    #[must_use]
    pub fn range_class(&self) -> ClassId {
        ClassId::new(BuiltinClass::Range as u16)
    }

    #[must_use]
    pub fn proc_class(&self) -> ClassId {
        ClassId::new(BuiltinClass::Proc as u16)
    }

    #[must_use]
    pub fn object_class(&self) -> ClassId {
        ClassId::new(BuiltinClass::Object as u16)
    }
}

#[cfg(test)]
mod class_test;
