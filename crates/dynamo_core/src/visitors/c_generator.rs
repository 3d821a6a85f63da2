//! C code generator.
//!
//! Emits one C translation unit for the compiled node list: a `static`
//! function per driver function, prefixed with the driver's qualified name
//! (`::` becomes `_`), with forward declarations gathered ahead of the
//! definitions.  Template arguments bound on an inheritance link become
//! constant accessor functions against the base driver's prefix, and the
//! functions of a templated driver materialise their parameters through
//! those accessors.

use crate::parser::ast::{
    BuiltinType, Driver, Function, NamedType, RawCodeBlock, Variable, Visitor,
};

/// Accumulates generated C source; retrieve it with [`CGenerator::source`]
/// after the traversal.
#[derive(Debug, Default)]
pub struct CGenerator {
    source: String,
    forward_decls: String,
    /// Function-name prefixes for the drivers being visited, innermost
    /// last.
    prefixes: Vec<String>,
    /// `(type name, parameter name)` for the current driver's template
    /// parameters.
    template_parameters: Vec<(String, String)>,
}

impl CGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The complete translation unit: forward declarations, then function
    /// definitions.
    pub fn source(&self) -> String {
        format!("{}\n{}", self.forward_decls, self.source)
    }

    fn push_prefix(&mut self, driver_name: &str) {
        self.prefixes.push(format!("drv_{}", driver_name.replace("::", "_")));
    }

    fn pop_prefix(&mut self) {
        self.prefixes.pop();
    }

    fn prefix(&self) -> &str {
        self.prefixes.last().map(String::as_str).unwrap_or_default()
    }
}

impl Visitor for CGenerator {
    fn visit_driver(&mut self, node: &Driver<'_>) {
        self.push_prefix(&node.name);

        for parameter in &node.template_parameters {
            self.template_parameters
                .push((parameter.ty.name.clone(), parameter.name.to_string()));
        }

        if let Some(base) = &node.inheritance {
            // Accessors for the template arguments this driver binds on
            // its base, named against the base's prefix so the base's own
            // functions can call them.
            self.push_prefix(&base.name);
            for (parameter, value) in base.template_parameters.iter().zip(&base.template_arguments)
            {
                self.forward_decls.push_str(&format!(
                    "static {} {}_{}() {{ return {}; }}\n",
                    parameter.ty.name,
                    self.prefix(),
                    parameter.name,
                    value.text,
                ));
            }
            self.pop_prefix();
        }

        for function in &node.functions {
            self.visit_function(function);
        }

        self.template_parameters.clear();
        self.pop_prefix();
    }

    fn visit_function(&mut self, node: &Function<'_>) {
        let mut signature = format!("static void {}_{}(", self.prefix(), node.name);
        for (i, parameter) in node.parameters.iter().enumerate() {
            signature.push_str(&format!("{} {}", parameter.ty.name, parameter.name));
            if i != node.parameters.len() - 1 {
                signature.push_str(", ");
            }
        }
        signature.push(')');

        self.forward_decls.push_str(&signature);
        self.forward_decls.push_str(";\n");
        self.source.push_str(&signature);
        self.source.push_str(" {\n");

        let prefix = self.prefix().to_string();
        for (type_name, parameter_name) in &self.template_parameters {
            self.source.push_str(&format!(
                "    const {type_name} {parameter_name} = {prefix}_{parameter_name}();\n"
            ));
        }
        self.source.push('\n');

        for statement in &node.body {
            statement.accept(self);
        }

        self.source.push_str("}\n\n");
    }

    fn visit_variable(&mut self, node: &Variable<'_>) {
        self.source
            .push_str(&format!("    {} {};\n", node.ty.name, node.name));
    }

    fn visit_builtin_type(&mut self, _node: &BuiltinType) {}

    fn visit_named_type(&mut self, _node: &NamedType<'_>) {}

    fn visit_raw_code_block(&mut self, node: &RawCodeBlock<'_>) {
        for line in node.code.lines() {
            self.source.push_str(&format!("    {}\n", line.trim()));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
