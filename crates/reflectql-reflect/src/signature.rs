//! Reflected handler-method signatures.
//!
//! A handler method's parameters carry a role: most become externally
//! visible arguments, while at most one receives the parent value and
//! at most one receives the execution context, marked as such by the
//! reflection layer.

use crate::descriptor::TypeDescriptor;

/// What a declared parameter receives when the handler is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ParameterRole {
    /// An externally visible field argument.
    Argument,
    /// The parent value of the field being resolved.
    Parent,
    /// The per-request execution context.
    Context,
}

/// One declared parameter of a handler method.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Parameter name as declared.
    pub name: String,
    /// The parameter's type.
    pub ty: TypeDescriptor,
    /// Whether the parameter was declared optional.
    pub optional: bool,
    /// Declared default value, if any.
    pub default_value: Option<serde_json::Value>,
    /// The parameter's role.
    pub role: ParameterRole,
}

impl ParameterDescriptor {
    /// Creates an argument parameter.
    pub fn argument(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default_value: None,
            role: ParameterRole::Argument,
        }
    }

    /// Creates a parent-value parameter.
    pub fn parent(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default_value: None,
            role: ParameterRole::Parent,
        }
    }

    /// Creates an execution-context parameter.
    pub fn context(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: TypeDescriptor::Void,
            optional: false,
            default_value: None,
            role: ParameterRole::Context,
        }
    }

    /// Marks the parameter optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attaches a default value. Implies optional.
    pub fn default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self.optional = true;
        self
    }
}

/// The reflected signature of one handler method.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// Declared parameters, in declaration order.
    pub parameters: Vec<ParameterDescriptor>,
    /// The declared return type.
    pub return_type: TypeDescriptor,
}

impl MethodSignature {
    /// Creates a signature with no parameters.
    pub fn returning(return_type: TypeDescriptor) -> Self {
        Self {
            parameters: Vec::new(),
            return_type,
        }
    }

    /// Adds a parameter.
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }
}
