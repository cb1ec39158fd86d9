//! Hook (interceptor) construction.
//!
//! Hook classes are unknown when the agent is built, so their constructor is
//! picked at runtime: the no-argument one by default, otherwise by an explicit
//! list of parameter types, or by the runtime types of the arguments.

use tracing::info;

use crate::context::LoadingContext;
use crate::descriptor::ConstructorSignature;
use crate::error::ConstructionError;

/// How to construct a hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Construction<V> {
    /// `new Hook()`
    Default,
    /// The constructor declared with exactly these Java parameter types, e.g.
    /// `["java.lang.String", "int"]`. Arguments may be `None` (null).
    WithSignature { parameter_types: Vec<String>, args: Vec<Option<V>> },
    /// The constructor whose parameter types equal the runtime classes of
    /// `args`. A `None` argument has no runtime class and is rejected; use
    /// [`Construction::WithSignature`] to pass nulls.
    Inferred(Vec<Option<V>>),
}

impl<V> Default for Construction<V> {
    fn default() -> Self {
        Construction::Default
    }
}

impl<V> Construction<V> {
    pub fn with_signature<S: Into<String>>(parameter_types: impl IntoIterator<Item = S>, args: Vec<Option<V>>) -> Self {
        Construction::WithSignature { parameter_types: parameter_types.into_iter().map(Into::into).collect(), args }
    }

    pub fn inferred(args: impl IntoIterator<Item = V>) -> Self {
        Construction::Inferred(args.into_iter().map(Some).collect())
    }
}

/// Picks the constructor for `construction` and runs it.
pub fn construct<C>(context: &C, class: &C::Class, name: &str, construction: Construction<C::Value>) -> Result<C::Hook, ConstructionError>
where
    C: LoadingContext + ?Sized,
{
    let (signature, args) = match construction {
        Construction::Default => (ConstructorSignature::no_args(), Vec::new()),
        Construction::WithSignature { parameter_types, args } => {
            (ConstructorSignature::from_type_names(&parameter_types)?, args)
        }
        Construction::Inferred(args) => {
            let types = runtime_types(context, &args)?;
            (ConstructorSignature::from_type_names(&types)?, args)
        }
    };
    if signature.arity() != args.len() {
        return Err(ConstructionError::ArityMismatch { expected: signature.arity(), found: args.len() });
    }

    let hook = context.instantiate(class, &signature, &args)?;
    info!(class = name, context = %context.label(), constructor = signature.descriptor(), "hook instance created");
    Ok(hook)
}

fn runtime_types<C>(context: &C, args: &[Option<C::Value>]) -> Result<Vec<String>, ConstructionError>
where
    C: LoadingContext + ?Sized,
{
    args.iter()
        .enumerate()
        .map(|(index, arg)| match arg {
            Some(value) => context.runtime_type_name(value),
            None => Err(ConstructionError::NullArgument { index }),
        })
        .collect()
}
