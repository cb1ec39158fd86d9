//! Definition of a class and its nested classes into a loading context.
//!
//! An enclosing class refers to its nested classes by name, so every nested
//! class has to be live before the class that encloses it. The injector walks
//! the nesting tree in post-order (innermost first) with an explicit stack,
//! so nesting depth is bounded by the heap rather than the thread stack.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::{DefineError, LoadingContext};
use crate::error::{DefinitionError, InstrumentError, ResolutionError};
use crate::pool::{ClassPool, TypeDescriptor};

struct Frame {
    descriptor: Arc<TypeDescriptor>,
    /// Nested names still to visit, reversed so `pop` yields declaration
    /// order.
    pending: Vec<String>,
}

impl Frame {
    fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        let mut pending = descriptor.nested_class_names();
        pending.reverse();
        Frame { descriptor, pending }
    }
}

/// The order in which `descriptor` and everything it nests must be defined:
/// each class after all of its nested classes, `descriptor` last.
///
/// Nested names are resolved through `pool`. A class nested in more than one
/// place appears once, at its first position.
pub fn injection_order(
    pool: &ClassPool,
    descriptor: &Arc<TypeDescriptor>,
) -> Result<Vec<Arc<TypeDescriptor>>, ResolutionError> {
    let mut order = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(descriptor.name().to_string());
    let mut stack = vec![Frame::new(Arc::clone(descriptor))];

    loop {
        let next = match stack.last_mut() {
            Some(frame) => frame.pending.pop(),
            None => break,
        };
        match next {
            Some(nested) => {
                if !seen.insert(nested.clone()) {
                    continue;
                }
                stack.push(Frame::new(pool.get(&nested)?));
            }
            None => {
                if let Some(done) = stack.pop() {
                    order.push(done.descriptor);
                }
            }
        }
    }
    Ok(order)
}

/// Defines `descriptor` into `context`, nested classes first.
///
/// Each defined descriptor is frozen. A class the context reports as already
/// defined is loaded instead; that only happens when another path defined it
/// first. A failure leaves the classes defined so far live; nothing is rolled
/// back because the host cannot undefine classes.
pub fn inject<C>(
    pool: &ClassPool,
    descriptor: &Arc<TypeDescriptor>,
    context: &C,
    security: &C::Security,
) -> Result<C::Class, InstrumentError>
where
    C: LoadingContext + ?Sized,
{
    let target = descriptor.name();
    let fail = |kind: crate::error::InstrumentErrorKind| InstrumentError::new(target, kind).in_context(context.label());

    let order = injection_order(pool, descriptor).map_err(|e| fail(e.into()))?;
    let mut defined = None;
    for item in &order {
        let class = define_one(item, context, security).map_err(|e| fail(e.into()))?;
        if item.name() == target {
            info!(class = target, context = %context.label(), nested = order.len() - 1, "class defined");
            defined = Some(class);
        } else {
            info!(class = item.name(), context = %context.label(), "defineNestedClass");
        }
    }
    // The walk always ends with the descriptor itself.
    defined.ok_or_else(|| {
        fail(DefinitionError::Rejected { name: target.to_string(), reason: "empty injection order".to_string() }.into())
    })
}

fn define_one<C>(descriptor: &TypeDescriptor, context: &C, security: &C::Security) -> Result<C::Class, DefinitionError>
where
    C: LoadingContext + ?Sized,
{
    let name = descriptor.name();
    let bytecode = descriptor.bytecode();
    match context.define(name, &bytecode, security) {
        Ok(class) => {
            descriptor.freeze();
            Ok(class)
        }
        Err(DefineError::AlreadyDefined) => {
            debug!(class = name, context = %context.label(), "already defined, loading the live class");
            descriptor.freeze();
            context
                .load(name)
                .map_err(|e| DefinitionError::LoadFailed { name: name.to_string(), reason: e.to_string() })
        }
        Err(e) => Err(DefinitionError::Rejected { name: name.to_string(), reason: e.to_string() }),
    }
}
