//! jacobian::rules — the per-transform derivative extension point.
//!
//! Purpose
//! -------
//! Map a deterministic node's transform key to the rule that builds its
//! Jacobian from its parents' Jacobians and values, and that pushes an
//! adjoint from the node back to its parents.
//!
//! Key behaviors
//! -------------
//! - [`DerivativeRule`] is implemented by structs and by plain closures.
//!   Closures only provide the forward form; [`FnRule`] pairs a forward and
//!   a reverse function.
//! - [`DerivativeRule::reverse`] defaults to
//!   [`JacobianError::UnsupportedReverse`].
//! - [`RuleRegistry::register`] replaces any rule already under that key.
//! - [`RuleRegistry::with_builtin_rules`] preloads the stock arithmetic,
//!   reduction, reshaping and selection rules.
//!
//! Conventions
//! -----------
//! - Rules receive parents in the node's parent order.
//! - A rule must return a map whose output shape is the node's shape; the
//!   accumulation driver checks this.
//! - A reverse form returns one contribution per parent, in parent order.
//!   An empty map means the parent receives nothing.
use std::collections::HashMap;

use crate::{
    graph::{NodeId, Tensor},
    jacobian::{
        builtin,
        errors::{JacobianError, JacobianResult},
        partials::JacobianMap,
    },
};

/// Everything a rule may read about the node being differentiated.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub node: NodeId,
    pub transform: &'a str,
    pub output_shape: &'a [usize],
    pub output_value: &'a Tensor,
    pub parent_values: Vec<&'a Tensor>,
    pub parent_partials: Vec<&'a JacobianMap>,
}

impl<'a> RuleContext<'a> {
    pub fn arity(&self) -> usize {
        self.parent_partials.len()
    }

    /// # Errors
    /// - [`JacobianError::RuleArity`] unless the node has exactly `expected`
    ///   parents.
    pub fn expect_arity(&self, expected: usize) -> JacobianResult<()> {
        check_arity(self.transform, expected, self.arity())
    }
}

/// Everything a reverse rule may read about the node an adjoint leaves.
///
/// `adjoint` is `∂(target)/∂(node)`: its output block is the target's shape
/// and every entry's source block is this node's shape.
#[derive(Debug, Clone)]
pub struct ReverseContext<'a> {
    pub node: NodeId,
    pub transform: &'a str,
    pub output_shape: &'a [usize],
    pub output_value: &'a Tensor,
    pub parent_values: Vec<&'a Tensor>,
    pub adjoint: &'a JacobianMap,
}

impl<'a> ReverseContext<'a> {
    pub fn arity(&self) -> usize {
        self.parent_values.len()
    }

    pub fn parent_shape(&self, index: usize) -> &'a [usize] {
        let value: &'a Tensor = self.parent_values[index];
        value.shape()
    }

    /// # Errors
    /// - [`JacobianError::RuleArity`] unless the node has exactly `expected`
    ///   parents.
    pub fn expect_arity(&self, expected: usize) -> JacobianResult<()> {
        check_arity(self.transform, expected, self.arity())
    }
}

fn check_arity(transform: &str, expected: usize, found: usize) -> JacobianResult<()> {
    if found != expected {
        return Err(JacobianError::RuleArity { transform: transform.to_string(), expected, found });
    }
    Ok(())
}

/// Builds a node's Jacobian from its parents', and optionally maps an
/// adjoint on the node to adjoints on its parents.
pub trait DerivativeRule: Send + Sync {
    fn partials(&self, ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap>;

    /// `∂(target)/∂(parent)` contributions, one per parent in parent order.
    ///
    /// # Errors
    /// - [`JacobianError::UnsupportedReverse`] unless the rule overrides it.
    fn reverse(&self, ctx: &ReverseContext<'_>) -> JacobianResult<Vec<JacobianMap>> {
        Err(JacobianError::UnsupportedReverse {
            node: ctx.node,
            transform: ctx.transform.to_string(),
        })
    }
}

impl<F> DerivativeRule for F
where
    F: Fn(&RuleContext<'_>) -> JacobianResult<JacobianMap> + Send + Sync,
{
    fn partials(&self, ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
        self(ctx)
    }
}

/// A rule assembled from a forward function and its reverse.
#[derive(Debug, Clone, Copy)]
pub struct FnRule<F, R> {
    forward: F,
    reverse: R,
}

impl<F, R> FnRule<F, R> {
    pub fn new(forward: F, reverse: R) -> Self {
        Self { forward, reverse }
    }
}

impl<F, R> DerivativeRule for FnRule<F, R>
where
    F: Fn(&RuleContext<'_>) -> JacobianResult<JacobianMap> + Send + Sync,
    R: Fn(&ReverseContext<'_>) -> JacobianResult<Vec<JacobianMap>> + Send + Sync,
{
    fn partials(&self, ctx: &RuleContext<'_>) -> JacobianResult<JacobianMap> {
        (self.forward)(ctx)
    }

    fn reverse(&self, ctx: &ReverseContext<'_>) -> JacobianResult<Vec<JacobianMap>> {
        (self.reverse)(ctx)
    }
}

/// Transform key -> derivative rule.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Box<dyn DerivativeRule>>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { rules: HashMap::new() }
    }

    /// A registry holding the stock rules: `add`, `subtract`, `multiply`,
    /// `divide`, `matmul`, `sum`, `reshape`, `min`, `max`, `if_then_else`,
    /// `concat` (axis 0), `exp` and `log`.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn register<R: DerivativeRule + 'static>(&mut self, key: &str, rule: R) -> &mut Self {
        self.rules.insert(key.to_string(), Box::new(rule));
        self
    }

    pub fn get(&self, key: &str) -> Option<&dyn DerivativeRule> {
        self.rules.get(key).map(|rule| rule.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rules.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("RuleRegistry").field("rules", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr0;

    #[test]
    // Purpose
    // -------
    // Verify closures can be registered and that re-registering a key
    // replaces the previous rule.
    //
    // Given
    // -----
    // - Two closures registered under "double", the second scaling by 3.
    //
    // Expect
    // ------
    // - One rule under the key; invoking it scales by 3.
    fn register_replaces_existing_rule() {
        // Arrange
        let mut registry = RuleRegistry::new();
        registry.register("double", |ctx: &RuleContext<'_>| -> JacobianResult<JacobianMap> {
            Ok(ctx.parent_partials[0].scale(2.0))
        });
        registry.register("double", |ctx: &RuleContext<'_>| -> JacobianResult<JacobianMap> {
            Ok(ctx.parent_partials[0].scale(3.0))
        });
        let parent = JacobianMap::identity(NodeId(0), &[]);
        let value = arr0(1.0).into_dyn();
        let ctx = RuleContext {
            node: NodeId(1),
            transform: "double",
            output_shape: &[],
            output_value: &value,
            parent_values: vec![&value],
            parent_partials: vec![&parent],
        };

        // Act
        let out = registry.get("double").unwrap().partials(&ctx).unwrap();

        // Assert
        assert_eq!(registry.len(), 1);
        assert_eq!(out.with_respect_to(NodeId(0)).unwrap(), &arr0(3.0).into_dyn());
    }

    #[test]
    // Purpose
    // -------
    // Ensure arity checks report the transform and both counts.
    //
    // Given
    // -----
    // - A context with one parent, checked against two.
    //
    // Expect
    // ------
    // - RuleArity { transform: "add", expected: 2, found: 1 }.
    fn expect_arity_reports_counts() {
        // Arrange
        let parent = JacobianMap::constant(&[]);
        let value = arr0(0.0).into_dyn();
        let ctx = RuleContext {
            node: NodeId(1),
            transform: "add",
            output_shape: &[],
            output_value: &value,
            parent_values: vec![&value],
            parent_partials: vec![&parent],
        };

        // Act
        let result = ctx.expect_arity(2);

        // Assert
        assert_eq!(
            result,
            Err(JacobianError::RuleArity { transform: "add".to_string(), expected: 2, found: 1 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Verify a closure-only rule refuses to run in reverse, while an `FnRule`
    // dispatches to its reverse function.
    //
    // Given
    // -----
    // - "fwd" registered as a closure; "both" as an FnRule whose reverse
    //   scales the adjoint by 4.
    //
    // Expect
    // ------
    // - UnsupportedReverse for "fwd"; one contribution scaled by 4 for "both".
    fn reverse_defaults_to_unsupported() {
        // Arrange
        let mut registry = RuleRegistry::new();
        registry.register("fwd", |ctx: &RuleContext<'_>| -> JacobianResult<JacobianMap> {
            Ok(ctx.parent_partials[0].clone())
        });
        registry.register(
            "both",
            FnRule::new(
                |ctx: &RuleContext<'_>| -> JacobianResult<JacobianMap> {
                    Ok(ctx.parent_partials[0].clone())
                },
                |ctx: &ReverseContext<'_>| -> JacobianResult<Vec<JacobianMap>> {
                    Ok(vec![ctx.adjoint.scale(4.0)])
                },
            ),
        );
        let adjoint = JacobianMap::identity(NodeId(1), &[]);
        let value = arr0(1.0).into_dyn();
        let ctx = |transform: &'static str| ReverseContext {
            node: NodeId(1),
            transform,
            output_shape: &[],
            output_value: &value,
            parent_values: vec![&value],
            adjoint: &adjoint,
        };

        // Act
        let fwd = registry.get("fwd").unwrap().reverse(&ctx("fwd"));
        let both = registry.get("both").unwrap().reverse(&ctx("both")).unwrap();

        // Assert
        assert_eq!(
            fwd,
            Err(JacobianError::UnsupportedReverse { node: NodeId(1), transform: "fwd".to_string() })
        );
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].with_respect_to(NodeId(1)).unwrap(), &arr0(4.0).into_dyn());
    }
}
