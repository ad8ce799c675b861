use std::sync::Arc;

use tracing::{debug, info};

use super::{Interceptor, Node, NodeKind, Properties};

/// Ordered, immutable-after-startup list of interceptors.
#[derive(Default, Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I: Interceptor + 'static>(&mut self, interceptor: I) -> &mut Self {
        self.add_with_properties(interceptor, &Properties::new())
    }

    /// Register an interceptor after handing it its properties.
    pub fn add_with_properties<I: Interceptor + 'static>(
        &mut self,
        mut interceptor: I,
        properties: &Properties,
    ) -> &mut Self {
        interceptor.set_properties(properties);
        info!(
            interceptor = interceptor.name(),
            position = self.interceptors.len(),
            signatures = interceptor.signatures().len(),
            "Registered interceptor"
        );
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Wrap `target` with every interceptor that names its role.
    ///
    /// With no such interceptor the plugin forwards calls straight to the target.
    pub fn plugin<T: Node>(&self, target: T) -> Plugin<T> {
        let kind = target.kind();
        let role = kind.role();
        let interceptors: Vec<_> = self
            .interceptors
            .iter()
            .filter(|interceptor| {
                interceptor
                    .signatures()
                    .iter()
                    .any(|signature| signature.role == role)
            })
            .cloned()
            .collect();

        debug!(
            node = %kind,
            interceptors = interceptors.len(),
            "Plugged pipeline node"
        );
        Plugin {
            target,
            interceptors,
        }
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}

/// A pipeline node wrapped by the interceptors that apply to its role.
///
/// `Plugin<T>` implements whichever pipeline trait `T` implements, routing
/// each call through [`super::Invocation`].
pub struct Plugin<T> {
    pub(crate) target: T,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<T> Plugin<T> {
    /// Whether any interceptor applies to this node.
    pub fn is_wrapped(&self) -> bool {
        !self.interceptors.is_empty()
    }
}

impl<T: Node> Node for Plugin<T> {
    fn kind(&self) -> NodeKind {
        self.target.kind()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Plugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("target", &self.target)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::BlockFullTableModify;

    struct Stub(NodeKind);

    impl Node for Stub {
        fn kind(&self) -> NodeKind {
            self.0
        }
    }

    #[test]
    fn only_nodes_with_a_matching_role_are_wrapped() {
        let mut chain = InterceptorChain::new();
        chain.add(BlockFullTableModify::new());

        assert!(chain.plugin(Stub(NodeKind::SimpleExecutor)).is_wrapped());
        assert!(chain.plugin(Stub(NodeKind::CachingExecutor)).is_wrapped());
        assert!(!chain.plugin(Stub(NodeKind::PreparedStatementHandler)).is_wrapped());
        assert!(!chain.plugin(Stub(NodeKind::DefaultResultSetHandler)).is_wrapped());
    }

    #[test]
    fn empty_chain_wraps_nothing() {
        let chain = InterceptorChain::new();
        let plugin = chain.plugin(Stub(NodeKind::SimpleExecutor));

        assert!(chain.is_empty());
        assert!(!plugin.is_wrapped());
        assert_eq!(plugin.kind(), NodeKind::SimpleExecutor);
    }
}
