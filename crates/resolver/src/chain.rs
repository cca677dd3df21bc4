use moat_context::DnsRequest;

use crate::{ChainedResolver, ResolveError, Resolver, Response};

/// The successor slot embedded by every [`ChainedResolver`].
#[derive(Default)]
pub struct NextResolver {
    next: Option<Box<dyn Resolver>>,
}

impl NextResolver {
    pub fn set(&mut self, next: Box<dyn Resolver>) {
        self.next = Some(next);
    }

    /// Delegate the request to the next node.
    pub async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError> {
        let next = self.next.as_deref().ok_or(ResolveError::NoNextResolver)?;

        tracing::trace!(next = %next, "go to next resolver");
        next.resolve(request).await
    }
}

/// Link `nodes` in order in front of `last` and return the head of the chain.
pub fn chain(nodes: Vec<Box<dyn ChainedResolver>>, last: Box<dyn Resolver>) -> Box<dyn Resolver> {
    for node in &nodes {
        log_configuration(node.as_ref());
    }
    log_configuration(last.as_ref());

    let mut next = last;
    for mut node in nodes.into_iter().rev() {
        node.set_next(next);
        next = node;
    }

    next
}

fn log_configuration(resolver: &dyn Resolver) {
    tracing::info!("{resolver}");
    for line in resolver.configuration() {
        tracing::info!("  {line}");
    }
}
