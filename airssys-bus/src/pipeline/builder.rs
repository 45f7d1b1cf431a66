//! Chain construction from subscriber registrations.
//!
//! The builder resolves every factory before creating any instance, so a
//! configuration failure cannot leak half-built chains, and detects
//! circular middleware declarations while doing so.

// Layer 1: Standard library imports
use std::collections::HashSet;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tracing::trace;

// Layer 3: Internal module imports
use super::chain::{AsyncHandlerChain, AsyncMiddlewareSlot, HandlerChain, MiddlewareSlot};
use super::inbox::{InboxConfiguration, InboxMiddleware};
use crate::error::{BusError, BusResult};
use crate::handler::{
    AsyncMiddlewareFactory, HandlerTypeId, MiddlewareFactory, Placement,
};
use crate::registry::{HandlerRegistration, SubscriberRegistry};
use crate::request::Request;

const INBOX_TYPE: HandlerTypeId = HandlerTypeId::new("inbox");

/// Resolved middleware source for a sync chain, pre-instantiation.
enum SyncSource<R: Request> {
    Declared {
        name: HandlerTypeId,
        factory: Arc<dyn MiddlewareFactory<R>>,
    },
    Inbox,
}

/// Resolved middleware source for an async chain, pre-instantiation.
enum AsyncSource<R: Request> {
    Declared {
        name: HandlerTypeId,
        factory: Arc<dyn AsyncMiddlewareFactory<R>>,
    },
    Inbox,
}

/// Builds handler chains for a request type from the subscriber registry.
///
/// One chain per registered terminal; declared middleware is honored in
/// placement and step order, and the inbox middleware is synthesized at
/// its configured position unless the registration opted out.
pub struct PipelineBuilder<'a> {
    subscribers: &'a SubscriberRegistry,
    inbox: Option<&'a InboxConfiguration>,
}

impl<'a> PipelineBuilder<'a> {
    /// Create a builder over the given registry
    pub fn new(subscribers: &'a SubscriberRegistry) -> Self {
        Self {
            subscribers,
            inbox: None,
        }
    }

    /// Builder method: synthesize inbox middleware per the configuration
    pub fn with_inbox(mut self, inbox: Option<&'a InboxConfiguration>) -> Self {
        self.inbox = inbox;
        self
    }

    /// Build synchronous chains for `R`, one per registered terminal.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when a registration lacks a sync factory,
    /// a declared middleware lacks a sync factory, or a middleware
    /// declaration is circular.
    pub fn build_sync<R: Request>(&self) -> BusResult<Vec<HandlerChain<R>>> {
        let registrations = self.subscribers.registrations_for::<R>();
        let mut chains = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            chains.push(self.build_sync_chain(registration)?);
        }
        trace!(
            request_type = R::REQUEST_TYPE,
            chains = chains.len(),
            "built sync pipeline"
        );
        Ok(chains)
    }

    /// Build asynchronous chains for `R`, one per registered terminal.
    pub fn build_async<R: Request>(&self) -> BusResult<Vec<AsyncHandlerChain<R>>> {
        let registrations = self.subscribers.registrations_for::<R>();
        let mut chains = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            chains.push(self.build_async_chain(registration)?);
        }
        trace!(
            request_type = R::REQUEST_TYPE,
            chains = chains.len(),
            "built async pipeline"
        );
        Ok(chains)
    }

    /// Rejects chains whose middleware repeats a handler type (including
    /// the terminal's own type).
    fn check_circular<R: Request>(registration: &HandlerRegistration<R>) -> BusResult<()> {
        let mut seen = HashSet::new();
        seen.insert(registration.handler_type());
        for middleware in registration.middleware() {
            if !seen.insert(middleware.handler_type()) {
                return Err(BusError::configuration(format!(
                    "circular middleware declaration '{}' in chain for request type '{}'",
                    middleware.handler_type(),
                    R::REQUEST_TYPE
                )));
            }
        }
        Ok(())
    }

    fn build_sync_chain<R: Request>(
        &self,
        registration: &HandlerRegistration<R>,
    ) -> BusResult<HandlerChain<R>> {
        Self::check_circular(registration)?;

        let terminal_factory = registration.sync_factory().map(Arc::clone).ok_or_else(|| {
            BusError::configuration(format!(
                "no sync handler factory for request type '{}' (handler '{}')",
                R::REQUEST_TYPE,
                registration.handler_type()
            ))
        })?;

        // Resolve every factory before creating any instance
        let mut before_sources: Vec<(i32, SyncSource<R>)> = Vec::new();
        let mut after_sources: Vec<(i32, SyncSource<R>)> = Vec::new();
        for middleware in registration.middleware() {
            let factory = middleware.sync_factory().map(Arc::clone).ok_or_else(|| {
                BusError::configuration(format!(
                    "no sync factory for middleware '{}' in chain for request type '{}'",
                    middleware.handler_type(),
                    R::REQUEST_TYPE
                ))
            })?;
            let entry = (
                middleware.step(),
                SyncSource::Declared {
                    name: middleware.handler_type(),
                    factory,
                },
            );
            match middleware.placement() {
                Placement::Before => before_sources.push(entry),
                Placement::After => after_sources.push(entry),
            }
        }
        if let Some(config) = self.inbox {
            if registration.use_inbox() {
                let entry = (config.step(), SyncSource::Inbox);
                match config.placement() {
                    Placement::Before => before_sources.push(entry),
                    Placement::After => after_sources.push(entry),
                }
            }
        }
        // Stable sort keeps declaration order within one step
        before_sources.sort_by_key(|(step, _)| *step);
        after_sources.sort_by_key(|(step, _)| *step);

        // Construction order: before slots, terminal, after slots
        let terminal_name = registration.handler_type();
        let before = self.instantiate_sync(before_sources, terminal_name);
        let terminal = terminal_factory.create();
        let after = self.instantiate_sync(after_sources, terminal_name);

        Ok(HandlerChain::new(
            terminal_name,
            before,
            terminal,
            terminal_factory,
            after,
        ))
    }

    fn instantiate_sync<R: Request>(
        &self,
        sources: Vec<(i32, SyncSource<R>)>,
        terminal: HandlerTypeId,
    ) -> Vec<MiddlewareSlot<R>> {
        let mut slots = Vec::with_capacity(sources.len());
        for (_, source) in sources {
            match (source, self.inbox) {
                (SyncSource::Declared { name, factory }, _) => {
                    let instance = factory.create();
                    slots.push(MiddlewareSlot::new(name, instance, Some(factory)));
                }
                (SyncSource::Inbox, Some(config)) => {
                    let middleware = InboxMiddleware::for_chain(config, terminal.as_str());
                    slots.push(MiddlewareSlot::new(INBOX_TYPE, Box::new(middleware), None));
                }
                (SyncSource::Inbox, None) => {}
            }
        }
        slots
    }

    fn build_async_chain<R: Request>(
        &self,
        registration: &HandlerRegistration<R>,
    ) -> BusResult<AsyncHandlerChain<R>> {
        Self::check_circular(registration)?;

        let terminal_factory = registration
            .async_factory()
            .map(Arc::clone)
            .ok_or_else(|| {
                BusError::configuration(format!(
                    "no async handler factory for request type '{}' (handler '{}')",
                    R::REQUEST_TYPE,
                    registration.handler_type()
                ))
            })?;

        let mut before_sources: Vec<(i32, AsyncSource<R>)> = Vec::new();
        let mut after_sources: Vec<(i32, AsyncSource<R>)> = Vec::new();
        for middleware in registration.middleware() {
            let factory = middleware.async_factory().map(Arc::clone).ok_or_else(|| {
                BusError::configuration(format!(
                    "no async factory for middleware '{}' in chain for request type '{}'",
                    middleware.handler_type(),
                    R::REQUEST_TYPE
                ))
            })?;
            let entry = (
                middleware.step(),
                AsyncSource::Declared {
                    name: middleware.handler_type(),
                    factory,
                },
            );
            match middleware.placement() {
                Placement::Before => before_sources.push(entry),
                Placement::After => after_sources.push(entry),
            }
        }
        if let Some(config) = self.inbox {
            if registration.use_inbox() {
                let entry = (config.step(), AsyncSource::Inbox);
                match config.placement() {
                    Placement::Before => before_sources.push(entry),
                    Placement::After => after_sources.push(entry),
                }
            }
        }
        before_sources.sort_by_key(|(step, _)| *step);
        after_sources.sort_by_key(|(step, _)| *step);

        let terminal_name = registration.handler_type();
        let before = self.instantiate_async(before_sources, terminal_name);
        let terminal = terminal_factory.create();
        let after = self.instantiate_async(after_sources, terminal_name);

        Ok(AsyncHandlerChain::new(
            terminal_name,
            before,
            terminal,
            terminal_factory,
            after,
        ))
    }

    fn instantiate_async<R: Request>(
        &self,
        sources: Vec<(i32, AsyncSource<R>)>,
        terminal: HandlerTypeId,
    ) -> Vec<AsyncMiddlewareSlot<R>> {
        let mut slots = Vec::with_capacity(sources.len());
        for (_, source) in sources {
            match (source, self.inbox) {
                (AsyncSource::Declared { name, factory }, _) => {
                    let instance = factory.create();
                    slots.push(AsyncMiddlewareSlot::new(name, instance, Some(factory)));
                }
                (AsyncSource::Inbox, Some(config)) => {
                    let middleware = InboxMiddleware::for_chain(config, terminal.as_str());
                    slots.push(AsyncMiddlewareSlot::new(
                        INBOX_TYPE,
                        Box::new(middleware),
                        None,
                    ));
                }
                (AsyncSource::Inbox, None) => {}
            }
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::context::RequestContext;
    use crate::handler::{
        FnHandlerFactory, FnMiddlewareFactory, Handler, Middleware, MiddlewareResult,
    };
    use crate::pipeline::inbox::InMemoryInbox;
    use crate::registry::{MiddlewareRegistration, PolicyRegistry};
    use crate::util::MessageId;

    #[derive(Debug, Clone)]
    struct Job {
        id: MessageId,
        hops: Vec<&'static str>,
    }

    impl Request for Job {
        const REQUEST_TYPE: &'static str = "job";

        fn id(&self) -> MessageId {
            self.id
        }
    }

    struct JobHandler;

    impl Handler<Job> for JobHandler {
        fn name(&self) -> &str {
            "job_handler"
        }

        fn handle(
            &mut self,
            mut request: Job,
            _context: &mut RequestContext,
        ) -> crate::error::BusResult<Job> {
            request.hops.push("terminal");
            Ok(request)
        }
    }

    struct Step {
        label: &'static str,
    }

    impl Middleware<Job> for Step {
        fn name(&self) -> &str {
            self.label
        }

        fn before(
            &mut self,
            mut request: Job,
            _context: &mut RequestContext,
        ) -> MiddlewareResult<Option<Job>> {
            request.hops.push(self.label);
            Ok(Some(request))
        }
    }

    fn job() -> Job {
        Job {
            id: MessageId::new(),
            hops: Vec::new(),
        }
    }

    fn context() -> RequestContext {
        RequestContext::new(std::sync::Arc::new(PolicyRegistry::with_defaults()))
    }

    fn step_registration(label: &'static str, step: i32) -> MiddlewareRegistration<Job> {
        MiddlewareRegistration::sync(
            label,
            Placement::Before,
            step,
            FnMiddlewareFactory::new(move || Step { label }),
        )
    }

    #[test]
    fn test_no_registrations_builds_no_chains() {
        let registry = SubscriberRegistry::new();
        let chains = PipelineBuilder::new(&registry).build_sync::<Job>().unwrap();
        assert!(chains.is_empty());
    }

    #[test]
    fn test_step_order_wins_over_declaration_order() {
        let registry = SubscriberRegistry::new();
        registry.register(
            HandlerRegistration::sync("job_handler", FnHandlerFactory::new(|| JobHandler))
                .with_middleware(step_registration("second", 20))
                .with_middleware(step_registration("first", 10)),
        );

        let mut chains = PipelineBuilder::new(&registry).build_sync::<Job>().unwrap();
        let result = chains[0].dispatch(job(), &mut context()).unwrap().unwrap();
        assert_eq!(result.hops, vec!["first", "second", "terminal"]);
    }

    #[test]
    fn test_missing_sync_factory_is_configuration_error() {
        let registry = SubscriberRegistry::new();
        registry.register(HandlerRegistration::<Job>::asynchronous(
            "job_handler",
            crate::handler::FnAsyncHandlerFactory::new(|| AsyncJobHandler),
        ));

        let err = PipelineBuilder::new(&registry)
            .build_sync::<Job>()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("job"));
    }

    struct AsyncJobHandler;

    #[async_trait::async_trait]
    impl crate::handler::AsyncHandler<Job> for AsyncJobHandler {
        fn name(&self) -> &str {
            "job_handler"
        }

        async fn handle(
            &mut self,
            request: Job,
            _context: &mut RequestContext,
            _cancel: &tokio_util::sync::CancellationToken,
        ) -> crate::error::BusResult<Job> {
            Ok(request)
        }
    }

    #[test]
    fn test_circular_declaration_is_configuration_error() {
        let registry = SubscriberRegistry::new();
        registry.register(
            HandlerRegistration::sync("job_handler", FnHandlerFactory::new(|| JobHandler))
                .with_middleware(step_registration("audit", 1))
                .with_middleware(step_registration("audit", 2)),
        );

        let err = PipelineBuilder::new(&registry)
            .build_sync::<Job>()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_inbox_synthesis_deduplicates() {
        let registry = SubscriberRegistry::new();
        registry.register(HandlerRegistration::sync(
            "job_handler",
            FnHandlerFactory::new(|| JobHandler),
        ));
        let inbox = InboxConfiguration::new(std::sync::Arc::new(InMemoryInbox::new()));

        let builder = PipelineBuilder::new(&registry).with_inbox(Some(&inbox));
        let request = job();

        let mut chains = builder.build_sync::<Job>().unwrap();
        assert!(chains[0]
            .dispatch(request.clone(), &mut context())
            .unwrap()
            .is_some());

        // A fresh chain shares the inbox store, so the repeat is skipped
        let mut chains = builder.build_sync::<Job>().unwrap();
        assert!(chains[0]
            .dispatch(request, &mut context())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_inbox_opt_out_disables_dedup() {
        let registry = SubscriberRegistry::new();
        registry.register(
            HandlerRegistration::sync("job_handler", FnHandlerFactory::new(|| JobHandler))
                .without_inbox(),
        );
        let inbox = InboxConfiguration::new(std::sync::Arc::new(InMemoryInbox::new()));

        let builder = PipelineBuilder::new(&registry).with_inbox(Some(&inbox));
        let request = job();

        let mut chains = builder.build_sync::<Job>().unwrap();
        assert!(chains[0]
            .dispatch(request.clone(), &mut context())
            .unwrap()
            .is_some());

        let mut chains = builder.build_sync::<Job>().unwrap();
        assert!(chains[0]
            .dispatch(request, &mut context())
            .unwrap()
            .is_some());
    }
}
