//! The command processor: one façade over in-process dispatch, the
//! outbox-backed external bus, and blocking request-reply.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// Layer 3: Internal module imports
use super::builder::CommandProcessorBuilder;
use crate::bus::ExternalBus;
use crate::channel::{ChannelFactory, Subscription};
use crate::context::RequestContext;
use crate::error::{BusError, BusResult};
use crate::message::{ChannelName, Topic};
use crate::pipeline::{InboxConfiguration, PipelineBuilder};
use crate::registry::{MapperRegistry, PolicyRegistry, SubscriberRegistry};
use crate::request::{Call, ReplyAddress, Request};
use crate::switches::FeatureSwitches;
use crate::util::MessageId;

/// Dispatches typed requests to in-process handlers and mediates the
/// outbox-backed external bus.
///
/// Four dispatch shapes share this façade:
///
/// - [`send`](CommandProcessor::send) — exactly one handler, synchronous
/// - [`publish`](CommandProcessor::publish) — zero or more handlers,
///   failures aggregated
/// - [`post`](CommandProcessor::post) /
///   [`deposit`](CommandProcessor::deposit) /
///   [`clear`](CommandProcessor::clear) — durable store-and-forward
///   publication
/// - [`call`](CommandProcessor::call) — blocking request-reply over the
///   external bus
///
/// Every operation has an async twin taking a `CancellationToken`.
///
/// # Example
/// ```rust
/// use airssys_bus::prelude::*;
///
/// #[derive(Debug, Clone)]
/// struct Greet { id: MessageId }
///
/// impl Request for Greet {
///     const REQUEST_TYPE: &'static str = "greet";
///     fn id(&self) -> MessageId { self.id }
/// }
///
/// struct Greeter;
///
/// impl Handler<Greet> for Greeter {
///     fn name(&self) -> &str { "greeter" }
///     fn handle(&mut self, request: Greet, _: &mut RequestContext) -> BusResult<Greet> {
///         Ok(request)
///     }
/// }
///
/// let subscribers = std::sync::Arc::new(SubscriberRegistry::new());
/// subscribers.register(HandlerRegistration::sync(
///     "greeter",
///     FnHandlerFactory::new(|| Greeter),
/// ));
/// let processor = CommandProcessor::builder()
///     .with_subscribers(subscribers)
///     .build();
/// processor.send(Greet { id: MessageId::new() }).unwrap();
/// ```
pub struct CommandProcessor {
    pub(super) subscribers: Arc<SubscriberRegistry>,
    pub(super) mappers: Arc<MapperRegistry>,
    pub(super) policies: Arc<PolicyRegistry>,
    pub(super) feature_switches: Option<Arc<FeatureSwitches>>,
    pub(super) inbox: Option<InboxConfiguration>,
    pub(super) bus: Option<Arc<ExternalBus>>,
    pub(super) channel_factory: Option<Arc<dyn ChannelFactory>>,
    pub(super) reply_subscriptions: DashMap<TypeId, Subscription>,
}

impl CommandProcessor {
    /// Start building a processor
    pub fn builder() -> CommandProcessorBuilder {
        CommandProcessorBuilder::new()
    }

    /// The subscriber registry backing dispatch
    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    /// Register a reply subscription template for a response type.
    ///
    /// [`call`](CommandProcessor::call) requires one for its response
    /// type; the channel name and routing key are rewritten per call.
    pub fn register_reply_subscription<R: Request>(&self, subscription: Subscription) {
        self.reply_subscriptions
            .insert(TypeId::of::<R>(), subscription);
    }

    fn new_context(&self) -> RequestContext {
        let context = RequestContext::new(Arc::clone(&self.policies));
        match &self.feature_switches {
            Some(switches) => context.with_feature_switches(Arc::clone(switches)),
            None => context,
        }
    }

    fn pipeline(&self) -> PipelineBuilder<'_> {
        PipelineBuilder::new(&self.subscribers).with_inbox(self.inbox.as_ref())
    }

    fn external_bus(&self) -> BusResult<&Arc<ExternalBus>> {
        self.bus
            .as_ref()
            .ok_or_else(|| BusError::configuration("external bus is not configured"))
    }

    fn expect_one_handler<R: Request>(&self) -> BusResult<()> {
        let count = self.subscribers.handler_count::<R>();
        if count == 1 {
            Ok(())
        } else {
            Err(BusError::contract(format!(
                "expected exactly one handler for request type '{}', found {count}",
                R::REQUEST_TYPE
            )))
        }
    }

    /// Dispatch a command to its single registered handler.
    ///
    /// # Errors
    ///
    /// `Contract` when the handler count is not exactly one,
    /// `Configuration` when the registration lacks a sync factory, and
    /// any handler error unchanged.
    pub fn send<R: Request>(&self, request: R) -> BusResult<()> {
        self.expect_one_handler::<R>()?;
        let mut chains = self.pipeline().build_sync::<R>()?;
        let mut context = self.new_context();

        if let Some(chain) = chains.first_mut() {
            debug!(
                request_type = R::REQUEST_TYPE,
                handler = %chain.terminal_type(),
                "sending command"
            );
            chain.dispatch(request, &mut context)?;
        }
        Ok(())
    }

    /// Dispatch a command to its single registered async handler.
    ///
    /// The token is checked before the first suspension point and flows
    /// into every handler and middleware.
    pub async fn send_async<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        self.expect_one_handler::<R>()?;
        let mut chains = self.pipeline().build_async::<R>()?;
        let mut context = self.new_context();

        if let Some(chain) = chains.first_mut() {
            debug!(
                request_type = R::REQUEST_TYPE,
                handler = %chain.terminal_type(),
                "sending command"
            );
            chain.dispatch(request, &mut context, cancel).await?;
        }
        Ok(())
    }

    /// Dispatch an event to every registered handler.
    ///
    /// Chains run sequentially in registration order and failures never
    /// short-circuit the fan-out; they are collected into one
    /// `Aggregate` error, raised only when non-empty. Zero handlers is a
    /// success.
    pub fn publish<R: Request>(&self, event: R) -> BusResult<()> {
        let mut chains = self.pipeline().build_sync::<R>()?;
        if chains.is_empty() {
            trace!(request_type = R::REQUEST_TYPE, "publish with no subscribers");
            return Ok(());
        }

        let mut context = self.new_context();
        let mut errors = Vec::new();
        for chain in &mut chains {
            if let Err(error) = chain.dispatch(event.clone(), &mut context) {
                errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BusError::Aggregate { errors })
        }
    }

    /// Dispatch an event to every registered async handler.
    ///
    /// Cancellation stops the fan-out immediately and surfaces as
    /// `Cancelled` rather than joining the aggregate.
    pub async fn publish_async<R: Request>(
        &self,
        event: R,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        let mut chains = self.pipeline().build_async::<R>()?;
        if chains.is_empty() {
            trace!(request_type = R::REQUEST_TYPE, "publish with no subscribers");
            return Ok(());
        }

        let mut context = self.new_context();
        let mut errors = Vec::new();
        for chain in &mut chains {
            match chain.dispatch(event.clone(), &mut context, cancel).await {
                Ok(_) => {}
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BusError::Aggregate { errors })
        }
    }

    /// Map a request and stage it in the outbox, returning the message id.
    ///
    /// With a transaction provider configured on the bus, the write joins
    /// the caller's transaction and becomes visible when they commit.
    pub fn deposit<R: Request>(&self, request: &R) -> BusResult<MessageId> {
        let mapper = self.mappers.get::<R>().ok_or_else(|| {
            BusError::configuration(format!(
                "no message mapper registered for request type '{}'",
                R::REQUEST_TYPE
            ))
        })?;
        let bus = self.external_bus()?;

        let message = mapper.map_to_message(request)?;
        let id = message.id();
        bus.add_to_outbox(&message)?;
        Ok(id)
    }

    /// Map a request and stage it in the async outbox.
    pub async fn deposit_async<R: Request>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> BusResult<MessageId> {
        let mapper = self.mappers.get::<R>().ok_or_else(|| {
            BusError::configuration(format!(
                "no message mapper registered for request type '{}'",
                R::REQUEST_TYPE
            ))
        })?;
        let bus = self.external_bus()?;

        let message = mapper.map_to_message(request)?;
        let id = message.id();
        bus.add_to_outbox_async(&message, cancel).await?;
        Ok(id)
    }

    /// Produce staged messages to the broker under the resilience
    /// envelope.
    pub fn clear(&self, ids: &[MessageId]) -> BusResult<()> {
        self.external_bus()?.clear_outbox(ids)
    }

    /// Produce staged messages to the broker, async variant.
    pub async fn clear_async(&self, ids: &[MessageId], cancel: &CancellationToken) -> BusResult<()> {
        self.external_bus()?.clear_outbox_async(ids, cancel).await
    }

    /// Deposit then immediately clear. No caller transaction
    /// participates.
    pub fn post<R: Request>(&self, request: &R) -> BusResult<()> {
        let id = self.deposit(request)?;
        self.clear(&[id])
    }

    /// Deposit then immediately clear, async variant.
    pub async fn post_async<R: Request>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        let id = self.deposit_async(request, cancel).await?;
        self.clear_async(&[id], cancel).await
    }

    /// Blocking request-reply over the external bus.
    ///
    /// A fresh ephemeral channel carries the reply; its id becomes both
    /// the reply topic and the correlation id the response must echo.
    /// The received response is locally dispatched as a
    /// [`send`](CommandProcessor::send) and returned; a `None`-typed
    /// message from the channel (its timeout indicator) yields
    /// `Ok(None)`. The reply channel is destroyed on every exit path.
    ///
    /// # Errors
    ///
    /// `Contract` when the timeout is zero; `Configuration` when the
    /// bus, channel factory, either mapper, or the reply subscription is
    /// missing; transport errors once retries are exhausted.
    pub fn call<T: Call, R: Request>(
        &self,
        request: T,
        timeout: Duration,
    ) -> BusResult<Option<R>> {
        if timeout.is_zero() {
            return Err(BusError::contract("call timeout must be greater than zero"));
        }
        let bus = self.external_bus()?;
        let channel_factory = self
            .channel_factory
            .as_ref()
            .ok_or_else(|| BusError::configuration("no channel factory configured"))?;
        let request_mapper = self.mappers.get::<T>().ok_or_else(|| {
            BusError::configuration(format!(
                "no message mapper registered for request type '{}'",
                T::REQUEST_TYPE
            ))
        })?;
        let response_mapper = self.mappers.get::<R>().ok_or_else(|| {
            BusError::configuration(format!(
                "no message mapper registered for response type '{}'",
                R::REQUEST_TYPE
            ))
        })?;
        let template = self
            .reply_subscriptions
            .get(&TypeId::of::<R>())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                BusError::configuration(format!(
                    "no reply subscription registered for response type '{}'",
                    R::REQUEST_TYPE
                ))
            })?;

        // Channel name and correlation token are two sides of one fresh uuid
        let (channel_name, correlation) = ChannelName::ephemeral();
        debug!(
            request_type = T::REQUEST_TYPE,
            channel = %channel_name,
            "starting call"
        );

        let subscription = template.redirect(&channel_name);
        let mut channel = channel_factory.create_channel(&subscription)?;

        // Purge forces broker-side creation ahead of the send
        bus.retry(&mut || channel.purge())?;

        let mut request = request;
        request.set_reply_address(ReplyAddress::new(
            Topic::new(channel_name.as_str()),
            correlation,
        ));
        let mut message = request_mapper.map_to_message(&request)?;
        // The header must route the reply even if the mapper ignored the
        // reply address on the request
        message.header.reply_to = Some(channel_name.clone());
        message.header.correlation_id = Some(correlation);
        bus.send_via_bus(&message)?;

        let started = Instant::now();
        loop {
            let Some(remaining) = timeout.checked_sub(started.elapsed()) else {
                return Ok(None);
            };

            let mut received = None;
            let outcome = bus.retry(&mut || {
                received = Some(channel.receive(remaining)?);
                Ok(())
            });
            if let Err(error) = outcome {
                if matches!(error, BusError::Timeout { .. }) {
                    return Ok(None);
                }
                return Err(error);
            }
            let Some(reply) = received else {
                continue;
            };

            if reply.is_none_type() {
                debug!(channel = %channel_name, "call timed out");
                return Ok(None);
            }
            if !correlation.accepts(reply.header.correlation_id) {
                debug!(channel = %channel_name, "dropping reply with foreign correlation id");
                continue;
            }

            let response = response_mapper.map_to_request(&reply)?;
            self.send(response.clone())?;
            return Ok(Some(response));
        }
    }
}
