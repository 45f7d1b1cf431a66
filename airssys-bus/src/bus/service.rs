//! The external bus service.
//!
//! One instance per process coordinates the optional outbox and producer
//! variants, the policy registry, an optional caller-transaction
//! provider, and post-publication callbacks. Steady-state operations
//! take no lock; the collaborators are thread-safe by contract.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::builder::ExternalBusBuilder;
use crate::error::{BusError, BusResult};
use crate::message::Message;
use crate::outbox::{AsyncOutbox, Outbox, TransactionProvider};
use crate::policy::{names, AsyncPolicy, AsyncPolicyAction, Policy};
use crate::producer::{AsyncMessageProducer, MessageProducer};
use crate::registry::PolicyRegistry;
use crate::util::MessageId;

/// Callback fired after an outbox entry is successfully produced.
pub type PublicationCallback = Arc<dyn Fn(&MessageId, DateTime<Utc>) + Send + Sync>;

/// Coordinates durable deposit and broker clear under the resilience
/// envelope.
///
/// Built by [`ExternalBusBuilder`]; the façade holds it behind an `Arc`,
/// and a process-wide handle is available through [`crate::bus::handle`]
/// for deployments that want one bus per process.
pub struct ExternalBus {
    pub(super) outbox: Option<Arc<dyn Outbox>>,
    pub(super) async_outbox: Option<Arc<dyn AsyncOutbox>>,
    pub(super) producer: Option<Arc<dyn MessageProducer>>,
    pub(super) async_producer: Option<Arc<dyn AsyncMessageProducer>>,
    pub(super) policies: Arc<PolicyRegistry>,
    pub(super) outbox_timeout: Duration,
    pub(super) transaction_provider: Option<Arc<dyn TransactionProvider>>,
    pub(super) on_published: Vec<PublicationCallback>,
}

impl ExternalBus {
    /// Start building an external bus
    pub fn builder() -> ExternalBusBuilder {
        ExternalBusBuilder::new()
    }

    /// The policy registry backing the resilience envelope
    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    /// The configured outbox write timeout
    pub fn outbox_timeout(&self) -> Duration {
        self.outbox_timeout
    }

    /// Returns true when a sync outbox is configured
    pub fn has_sync_outbox(&self) -> bool {
        self.outbox.is_some()
    }

    /// Returns true when an async outbox is configured
    pub fn has_async_outbox(&self) -> bool {
        self.async_outbox.is_some()
    }

    fn sync_outbox(&self) -> BusResult<&Arc<dyn Outbox>> {
        self.outbox
            .as_ref()
            .ok_or_else(|| BusError::configuration("no sync outbox configured"))
    }

    fn async_outbox(&self) -> BusResult<&Arc<dyn AsyncOutbox>> {
        self.async_outbox
            .as_ref()
            .ok_or_else(|| BusError::configuration("no async outbox configured"))
    }

    fn sync_producer(&self) -> BusResult<&Arc<dyn MessageProducer>> {
        self.producer
            .as_ref()
            .ok_or_else(|| BusError::configuration("no sync message producer configured"))
    }

    fn async_producer(&self) -> BusResult<&Arc<dyn AsyncMessageProducer>> {
        self.async_producer
            .as_ref()
            .ok_or_else(|| BusError::configuration("no async message producer configured"))
    }

    fn sync_policy(&self, name: &str) -> BusResult<Arc<dyn Policy>> {
        self.policies
            .policy(name)
            .ok_or_else(|| BusError::configuration(format!("policy '{name}' is not registered")))
    }

    fn async_policy(&self, name: &str) -> BusResult<Arc<dyn AsyncPolicy>> {
        self.policies
            .async_policy(name)
            .ok_or_else(|| BusError::configuration(format!("policy '{name}' is not registered")))
    }

    /// Persist a message to the outbox.
    ///
    /// With a transaction provider configured, the write goes through the
    /// provider's connection so it joins the caller's transaction.
    pub fn add_to_outbox(&self, message: &Message) -> BusResult<()> {
        let outbox = self.sync_outbox()?;
        let conn = self
            .transaction_provider
            .as_ref()
            .map(|provider| provider.connection());
        outbox.add(message, self.outbox_timeout, conn.as_deref())?;
        debug!(id = %message.id(), "message deposited to outbox");
        Ok(())
    }

    /// Persist a message to the async outbox.
    pub async fn add_to_outbox_async(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        let outbox = self.async_outbox()?;
        let conn = self
            .transaction_provider
            .as_ref()
            .map(|provider| provider.connection());
        outbox
            .add(message, self.outbox_timeout, conn.as_deref(), cancel)
            .await?;
        debug!(id = %message.id(), "message deposited to outbox");
        Ok(())
    }

    /// Produce staged messages to the broker.
    ///
    /// Each id is processed independently: already-dispatched entries
    /// are skipped, a missing id is remembered and the sweep continues,
    /// and each produce runs under circuit-breaker around retry. A
    /// transport failure after policy exhaustion stops the sweep and
    /// surfaces unchanged; otherwise the first missing id surfaces as
    /// `NotFound` once every id has been visited.
    pub fn clear_outbox(&self, ids: &[MessageId]) -> BusResult<()> {
        let outbox = self.sync_outbox()?;
        let producer = self.sync_producer()?;
        let breaker = self.sync_policy(names::CIRCUIT_BREAKER)?;
        let retry = self.sync_policy(names::RETRY_POLICY)?;

        let mut missing: Option<MessageId> = None;
        for id in ids {
            let Some(entry) = outbox.get(id)? else {
                warn!(%id, "outbox entry not found");
                missing.get_or_insert(*id);
                continue;
            };
            if entry.is_dispatched() {
                debug!(%id, "outbox entry already dispatched, skipping");
                continue;
            }

            let message = entry.message;
            breaker.execute(&mut || {
                retry.execute(&mut || match message.header.delay_ms {
                    Some(ms) => producer.send_with_delay(&message, Duration::from_millis(ms)),
                    None => producer.send(&message),
                })
            })?;

            let now = Utc::now();
            outbox.mark_dispatched(id, now)?;
            for callback in &self.on_published {
                callback(id, now);
            }
            debug!(%id, "outbox entry cleared");
        }

        match missing {
            Some(id) => Err(BusError::NotFound { id }),
            None => Ok(()),
        }
    }

    /// Produce staged messages to the broker, async variant.
    pub async fn clear_outbox_async(
        &self,
        ids: &[MessageId],
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        let outbox = self.async_outbox()?;
        let producer = self.async_producer()?;
        let breaker = self.async_policy(names::CIRCUIT_BREAKER_ASYNC)?;
        let retry = self.async_policy(names::RETRY_POLICY_ASYNC)?;

        let mut missing: Option<MessageId> = None;
        for id in ids {
            if cancel.is_cancelled() {
                return Err(BusError::Cancelled);
            }
            let Some(entry) = outbox.get(id).await? else {
                warn!(%id, "outbox entry not found");
                missing.get_or_insert(*id);
                continue;
            };
            if entry.is_dispatched() {
                debug!(%id, "outbox entry already dispatched, skipping");
                continue;
            }

            let message = entry.message;
            let retry = &retry;
            let producer = &producer;
            let message_ref = &message;
            breaker
                .execute(
                    Box::new(move || {
                        let fut: BoxFuture<'_, BusResult<()>> = Box::pin(async move {
                            retry
                                .execute(
                                    Box::new(move || {
                                        let fut: BoxFuture<'_, BusResult<()>> =
                                            Box::pin(async move {
                                                match message_ref.header.delay_ms {
                                                    Some(ms) => {
                                                        producer
                                                            .send_with_delay(
                                                                message_ref,
                                                                Duration::from_millis(ms),
                                                                cancel,
                                                            )
                                                            .await
                                                    }
                                                    None => {
                                                        producer.send(message_ref, cancel).await
                                                    }
                                                }
                                            });
                                        fut
                                    }),
                                    cancel,
                                )
                                .await
                        });
                        fut
                    }),
                    cancel,
                )
                .await?;

            let now = Utc::now();
            outbox.mark_dispatched(id, now).await?;
            for callback in &self.on_published {
                callback(id, now);
            }
            debug!(%id, "outbox entry cleared");
        }

        match missing {
            Some(id) => Err(BusError::NotFound { id }),
            None => Ok(()),
        }
    }

    /// Send a message without outbox bookkeeping, retry-only.
    ///
    /// The request-reply path uses this for its outbound message.
    pub fn send_via_bus(&self, message: &Message) -> BusResult<()> {
        let producer = self.sync_producer()?;
        let retry = self.sync_policy(names::RETRY_POLICY)?;
        retry.execute(&mut || producer.send(message))
    }

    /// Send a message without outbox bookkeeping, retry-only, async.
    pub async fn send_via_bus_async(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        let producer = self.async_producer()?;
        let retry = self.async_policy(names::RETRY_POLICY_ASYNC)?;
        retry
            .execute(
                Box::new(move || {
                    let fut: BoxFuture<'_, BusResult<()>> =
                        Box::pin(async move { producer.send(message, cancel).await });
                    fut
                }),
                cancel,
            )
            .await
    }

    /// Run an arbitrary action under the retry policy alone.
    ///
    /// Used by request-reply for channel purge and receive.
    pub fn retry(&self, action: &mut dyn FnMut() -> BusResult<()>) -> BusResult<()> {
        let retry = self.sync_policy(names::RETRY_POLICY)?;
        retry.execute(action)
    }

    /// Run an arbitrary action under the async retry policy alone.
    pub async fn retry_async(
        &self,
        action: AsyncPolicyAction<'_>,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        let retry = self.async_policy(names::RETRY_POLICY_ASYNC)?;
        retry.execute(action, cancel).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::message::{MessageBody, MessageHeader, MessageType, Topic};
    use crate::outbox::InMemoryOutbox;
    use crate::producer::InMemoryMessageProducer;

    fn message() -> Message {
        Message::new(
            MessageHeader::new(MessageId::new(), Topic::new("t"), MessageType::Event),
            MessageBody::empty(),
        )
    }

    fn bus_with(
        outbox: Arc<InMemoryOutbox>,
        producer: Arc<InMemoryMessageProducer>,
    ) -> ExternalBus {
        ExternalBus::builder()
            .with_outbox(outbox)
            .with_producer(producer)
            .build()
    }

    #[test]
    fn test_deposit_then_clear_marks_dispatched() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let producer = Arc::new(InMemoryMessageProducer::new());
        let bus = bus_with(Arc::clone(&outbox), Arc::clone(&producer));
        let message = message();

        bus.add_to_outbox(&message).unwrap();
        bus.clear_outbox(&[message.id()]).unwrap();

        assert_eq!(producer.sent_count(), 1);
        let entry = Outbox::get(outbox.as_ref(), &message.id()).unwrap().unwrap();
        assert!(entry.is_dispatched());
    }

    #[test]
    fn test_clear_missing_id_is_not_found() {
        let bus = bus_with(
            Arc::new(InMemoryOutbox::new()),
            Arc::new(InMemoryMessageProducer::new()),
        );

        let err = bus.clear_outbox(&[MessageId::new()]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_clear_continues_past_missing_ids() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let producer = Arc::new(InMemoryMessageProducer::new());
        let bus = bus_with(Arc::clone(&outbox), Arc::clone(&producer));
        let message = message();
        bus.add_to_outbox(&message).unwrap();

        let err = bus
            .clear_outbox(&[MessageId::new(), message.id()])
            .unwrap_err();

        // The staged message still went out
        assert!(err.is_not_found());
        assert_eq!(producer.sent_count(), 1);
    }

    #[test]
    fn test_second_clear_is_noop() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let producer = Arc::new(InMemoryMessageProducer::new());
        let bus = bus_with(Arc::clone(&outbox), Arc::clone(&producer));
        let message = message();

        bus.add_to_outbox(&message).unwrap();
        bus.clear_outbox(&[message.id()]).unwrap();
        bus.clear_outbox(&[message.id()]).unwrap();

        assert_eq!(producer.sent_count(), 1);
    }

    #[test]
    fn test_missing_outbox_is_configuration_error() {
        let bus = ExternalBus::builder()
            .with_producer(Arc::new(InMemoryMessageProducer::new()))
            .build();

        let err = bus.add_to_outbox(&message()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_publication_callback_fires() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        let bus = ExternalBus::builder()
            .with_outbox(Arc::new(InMemoryOutbox::new()))
            .with_producer(Arc::new(InMemoryMessageProducer::new()))
            .on_published(move |_, _| {
                observed.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let message = message();

        bus.add_to_outbox(&message).unwrap();
        bus.clear_outbox(&[message.id()]).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_via_bus_skips_outbox() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let producer = Arc::new(InMemoryMessageProducer::new());
        let bus = bus_with(Arc::clone(&outbox), Arc::clone(&producer));

        bus.send_via_bus(&message()).unwrap();

        assert_eq!(producer.sent_count(), 1);
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn test_async_deposit_and_clear() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let producer = Arc::new(InMemoryMessageProducer::new());
        let bus = ExternalBus::builder()
            .with_async_outbox(Arc::clone(&outbox) as Arc<dyn AsyncOutbox>)
            .with_async_producer(Arc::clone(&producer) as Arc<dyn AsyncMessageProducer>)
            .build();
        let message = message();
        let cancel = CancellationToken::new();

        bus.add_to_outbox_async(&message, &cancel).await.unwrap();
        bus.clear_outbox_async(&[message.id()], &cancel)
            .await
            .unwrap();

        assert_eq!(producer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_async_clear_observes_cancellation() {
        let bus = ExternalBus::builder()
            .with_async_outbox(Arc::new(InMemoryOutbox::new()) as Arc<dyn AsyncOutbox>)
            .with_async_producer(
                Arc::new(InMemoryMessageProducer::new()) as Arc<dyn AsyncMessageProducer>
            )
            .build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = bus
            .clear_outbox_async(&[MessageId::new()], &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
