//! Integration tests for the asynchronous dispatch surface.
//!
//! Coverage:
//! - send_async / publish_async mirror the sync semantics
//! - cancellation before the first suspension point invokes no handler
//! - cancellation during fan-out surfaces as Cancelled, not Aggregate
//! - async middleware runs in declared order

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use airssys_bus::prelude::*;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone)]
struct Refresh {
    id: MessageId,
}

impl Refresh {
    fn new() -> Self {
        Self {
            id: MessageId::new(),
        }
    }
}

impl Request for Refresh {
    const REQUEST_TYPE: &'static str = "Refresh";

    fn id(&self) -> MessageId {
        self.id
    }
}

/// Async handler appending its label to a shared trace.
struct Tracing {
    label: &'static str,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait::async_trait]
impl AsyncHandler<Refresh> for Tracing {
    fn name(&self) -> &str {
        self.label
    }

    async fn handle(
        &mut self,
        request: Refresh,
        _context: &mut RequestContext,
        _cancel: &CancellationToken,
    ) -> BusResult<Refresh> {
        tokio::task::yield_now().await;
        self.trace.lock().unwrap().push(self.label);
        Ok(request)
    }
}

/// Async handler failing with a fixed message.
struct Exploding;

#[async_trait::async_trait]
impl AsyncHandler<Refresh> for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn handle(
        &mut self,
        _request: Refresh,
        _context: &mut RequestContext,
        _cancel: &CancellationToken,
    ) -> BusResult<Refresh> {
        Err(BusError::user_message("boom"))
    }
}

fn tracing_registration(
    label: &'static str,
    trace: &Arc<Mutex<Vec<&'static str>>>,
) -> HandlerRegistration<Refresh> {
    let trace = Arc::clone(trace);
    HandlerRegistration::asynchronous(
        label,
        FnAsyncHandlerFactory::new(move || Tracing {
            label,
            trace: Arc::clone(&trace),
        }),
    )
}

fn processor_with(subscribers: Arc<SubscriberRegistry>) -> CommandProcessor {
    CommandProcessor::builder()
        .with_subscribers(subscribers)
        .build()
}

// ============================================================================
// Send
// ============================================================================

#[tokio::test]
async fn test_send_async_invokes_single_handler() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(tracing_registration("handler", &trace));

    let processor = processor_with(subscribers);
    processor
        .send_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*trace.lock().unwrap(), vec!["handler"]);
}

#[tokio::test]
async fn test_send_async_zero_handlers_is_contract_error() {
    let processor = processor_with(Arc::new(SubscriberRegistry::new()));

    let err = processor
        .send_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_contract());
    assert!(err.to_string().contains("Refresh"));
}

#[tokio::test]
async fn test_send_async_sync_only_registration_is_configuration_error() {
    struct SyncOnly;

    impl Handler<Refresh> for SyncOnly {
        fn name(&self) -> &str {
            "sync_only"
        }

        fn handle(&mut self, request: Refresh, _context: &mut RequestContext) -> BusResult<Refresh> {
            Ok(request)
        }
    }

    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(HandlerRegistration::<Refresh>::sync(
        "sync_only",
        FnHandlerFactory::new(|| SyncOnly),
    ));

    let processor = processor_with(subscribers);
    let err = processor
        .send_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_pre_cancelled_send_invokes_no_handler() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(tracing_registration("handler", &trace));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let processor = processor_with(subscribers);
    let err = processor.send_async(Refresh::new(), &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(trace.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_pre_cancelled_publish_invokes_no_handler() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(tracing_registration("h1", &trace));
    subscribers.register(tracing_registration("h2", &trace));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let processor = processor_with(subscribers);
    let err = processor
        .publish_async(Refresh::new(), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(trace.lock().unwrap().is_empty());
}

// ============================================================================
// Publish
// ============================================================================

#[tokio::test]
async fn test_publish_async_runs_sequentially_in_order() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(tracing_registration("h1", &trace));
    subscribers.register(tracing_registration("h2", &trace));
    subscribers.register(tracing_registration("h3", &trace));

    let processor = processor_with(subscribers);
    processor
        .publish_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*trace.lock().unwrap(), vec!["h1", "h2", "h3"]);
}

#[tokio::test]
async fn test_publish_async_aggregates_failures() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let subscribers = Arc::new(SubscriberRegistry::new());
    subscribers.register(tracing_registration("h1", &trace));
    subscribers.register(HandlerRegistration::<Refresh>::asynchronous(
        "exploding",
        FnAsyncHandlerFactory::new(|| Exploding),
    ));
    subscribers.register(tracing_registration("h3", &trace));

    let processor = processor_with(subscribers);
    let err = processor
        .publish_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(*trace.lock().unwrap(), vec!["h1", "h3"]);
    match err {
        BusError::Aggregate { errors } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].to_string().contains("boom"));
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_publish_async_zero_handlers_is_success() {
    let processor = processor_with(Arc::new(SubscriberRegistry::new()));
    processor
        .publish_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap();
}

// ============================================================================
// Async Middleware
// ============================================================================

struct TracingMiddleware {
    label: &'static str,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait::async_trait]
impl airssys_bus::handler::AsyncMiddleware<Refresh> for TracingMiddleware {
    fn name(&self) -> &str {
        self.label
    }

    async fn before(
        &mut self,
        request: Refresh,
        _context: &mut RequestContext,
        _cancel: &CancellationToken,
    ) -> MiddlewareResult<Option<Refresh>> {
        self.trace.lock().unwrap().push(self.label);
        Ok(Some(request))
    }
}

#[tokio::test]
async fn test_async_middleware_wraps_terminal() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let subscribers = Arc::new(SubscriberRegistry::new());

    let pre_trace = Arc::clone(&trace);
    let post_trace = Arc::clone(&trace);
    subscribers.register(
        tracing_registration("terminal", &trace)
            .with_middleware(MiddlewareRegistration::asynchronous(
                "pre",
                Placement::Before,
                0,
                airssys_bus::handler::FnAsyncMiddlewareFactory::new(move || TracingMiddleware {
                    label: "pre",
                    trace: Arc::clone(&pre_trace),
                }),
            ))
            .with_middleware(MiddlewareRegistration::asynchronous(
                "post",
                Placement::After,
                0,
                airssys_bus::handler::FnAsyncMiddlewareFactory::new(move || TracingMiddleware {
                    label: "post",
                    trace: Arc::clone(&post_trace),
                }),
            )),
    );

    let processor = processor_with(subscribers);
    processor
        .publish_async(Refresh::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*trace.lock().unwrap(), vec!["pre", "terminal", "post"]);
}
