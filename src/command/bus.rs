//! In-process message buses, routing messages to their handlers by the
//! runtime type of the payload.
//!
//! Two message kinds travel through here: Commands, dispatched by the
//! [CommandBus] to exactly one handler, and integration events, fanned out
//! by the [EventBus] to every subscribed handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::auth::Authorize;
use crate::command::{Envelope, Handler};
use crate::fault::Fault;
use crate::message;

/// Retry policy applied by [CommandBus::send] when a handler fails with a
/// version conflict.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    /// Maximum number of retries after the initial attempt.
    pub limit: u32,

    /// Base backoff duration, doubled on each subsequent attempt.
    pub base_backoff: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            limit: 3,
            base_backoff: Duration::from_millis(1),
        }
    }
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle(&self, message: &(dyn Any + Send + Sync)) -> Result<(), Fault>;
}

struct Route<T, H> {
    handler: H,
    message: PhantomData<fn(T)>,
}

#[async_trait]
impl<T, H> ErasedHandler for Route<T, H>
where
    T: message::Message + Clone + Send + Sync + 'static,
    H: Handler<T>,
    H::Error: Into<Fault>,
{
    async fn handle(&self, message: &(dyn Any + Send + Sync)) -> Result<(), Fault> {
        let envelope = message
            .downcast_ref::<Envelope<T>>()
            .expect("message payload type matches the registered route");

        self.handler.handle(envelope.clone()).await.map_err(Into::into)
    }
}

/// Routes Commands to the single [Handler] registered for their concrete
/// type.
///
/// Dispatch sequence: resolve the handler (failing with [Fault::NoHandler]
/// or [Fault::Misconfigured]), run the [Authorize] hook, then invoke the
/// handler. A [Fault::Conflict] is retried with exponential backoff and a
/// small jitter, up to the configured [Retry] limit; every other fault
/// propagates to the caller untouched.
pub struct CommandBus {
    routes: HashMap<TypeId, Vec<Arc<dyn ErasedHandler>>>,
    authorizer: Arc<dyn Authorize>,
    retry: Retry,
}

impl CommandBus {
    /// Creates a new bus using the given authorization hook and retry
    /// policy.
    pub fn new(authorizer: Arc<dyn Authorize>, retry: Retry) -> Self {
        Self {
            routes: HashMap::new(),
            authorizer,
            retry,
        }
    }

    /// Registers the [Handler] for the Command type `T`.
    ///
    /// Registering more than one handler for the same type is reported as
    /// [Fault::Misconfigured] when such a command is sent.
    pub fn register<T, H>(&mut self, handler: H)
    where
        T: message::Message + Clone + Send + Sync + 'static,
        H: Handler<T> + 'static,
        H::Error: Into<Fault>,
    {
        self.routes
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Arc::new(Route {
                handler,
                message: PhantomData,
            }));
    }

    /// Dispatches the Command to its registered [Handler].
    pub async fn send<T>(&self, command: Envelope<T>) -> Result<(), Fault>
    where
        T: message::Message + Clone + Send + Sync + 'static,
    {
        let name = command.message.name();

        let handler = match self.routes.get(&TypeId::of::<T>()) {
            None => return Err(Fault::NoHandler(name)),
            Some(handlers) if handlers.is_empty() => return Err(Fault::NoHandler(name)),
            Some(handlers) if handlers.len() > 1 => return Err(Fault::Misconfigured(name)),
            Some(handlers) => &handlers[0],
        };

        self.authorizer
            .authorize(&command.actor_id, name)
            .await?;

        let mut attempts: u32 = 0;

        loop {
            match handler.handle(&command).await {
                Err(Fault::Conflict(conflict)) if attempts < self.retry.limit => {
                    attempts += 1;

                    let backoff = self.retry.base_backoff * 2u32.pow(attempts - 1)
                        + Duration::from_micros(rand::thread_rng().gen_range(0..=1_000));

                    tracing::debug!(
                        command = name,
                        attempt = attempts,
                        backoff_us = backoff.as_micros() as u64,
                        %conflict,
                        "retrying command after version conflict",
                    );

                    tokio::time::sleep(backoff).await;
                }
                result => return result,
            }
        }
    }
}

/// Fans integration events out to every subscribed handler.
///
/// Handlers run sequentially in subscription order; a failing handler is
/// logged and does not stop the remaining handlers (at-most-once per
/// handler, no inter-handler transaction).
#[derive(Default)]
pub struct EventBus {
    routes: HashMap<TypeId, Vec<Arc<dyn ErasedHandler>>>,
}

impl EventBus {
    /// Creates a new bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes the [Handler] to integration events of type `T`.
    pub fn subscribe<T, H>(&mut self, handler: H)
    where
        T: message::Message + Clone + Send + Sync + 'static,
        H: Handler<T> + 'static,
        H::Error: Into<Fault>,
    {
        self.routes
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Arc::new(Route {
                handler,
                message: PhantomData,
            }));
    }

    /// Publishes the integration event to all subscribed handlers.
    pub async fn publish<T>(&self, event: Envelope<T>)
    where
        T: message::Message + Clone + Send + Sync + 'static,
    {
        let name = event.message.name();

        let Some(handlers) = self.routes.get(&TypeId::of::<T>()) else {
            tracing::debug!(event = name, "no subscribers for integration event");
            return;
        };

        for handler in handlers {
            if let Err(error) = handler.handle(&event).await {
                tracing::error!(event = name, %error, "integration event handler failed");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::auth::AllowAll;
    use crate::message::{ActorId, Message};
    use crate::version::ConflictError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DoSomething;

    impl Message for DoSomething {
        fn name(&self) -> &'static str {
            "DoSomething"
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct SomethingHappened;

    impl Message for SomethingHappened {
        fn name(&self) -> &'static str {
            "SomethingHappened"
        }
    }

    fn conflict() -> Fault {
        Fault::Conflict(ConflictError {
            expected: 0,
            actual: 1,
        })
    }

    fn bus() -> CommandBus {
        CommandBus::new(Arc::new(AllowAll), Retry::default())
    }

    #[tokio::test]
    async fn send_fails_when_no_handler_is_registered() {
        let result = bus().send(Envelope::new("u1", DoSomething)).await;

        assert!(matches!(result, Err(Fault::NoHandler("DoSomething"))));
    }

    #[tokio::test]
    async fn send_fails_when_multiple_handlers_are_registered() {
        let mut bus = bus();
        bus.register::<DoSomething, _>(|_cmd: Envelope<DoSomething>| async { Ok::<_, Fault>(()) });
        bus.register::<DoSomething, _>(|_cmd: Envelope<DoSomething>| async { Ok::<_, Fault>(()) });

        let result = bus.send(Envelope::new("u1", DoSomething)).await;

        assert!(matches!(result, Err(Fault::Misconfigured("DoSomething"))));
    }

    #[tokio::test]
    async fn send_invokes_the_registered_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let mut bus = bus();
        bus.register::<DoSomething, _>(move |_cmd: Envelope<DoSomething>| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Fault>(())
            }
        });

        bus.send(Envelope::new("u1", DoSomething))
            .await
            .expect("command should be handled");

        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn send_refuses_unauthorized_commands() {
        struct DenyAll;

        #[async_trait]
        impl Authorize for DenyAll {
            async fn authorize(
                &self,
                actor_id: &ActorId,
                _command_name: &'static str,
            ) -> Result<(), Fault> {
                Err(Fault::Unauthorized(actor_id.clone()))
            }
        }

        let mut bus = CommandBus::new(Arc::new(DenyAll), Retry::default());
        bus.register::<DoSomething, _>(|_cmd: Envelope<DoSomething>| async { Ok::<_, Fault>(()) });

        let result = bus.send(Envelope::new("u1", DoSomething)).await;

        assert!(matches!(result, Err(Fault::Unauthorized(_))));
    }

    #[tokio::test]
    async fn send_retries_version_conflicts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let mut bus = bus();
        bus.register::<DoSomething, _>(move |_cmd: Envelope<DoSomething>| {
            let counted = counted.clone();
            async move {
                if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(conflict())
                } else {
                    Ok(())
                }
            }
        });

        bus.send(Envelope::new("u1", DoSomething))
            .await
            .expect("command should succeed on the retry");

        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn send_gives_up_after_the_retry_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let mut bus = bus();
        bus.register::<DoSomething, _>(move |_cmd: Envelope<DoSomething>| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(conflict())
            }
        });

        let result = bus.send(Envelope::new("u1", DoSomething)).await;

        assert!(matches!(result, Err(Fault::Conflict(_))));
        assert_eq!(
            1 + Retry::default().limit,
            calls.load(Ordering::SeqCst),
            "the initial attempt plus every retry should have run",
        );
    }

    #[tokio::test]
    async fn other_faults_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let mut bus = bus();
        bus.register::<DoSomething, _>(move |_cmd: Envelope<DoSomething>| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Fault::invalid_operation("nope"))
            }
        });

        let result = bus.send(Envelope::new("u1", DoSomething)).await;

        assert!(matches!(result, Err(Fault::InvalidOperation(_))));
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers_even_when_one_fails() {
        let calls = Arc::new(AtomicU32::new(0));

        let mut bus = EventBus::new();

        bus.subscribe::<SomethingHappened, _>(|_evt: Envelope<SomethingHappened>| async {
            Err::<(), _>(Fault::invalid_operation("subscriber failure"))
        });

        let counted = calls.clone();
        bus.subscribe::<SomethingHappened, _>(move |_evt: Envelope<SomethingHappened>| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Fault>(())
            }
        });

        bus.publish(Envelope::new("u1", SomethingHappened)).await;

        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.publish(Envelope::new("u1", SomethingHappened)).await;
    }
}
