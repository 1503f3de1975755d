//! Shared radio arbitration
//!
//! One arbiter per radio. The transport is opened on the first `acquire`, shared by every
//! role that acquired it and closed when the last role releases it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rowbridge_ant::AntPlusManager;
use rowbridge_core::{BleHost, BridgeError, BridgeResult, TransportError};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Logical user of a shared radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportRole {
    BleFitness,
    BleHeartRate,
    AntFitness,
    AntHeartRate,
}

impl fmt::Display for TransportRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BleFitness => "BLE fitness",
            Self::BleHeartRate => "BLE heart rate",
            Self::AntFitness => "ANT+ fitness",
            Self::AntHeartRate => "ANT+ heart rate",
        };
        f.write_str(name)
    }
}

/// A radio that can be closed once nobody uses it
#[async_trait]
pub trait SharedTransport: Send + Sync {
    async fn close(&self) -> BridgeResult<()>;
}

#[async_trait]
impl SharedTransport for dyn BleHost {
    async fn close(&self) -> BridgeResult<()> {
        BleHost::close(self).await
    }
}

#[async_trait]
impl SharedTransport for AntPlusManager {
    async fn close(&self) -> BridgeResult<()> {
        AntPlusManager::close(self).await
    }
}

pub type OpenFuture<T> = BoxFuture<'static, BridgeResult<Arc<T>>>;

/// Opens the radio on first demand
pub type TransportOpener<T> = Box<dyn Fn() -> OpenFuture<T> + Send + Sync>;

/// Box an async opening function
pub fn opener<T, F, Fut>(open: F) -> TransportOpener<T>
where
    T: ?Sized + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BridgeResult<Arc<T>>> + Send + 'static,
{
    Box::new(move || open().boxed())
}

struct ArbiterState<T: ?Sized> {
    transport: Option<Arc<T>>,
    holders: BTreeSet<TransportRole>,
}

// ----------------------------------------------------------------------------
// Arbiter
// ----------------------------------------------------------------------------

/// Reference-counted access to one radio by role
pub struct TransportArbiter<T: SharedTransport + ?Sized> {
    name: &'static str,
    opener: TransportOpener<T>,
    state: Mutex<ArbiterState<T>>,
}

impl<T: SharedTransport + ?Sized + 'static> TransportArbiter<T> {
    pub fn new(name: &'static str, opener: TransportOpener<T>) -> Self {
        Self {
            name,
            opener,
            state: Mutex::new(ArbiterState {
                transport: None,
                holders: BTreeSet::new(),
            }),
        }
    }

    /// Arbiter for a radio this host does not have
    pub fn unavailable(name: &'static str) -> Self {
        Self::new(
            name,
            opener(move || async move {
                let unavailable: BridgeResult<Arc<T>> = Err(TransportError::TransportUnavailable {
                    transport_type: name.to_string(),
                }
                .into());
                unavailable
            }),
        )
    }

    /// Arbiter sharing a radio that is already open
    pub fn from_transport(name: &'static str, transport: Arc<T>) -> Self {
        Self::new(
            name,
            opener(move || {
                let transport = Arc::clone(&transport);
                async move { Ok::<_, BridgeError>(transport) }
            }),
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Open the radio if needed and register `role` as a holder
    pub async fn acquire(&self, role: TransportRole) -> BridgeResult<Arc<T>> {
        let mut state = self.state.lock().await;
        let transport = match &state.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                info!("Opening {} for {}", self.name, role);
                let transport = (self.opener)().await?;
                state.transport = Some(Arc::clone(&transport));
                transport
            }
        };
        state.holders.insert(role);
        Ok(transport)
    }

    /// Drop `role`; the radio closes when no holder remains
    pub async fn release(&self, role: TransportRole) -> BridgeResult<()> {
        let mut state = self.state.lock().await;
        state.holders.remove(&role);
        if !state.holders.is_empty() {
            debug!("{} still held by {:?}", self.name, state.holders);
            return Ok(());
        }
        if let Some(transport) = state.transport.take() {
            info!("Closing {}, last holder {} released it", self.name, role);
            transport.close().await?;
        }
        Ok(())
    }

    pub async fn holders(&self) -> Vec<TransportRole> {
        self.state.lock().await.holders.iter().copied().collect()
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.transport.is_some()
    }

    /// Close the radio regardless of holders
    pub async fn shutdown(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().await;
        state.holders.clear();
        match state.transport.take() {
            Some(transport) => transport.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        closed: AtomicUsize,
    }

    #[async_trait]
    impl SharedTransport for CountingTransport {
        async fn close(&self) -> BridgeResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_arbiter() -> (
        TransportArbiter<CountingTransport>,
        Arc<CountingTransport>,
        Arc<AtomicUsize>,
    ) {
        let transport = Arc::new(CountingTransport::default());
        let opens = Arc::new(AtomicUsize::new(0));
        let (shared, counter) = (Arc::clone(&transport), Arc::clone(&opens));
        let arbiter = TransportArbiter::new(
            "test radio",
            opener(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let transport = Arc::clone(&shared);
                async move { Ok::<_, BridgeError>(transport) }
            }),
        );
        (arbiter, transport, opens)
    }

    #[tokio::test]
    async fn test_opens_lazily_once() {
        let (arbiter, _transport, opens) = counting_arbiter();
        assert!(!arbiter.is_open().await);
        arbiter.acquire(TransportRole::BleFitness).await.unwrap();
        arbiter.acquire(TransportRole::BleHeartRate).await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            arbiter.holders().await,
            vec![TransportRole::BleFitness, TransportRole::BleHeartRate]
        );
    }

    #[tokio::test]
    async fn test_closes_with_last_holder() {
        let (arbiter, transport, _opens) = counting_arbiter();
        arbiter.acquire(TransportRole::AntFitness).await.unwrap();
        arbiter.acquire(TransportRole::AntHeartRate).await.unwrap();

        arbiter.release(TransportRole::AntFitness).await.unwrap();
        assert_eq!(transport.closed.load(Ordering::SeqCst), 0);
        assert!(arbiter.is_open().await);

        arbiter.release(TransportRole::AntHeartRate).await.unwrap();
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
        assert!(!arbiter.is_open().await);

        // releasing again is harmless
        arbiter.release(TransportRole::AntHeartRate).await.unwrap();
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reopens_after_close() {
        let (arbiter, _transport, opens) = counting_arbiter();
        arbiter.acquire(TransportRole::BleFitness).await.unwrap();
        arbiter.release(TransportRole::BleFitness).await.unwrap();
        arbiter.acquire(TransportRole::BleFitness).await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_radio() {
        let arbiter: TransportArbiter<CountingTransport> = TransportArbiter::unavailable("ANT+ stick");
        let err = arbiter.acquire(TransportRole::AntFitness).await.err().unwrap();
        assert!(err.is_transport());
        assert!(arbiter.holders().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_ignores_holders() {
        let (arbiter, transport, _opens) = counting_arbiter();
        arbiter.acquire(TransportRole::BleFitness).await.unwrap();
        arbiter.acquire(TransportRole::BleHeartRate).await.unwrap();
        arbiter.shutdown().await.unwrap();
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
        assert!(arbiter.holders().await.is_empty());
    }
}
