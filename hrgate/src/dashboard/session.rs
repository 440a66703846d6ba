// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use futures_util::StreamExt;
use hrgate_core::{PrincipalId, SessionId};
use hrgate_notify::{Notice, Subscription};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::dashboard::{View, ViewData};
use crate::gateway::{Backend, Gateway, StoreError};
use crate::{AccessError, GatewayError, PrincipalContext};

type Result<T, S> = std::result::Result<T, GatewayError<StoreError<S>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Refreshing,
    Closed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Refreshing => "refreshing",
            SessionState::Closed => "closed",
        };

        write!(f, "{}", s)
    }
}

/// One open dashboard.
///
/// A session resolves its principal when it is opened and keeps that context until it is
/// reopened, changes to the principal's role or department do not affect an open session. On
/// every change notice for a watched entity type the session re-runs its view's query, it never
/// patches its data from the notice itself.
///
/// ```text
/// Idle --open--> Loading --> Ready --notice--> Refreshing --> Ready
///                                   \--close--> Closed
/// ```
///
/// Sessions can be driven by hand with [`Session::open`] and [`Session::next_update`] or run as
/// a task with [`Session::spawn`].
pub struct Session<S> {
    id: SessionId,
    principal: PrincipalId,
    view: View,
    gateway: Gateway<S>,
    context: Option<PrincipalContext>,
    subscription: Option<Subscription>,
    state: watch::Sender<SessionState>,
    data: watch::Sender<Option<ViewData>>,
}

impl<S> Session<S>
where
    S: Backend,
{
    pub(crate) fn new(id: SessionId, principal: PrincipalId, view: View, gateway: Gateway<S>) -> Self {
        Self {
            id,
            principal,
            view,
            gateway,
            context: None,
            subscription: None,
            state: watch::Sender::new(SessionState::Idle),
            data: watch::Sender::new(None),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn principal(&self) -> PrincipalId {
        self.principal
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Context the session queries with, once it was opened.
    pub fn context(&self) -> Option<&PrincipalContext> {
        self.context.as_ref()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Result of the last completed query.
    pub fn data(&self) -> Option<ViewData> {
        self.data.borrow().clone()
    }

    fn set_state(&self, state: SessionState) {
        trace!(session = %self.id, %state, "session state");
        self.state.send_replace(state);
    }

    /// Resolves the principal with a fresh lookup and subscribes to the view's entity types.
    ///
    /// The subscription is established before the first query so no change committed after the
    /// query started is missed.
    async fn prepare(&mut self) -> Result<(), S> {
        self.subscription = None;
        self.set_state(SessionState::Loading);

        let context = self.gateway.refresh(self.principal).await?;
        debug!(
            session = %self.id,
            principal = %context.id(),
            role = %context.role(),
            "open session"
        );
        self.subscription = Some(self.gateway.subscribe(self.view.watches().iter().copied()));
        self.context = Some(context);

        Ok(())
    }

    // Takes `&mut self` so the future stays `Send`, subscriptions are not `Sync`.
    async fn load(&mut self) -> Result<ViewData, S> {
        let Some(context) = &self.context else {
            return Err(GatewayError::Access(AccessError::AuthenticationRequired));
        };
        self.gateway.query(context, &self.view).await
    }

    fn apply(&self, data: ViewData) -> ViewData {
        self.data.send_replace(Some(data.clone()));
        self.set_state(SessionState::Ready);
        data
    }

    /// Opens the session and runs the first query.
    ///
    /// Opening a session which is open already re-resolves its principal. If anything fails the
    /// session goes back to `Idle`.
    pub async fn open(&mut self) -> Result<ViewData, S> {
        let result = match self.prepare().await {
            Ok(()) => self.load().await,
            Err(err) => Err(err),
        };

        match result {
            Ok(data) => Ok(self.apply(data)),
            Err(err) => {
                self.context = None;
                self.subscription = None;
                self.set_state(SessionState::Idle);
                Err(err)
            }
        }
    }

    /// Closes the subscription and opens the session again with a freshly resolved context.
    pub async fn reopen(&mut self) -> Result<ViewData, S> {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.context = None;
        self.open().await
    }

    /// Re-runs the view's query with the session's context.
    pub async fn refresh(&mut self) -> Result<ViewData, S> {
        if self.context.is_none() {
            return self.open().await;
        }

        self.set_state(SessionState::Refreshing);
        match self.load().await {
            Ok(data) => Ok(self.apply(data)),
            Err(err) => {
                // Keep showing the last result.
                self.set_state(SessionState::Ready);
                Err(err)
            }
        }
    }

    /// Waits for the next change notice of a watched entity type.
    ///
    /// Returns `None` if the session is not open.
    pub async fn next_change(&mut self) -> Option<Notice> {
        self.subscription.as_mut()?.next().await
    }

    /// Waits for the next change notice and refreshes.
    pub async fn next_update(&mut self) -> Option<Result<ViewData, S>> {
        let notice = self.next_change().await?;
        self.log_notice(&notice);
        Some(self.refresh().await)
    }

    fn log_notice(&self, notice: &Notice) {
        match notice {
            Notice::Changed(event) => trace!(
                session = %self.id,
                entity = %event.entity,
                record = %event.id,
                operation = %event.operation,
                "change notice"
            ),
            Notice::Lagged { entity, missed } => debug!(
                session = %self.id,
                %entity,
                missed,
                "missed change notices, re-querying"
            ),
        }
    }

    /// Tears the session down and unsubscribes.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.context = None;
        self.data.send_replace(None);
        self.set_state(SessionState::Closed);
        debug!(session = %self.id, "closed session");
    }

    /// Runs the session as a task which keeps its data up to date until it is closed.
    ///
    /// The session is opened first if it is not open yet.
    pub fn spawn(self) -> SessionHandle<StoreError<S>> {
        let id = self.id;
        let state = self.state.subscribe();
        let data = self.data.subscribe();
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(close_rx));

        SessionHandle {
            id,
            state,
            data,
            close: Some(close_tx),
            task,
        }
    }

    async fn run(mut self, mut close: oneshot::Receiver<()>) -> Result<(), S> {
        let result = self.drive(&mut close).await;
        if let Err(err) = &result {
            warn!(session = %self.id, %err, "session failed");
        }
        self.teardown();
        result
    }

    async fn drive(&mut self, close: &mut oneshot::Receiver<()>) -> Result<(), S> {
        // Sessions opened before spawning keep their context.
        if self.context.is_none() || self.subscription.is_none() {
            self.prepare().await?;
        }

        loop {
            // Queries in flight when the session is closed complete, their result is discarded.
            let data = self.load().await?;
            if close_requested(close) {
                return Ok(());
            }
            self.apply(data);

            let notice = tokio::select! {
                _ = &mut *close => return Ok(()),
                notice = self.next_change() => notice,
            };
            let Some(notice) = notice else {
                return Ok(());
            };
            self.log_notice(&notice);
            self.set_state(SessionState::Refreshing);
        }
    }
}

fn close_requested(close: &mut oneshot::Receiver<()>) -> bool {
    !matches!(close.try_recv(), Err(TryRecvError::Empty))
}

/// Handle to a session running as a task.
///
/// Dropping the handle closes the session.
pub struct SessionHandle<E> {
    id: SessionId,
    state: watch::Receiver<SessionState>,
    data: watch::Receiver<Option<ViewData>>,
    close: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::result::Result<(), GatewayError<E>>>,
}

impl<E> SessionHandle<E> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Latest data of the session, `None` before the first query completed and after closing.
    pub fn data(&self) -> Option<ViewData> {
        self.data.borrow().clone()
    }

    /// Waits until the session published data which the predicate accepts.
    ///
    /// Returns `None` if the session ended before.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&ViewData) -> bool) -> Option<ViewData> {
        let data = self
            .data
            .wait_for(|data| data.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        (*data).clone()
    }

    /// Waits until the session reached the given state. Returns `false` if the session ended
    /// before.
    pub async fn wait_for_state(&mut self, state: SessionState) -> bool {
        self.state.wait_for(|current| *current == state).await.is_ok()
    }

    /// Asks the session to close. A query in flight completes and its result is discarded.
    pub fn close(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }

    /// Waits for the session task to end and returns the error which ended it, if any.
    pub async fn join(self) -> std::result::Result<(), GatewayError<E>> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Ok(()),
        }
    }
}
