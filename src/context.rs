//! Deadlines and cancellation for blocking calls.
//!
//! A [Context] carries an optional deadline and a cancellation token. Child
//! contexts inherit both, may shorten the deadline, and are cancelled when
//! their parent is, so a call can abandon every sub-query it spawned.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use flume::{Receiver, Selector, Sender};

#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: Arc<Token>,
}

#[derive(Debug)]
struct Token {
    /// Dropped on cancellation, which disconnects `done`.
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    children: Mutex<Vec<Weak<Token>>>,
}

impl Token {
    fn new() -> Arc<Self> {
        let (trigger, done) = flume::bounded(0);

        Arc::new(Self {
            trigger: Mutex::new(Some(trigger)),
            done,
            children: Mutex::new(Vec::new()),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.done.is_disconnected()
    }

    fn cancel(&self) {
        if let Ok(mut trigger) = self.trigger.lock() {
            trigger.take();
        }

        let children = match self.children.lock() {
            Ok(mut children) => std::mem::take(&mut *children),
            Err(_) => return,
        };

        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn child(self: &Arc<Self>) -> Arc<Self> {
        let child = Token::new();

        if let Ok(mut children) = self.children.lock() {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }

        // The parent may have been cancelled before this child was registered.
        if self.is_cancelled() {
            child.cancel();
        }

        child
    }
}

impl Context {
    /// A context that never expires and is only cancelled explicitly.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: Token::new(),
        }
    }

    /// A root context expiring after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A root context expiring at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: Token::new(),
        }
    }

    /// A child context, cancelled with this one or on its own.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child(),
        }
    }

    /// A child context whose deadline is at most `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;

        Self {
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
            token: self.token.child(),
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why this context is done, or `None` if it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// A receiver that disconnects once this context is cancelled.
    ///
    /// It does not observe the deadline, combine it with [Self::deadline].
    pub fn done(&self) -> &Receiver<()> {
        &self.token.done
    }

    /// Block until a message arrives on `receiver`, or this context is done.
    pub fn recv<T>(&self, receiver: &Receiver<T>) -> Result<T, RecvError> {
        self.check()?;

        let selector = Selector::new()
            .recv(receiver, |result| match result {
                Ok(message) => Ok(message),
                Err(_) => Err(RecvError::Disconnected),
            })
            .recv(self.done(), |_| Err(RecvError::Context(ContextError::Cancelled)));

        match self.deadline {
            Some(deadline) => selector
                .wait_deadline(deadline)
                .unwrap_or(Err(RecvError::Context(ContextError::DeadlineExceeded))),
            None => selector.wait(),
        }
    }

    /// Sleep for `duration`, returning early with an error if this context is done first.
    pub fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        // Nothing is ever sent on this channel.
        let (_sender, receiver) = flume::bounded::<()>(0);
        let until = Instant::now() + duration;

        let sleeper = Context {
            deadline: Some(self.deadline.map_or(until, |d| d.min(until))),
            token: self.token.clone(),
        };

        match sleeper.recv(&receiver) {
            Err(RecvError::Context(ContextError::DeadlineExceeded)) => self.check(),
            Err(RecvError::Context(error)) => Err(error),
            _ => self.check(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// The caller gave up on the call.
pub enum ContextError {
    #[error("Context cancelled")]
    Cancelled,

    #[error("Context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("All senders were dropped")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn background_is_live() {
        let ctx = Context::background();

        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.remaining(), None);
    }

    #[test]
    fn deadline() {
        let ctx = Context::with_timeout(Duration::from_millis(20));
        let (_sender, receiver) = flume::unbounded::<()>();

        let start = Instant::now();
        assert_eq!(
            ctx.recv(&receiver),
            Err(RecvError::Context(ContextError::DeadlineExceeded))
        );
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn cancel_wakes_receiver() {
        let ctx = Context::background();
        let (_sender, receiver) = flume::unbounded::<()>();

        let clone = ctx.clone();
        let handle = thread::spawn(move || clone.recv(&receiver));

        thread::sleep(Duration::from_millis(20));
        ctx.cancel();

        assert_eq!(
            handle.join().unwrap(),
            Err(RecvError::Context(ContextError::Cancelled))
        );
    }

    #[test]
    fn children_follow_parent() {
        let parent = Context::background();
        let child = parent.child();
        let grandchild = child.child_with_timeout(Duration::from_secs(10));

        child.cancel();
        assert_eq!(parent.err(), None);
        assert_eq!(grandchild.err(), Some(ContextError::Cancelled));

        let child = parent.child();
        parent.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));

        // Children of a cancelled context are born cancelled.
        assert_eq!(parent.child().err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn child_deadline_is_bounded_by_parent() {
        let parent = Context::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(10));

        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn message_before_deadline() {
        let ctx = Context::with_timeout(Duration::from_secs(10));
        let (sender, receiver) = flume::unbounded();

        sender.send(7).unwrap();

        assert_eq!(ctx.recv(&receiver), Ok(7));

        drop(sender);
        assert_eq!(ctx.recv(&receiver), Err(RecvError::Disconnected));
    }

    #[test]
    fn sleep() {
        let ctx = Context::background();
        assert_eq!(ctx.sleep(Duration::from_millis(5)), Ok(()));

        let ctx = Context::with_timeout(Duration::from_millis(5));
        assert_eq!(
            ctx.sleep(Duration::from_secs(10)),
            Err(ContextError::DeadlineExceeded)
        );
    }
}
