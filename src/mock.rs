//! In-memory UART and DE/RE pin for unit tests.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::future::poll_fn;
use core::task::Poll;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl embedded_io_async::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::BrokenPipe
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

#[derive(Default)]
struct Inner {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    pending: Vec<u8>,
    flushes: usize,
    fail_writes: bool,
    writes_while_receiving: usize,
    de_level: Option<Rc<Cell<bool>>>,
    responder: Option<Responder>,
}

/// Scripted byte channel. Reads return `Pending` when nothing is queued.
#[derive(Clone, Default)]
pub struct MockPort {
    inner: Rc<RefCell<Inner>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be read.
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.inner.borrow().written.clone()
    }

    pub fn take_written(&self) -> Vec<u8> {
        core::mem::take(&mut self.inner.borrow_mut().written)
    }

    pub fn flushes(&self) -> usize {
        self.inner.borrow().flushes
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    /// Record writes that happen while `pin` is in receive mode.
    pub fn watch(&self, pin: &MockPin) {
        self.inner.borrow_mut().de_level = Some(pin.level.clone());
    }

    pub fn writes_while_receiving(&self) -> usize {
        self.inner.borrow().writes_while_receiving
    }

    /// Called with each flushed transmission; its output is queued for reading.
    pub fn respond_with(&self, f: impl FnMut(&[u8]) -> Vec<u8> + 'static) {
        self.inner.borrow_mut().responder = Some(Box::new(f));
    }
}

impl ErrorType for MockPort {
    type Error = MockError;
}

impl Read for MockPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        poll_fn(|_cx| {
            let mut inner = self.inner.borrow_mut();
            if inner.rx.is_empty() {
                return Poll::Pending;
            }
            let mut n = 0;
            while n < buf.len() {
                match inner.rx.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Poll::Ready(Ok(n))
        })
        .await
    }
}

impl Write for MockPort {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(MockError);
        }
        if inner.de_level.as_ref().is_some_and(|l| !l.get()) {
            inner.writes_while_receiving += 1;
        }
        inner.written.extend_from_slice(buf);
        inner.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        inner.flushes += 1;
        let sent = core::mem::take(&mut inner.pending);
        if let Some(mut responder) = inner.responder.take() {
            let reply = responder(&sent);
            inner.rx.extend(reply);
            inner.responder = Some(responder);
        }
        Ok(())
    }
}

/// Direction pin that logs every level it is driven to.
#[derive(Clone, Default)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    log: Rc<RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.get()
    }

    /// Levels driven so far, `true` = transmit.
    pub fn log(&self) -> Vec<bool> {
        self.log.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        self.log.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        self.log.borrow_mut().push(true);
        Ok(())
    }
}
