use tokio::sync::watch;

/// Number of dispatch and meta-event tasks a bus has spawned and not yet
/// finished, published so `drain` can wait for it to reach zero.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    count: watch::Sender<usize>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self {
            count: watch::Sender::new(0),
        }
    }
}

impl InFlight {
    /// Must be taken before the task is spawned, so a child tracked from a
    /// running task keeps the count above zero.
    pub(crate) fn track(&self) -> InFlightGuard {
        self.count.send_modify(|count| *count += 1);
        InFlightGuard {
            count: self.count.clone(),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        *self.count.borrow()
    }

    pub(crate) async fn settled(&self) {
        let mut count = self.count.subscribe();
        // The sender outlives the receiver, so waiting cannot fail.
        let _ = count.wait_for(|pending| *pending == 0).await;
    }
}

pub(crate) struct InFlightGuard {
    count: watch::Sender<usize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|count| *count -= 1);
    }
}
