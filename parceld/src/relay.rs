//! The relay's fan-out state machine: one `mio`-polled event loop thread,
//! a bounded array of per-peer slots, and the handshake/rekey calls into
//! `parcel_core::handshake`. Grounded in `original_source/src/parceld/daemon.c`'s
//! `server_t`/`add_client`/`transfer_message`/`disconnect_client`/`recv_client`/
//! `main_thread`, with `select`'s `fd_set` replaced by `mio::Poll` (design
//! note §4.7) and socket-index bookkeeping kept but renamed to "slots".

use std::io::{self, Read, Write};
use std::net::TcpListener as StdTcpListener;
use std::thread;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use parcel_core::error::{CoreError, Result};
use parcel_core::handshake::{n_party_server, two_party_server};
use parcel_core::keys::SymKey;

/// Mirrors `MAX_CONNECTIONS` in the original `daemon.h`: the bound on
/// simultaneously connected peers, including the reserved zero slot.
const MAX_CONNECTIONS: usize = 64;
const LISTENER: Token = Token(0);

/// Per-byte-read scratch buffer. The relay never interprets message
/// content — it only needs a buffer large enough to hold one `recv()`'s
/// worth of an encrypted cable, matching `recv_client`'s `msg_t::data`.
const RECV_BUFFER_SIZE: usize = 1 << 17;

/// A live peer connection. A free slot is simply `None` in `Relay::slots`
/// — there is no intermediate state, since `accept_pending` only ever
/// inserts a slot once its handshake has already completed.
struct Slot {
    stream: TcpStream,
}

pub struct Relay {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    slots: Vec<Option<Slot>>,
    active_connections: usize,
    control_key: SymKey,
}

/// Adapts a non-blocking `mio` stream to blocking `Read`/`Write` by
/// spin-retrying on `WouldBlock`. Used only for the bounded, low-frequency
/// handshake/rekey exchanges — never on the steady-state fan-out path —
/// so the relay's single event-loop thread can still reuse
/// `parcel_core::handshake`'s blocking-transport-shaped functions.
struct BlockingAdapter<'a>(&'a mut TcpStream);

impl Read for BlockingAdapter<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.0.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
                result => return result,
            }
        }
    }
}

impl Write for BlockingAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.0.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
                result => return result,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Relay {
    pub fn bind(port: u16) -> Result<Relay> {
        let std_listener = StdTcpListener::bind(("0.0.0.0", port))
            .map_err(|e| CoreError::io("relay_bind", e))?;
        std_listener.set_nonblocking(true).map_err(|e| CoreError::io("relay_bind", e))?;
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new().map_err(|e| CoreError::io("relay_bind", e))?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(|e| CoreError::io("relay_bind", e))?;

        let mut slots = Vec::with_capacity(MAX_CONNECTIONS + 1);
        for _ in 0..=MAX_CONNECTIONS {
            slots.push(None);
        }

        let mut seed = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut seed);

        Ok(Relay {
            poll,
            events: Events::with_capacity(128),
            listener,
            slots,
            active_connections: 0,
            control_key: SymKey::new(seed),
        })
    }

    /// Run the event loop forever. Mirrors `main_thread`'s `select` loop.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.poll.poll(&mut self.events, None).map_err(|e| CoreError::io("relay_run", e))?;

            let tokens: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
            for token in tokens {
                if token == LISTENER {
                    self.accept_pending()?;
                } else {
                    self.service_slot(token.0);
                }
            }
        }
    }

    fn first_free_slot(&self) -> Option<usize> {
        (1..=MAX_CONNECTIONS).find(|&i| self.slots[i].is_none())
    }

    /// Drain every pending connection, handshake each synchronously
    /// (mirrors the original's own synchronous `two_party_server` call
    /// inside `add_client`), then run one N-party rekey round including
    /// the new peer. Mirrors `add_client` plus `main_thread`'s trailing
    /// `n_party_server` call.
    fn accept_pending(&mut self) -> Result<()> {
        loop {
            let (mut stream, _addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(CoreError::io("accept_pending", e)),
            };

            let Some(index) = self.first_free_slot() else {
                log::warn!("rejecting connection: at capacity ({} slots)", MAX_CONNECTIONS);
                continue;
            };

            let handshake_result = {
                let mut adapter = BlockingAdapter(&mut stream);
                two_party_server(&mut adapter, &self.control_key)
            };

            if let Err(e) = handshake_result {
                log::warn!("handshake failed for incoming connection: {e}");
                continue;
            }

            self.poll
                .registry()
                .register(&mut stream, Token(index), Interest::READABLE)
                .map_err(|e| CoreError::io("accept_pending", e))?;

            self.slots[index] = Some(Slot { stream });
            self.active_connections += 1;
            log::info!("connection added to slot {index}, {} active", self.active_connections);

            if let Err(e) = self.rekey_all() {
                log::error!("rekey after accept failed: {e}");
            }
        }

        // unreachable, loop only exits via early return
    }

    /// Collect every other live slot's stream as a blocking adapter for a
    /// rekey round, skipping when fewer than two peers are connected
    /// (mirrors `n_party_server`'s own `rounds < 1` short-circuit).
    fn rekey_all(&mut self) -> Result<()> {
        if self.active_connections < 1 {
            return Ok(());
        }

        let mut live: Vec<BlockingAdapter<'_>> = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut())
            .map(|slot| BlockingAdapter(&mut slot.stream))
            .collect();

        n_party_server(&mut live, &mut self.control_key)
    }

    /// Read whatever bytes are available from one client socket and fan
    /// them out verbatim to every other live slot, exactly as
    /// `transfer_message` forwards `msg->data` without inspecting it — the
    /// relay never holds the session key needed to decrypt peer traffic.
    fn service_slot(&mut self, index: usize) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        let read_result = match &mut self.slots[index] {
            Some(slot) => slot.stream.read(&mut buf),
            None => return,
        };

        match read_result {
            Ok(0) => self.disconnect(index),
            Ok(n) => {
                // Highest index first: disconnecting a lower-indexed slot
                // swaps the current highest live slot down into it, which
                // would otherwise relocate a still-pending failed index
                // out from under us before we get to it.
                let mut failed = self.fan_out(index, &buf[..n]);
                failed.sort_unstable_by(|a, b| b.cmp(a));
                for slot in failed {
                    log::error!("write failed fanning out to slot {slot}, disconnecting it");
                    self.disconnect(slot);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                log::warn!("read error on slot {index}: {e}");
                self.disconnect(index);
            }
        }
    }

    /// Fan `bytes` out to every other live slot, continuing past any
    /// individual write failure rather than aborting the whole broadcast.
    /// Returns the indices of recipients whose write failed — per the
    /// spec, a failed write is treated as *that peer's* disconnect, not
    /// the sender's.
    fn fan_out(&mut self, sender_index: usize, bytes: &[u8]) -> Vec<usize> {
        let mut failed = Vec::new();
        for i in 1..=MAX_CONNECTIONS {
            if i == sender_index {
                continue;
            }
            if let Some(slot) = &mut self.slots[i] {
                let mut adapter = BlockingAdapter(&mut slot.stream);
                if adapter.write_all(bytes).is_err() {
                    failed.push(i);
                }
            }
        }
        failed
    }

    /// Deregister and close a slot, then compact the active range by
    /// moving the highest-indexed live slot into the vacated position —
    /// mirrors `disconnect_client`'s `sockets[client_index] =
    /// sockets[active_connections]` swap, then rekeys the survivors.
    fn disconnect(&mut self, index: usize) {
        if let Some(mut slot) = self.slots[index].take() {
            let _ = self.poll.registry().deregister(&mut slot.stream);
        }

        let last_active = self.active_connections;
        if index != last_active {
            self.slots.swap(index, last_active);
            if let Some(slot) = &mut self.slots[index] {
                let _ = self.poll.registry().reregister(&mut slot.stream, Token(index), Interest::READABLE);
            }
        }
        self.active_connections = self.active_connections.saturating_sub(1);

        log::info!("slot disconnected, {} active", self.active_connections);

        if let Err(e) = self.rekey_all() {
            log::error!("rekey after disconnect failed: {e}");
        }
    }
}
