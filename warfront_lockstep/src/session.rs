// One transport session: a connected peer's socket plus its write half.
//
// A `Session` owns exactly one TCP stream. Reads happen on the session's
// dedicated reader thread (spawned by the connection manager, which also
// does the routing); writes go through a mutex-guarded `BufWriter` so any
// thread — a reader relaying on the host, or the tick thread emitting its
// no-input ack — can send without interleaving frames.
//
// The raw stream handle is kept alongside the buffered halves: calling
// `close()` shuts the socket down at the OS level, which is what unblocks a
// reader parked in `read_exact` during shutdown or session teardown.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Mutex;
use std::time::Duration;

use warfront_protocol::{CodecError, NetMessage, PlayerNumber, SessionId, write_message};

use crate::lock;

/// A connected peer. Created by the connection manager on accept (host) or
/// connect (join); destroyed on disconnect or shutdown. The session is the
/// only place that writes to its socket.
pub struct Session {
    id: SessionId,
    remote_addr: SocketAddr,
    stream: TcpStream,
    writer: Mutex<BufWriter<TcpStream>>,
    slot: Mutex<Option<PlayerNumber>>,
}

impl Session {
    pub(crate) fn new(id: SessionId, stream: TcpStream) -> io::Result<Session> {
        let remote_addr = stream.peer_addr()?;
        let writer = BufWriter::new(stream.try_clone()?);
        Ok(Session {
            id,
            remote_addr,
            stream,
            writer: Mutex::new(writer),
            slot: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The seat this session occupies, once assigned.
    #[must_use]
    pub fn slot(&self) -> Option<PlayerNumber> {
        *lock(&self.slot)
    }

    pub(crate) fn set_slot(&self, number: Option<PlayerNumber>) {
        *lock(&self.slot) = number;
    }

    /// Serialize and send one message. Callable from any thread; frames
    /// never interleave because the writer is locked for the whole frame.
    pub fn send(&self, msg: &NetMessage) -> Result<(), CodecError> {
        write_message(&mut *lock(&self.writer), msg)
    }

    /// A buffered read half on the same socket, for the reader thread.
    pub(crate) fn reader(&self) -> io::Result<BufReader<TcpStream>> {
        Ok(BufReader::new(self.stream.try_clone()?))
    }

    /// Socket-level read timeout. Shared with the reader clone (timeouts
    /// live on the underlying socket, not the handle).
    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    /// Shut the socket down both ways. Safe to call more than once; a
    /// reader blocked on this socket fails out of its read.
    pub(crate) fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use warfront_protocol::read_message;

    use super::*;

    /// A connected (client, server) stream pair on localhost.
    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn send_frames_arrive_in_order() {
        let (client, server) = tcp_pair();
        let session = Session::new(SessionId(1), server).unwrap();

        session
            .send(&NetMessage::Welcome {
                motd: "hello".into(),
            })
            .unwrap();
        session
            .send(&NetMessage::SlotAssign {
                slot: PlayerNumber(1),
            })
            .unwrap();

        let mut reader = BufReader::new(client);
        assert_eq!(
            read_message(&mut reader).unwrap(),
            NetMessage::Welcome {
                motd: "hello".into()
            }
        );
        assert_eq!(
            read_message(&mut reader).unwrap(),
            NetMessage::SlotAssign {
                slot: PlayerNumber(1)
            }
        );
    }

    #[test]
    fn close_unblocks_a_pending_read() {
        let (client, server) = tcp_pair();
        let session = Session::new(SessionId(1), server).unwrap();

        let handle = std::thread::spawn(move || {
            let mut reader = BufReader::new(client);
            read_message(&mut reader)
        });

        // Give the reader a moment to park in read_exact.
        std::thread::sleep(Duration::from_millis(50));
        session.close();

        let result = handle.join().unwrap();
        assert!(result.is_err(), "read should fail once the peer closes");
    }

    #[test]
    fn slot_assignment_is_visible_across_threads() {
        let (_client, server) = tcp_pair();
        let session = std::sync::Arc::new(Session::new(SessionId(2), server).unwrap());
        assert_eq!(session.slot(), None);

        let clone = session.clone();
        std::thread::spawn(move || clone.set_slot(Some(PlayerNumber(3))))
            .join()
            .unwrap();
        assert_eq!(session.slot(), Some(PlayerNumber(3)));
    }
}
