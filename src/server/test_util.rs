//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use bytes::BytesMut;
use rstest::fixture;

use super::{Bound, DumpServer};
use crate::{
    codec::DumpFrameCodec,
    frame::{DeviceId, FirmwareVersion, Frame},
    sink::MemorySink,
};

#[fixture]
pub fn sink() -> MemorySink { MemorySink::new() }

#[fixture]
/// Returns a bound [`TcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

/// Extract the bound address from a listener.
#[must_use]
pub fn listener_addr(listener: &StdTcpListener) -> SocketAddr {
    listener
        .local_addr()
        .expect("failed to get listener address")
}

pub fn bind_server(sink: MemorySink, listener: StdTcpListener) -> DumpServer<MemorySink, Bound> {
    DumpServer::new(sink)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

/// Wire bytes of a complete dump carrying `payload` in one transfer frame.
pub fn dump_bytes(device: [u8; 6], payload: &[u8]) -> Vec<u8> {
    let device = DeviceId::new(device);
    let version: FirmwareVersion = "v2.1.2".parse().expect("version fits");
    let codec = DumpFrameCodec::default();
    let mut buf = BytesMut::new();
    for frame in [
        Frame::start(device, version, u32::try_from(payload.len()).expect("small payload")),
        Frame::transferring(device, version, payload.to_vec()),
        Frame::end(device, version),
    ] {
        codec.encode_frame(&frame, &mut buf).expect("encode frame");
    }
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_addr_matches_local_addr() {
        let listener = free_listener();
        assert_eq!(
            listener_addr(&listener),
            listener.local_addr().expect("failed to get address")
        );
    }

    #[test]
    fn dump_bytes_frames_payload() {
        let bytes = dump_bytes([1, 2, 3, 4, 5, 6], b"abc");
        assert_eq!(bytes.len(), 32 * 3 + 3);
    }
}
