//! Network subsystem for multicast UDP audio transport

pub mod packet;
pub mod transport;

pub use packet::{depacketize, packetize};
pub use transport::{MulticastReceiver, MulticastSender, Recv};
