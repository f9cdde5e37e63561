use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Result;
use service::{Channel, Delivery};
use tokio::{
    io::{AsyncBufReadExt, BufReader, stdin},
    net::UdpSocket,
};

/// A messaging peer: one socket bound for receiving, one connected socket
/// for sending, and the channel state between them.
///
/// The transmit and receive paths never wake each other. Transmitting ends
/// when the input source says so; receiving ends when the socket goes
/// away.
pub struct Client {
    channel: Channel,
    receiver: UdpSocket,
    sender: UdpSocket,
}

impl Client {
    pub async fn new(bind: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let receiver = UdpSocket::bind(bind).await?;

        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let sender = UdpSocket::bind(local).await?;
        sender.connect(peer).await?;

        Ok(Self {
            channel: Channel::new(),
            receiver,
            sender,
        })
    }

    /// The local synchronization source identifier.
    pub fn ssrc(&self) -> u32 {
        self.channel.ssrc()
    }

    /// Fragment a message and transmit every resulting datagram.
    pub async fn send_message(&self, message: &[u8]) -> Result<()> {
        for datagram in self.channel.send(message)? {
            self.sender.send(&datagram).await?;
        }

        Ok(())
    }

    /// Read one datagram off the receive socket and run it through the
    /// channel. `None` means a fragment was absorbed and the message is
    /// still incomplete.
    pub async fn recv_message(&self) -> Result<Option<Delivery>> {
        let mut buf = [0u8; 2048];
        let (size, _) = self.receiver.recv_from(&mut buf).await?;
        Ok(self.channel.recv(&buf[..size])?)
    }

    /// Run both halves of the peer until the interactive input quits.
    pub async fn run(self) -> Result<()> {
        let client = Arc::new(self);

        let receiver = client.clone();
        let receiving = tokio::spawn(async move { receiver.start_receiving().await });

        let result = client.start_sending().await;
        receiving.abort();
        result
    }

    /// Receive loop: decode, reassemble, print.
    ///
    /// A datagram that fails to decode or violates the fragment protocol
    /// is logged and dropped; only a socket error ends the loop, and that
    /// is a normal shutdown, not something to report loudly.
    async fn start_receiving(&self) {
        let mut buf = vec![0u8; 2048];

        loop {
            let size = match self.receiver.recv_from(&mut buf).await {
                Ok((size, _)) => size,
                Err(_) => break,
            };

            match self.channel.recv(&buf[..size]) {
                Ok(Some(delivery)) if !delivery.message.is_empty() => {
                    println!(
                        "\n[0x{:X} seq={}] {}",
                        delivery.ssrc,
                        delivery.sequence_number,
                        String::from_utf8_lossy(&delivery.message)
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("datagram dropped: err={}", e);
                }
            }
        }
    }

    /// Transmit loop: one message per line of input, until `quit` or the
    /// input closes. A rejected or failed send drops that line and keeps
    /// the loop alive.
    async fn start_sending(&self) -> Result<()> {
        let mut lines = BufReader::new(stdin()).lines();

        println!("Type a message and press Enter to send (type 'quit' to exit):");

        while let Some(line) = lines.next_line().await? {
            if line == "quit" {
                break;
            }

            if line.is_empty() {
                continue;
            }

            if let Err(e) = self.send_message(line.as_bytes()).await {
                log::error!("message not sent: err={}", e);
            }
        }

        Ok(())
    }
}
