use std::net::UdpSocket;

/// Guesses the address of the interface used for outgoing traffic.
///
/// A UDP socket is "connected" to a public address; nothing is sent, the OS
/// only picks the route. Falls back to `127.0.0.1`.
pub fn guess_local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[test]
    fn guessed_ip_parses() {
        let ip = guess_local_ip();
        assert!(ip.parse::<IpAddr>().is_ok(), "not an address: {ip}");
    }
}
